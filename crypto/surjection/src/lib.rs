// Copyright (c) 2024 Botho Foundation

//! Surjection proofs for confidential asset types.
//!
//! An output's asset commitment `H'_o = H_a + r_o·G` surjects onto a ring of
//! input asset commitments `H'_i = H_{a_i} + r_i·G` if at least one input
//! carries the same asset: then `H'_o − H'_i = (r_o − r_i)·G` and the prover
//! knows its discrete log. The proof is a ring signature over the ring of
//! differences, so it does not reveal which input matched.

#![deny(missing_docs)]

mod error;
mod surjection_proof;

pub use crate::{
    error::Error,
    surjection_proof::{SurjectionInput, SurjectionProof, MAX_ITERATIONS, MAX_RING_SIZE},
};
