// Copyright (c) 2024 Botho Foundation

//! Bulletproof range proofs for 64-bit values.
//!
//! A proof shows that the value committed in `V = v·B + γ·B̃` lies in
//! `[0, 2^64)`, where `B` is an output's asset commitment and `B̃` is the
//! blinding basepoint.
//!
//! The blinding `γ` of a jointly owned output is never held by one party.
//! The [`mpc`] module splits proving into three rounds so that every owner
//! contributes its share of `γ` (as `taux`) without revealing it, and a
//! single coordinator assembles one proof that verifies like any other.

#![deny(missing_docs)]
#![allow(non_snake_case)]

mod error;
mod generators;
mod inner_product_proof;
mod range_proof;
mod transcript;
mod util;

pub mod mpc;

pub use crate::{
    error::Error,
    generators::BITS,
    range_proof::{RangeProof, RANGE_PROOF_SIZE},
};
