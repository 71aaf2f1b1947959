// Copyright (c) 2024 Botho Foundation

//! Pedersen verifiable secret sharing over the Ristretto scalar field.
//!
//! A dealer splits a blinding factor `s` with two random polynomials
//! `f(x) = s + a_1·x + ...` and `g(x) = b_0 + b_1·x + ...` of degree `k − 1`
//! and publishes `C_j = a_j·G + b_j·H` for every coefficient. Shareholder `i`
//! receives `(f(i), g(i))` and checks it against the published commitment
//! without learning anything about the other shares. Any `k` verified shares
//! reconstruct `s` by Lagrange interpolation at zero.

#![deny(missing_docs)]

mod encryption;
mod error;
mod sharing;

pub use crate::{
    encryption::EncryptedShare,
    error::Error,
    sharing::{open_blind, share_blind, verify_share, SharingCommitment, VerifiableShare},
};
