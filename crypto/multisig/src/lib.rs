// Copyright (c) 2024 Botho Foundation

//! Aggregate Schnorr signatures over Ristretto.
//!
//! Every signer `p` holds a secret key `x_p` and a secret nonce `r_p`. The
//! signers agree on the aggregated nonce `R = Σ R_p` and the aggregated key
//! `X = Σ X_p`, and each issues `s_p = r_p + H(R, X, msg)·x_p`. The sum
//! `s = Σ s_p` then verifies as an ordinary Schnorr signature `(R, s)`
//! against `X`.
//!
//! Partial signatures are checked one by one before they are summed, so a
//! bad contribution is always attributable to the signer that produced it.

#![deny(missing_docs)]

mod error;
mod signature;

pub use crate::{
    error::Error,
    signature::{
        aggregate, aggregate_public_keys, challenge, sign_partial, verify_partial,
        PartialSignature, Signature,
    },
};
