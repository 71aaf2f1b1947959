// Copyright (c) 2024 Botho Foundation

//! Errors which can occur when creating or verifying surjection proofs.

use displaydoc::Display;
use serde::{Deserialize, Serialize};

/// An error which can occur in surjection proofs.
#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// No input with a known opening carries the output's asset
    InputNotFound,

    /// Gave up sampling a ring after {0} iterations
    TooManyIterations(usize),

    /// Ring member {0} is not an input of the transaction
    UnknownRingMember(usize),

    /// Proof of {0} bytes is malformed
    Format(usize),

    /// The proof does not verify
    VerificationError,

    /// Commitment: {0}
    Commitment(bth_crypto_commitment::Error),
}

impl std::error::Error for Error {}

impl From<bth_crypto_commitment::Error> for Error {
    fn from(src: bth_crypto_commitment::Error) -> Self {
        Self::Commitment(src)
    }
}
