// Copyright (c) 2024 Botho Foundation

//! Errors which can occur when proving or verifying ranges.

use displaydoc::Display;
use serde::{Deserialize, Serialize};

/// An error which can occur in range proving.
#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// The proof does not verify against the commitment
    VerificationError,

    /// Malformed proof encoding: {0}
    Format(String),

    /// No taux shares were supplied
    MissingTauxShares,

    /// Commitment: {0}
    Commitment(bth_crypto_commitment::Error),
}

impl std::error::Error for Error {}

impl From<bth_crypto_commitment::Error> for Error {
    fn from(src: bth_crypto_commitment::Error) -> Self {
        Self::Commitment(src)
    }
}
