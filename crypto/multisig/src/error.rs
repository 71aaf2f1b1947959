// Copyright (c) 2024 Botho Foundation

//! Errors which can occur while signing or verifying.

use displaydoc::Display;
use serde::{Deserialize, Serialize};

/// An error which can occur in the aggregate signature scheme.
#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// The signature does not verify against the public key
    InvalidSignature,

    /// The partial signature does not verify against the signer's key
    InvalidPartialSignature,

    /// Nothing to aggregate
    NoPartialSignatures,

    /// Commitment: {0}
    Commitment(bth_crypto_commitment::Error),
}

impl std::error::Error for Error {}

impl From<bth_crypto_commitment::Error> for Error {
    fn from(src: bth_crypto_commitment::Error) -> Self {
        Self::Commitment(src)
    }
}
