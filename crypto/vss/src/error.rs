// Copyright (c) 2024 Botho Foundation

//! Errors which can occur while sharing or reconstructing secrets.

use displaydoc::Display;
use serde::{Deserialize, Serialize};

/// An error which can occur in secret sharing.
#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// Threshold {threshold} is not in 1..={share_count}
    InvalidThreshold {
        /// Requested threshold
        threshold: u32,
        /// Number of shareholders
        share_count: u32,
    },

    /// Insufficient shares: got {got}, need {need}
    InsufficientShares {
        /// Distinct verified shares supplied
        got: usize,
        /// Threshold
        need: usize,
    },

    /// Share index {0} supplied twice
    DuplicateShareIndex(u32),

    /// Share {0} is inconsistent with the sharing commitment
    InvalidShare(u32),

    /// Share index {0} is outside the sharing
    ShareIndexOutOfRange(u32),

    /// The encrypted share could not be decrypted
    Decryption,

    /// Commitment: {0}
    Commitment(bth_crypto_commitment::Error),
}

impl std::error::Error for Error {}

impl From<bth_crypto_commitment::Error> for Error {
    fn from(src: bth_crypto_commitment::Error) -> Self {
        Self::Commitment(src)
    }
}
