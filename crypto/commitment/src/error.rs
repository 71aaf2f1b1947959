// Copyright (c) 2024 Botho Foundation

//! Errors which can occur when decoding or combining commitments.

use displaydoc::Display;
use serde::{Deserialize, Serialize};

/// An error which can occur in the commitment algebra.
#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Error {
    /// Invalid curve point encoding
    InvalidCurvePoint,

    /// Scalar is not canonically encoded
    InvalidScalar,

    /// Incorrect length for array copy, provided `{0}`, required `{1}`
    LengthMismatch(usize, usize),

    /// Invalid hex encoding
    InvalidHex,
}

impl std::error::Error for Error {}

impl From<hex::FromHexError> for Error {
    fn from(_: hex::FromHexError) -> Self {
        Self::InvalidHex
    }
}
