// Copyright (c) 2018-2022 The Botho Foundation

use displaydoc::Display;
use serde::{Deserialize, Serialize};

/// Type alias for transaction validation results.
pub type TransactionValidationResult<T> = Result<T, TransactionValidationError>;

/// Reasons why a single transaction may fail to be valid.
#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
pub enum TransactionValidationError {
    /// A transaction must have at least one input.
    NoInputs,

    /**
     * A transaction must have no more than the maximum allowed number of
     * inputs.
     */
    TooManyInputs,

    /// Must have at least one output.
    NoOutputs,

    /**
     * A transaction must have no more than the maximum allowed number of
     * outputs.
     */
    TooManyOutputs,

    /// Inputs must not be repeated.
    DuplicateInputs,

    /// Output commitments must be unique.
    DuplicateOutputs,

    /// Output {0} has no range proof
    MissingRangeProof(usize),

    /// Output {0} has an invalid range proof: {1}
    InvalidRangeProof(usize, bth_crypto_range_proof::Error),

    /// Output {0} has no surjection proof
    MissingSurjectionProof(usize),

    /// Output {0} has an invalid surjection proof: {1}
    InvalidSurjectionProof(usize, bth_crypto_surjection::Error),

    /// The kernel is not signed.
    MissingKernelSignature,

    /// Invalid kernel signature: {0}
    InvalidKernelSignature(bth_crypto_multisig::Error),

    /// Inputs minus outputs, fee and offset do not equal the kernel excess.
    ExcessMismatch,

    /// Invalid commitment: {0}
    Commitment(bth_crypto_commitment::Error),
}

impl std::error::Error for TransactionValidationError {}

impl From<bth_crypto_commitment::Error> for TransactionValidationError {
    fn from(src: bth_crypto_commitment::Error) -> Self {
        Self::Commitment(src)
    }
}
