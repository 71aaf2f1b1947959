// Copyright (c) 2024 Botho Foundation

//! Errors raised while building, combining and finishing slates.

use crate::{ParticipantId, SlateState};
use bth_transaction_core::validation::TransactionValidationError;
use displaydoc::Display;

/// A slate error. Failures caused by one participant's contribution name it.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum Error {
    /// No slates to combine
    NoSlates,

    /// Slate version {0} does not match {1}
    VersionMismatch(u16, u16),

    /// Slates belong to different sessions
    SessionMismatch,

    /// Slates disagree on the asset
    AssetMismatch,

    /// Slates disagree on the kernel fee
    FeeMismatch,

    /// Slates disagree on the amount
    AmountMismatch,

    /// Slates disagree on the session parameters
    ParametersMismatch,

    /// Slates are in different states: {0} and {1}
    StateMismatch(SlateState, SlateState),

    /// Slates disagree on the offset
    OffsetMismatch,

    /// Participant {0} has conflicting entries
    ParticipantMismatch(ParticipantId),

    /// Output {0} has conflicting proofs
    OutputMismatch(String),

    /// Expected a {expected} slate, found a {found} one
    UnexpectedState {
        /// Required state
        expected: SlateState,
        /// Actual state
        found: SlateState,
    },

    /// Participant {0} is not part of the slate
    UnknownParticipant(ParticipantId),

    /// The slate has no multisig fund owner
    NoFundOwner,

    /// The slate mints no joint output
    NoJointOutput,

    /// Amounts overflow
    AmountOverflow,

    /// Participant {0} has not signed
    MissingPartialSignature(ParticipantId),

    /// Invalid partial signature from participant {0}
    InvalidPartialSignature(ParticipantId),

    /// The aggregated signature does not verify
    InvalidSignature,

    /// Participant {0} has not published its bulletproof share
    MissingBulletproofShare(ParticipantId),

    /// Invalid bulletproof share from participant {0}
    InvalidBulletproofShare(ParticipantId),

    /// Joint range proof: {0}
    RangeProof(bth_crypto_range_proof::Error),

    /// Surjection proof: {0}
    Surjection(bth_crypto_surjection::Error),

    /// Signature: {0}
    Multisig(bth_crypto_multisig::Error),

    /// Commitment: {0}
    Commitment(bth_crypto_commitment::Error),

    /// The assembled transaction is invalid: {0}
    Validation(TransactionValidationError),
}

impl std::error::Error for Error {}

impl From<bth_crypto_range_proof::Error> for Error {
    fn from(src: bth_crypto_range_proof::Error) -> Self {
        Self::RangeProof(src)
    }
}

impl From<bth_crypto_surjection::Error> for Error {
    fn from(src: bth_crypto_surjection::Error) -> Self {
        Self::Surjection(src)
    }
}

impl From<bth_crypto_multisig::Error> for Error {
    fn from(src: bth_crypto_multisig::Error) -> Self {
        Self::Multisig(src)
    }
}

impl From<bth_crypto_commitment::Error> for Error {
    fn from(src: bth_crypto_commitment::Error) -> Self {
        Self::Commitment(src)
    }
}

impl From<TransactionValidationError> for Error {
    fn from(src: TransactionValidationError) -> Self {
        Self::Validation(src)
    }
}
