// Copyright (c) 2024 Botho Foundation

//! Wallet errors

use bth_transaction_slate::ParticipantId;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Slate error: {0}")]
    Slate(#[from] bth_transaction_slate::Error),

    #[error("Range proof error: {0}")]
    RangeProof(#[from] bth_crypto_range_proof::Error),

    #[error("Surjection proof error: {0}")]
    Surjection(#[from] bth_crypto_surjection::Error),

    #[error("Commitment error: {0}")]
    Commitment(#[from] bth_crypto_commitment::Error),

    #[error("Secret sharing failed for participant {participant}: {source}")]
    Sharing {
        participant: ParticipantId,
        source: bth_crypto_vss::Error,
    },

    #[error("No sharing of participant {0}'s blinding share")]
    MissingDealing(ParticipantId),

    #[error("Blind reconstructed for participant {0} does not match its public blind")]
    ReconstructionMismatch(ParticipantId),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Amount overflow")]
    AmountOverflow,

    #[error("Unknown output: {0}")]
    UnknownOutput(String),

    #[error("Output {0} is not jointly owned")]
    NotJoint(String),

    #[error("Output {0} is not spendable")]
    NotSpendable(String),

    #[error("Participant {0} is not an owner of the fund")]
    NotAnOwner(ParticipantId),

    #[error("Owner {0} is absent and the fund has no threshold")]
    MissingOwner(ParticipantId),

    #[error("No saved slate for session {0}")]
    MissingSavedSlate(Uuid),

    #[error("No record of session {0}")]
    UnknownSession(Uuid),

    #[error("Entry of participant {0} was altered")]
    EntryAltered(ParticipantId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid wallet seed: {0}")]
    InvalidSeed(String),

    #[error("Key derivation failed")]
    KeyDerivation,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Ledger error: {0}")]
    Ledger(String),
}

pub type Result<T> = std::result::Result<T, WalletError>;
