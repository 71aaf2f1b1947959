// Copyright (c) 2024 Botho Foundation

use bth_transaction_slate::ParticipantId;
use bth_wallet::WalletError;
use thiserror::Error;
use uuid::Uuid;

use crate::exchange::Round;

pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Errors that end a session on this node.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Slate error: {0}")]
    Slate(#[from] bth_transaction_slate::Error),

    #[error("Session {session}: round {round} timed out waiting for {missing:?}")]
    RoundTimeout {
        session: Uuid,
        round: Round,
        missing: Vec<ParticipantId>,
    },

    #[error("Session {0} was cancelled")]
    Cancelled(Uuid),

    #[error("No peer is configured for participant {0}")]
    UnknownPeer(ParticipantId),

    #[error("Participant {participant} did not accept the slate before the round ended: {reason}")]
    PeerUnreachable {
        participant: ParticipantId,
        reason: String,
    },

    #[error("Receiver failed: {0}")]
    ReceiverFailed(String),

    #[error("Ledger rejected the transaction: {0}")]
    Rejected(String),

    #[error("Session {0} did not reach the ledger in time")]
    LedgerTimeout(Uuid),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
