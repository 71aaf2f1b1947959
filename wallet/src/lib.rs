// Copyright (c) 2024 Botho Foundation

//! Wallet side of the multi-party protocol: secret derivation, local
//! records, and the per-round operations of fund owners and receivers.

pub mod database;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod secrets;
pub mod threshold;
pub mod wallet;

pub use database::{
    Database, JointFund, OutputRecord, OutputStatus, SessionRole, TxRecord, TxStatus,
};
pub use error::WalletError;
pub use ledger::{LedgerClient, SubmitResult};
pub use memory::MemoryDatabase;
pub use secrets::{HkdfSecretGenerator, SecretGenerator};
pub use threshold::ThresholdWallet;
pub use wallet::{FundRequest, MultipartyWallet, SpendRequest, Wallet};
