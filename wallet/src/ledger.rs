// Copyright (c) 2024 Botho Foundation

//! The wallet's view of the ledger.

use crate::error::Result;
use async_trait::async_trait;
use bth_crypto_commitment::CompressedCommitment;
use bth_transaction_core::{Output, Transaction};
use serde::{Deserialize, Serialize};

/// The ledger's verdict on a submitted transaction.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub accepted: bool,
    /// Why the transaction was rejected, or a note on its acceptance.
    #[serde(default)]
    pub log: String,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, tx: &Transaction) -> Result<SubmitResult>;

    /// Whether `commitment` is currently an unspent output.
    async fn output_exists(&self, commitment: &CompressedCommitment) -> Result<bool>;

    /// Create an output out of thin air. Only development ledgers accept
    /// this.
    async fn issue(&self, output: &Output) -> Result<SubmitResult>;
}
