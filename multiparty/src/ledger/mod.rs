// Copyright (c) 2024 Botho Foundation

//! A development ledger: the set of unspent outputs, changed only by valid
//! transactions and by issuance.

pub mod rpc;

use async_trait::async_trait;
use bth_crypto_commitment::{AssetCommitment, CompressedCommitment, PedersenGens};
use bth_transaction_core::{
    validation::{validate, TransactionValidationError},
    Output, Transaction,
};
use bth_wallet::{LedgerClient, SubmitResult, WalletError};
use std::{collections::HashMap, sync::RwLock};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid transaction: {0}")]
    Invalid(#[from] TransactionValidationError),

    #[error("Input {0} is not an unspent output")]
    UnknownInput(CompressedCommitment),

    #[error("Output {0} already exists")]
    DuplicateOutput(CompressedCommitment),

    #[error("Issued output {0} has no valid range proof")]
    InvalidIssue(CompressedCommitment),

    #[error("Ledger state is poisoned")]
    Poisoned,
}

#[derive(Default)]
pub struct Ledger {
    unspent: RwLock<HashMap<CompressedCommitment, AssetCommitment>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `tx` against the unspent set and apply it.
    pub fn apply(&self, tx: &Transaction) -> Result<(), LedgerError> {
        validate(tx)?;
        let mut unspent = self.unspent.write().map_err(|_| LedgerError::Poisoned)?;
        for input in &tx.body.inputs {
            if unspent.get(&input.commitment) != Some(&input.asset_commitment) {
                return Err(LedgerError::UnknownInput(input.commitment));
            }
        }
        for output in &tx.body.outputs {
            if unspent.contains_key(&output.commitment) {
                return Err(LedgerError::DuplicateOutput(output.commitment));
            }
        }

        for input in &tx.body.inputs {
            unspent.remove(&input.commitment);
        }
        for output in &tx.body.outputs {
            unspent.insert(output.commitment, output.asset_commitment);
        }
        info!(
            inputs = tx.body.inputs.len(),
            outputs = tx.body.outputs.len(),
            fee = tx.body.kernel.fee,
            "Applied transaction with excess {}",
            tx.body.kernel.excess
        );
        Ok(())
    }

    /// Add an output with nothing spent for it.
    pub fn issue(&self, output: &Output) -> Result<(), LedgerError> {
        let proven = output.range_proof.as_ref().is_some_and(|proof| {
            PedersenGens::for_asset_commitment(&output.asset_commitment)
                .ok()
                .is_some_and(|gens| proof.verify(&output.commitment, &gens).is_ok())
        });
        if !proven {
            return Err(LedgerError::InvalidIssue(output.commitment));
        }
        let mut unspent = self.unspent.write().map_err(|_| LedgerError::Poisoned)?;
        if unspent.contains_key(&output.commitment) {
            return Err(LedgerError::DuplicateOutput(output.commitment));
        }
        unspent.insert(output.commitment, output.asset_commitment);
        debug!("Issued {}", output.commitment);
        Ok(())
    }

    pub fn contains(&self, commitment: &CompressedCommitment) -> Result<bool, LedgerError> {
        let unspent = self.unspent.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(unspent.contains_key(commitment))
    }

    pub fn len(&self) -> usize {
        self.unspent.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn verdict(result: Result<(), LedgerError>) -> Result<SubmitResult, WalletError> {
    match result {
        Ok(()) => Ok(SubmitResult {
            accepted: true,
            log: String::new(),
        }),
        Err(LedgerError::Poisoned) => Err(WalletError::Ledger(LedgerError::Poisoned.to_string())),
        Err(e) => Ok(SubmitResult {
            accepted: false,
            log: e.to_string(),
        }),
    }
}

#[async_trait]
impl LedgerClient for Ledger {
    async fn submit(&self, tx: &Transaction) -> Result<SubmitResult, WalletError> {
        verdict(self.apply(tx))
    }

    async fn output_exists(&self, commitment: &CompressedCommitment) -> Result<bool, WalletError> {
        self.contains(commitment)
            .map_err(|e| WalletError::Ledger(e.to_string()))
    }

    async fn issue(&self, output: &Output) -> Result<SubmitResult, WalletError> {
        verdict(Ledger::issue(self, output))
    }
}
