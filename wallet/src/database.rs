// Copyright (c) 2024 Botho Foundation

//! What a wallet persists between rounds and sessions.

use crate::error::Result;
use bth_crypto_commitment::{
    AssetCommitment, AssetId, BlindingFactor, CompressedCommitment, PublicKey,
};
use bth_crypto_vss::{EncryptedShare, SharingCommitment};
use bth_transaction_core::{Input, Transaction};
use bth_transaction_slate::{ParticipantId, SavedSlate, Slate, Threshold};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    /// Created by a session that has not been seen on the ledger yet.
    Unconfirmed,
    Unspent,
    /// Reserved as an input of a pending session.
    Locked,
    Spent,
}

/// Public data and this wallet's shares of a jointly owned output.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct JointFund {
    /// Public blinding share of every owner that contributed one.
    pub public_blinds: BTreeMap<ParticipantId, PublicKey>,
    /// Set when the blinding shares were split among shareholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Threshold>,
    /// Every dealer's sharing commitment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dealings: BTreeMap<ParticipantId, SharingCommitment>,
    /// This wallet's share of each dealer's blinding share, sealed to its
    /// share key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shares: BTreeMap<ParticipantId, EncryptedShare>,
}

impl JointFund {
    /// Participants who co-own the output.
    pub fn owners(&self) -> Vec<ParticipantId> {
        match &self.threshold {
            Some(threshold) => threshold.holders.keys().copied().collect(),
            None => self.public_blinds.keys().copied().collect(),
        }
    }
}

/// An output this wallet can open, alone or jointly.
#[serde_as]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub commitment: CompressedCommitment,
    pub asset_commitment: AssetCommitment,
    pub asset: AssetId,
    #[serde_as(as = "DisplayFromStr")]
    pub value: u64,
    /// The full blinding, or this wallet's share of a joint output's
    /// blinding (zero if it dealt none).
    pub blind: BlindingFactor,
    pub asset_blind: BlindingFactor,
    pub status: OutputStatus,
    /// Session that created or locked the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint: Option<JointFund>,
}

impl OutputRecord {
    pub fn to_input(&self) -> Input {
        Input {
            commitment: self.commitment,
            asset_commitment: self.asset_commitment,
        }
    }

    pub fn is_joint(&self) -> bool {
        self.joint.is_some()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    Owner,
    Receiver,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Rounds still running.
    Pending,
    /// Signed and assembled, not yet seen on the ledger.
    Finalized,
    Confirmed,
    /// Given up before it reached the ledger.
    Abandoned,
}

/// One session as seen by this wallet.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: Uuid,
    pub role: SessionRole,
    pub status: TxStatus,
    /// Latest slate of the session. For a receiver, its response.
    pub slate: Slate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

/// Key-value storage of a wallet. Writes are individually atomic.
pub trait Database: Send + Sync {
    /// Reserve the next secret index.
    fn next_secret_index(&self) -> Result<u64>;

    fn put_output(&self, record: &OutputRecord) -> Result<()>;
    fn output(&self, commitment: &CompressedCommitment) -> Result<Option<OutputRecord>>;
    /// Forget an output that will never exist on the ledger.
    fn delete_output(&self, commitment: &CompressedCommitment) -> Result<()>;
    /// Every output of `asset`, in commitment order.
    fn outputs_by_asset(&self, asset: &AssetId) -> Result<Vec<OutputRecord>>;

    /// This wallet's secrets for a session it takes part in.
    fn put_saved_slate(&self, saved: &SavedSlate) -> Result<()>;
    fn saved_slate(&self, session: &Uuid) -> Result<Option<SavedSlate>>;

    /// Secrets kept for an absent owner this wallet signs for.
    fn put_missing_party_slate(&self, saved: &SavedSlate) -> Result<()>;
    fn missing_party_slate(
        &self,
        session: &Uuid,
        participant: ParticipantId,
    ) -> Result<Option<SavedSlate>>;

    fn put_transaction(&self, record: &TxRecord) -> Result<()>;
    fn transaction(&self, session: &Uuid) -> Result<Option<TxRecord>>;
}
