// Copyright (c) 2024 Botho Foundation

//! In-memory [`Database`], optionally mirrored to a JSON file after every
//! write.

use crate::{
    database::{Database, OutputRecord, TxRecord},
    error::Result,
    secrets::SHARE_KEY_INDEX,
    WalletError,
};
use bth_crypto_commitment::{AssetId, CompressedCommitment};
use bth_transaction_slate::{ParticipantId, SavedSlate};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use tracing::debug;
use uuid::Uuid;

fn first_secret_index() -> u64 {
    SHARE_KEY_INDEX + 1
}

#[derive(Serialize, Deserialize)]
struct Store {
    #[serde(default = "first_secret_index")]
    next_secret_index: u64,
    #[serde(default)]
    outputs: BTreeMap<CompressedCommitment, OutputRecord>,
    /// `(asset, commitment)` of every output.
    #[serde(default)]
    outputs_by_asset: BTreeSet<(AssetId, CompressedCommitment)>,
    #[serde(default)]
    saved_slates: BTreeMap<Uuid, SavedSlate>,
    #[serde(default)]
    missing_party_slates: BTreeMap<String, SavedSlate>,
    #[serde(default)]
    transactions: BTreeMap<Uuid, TxRecord>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            next_secret_index: first_secret_index(),
            outputs: BTreeMap::new(),
            outputs_by_asset: BTreeSet::new(),
            saved_slates: BTreeMap::new(),
            missing_party_slates: BTreeMap::new(),
            transactions: BTreeMap::new(),
        }
    }
}

fn missing_party_key(session: &Uuid, participant: ParticipantId) -> String {
    format!("{session}/{participant}")
}

pub struct MemoryDatabase {
    store: Mutex<Store>,
    path: Option<PathBuf>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    /// A database that lives as long as the process.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            path: None,
        }
    }

    /// Load `path` if it exists and write every change back to it.
    pub fn open(path: &Path) -> Result<Self> {
        let store = if path.exists() {
            let json = fs::read_to_string(path)
                .map_err(|e| WalletError::Database(format!("Failed to read {}: {e}", path.display())))?;
            serde_json::from_str(&json)
                .map_err(|e| WalletError::Database(format!("Failed to parse {}: {e}", path.display())))?
        } else {
            Store::default()
        };
        debug!("Opened wallet database at {}", path.display());
        Ok(Self {
            store: Mutex::new(store),
            path: Some(path.to_path_buf()),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| WalletError::Database("database lock poisoned".into()))
    }

    /// Apply `f` and persist the result.
    fn write<T>(&self, f: impl FnOnce(&mut Store) -> T) -> Result<T> {
        let mut store = self.lock()?;
        let out = f(&mut store);
        if let Some(path) = &self.path {
            save(&store, path)?;
        }
        Ok(out)
    }
}

fn save(store: &Store, path: &Path) -> Result<()> {
    let io = |e: std::io::Error| WalletError::Database(format!("Failed to write {}: {e}", path.display()));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io)?;
    }
    let json = serde_json::to_string_pretty(store)
        .map_err(|e| WalletError::Database(e.to_string()))?;

    // Write beside the target, then swap it in.
    let tmp = path.with_extension("tmp");
    #[cfg(unix)]
    {
        use std::{io::Write, os::unix::fs::OpenOptionsExt};
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp)
            .map_err(io)?;
        file.write_all(json.as_bytes()).map_err(io)?;
    }
    #[cfg(not(unix))]
    {
        fs::write(&tmp, json).map_err(io)?;
    }
    fs::rename(&tmp, path).map_err(io)
}

impl Database for MemoryDatabase {
    fn next_secret_index(&self) -> Result<u64> {
        self.write(|store| {
            let index = store.next_secret_index;
            store.next_secret_index += 1;
            index
        })
    }

    fn put_output(&self, record: &OutputRecord) -> Result<()> {
        self.write(|store| {
            store
                .outputs_by_asset
                .insert((record.asset.clone(), record.commitment));
            store.outputs.insert(record.commitment, record.clone());
        })
    }

    fn output(&self, commitment: &CompressedCommitment) -> Result<Option<OutputRecord>> {
        Ok(self.lock()?.outputs.get(commitment).cloned())
    }

    fn delete_output(&self, commitment: &CompressedCommitment) -> Result<()> {
        self.write(|store| {
            if let Some(record) = store.outputs.remove(commitment) {
                store
                    .outputs_by_asset
                    .remove(&(record.asset, record.commitment));
            }
        })
    }

    fn outputs_by_asset(&self, asset: &AssetId) -> Result<Vec<OutputRecord>> {
        let store = self.lock()?;
        Ok(store
            .outputs_by_asset
            .range((asset.clone(), CompressedCommitment::default())..)
            .take_while(|(a, _)| a == asset)
            .filter_map(|(_, commitment)| store.outputs.get(commitment).cloned())
            .collect())
    }

    fn put_saved_slate(&self, saved: &SavedSlate) -> Result<()> {
        self.write(|store| {
            store.saved_slates.insert(saved.id, saved.clone());
        })
    }

    fn saved_slate(&self, session: &Uuid) -> Result<Option<SavedSlate>> {
        Ok(self.lock()?.saved_slates.get(session).cloned())
    }

    fn put_missing_party_slate(&self, saved: &SavedSlate) -> Result<()> {
        self.write(|store| {
            store.missing_party_slates.insert(
                missing_party_key(&saved.id, saved.participant_id),
                saved.clone(),
            );
        })
    }

    fn missing_party_slate(
        &self,
        session: &Uuid,
        participant: ParticipantId,
    ) -> Result<Option<SavedSlate>> {
        Ok(self
            .lock()?
            .missing_party_slates
            .get(&missing_party_key(session, participant))
            .cloned())
    }

    fn put_transaction(&self, record: &TxRecord) -> Result<()> {
        self.write(|store| {
            store.transactions.insert(record.id, record.clone());
        })
    }

    fn transaction(&self, session: &Uuid) -> Result<Option<TxRecord>> {
        Ok(self.lock()?.transactions.get(session).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::OutputStatus;
    use bth_crypto_commitment::{commit, AssetCommitment, BlindingFactor};
    use tempfile::TempDir;

    fn record(asset: &str, value: u64, blind: u64) -> OutputRecord {
        let asset = AssetId::from(asset);
        let asset_blind = BlindingFactor::from(blind + 1);
        let asset_commitment = AssetCommitment::new(&asset.tag(), &asset_blind);
        let blind = BlindingFactor::from(blind);
        OutputRecord {
            commitment: commit(value, &blind, &asset_commitment).unwrap().compress(),
            asset_commitment,
            asset,
            value,
            blind,
            asset_blind,
            status: OutputStatus::Unspent,
            session: None,
            joint: None,
        }
    }

    #[test]
    fn secret_indices_skip_the_share_key() {
        let db = MemoryDatabase::new();
        assert_eq!(db.next_secret_index().unwrap(), 1);
        assert_eq!(db.next_secret_index().unwrap(), 2);
    }

    #[test]
    fn outputs_are_scanned_by_asset() {
        let db = MemoryDatabase::new();
        db.put_output(&record("bth", 10, 1)).unwrap();
        db.put_output(&record("bth", 20, 2)).unwrap();
        db.put_output(&record("gold", 30, 3)).unwrap();

        let bth = db.outputs_by_asset(&AssetId::from("bth")).unwrap();
        assert_eq!(bth.len(), 2);
        assert!(bth.iter().all(|r| r.asset == AssetId::from("bth")));
        assert_eq!(db.outputs_by_asset(&AssetId::from("gold")).unwrap().len(), 1);
        assert!(db.outputs_by_asset(&AssetId::from("silver")).unwrap().is_empty());

        let first = &bth[0];
        assert_eq!(db.output(&first.commitment).unwrap().as_ref(), Some(first));
    }

    #[test]
    fn deleted_outputs_leave_the_asset_scan() {
        let db = MemoryDatabase::new();
        let kept = record("bth", 10, 1);
        let dropped = record("bth", 20, 2);
        db.put_output(&kept).unwrap();
        db.put_output(&dropped).unwrap();

        db.delete_output(&dropped.commitment).unwrap();
        db.delete_output(&dropped.commitment).unwrap();
        assert_eq!(db.output(&dropped.commitment).unwrap(), None);
        assert_eq!(db.outputs_by_asset(&AssetId::from("bth")).unwrap(), vec![kept]);
    }

    #[test]
    fn reopened_database_keeps_its_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wallet.json");
        let session = Uuid::from_bytes([4u8; 16]);
        let saved = SavedSlate {
            id: session,
            participant_id: ParticipantId(2),
            blind: BlindingFactor::from(5u64),
            asset_blind: BlindingFactor::from(6u64),
            excess_blind: BlindingFactor::from(7u64),
            nonce: BlindingFactor::from(8u64),
        };
        {
            let db = MemoryDatabase::open(&path).unwrap();
            db.next_secret_index().unwrap();
            db.put_output(&record("bth", 10, 1)).unwrap();
            db.put_saved_slate(&saved).unwrap();
            db.put_missing_party_slate(&saved).unwrap();
        }

        let db = MemoryDatabase::open(&path).unwrap();
        assert_eq!(db.next_secret_index().unwrap(), 2);
        assert_eq!(db.outputs_by_asset(&AssetId::from("bth")).unwrap().len(), 1);
        assert_eq!(db.saved_slate(&session).unwrap(), Some(saved.clone()));
        assert_eq!(
            db.missing_party_slate(&session, ParticipantId(2)).unwrap(),
            Some(saved)
        );
        assert_eq!(db.missing_party_slate(&session, ParticipantId(3)).unwrap(), None);
    }
}
