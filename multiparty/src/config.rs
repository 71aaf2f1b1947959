// Copyright (c) 2024 Botho Foundation

use anyhow::{anyhow, Context, Result};
use bth_transaction_slate::ParticipantId;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

/// Configuration of one participant's node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub wallet: WalletConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Every other participant this node may exchange slates with
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's participant id
    pub participant_id: ParticipantId,

    /// Address of the `/first`, `/second` and `/receive` endpoints
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// 32-byte wallet seed, hex
    pub seed: String,

    /// Wallet database file (default: ~/.botho-multiparty/wallet-{id}.json)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Shares needed to spend joint funds this wallet creates. Unset means
    /// every owner must sign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Pause between attempts to push a slate to a peer
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// How long a round may wait for every expected slate
    #[serde(default = "default_round_timeout_secs")]
    pub round_timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: default_retry_backoff_ms(),
            round_timeout_secs: default_round_timeout_secs(),
        }
    }
}

impl ExchangeConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the ledger
    #[serde(default = "default_ledger_url")]
    pub url: String,

    /// Where `botho-multiparty ledger` listens
    #[serde(default = "default_ledger_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_ledger_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long to wait for a submitted transaction to show up
    #[serde(default = "default_ledger_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: default_ledger_url(),
            listen: default_ledger_listen(),
            poll_interval_ms: default_ledger_poll_interval_ms(),
            timeout_secs: default_ledger_timeout_secs(),
        }
    }
}

impl LedgerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub id: ParticipantId,
    /// Base URL of the peer's exchange endpoints
    pub url: String,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7300))
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_round_timeout_secs() -> u64 {
    300
}

fn default_ledger_url() -> String {
    "http://127.0.0.1:7400".to_string()
}

fn default_ledger_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7400))
}

fn default_ledger_poll_interval_ms() -> u64 {
    1000
}

fn default_ledger_timeout_secs() -> u64 {
    300
}

impl Config {
    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.peers.iter().any(|p| p.id == self.node.participant_id) {
            return Err(anyhow!(
                "Participant {} is listed as its own peer",
                self.node.participant_id
            ));
        }
        if self.wallet.threshold == Some(0) {
            return Err(anyhow!("Wallet threshold must be at least 1"));
        }
        Ok(())
    }

    pub fn peer(&self, id: ParticipantId) -> Option<&PeerConfig> {
        self.peers.iter().find(|p| p.id == id)
    }

    /// The wallet database file
    pub fn wallet_path(&self) -> PathBuf {
        self.wallet.path.clone().unwrap_or_else(|| {
            default_data_dir().join(format!("wallet-{}.json", self.node.participant_id))
        })
    }
}

/// Get the default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".botho-multiparty")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}
