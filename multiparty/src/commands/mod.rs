// Copyright (c) 2024 Botho Foundation

//! CLI command implementations.
//!
//! These modules implement the user-facing CLI commands and use stdout for
//! their results.

pub mod fund;
pub mod issue;
pub mod ledger;
pub mod receive;
pub mod spend;
pub mod status;

use crate::{
    config::Config,
    exchange::{
        server::{serve, ExchangeState},
        Inbox,
    },
    ledger::rpc::RpcLedgerClient,
};
use anyhow::{Context, Result};
use bth_transaction_slate::ParticipantId;
use bth_wallet::{
    HkdfSecretGenerator, LedgerClient, MemoryDatabase, MultipartyWallet, ThresholdWallet, Wallet,
};
use std::{collections::BTreeMap, future::Future, sync::Arc};
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use uuid::Uuid;

pub type NodeWallet = Wallet<HkdfSecretGenerator, MemoryDatabase>;

/// Open this node's wallet.
pub fn open_wallet(config: &Config) -> Result<NodeWallet> {
    let path = config.wallet_path();
    let db = MemoryDatabase::open(&path)
        .with_context(|| format!("Failed to open wallet at {}", path.display()))?;
    let secrets =
        HkdfSecretGenerator::from_hex(&config.wallet.seed).context("Invalid wallet seed")?;
    Ok(Wallet::new(config.node.participant_id, secrets, db))
}

/// Open this node's wallet for sessions, K-of-N if a threshold is set.
pub fn session_wallet(config: &Config) -> Result<Arc<dyn MultipartyWallet>> {
    let wallet = open_wallet(config)?;
    Ok(match config.wallet.threshold {
        Some(threshold) => Arc::new(ThresholdWallet::new(wallet, threshold)),
        None => Arc::new(wallet),
    })
}

pub fn ledger_client(config: &Config) -> Result<Arc<dyn LedgerClient>> {
    Ok(Arc::new(
        RpcLedgerClient::new(&config.ledger.url).context("Failed to create ledger client")?,
    ))
}

pub fn peer_urls(config: &Config) -> BTreeMap<ParticipantId, String> {
    config
        .peers
        .iter()
        .map(|peer| (peer.id, peer.url.clone()))
        .collect()
}

/// This node's exchange endpoints, running in the background.
pub struct Endpoints {
    pub inbox: Arc<Inbox>,
    shutdown: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
}

impl Endpoints {
    /// Listen on the configured address. Sessions answered through
    /// `/receive` are reported on the returned channel.
    pub async fn start(
        config: &Config,
        wallet: Arc<dyn MultipartyWallet>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Uuid>)> {
        let listener = TcpListener::bind(config.node.listen)
            .await
            .with_context(|| format!("Failed to listen on {}", config.node.listen))?;
        let inbox = Arc::new(Inbox::new());
        let (state, receipts) = ExchangeState::new(wallet, inbox.clone()).with_receipts();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(listener, Arc::new(state), shutdown.clone()));
        Ok((
            Self {
                inbox,
                shutdown,
                server,
            },
            receipts,
        ))
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        match self.server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Exchange server failed: {}", e),
            Err(e) => error!("Exchange server task failed: {}", e),
        }
    }
}

/// Drive `session` to completion. If `interrupt` fires first, cancel the
/// session and keep polling it, so its own failure path releases what it
/// locked before the command exits.
pub async fn until_interrupted<S: Future>(
    session: S,
    cancel: &CancellationToken,
    interrupt: impl Future,
) -> S::Output {
    tokio::pin!(session);
    tokio::select! {
        result = &mut session => return result,
        _ = interrupt => {
            warn!("Interrupted, cancelling the session");
            cancel.cancel();
        }
    }
    session.await
}

/// Parse a comma-separated id list such as `1,2,3`.
pub fn parse_participants(s: &str) -> Result<Vec<ParticipantId>> {
    s.split(',')
        .map(|id| {
            id.trim()
                .parse::<u32>()
                .map(ParticipantId)
                .with_context(|| format!("Invalid participant id '{id}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interrupted_sessions_clean_up_before_returning() {
        let cancel = CancellationToken::new();
        let released = std::sync::atomic::AtomicBool::new(false);
        let session = async {
            cancel.cancelled().await;
            released.store(true, std::sync::atomic::Ordering::SeqCst);
            "abandoned"
        };

        let outcome = until_interrupted(session, &cancel, std::future::ready(())).await;
        assert_eq!(outcome, "abandoned");
        assert!(cancel.is_cancelled());
        assert!(released.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn finished_sessions_ignore_the_interrupt() {
        let cancel = CancellationToken::new();
        let outcome =
            until_interrupted(async { 7 }, &cancel, std::future::pending::<()>()).await;
        assert_eq!(outcome, 7);
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn participant_lists() {
        assert_eq!(
            parse_participants("1, 2,3").unwrap(),
            vec![ParticipantId(1), ParticipantId(2), ParticipantId(3)]
        );
        assert!(parse_participants("1,,2").is_err());
        assert!(parse_participants("one").is_err());
    }
}
