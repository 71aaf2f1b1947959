// Copyright (c) 2024 Botho Foundation

//! A local network of participant nodes and a development ledger, all on
//! ephemeral ports.

#![allow(dead_code)]

use botho_multiparty::{
    exchange::{
        server::{serve, ExchangeState},
        Inbox,
    },
    ledger::{
        rpc::{self, RpcLedgerClient},
        Ledger,
    },
    Coordinator, Receiver, Settings,
};
use async_trait::async_trait;
use bth_crypto_commitment::{AssetId, CompressedCommitment};
use bth_transaction_core::{Output, Transaction};
use bth_transaction_slate::ParticipantId;
use bth_wallet::{
    HkdfSecretGenerator, LedgerClient, MemoryDatabase, MultipartyWallet, SubmitResult,
    ThresholdWallet, Wallet, WalletError,
};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::{
    net::TcpListener,
    sync::{mpsc, Semaphore},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type NodeWallet = Wallet<HkdfSecretGenerator, MemoryDatabase>;

/// Access to the plain wallet under a session wallet.
pub trait Base: MultipartyWallet + 'static {
    fn base(&self) -> &NodeWallet;
}

impl Base for NodeWallet {
    fn base(&self) -> &NodeWallet {
        self
    }
}

impl Base for ThresholdWallet<HkdfSecretGenerator, MemoryDatabase> {
    fn base(&self) -> &NodeWallet {
        self.inner()
    }
}

pub fn settings() -> Settings {
    Settings {
        retry_backoff: Duration::from_millis(50),
        round_timeout: Duration::from_secs(20),
        ledger_poll_interval: Duration::from_millis(50),
        ledger_timeout: Duration::from_secs(20),
    }
}

pub fn bth() -> AssetId {
    AssetId::from("bth")
}

pub fn plain_wallet(id: u32) -> NodeWallet {
    Wallet::new(
        ParticipantId(id),
        HkdfSecretGenerator::new([id as u8; 32]),
        MemoryDatabase::new(),
    )
}

pub fn threshold_wallet(id: u32, k: u32) -> ThresholdWallet<HkdfSecretGenerator, MemoryDatabase> {
    ThresholdWallet::new(plain_wallet(id), k)
}

/// A ledger whose submissions wait until the test releases them.
pub struct HeldLedger {
    inner: Arc<dyn LedgerClient>,
    released: Semaphore,
}

impl HeldLedger {
    pub fn new(inner: Arc<dyn LedgerClient>) -> Self {
        Self {
            inner,
            released: Semaphore::new(0),
        }
    }

    /// Let one held submission through.
    pub fn release(&self) {
        self.released.add_permits(1);
    }
}

#[async_trait]
impl LedgerClient for HeldLedger {
    async fn submit(&self, tx: &Transaction) -> Result<SubmitResult, WalletError> {
        let _permit = self
            .released
            .acquire()
            .await
            .map_err(|e| WalletError::Ledger(e.to_string()))?;
        self.inner.submit(tx).await
    }

    async fn output_exists(&self, commitment: &CompressedCommitment) -> Result<bool, WalletError> {
        self.inner.output_exists(commitment).await
    }

    async fn issue(&self, output: &Output) -> Result<SubmitResult, WalletError> {
        self.inner.issue(output).await
    }
}

pub struct Node<W> {
    pub wallet: Arc<W>,
    pub url: String,
    pub inbox: Arc<Inbox>,
    pub receipts: Option<mpsc::UnboundedReceiver<Uuid>>,
}

pub struct Network<W> {
    pub ledger: Arc<Ledger>,
    pub ledger_client: Arc<dyn LedgerClient>,
    pub nodes: BTreeMap<u32, Node<W>>,
    pub shutdown: CancellationToken,
}

impl<W: Base> Network<W> {
    /// Start one node per wallet and a ledger served over JSON-RPC.
    pub async fn start(wallets: Vec<W>) -> Self {
        let shutdown = CancellationToken::new();

        let ledger = Arc::new(Ledger::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ledger_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(rpc::serve(listener, ledger.clone(), shutdown.clone()));
        let ledger_client: Arc<dyn LedgerClient> =
            Arc::new(RpcLedgerClient::new(&ledger_url).unwrap());

        let mut nodes = BTreeMap::new();
        for wallet in wallets {
            let wallet = Arc::new(wallet);
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let inbox = Arc::new(Inbox::new());
            let (state, receipts) =
                ExchangeState::new(wallet.clone() as Arc<dyn MultipartyWallet>, inbox.clone())
                    .with_receipts();
            tokio::spawn(serve(listener, Arc::new(state), shutdown.clone()));
            nodes.insert(
                wallet.participant_id().0,
                Node {
                    wallet,
                    url,
                    inbox,
                    receipts: Some(receipts),
                },
            );
        }

        Self {
            ledger,
            ledger_client,
            nodes,
            shutdown,
        }
    }

    pub fn node(&self, id: u32) -> &Node<W> {
        &self.nodes[&id]
    }

    /// A coordinator for node `id` that knows every other node.
    pub fn coordinator(&self, id: u32) -> Coordinator {
        self.coordinator_with_ledger(id, self.ledger_client.clone())
    }

    /// A coordinator for node `id` that reaches the ledger through `ledger`.
    pub fn coordinator_with_ledger(&self, id: u32, ledger: Arc<dyn LedgerClient>) -> Coordinator {
        let node = self.node(id);
        let peers = self
            .nodes
            .iter()
            .filter(|(other, _)| **other != id)
            .map(|(other, n)| (ParticipantId(*other), n.url.clone()))
            .collect();
        Coordinator::new(
            node.wallet.clone(),
            node.inbox.clone(),
            peers,
            ledger,
            settings(),
        )
        .unwrap()
    }

    /// The receiving side of node `id`, with its receipt channel.
    pub fn receiver(&mut self, id: u32) -> (Receiver, mpsc::UnboundedReceiver<Uuid>) {
        let ledger = self.ledger_client.clone();
        let node = self.nodes.get_mut(&id).unwrap();
        let receipts = node.receipts.take().unwrap();
        (
            Receiver::new(node.wallet.clone(), ledger, settings()),
            receipts,
        )
    }

    /// Issue `value` to each listed node.
    pub async fn issue(&self, ids: &[u32], value: u64) {
        for id in ids {
            self.node(*id)
                .wallet
                .base()
                .issue(&bth(), value, self.ledger_client.as_ref())
                .await
                .unwrap();
        }
    }
}

impl<W> Drop for Network<W> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
