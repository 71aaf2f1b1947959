// Copyright (c) 2024 Botho Foundation

//! Drives one participant through the rounds of a session.
//!
//! Each round, the coordinator hands its own slate to the inbox, pushes it
//! to every other expected participant, and waits until the inbox holds one
//! slate per expected participant. A spend additionally asks the receiver to
//! respond to the combined slate before signing. Once aggregated, the leader
//! submits the transaction and every participant waits for the ledger to
//! show it.

use crate::{
    config::Config,
    error::{ExchangeError, Result},
    exchange::{client::PeerClient, Inbox, Round},
};
use bth_transaction_core::Transaction;
use bth_transaction_slate::{combine, ParticipantId, Slate};
use bth_wallet::{FundRequest, LedgerClient, MultipartyWallet, SpendRequest};
use futures::future::try_join_all;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Timing of the exchange and of ledger polling.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
    pub retry_backoff: Duration,
    pub round_timeout: Duration,
    pub ledger_poll_interval: Duration,
    pub ledger_timeout: Duration,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            retry_backoff: config.exchange.retry_backoff(),
            round_timeout: config.exchange.round_timeout(),
            ledger_poll_interval: config.ledger.poll_interval(),
            ledger_timeout: config.ledger.timeout(),
        }
    }
}

/// Poll `wallet.confirm` until the ledger reflects `session`.
pub async fn await_confirmation(
    wallet: &dyn MultipartyWallet,
    ledger: &dyn LedgerClient,
    session: Uuid,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<()> {
    let deadline = Instant::now() + settings.ledger_timeout;
    loop {
        if wallet.confirm(&session, ledger).await? {
            return Ok(());
        }
        let wake = (Instant::now() + settings.ledger_poll_interval).min(deadline);
        tokio::select! {
            _ = tokio::time::sleep_until(wake) => {
                if Instant::now() >= deadline {
                    return Err(ExchangeError::LedgerTimeout(session));
                }
            }
            _ = cancel.cancelled() => return Err(ExchangeError::Cancelled(session)),
        }
    }
}

pub struct Coordinator {
    wallet: Arc<dyn MultipartyWallet>,
    inbox: Arc<Inbox>,
    client: PeerClient,
    peers: BTreeMap<ParticipantId, String>,
    ledger: Arc<dyn LedgerClient>,
    settings: Settings,
}

impl Coordinator {
    pub fn new(
        wallet: Arc<dyn MultipartyWallet>,
        inbox: Arc<Inbox>,
        peers: BTreeMap<ParticipantId, String>,
        ledger: Arc<dyn LedgerClient>,
        settings: Settings,
    ) -> Result<Self> {
        let client = PeerClient::new(wallet.participant_id(), settings.retry_backoff)?;
        Ok(Self {
            wallet,
            inbox,
            client,
            peers,
            ledger,
            settings,
        })
    }

    fn me(&self) -> ParticipantId {
        self.wallet.participant_id()
    }

    /// Fund a joint output with the other owners in `request`.
    pub async fn fund(&self, request: &FundRequest, cancel: &CancellationToken) -> Result<Transaction> {
        let owners: BTreeSet<ParticipantId> = request.owners.iter().copied().collect();
        info!(
            "Participant {} funding {} {} with {:?} in session {}",
            self.me(),
            request.amount,
            request.asset,
            owners,
            request.session
        );
        let rounds = async {
            let slate = self.wallet.fund(request)?;
            let combined = self.exchange(Round::First, slate, &owners, cancel).await?;
            self.sign_and_aggregate(&combined, &owners, cancel).await
        };
        let (tx, leader) = self.guard(request.session, cancel, rounds).await?;
        self.settle(request.session, &tx, leader, cancel).await?;
        Ok(tx)
    }

    /// Spend from a joint output with the owners present in `request`,
    /// paying the receiver whose endpoints are at `receiver_url`.
    pub async fn spend(
        &self,
        request: &SpendRequest,
        receiver_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Transaction> {
        let present: BTreeSet<ParticipantId> = request.present.iter().copied().collect();
        info!(
            "Participant {} spending {} from {} with {:?} in session {}",
            self.me(),
            request.amount,
            request.joint_output,
            present,
            request.session
        );
        let rounds = async {
            let slate = self.wallet.spend(request)?;
            let combined = self.exchange(Round::First, slate, &present, cancel).await?;
            let deadline = Instant::now() + self.settings.round_timeout;
            let response = self
                .client
                .request_receive(receiver_url, &combined, deadline, cancel)
                .await?;
            let combined = combined.absorb_response(response)?;
            debug!("Receiver responded in session {}", request.session);
            self.sign_and_aggregate(&combined, &present, cancel).await
        };
        let (tx, leader) = self.guard(request.session, cancel, rounds).await?;
        self.settle(request.session, &tx, leader, cancel).await?;
        Ok(tx)
    }

    async fn sign_and_aggregate(
        &self,
        combined: &Slate,
        expected: &BTreeSet<ParticipantId>,
        cancel: &CancellationToken,
    ) -> Result<(Transaction, ParticipantId)> {
        let leader = combined.leader()?;
        let signed = self.wallet.sign(combined)?;
        let signed = self.exchange_slates(Round::Second, signed, expected, cancel).await?;
        let tx = self.wallet.aggregate(&signed)?;
        Ok((tx, leader))
    }

    /// Run the rounds of `session`. On failure, cancel the session's pending
    /// pushes and waits, and release the wallet's locked outputs.
    async fn guard<T>(
        &self,
        session: Uuid,
        cancel: &CancellationToken,
        rounds: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match rounds.await {
            Ok(value) => Ok(value),
            Err(e) => {
                error!("Session {} failed: {}", session, e);
                self.abort(session, cancel);
                Err(e)
            }
        }
    }

    fn abort(&self, session: Uuid, cancel: &CancellationToken) {
        cancel.cancel();
        self.inbox.discard(&session);
        if let Err(e) = self.wallet.abandon(&session) {
            warn!("Failed to abandon session {}: {}", session, e);
        }
    }

    /// Exchange a round and combine its slates.
    async fn exchange(
        &self,
        round: Round,
        slate: Slate,
        expected: &BTreeSet<ParticipantId>,
        cancel: &CancellationToken,
    ) -> Result<Slate> {
        let slates = self.exchange_slates(round, slate, expected, cancel).await?;
        Ok(combine(&slates)?)
    }

    /// Send this participant's slate for `round` to every other expected
    /// participant, and collect one slate from each of them.
    async fn exchange_slates(
        &self,
        round: Round,
        slate: Slate,
        expected: &BTreeSet<ParticipantId>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Slate>> {
        let me = self.me();
        let session = slate.id;
        let mut targets = Vec::new();
        for id in expected.iter().filter(|id| **id != me) {
            let url = self.peers.get(id).ok_or(ExchangeError::UnknownPeer(*id))?;
            targets.push((*id, url.as_str()));
        }

        let deadline = Instant::now() + self.settings.round_timeout;
        self.inbox.deliver(round, me, slate.clone());
        let pushes = try_join_all(
            targets
                .iter()
                .map(|(id, url)| self.client.push(*id, url, round, &slate, deadline, cancel)),
        );
        let collected = self.inbox.collect(
            session,
            round,
            expected,
            self.settings.round_timeout,
            cancel,
        );
        let (_, slates) = tokio::try_join!(pushes, collected)?;
        debug!("Session {} finished {} round", session, round);
        Ok(slates)
    }

    /// Submit `tx` if this participant leads, then wait for the ledger.
    async fn settle(
        &self,
        session: Uuid,
        tx: &Transaction,
        leader: ParticipantId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if leader == self.me() {
            let result = self.ledger.submit(tx).await?;
            if !result.accepted {
                self.abort(session, cancel);
                return Err(ExchangeError::Rejected(result.log));
            }
            info!("Submitted session {}", session);
        }
        if let Err(e) =
            await_confirmation(self.wallet.as_ref(), self.ledger.as_ref(), session, &self.settings, cancel)
                .await
        {
            warn!("Session {} left pending: {}", session, e);
            return Err(e);
        }
        info!("Session {} confirmed on the ledger", session);
        Ok(())
    }
}

/// The receiving side of spends: confirms every session answered through
/// `/receive` once the ledger shows it.
pub struct Receiver {
    wallet: Arc<dyn MultipartyWallet>,
    ledger: Arc<dyn LedgerClient>,
    settings: Settings,
}

impl Receiver {
    pub fn new(
        wallet: Arc<dyn MultipartyWallet>,
        ledger: Arc<dyn LedgerClient>,
        settings: Settings,
    ) -> Self {
        Self {
            wallet,
            ledger,
            settings,
        }
    }

    async fn confirm(&self, session: Uuid, cancel: &CancellationToken) -> Result<()> {
        info!("Responded to session {}, waiting for the ledger", session);
        await_confirmation(
            self.wallet.as_ref(),
            self.ledger.as_ref(),
            session,
            &self.settings,
            cancel,
        )
        .await?;
        info!("Received session {} confirmed", session);
        Ok(())
    }

    /// Wait for one received session and confirm it. `None` once nothing is
    /// left to receive.
    pub async fn receive_one(
        &self,
        receipts: &mut mpsc::UnboundedReceiver<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<Option<Uuid>> {
        let session = tokio::select! {
            received = receipts.recv() => received,
            _ = cancel.cancelled() => None,
        };
        let Some(session) = session else {
            return Ok(None);
        };
        self.confirm(session, cancel).await?;
        Ok(Some(session))
    }

    /// Confirm received sessions until `cancel` fires.
    pub async fn run(
        self: Arc<Self>,
        mut receipts: mpsc::UnboundedReceiver<Uuid>,
        cancel: CancellationToken,
    ) {
        loop {
            let session = tokio::select! {
                received = receipts.recv() => match received {
                    Some(session) => session,
                    None => return,
                },
                _ = cancel.cancelled() => return,
            };
            let receiver = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = receiver.confirm(session, &cancel).await {
                    warn!("Received session {} not confirmed: {}", session, e);
                }
            });
        }
    }
}
