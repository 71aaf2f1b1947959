// Copyright (c) 2024 Botho Foundation

//! Slate exchange between participants.
//!
//! Peers push each round's slate to `/first` or `/second`. The handlers are
//! the only writers of the [`Inbox`]; the coordinator driving a session is
//! its only reader.

pub mod client;
pub mod server;

use crate::error::{ExchangeError, Result};
use bth_transaction_slate::{ParticipantId, Slate};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    sync::Mutex,
    time::Duration,
};
use tokio::{sync::Notify, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Header naming the participant that pushed a slate.
pub const PARTICIPANT_HEADER: &str = "x-participant-id";

/// How long late pushes for a finished round are recognised and dropped.
pub const CLOSED_ROUND_RETENTION: Duration = Duration::from_secs(600);

/// An exchange round.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Round {
    /// Initialized slates.
    First,
    /// Signed slates.
    Second,
}

impl Round {
    pub fn path(&self) -> &'static str {
        match self {
            Round::First => "/first",
            Round::Second => "/second",
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Round::First => write!(f, "first"),
            Round::Second => write!(f, "second"),
        }
    }
}

#[derive(Default)]
struct Buffers {
    pending: HashMap<(Uuid, Round), BTreeMap<ParticipantId, Slate>>,
    /// Rounds collected or discarded, and when. Late retries for them are
    /// dropped.
    closed: HashMap<(Uuid, Round), Instant>,
}

impl Buffers {
    fn close(&mut self, key: (Uuid, Round)) {
        self.pending.remove(&key);
        self.closed.insert(key, Instant::now());
    }

    fn prune(&mut self, retention: Duration) {
        let now = Instant::now();
        self.closed
            .retain(|_, closed_at| now.duration_since(*closed_at) < retention);
    }
}

/// Slates received from peers, per session and round, keyed by sender.
pub struct Inbox {
    buffers: Mutex<Buffers>,
    arrived: Notify,
    retention: Duration,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::with_retention(CLOSED_ROUND_RETENTION)
    }
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// An inbox that forgets finished rounds after `retention`.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            buffers: Mutex::new(Buffers::default()),
            arrived: Notify::new(),
            retention,
        }
    }

    /// Buffer a slate. A second slate from the same sender replaces the
    /// first. Returns false if the round was already collected.
    pub fn deliver(&self, round: Round, sender: ParticipantId, slate: Slate) -> bool {
        let key = (slate.id, round);
        {
            let mut buffers = match self.buffers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            buffers.prune(self.retention);
            if buffers.closed.contains_key(&key) {
                debug!(
                    "Dropping late {} round slate from {} for session {}",
                    round, sender, key.0
                );
                return false;
            }
            let slates = buffers.pending.entry(key).or_default();
            if slates.insert(sender, slate).is_some() {
                warn!(
                    "Participant {} pushed its {} round slate for session {} again",
                    sender, round, key.0
                );
            }
        }
        self.arrived.notify_waiters();
        true
    }

    /// Take exactly one slate per expected sender if all of them are here.
    fn take_complete(
        &self,
        session: Uuid,
        round: Round,
        expected: &BTreeSet<ParticipantId>,
    ) -> std::result::Result<Vec<Slate>, Vec<ParticipantId>> {
        let mut buffers = match self.buffers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let key = (session, round);
        let missing: Vec<ParticipantId> = {
            let received = buffers.pending.get(&key);
            expected
                .iter()
                .filter(|id| !received.is_some_and(|r| r.contains_key(id)))
                .copied()
                .collect()
        };
        if !missing.is_empty() {
            return Err(missing);
        }
        let mut received = buffers.pending.remove(&key).unwrap_or_default();
        buffers.close(key);
        Ok(expected
            .iter()
            .filter_map(|id| received.remove(id))
            .collect())
    }

    /// Wait until every participant in `expected` has delivered its slate
    /// for `round` of `session`, and take those slates in participant order.
    /// Slates from anyone else are discarded.
    pub async fn collect(
        &self,
        session: Uuid,
        round: Round,
        expected: &BTreeSet<ParticipantId>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<Slate>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Registered before checking, so a delivery in between still
            // wakes us.
            let arrived = self.arrived.notified();
            tokio::pin!(arrived);
            arrived.as_mut().enable();

            let missing = match self.take_complete(session, round, expected) {
                Ok(slates) => {
                    debug!("Collected {} slates for {} round of {}", slates.len(), round, session);
                    return Ok(slates);
                }
                Err(missing) => missing,
            };

            tokio::select! {
                _ = &mut arrived => {}
                _ = cancel.cancelled() => return Err(ExchangeError::Cancelled(session)),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(ExchangeError::RoundTimeout { session, round, missing });
                }
            }
        }
    }

    /// Forget a session's buffered slates and drop any that still arrive.
    pub fn discard(&self, session: &Uuid) {
        let mut buffers = match self.buffers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        buffers.close((*session, Round::First));
        buffers.close((*session, Round::Second));
        buffers.prune(self.retention);
    }
}
