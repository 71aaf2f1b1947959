// Copyright (c) 2024 Botho Foundation

//! Outbound side of the exchange: pushing slates to peers and asking the
//! receiver for its response.

use super::{Round, PARTICIPANT_HEADER};
use crate::error::{ExchangeError, Result};
use bth_transaction_slate::{ParticipantId, Slate};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-request timeout, separate from the round deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PeerClient {
    client: reqwest::Client,
    me: ParticipantId,
    backoff: Duration,
}

impl PeerClient {
    pub fn new(me: ParticipantId, backoff: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ExchangeError::Io(std::io::Error::other(format!(
                    "Failed to create HTTP client: {e}"
                )))
            })?;
        Ok(Self {
            client,
            me,
            backoff,
        })
    }

    /// Sleep out the backoff, unless the deadline passes or the session is
    /// cancelled first.
    async fn pause(&self, session: Uuid, deadline: Instant, cancel: &CancellationToken) -> bool {
        let wake = (Instant::now() + self.backoff).min(deadline);
        tokio::select! {
            _ = tokio::time::sleep_until(wake) => Instant::now() < deadline,
            _ = cancel.cancelled() => {
                debug!("Stopped retrying for cancelled session {}", session);
                false
            }
        }
    }

    /// Push a round's slate to one peer until it accepts.
    pub async fn push(
        &self,
        peer: ParticipantId,
        url: &str,
        round: Round,
        slate: &Slate,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let endpoint = format!("{}{}", url.trim_end_matches('/'), round.path());
        loop {
            let reason = match self
                .client
                .post(&endpoint)
                .header(PARTICIPANT_HEADER, self.me.to_string())
                .json(slate)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    debug!("Participant {} accepted {} round of {}", peer, round, slate.id);
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    format!("HTTP {status}: {text}")
                }
                Err(e) => e.to_string(),
            };
            warn!(
                "Pushing {} round of {} to participant {} failed: {}",
                round, slate.id, peer, reason
            );
            if cancel.is_cancelled() {
                return Err(ExchangeError::Cancelled(slate.id));
            }
            if !self.pause(slate.id, deadline, cancel).await {
                if cancel.is_cancelled() {
                    return Err(ExchangeError::Cancelled(slate.id));
                }
                return Err(ExchangeError::PeerUnreachable {
                    participant: peer,
                    reason,
                });
            }
        }
    }

    /// Ask the receiver at `url` to respond to a combined spend slate.
    ///
    /// Transport failures are retried. An error status is the receiver
    /// refusing the slate and ends the session.
    pub async fn request_receive(
        &self,
        url: &str,
        slate: &Slate,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Slate> {
        let endpoint = format!("{}/receive", url.trim_end_matches('/'));
        loop {
            match self
                .client
                .post(&endpoint)
                .header(PARTICIPANT_HEADER, self.me.to_string())
                .json(slate)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<Slate>()
                        .await
                        .map_err(|e| ExchangeError::ReceiverFailed(e.to_string()));
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(ExchangeError::ReceiverFailed(format!("HTTP {status}: {text}")));
                }
                Err(e) => {
                    warn!("Receiver for session {} unreachable: {}", slate.id, e);
                    if !self.pause(slate.id, deadline, cancel).await {
                        if cancel.is_cancelled() {
                            return Err(ExchangeError::Cancelled(slate.id));
                        }
                        return Err(ExchangeError::ReceiverFailed(e.to_string()));
                    }
                }
            }
        }
    }
}
