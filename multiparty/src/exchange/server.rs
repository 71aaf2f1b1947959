// Copyright (c) 2024 Botho Foundation

//! HTTP endpoints of a participant.
//!
//! - `POST /first`: an initialized slate from a peer
//! - `POST /second`: a signed slate from a peer
//! - `POST /receive`: a combined spend slate, answered with this wallet's
//!   response slate

use super::{Inbox, Round, PARTICIPANT_HEADER};
use bth_transaction_slate::{ParticipantId, Slate, SlateState};
use bth_wallet::MultipartyWallet;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Incoming, header, server::conn::http1, service::service_fn, Method, Request, Response,
    StatusCode,
};
use hyper_util::rt::TokioIo;
use std::{
    collections::HashSet,
    convert::Infallible,
    sync::{Arc, Mutex},
};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Shared state of the endpoint handlers.
pub struct ExchangeState {
    pub wallet: Arc<dyn MultipartyWallet>,
    pub inbox: Arc<Inbox>,
    /// Sessions this node answered as receiver, reported once each.
    receipts: Option<mpsc::UnboundedSender<Uuid>>,
    received: Mutex<HashSet<Uuid>>,
}

impl ExchangeState {
    pub fn new(wallet: Arc<dyn MultipartyWallet>, inbox: Arc<Inbox>) -> Self {
        Self {
            wallet,
            inbox,
            receipts: None,
            received: Mutex::new(HashSet::new()),
        }
    }

    /// Report every newly received session on the returned channel.
    pub fn with_receipts(mut self) -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.receipts = Some(tx);
        (self, rx)
    }

    fn note_received(&self, session: Uuid) {
        let first = match self.received.lock() {
            Ok(mut received) => received.insert(session),
            Err(poisoned) => poisoned.into_inner().insert(session),
        };
        if let (true, Some(receipts)) = (first, &self.receipts) {
            if receipts.send(session).is_err() {
                debug!("Nobody is waiting on received session {}", session);
            }
        }
    }
}

/// Serve the endpoints on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ExchangeState>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!(
        "Participant {} listening on {}",
        state.wallet.participant_id(),
        listener.local_addr()?
    );

    loop {
        let (stream, _) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.cancelled() => return Ok(()),
        };
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(|req| handle_request(req, state.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ExchangeState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::POST {
        return Ok(text_response(StatusCode::METHOD_NOT_ALLOWED, "POST only"));
    }
    let round = match req.uri().path() {
        "/first" => Some(Round::First),
        "/second" => Some(Round::Second),
        "/receive" => None,
        other => {
            debug!("No endpoint at {}", other);
            return Ok(text_response(StatusCode::NOT_FOUND, "Not found"));
        }
    };
    let sender = req
        .headers()
        .get(PARTICIPANT_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u32>().ok())
        .map(ParticipantId);

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read body: {e}"),
            ))
        }
    };
    let slate: Slate = match serde_json::from_slice(&body) {
        Ok(slate) => slate,
        Err(e) => {
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid slate: {e}"),
            ))
        }
    };

    Ok(match round {
        Some(round) => handle_push(&state, round, sender, slate),
        None => handle_receive(&state, slate),
    })
}

fn handle_push(
    state: &ExchangeState,
    round: Round,
    sender: Option<ParticipantId>,
    slate: Slate,
) -> Response<Full<Bytes>> {
    let Some(sender) = sender else {
        return text_response(
            StatusCode::BAD_REQUEST,
            &format!("Missing or invalid {PARTICIPANT_HEADER} header"),
        );
    };
    let expected = match round {
        Round::First => SlateState::Initialized,
        Round::Second => SlateState::Signed,
    };
    if let Err(e) = slate.expect_state(expected) {
        warn!("Participant {} pushed a bad {} round slate: {}", sender, round, e);
        return text_response(StatusCode::BAD_REQUEST, &e.to_string());
    }
    debug!(
        "Received {} round slate for session {} from {}",
        round, slate.id, sender
    );
    state.inbox.deliver(round, sender, slate);
    text_response(StatusCode::OK, "OK")
}

fn handle_receive(state: &ExchangeState, slate: Slate) -> Response<Full<Bytes>> {
    let session = slate.id;
    match state.wallet.receive(&slate) {
        Ok(response) => match serde_json::to_vec(&response) {
            Ok(body) => {
                state.note_received(session);
                Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Full::new(Bytes::from(body)))
                    .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
            }
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        },
        Err(e) => {
            error!("Failed to receive session {}: {}", session, e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/plain"));
    response
}
