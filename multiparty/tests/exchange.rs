// Copyright (c) 2024 Botho Foundation

//! The exchange endpoints and the peer client against them.

mod common;

use assert_matches::assert_matches;
use botho_multiparty::{
    exchange::{client::PeerClient, Round, PARTICIPANT_HEADER},
    ExchangeError,
};
use bth_crypto_commitment::AssetId;
use bth_transaction_slate::{ParticipantId, Slate, SlateKind, SlateState};
use common::{plain_wallet, Network};
use std::{collections::BTreeSet, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn slate(session: Uuid) -> Slate {
    Slate::new(session, SlateKind::Fund, 100, 3, 0, AssetId::from("bth"))
}

fn client(id: u32) -> PeerClient {
    PeerClient::new(ParticipantId(id), Duration::from_millis(20)).unwrap()
}

#[tokio::test]
async fn repeated_pushes_count_once() {
    let network = Network::start(vec![plain_wallet(1)]).await;
    let node = network.node(1);
    let session = Uuid::new_v4();
    let cancel = CancellationToken::new();
    let deadline = Instant::now() + Duration::from_secs(5);

    let pusher = client(2);
    for _ in 0..3 {
        pusher
            .push(ParticipantId(1), &node.url, Round::First, &slate(session), deadline, &cancel)
            .await
            .unwrap();
    }

    let expected: BTreeSet<ParticipantId> = [ParticipantId(2)].into();
    let slates = node
        .inbox
        .collect(session, Round::First, &expected, Duration::from_secs(1), &cancel)
        .await
        .unwrap();
    assert_eq!(slates.len(), 1);

    // Nothing from participant 3 yet.
    let expected: BTreeSet<ParticipantId> = [ParticipantId(2), ParticipantId(3)].into();
    assert_matches!(
        node.inbox
            .collect(session, Round::Second, &expected, Duration::from_millis(100), &cancel)
            .await,
        Err(ExchangeError::RoundTimeout { missing, .. }) if missing.len() == 2
    );
}

#[tokio::test]
async fn malformed_pushes_are_refused() {
    let network = Network::start(vec![plain_wallet(1)]).await;
    let url = network.node(1).url.clone();
    let http = reqwest::Client::new();
    let session = Uuid::new_v4();

    // No sender.
    let response = http
        .post(format!("{url}/first"))
        .json(&slate(session))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    // An initialized slate is not a second round slate.
    let response = http
        .post(format!("{url}/second"))
        .header(PARTICIPANT_HEADER, "2")
        .json(&slate(session))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let response = http
        .post(format!("{url}/first"))
        .header(PARTICIPANT_HEADER, "2")
        .body("not a slate")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let response = http.post(format!("{url}/third")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn push_gives_up_at_the_deadline() {
    // Reserve a port, then close it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let cancel = CancellationToken::new();
    let deadline = Instant::now() + Duration::from_millis(200);
    assert_matches!(
        client(1)
            .push(ParticipantId(2), &url, Round::First, &slate(Uuid::new_v4()), deadline, &cancel)
            .await,
        Err(ExchangeError::PeerUnreachable { participant: ParticipantId(2), .. })
    );

    cancel.cancel();
    let deadline = Instant::now() + Duration::from_secs(60);
    assert_matches!(
        client(1)
            .push(ParticipantId(2), &url, Round::First, &slate(Uuid::new_v4()), deadline, &cancel)
            .await,
        Err(ExchangeError::Cancelled(_))
    );
}

#[tokio::test]
async fn receiver_refusal_is_not_retried() {
    let network = Network::start(vec![plain_wallet(9)]).await;
    let url = network.node(9).url.clone();
    let cancel = CancellationToken::new();
    let deadline = Instant::now() + Duration::from_secs(5);

    // Only combined spend slates can be received.
    let fund = slate(Uuid::new_v4());
    assert_eq!(fund.state, SlateState::Initialized);
    assert_matches!(
        client(1).request_receive(&url, &fund, deadline, &cancel).await,
        Err(ExchangeError::ReceiverFailed(_))
    );
}
