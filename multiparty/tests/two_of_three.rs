// Copyright (c) 2024 Botho Foundation

//! A 2-of-3 joint output funded by all three owners and spent by two.

mod common;

use bth_transaction_slate::ParticipantId;
use bth_wallet::{Database, FundRequest, OutputStatus, SpendRequest};
use common::{bth, threshold_wallet, Base, Network};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn ids(ids: &[u32]) -> Vec<ParticipantId> {
    ids.iter().copied().map(ParticipantId).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_owners_spend_without_the_third() {
    let mut network = Network::start(vec![
        threshold_wallet(1, 2),
        threshold_wallet(2, 2),
        threshold_wallet(3, 2),
        threshold_wallet(9, 2),
    ])
    .await;
    network.issue(&[1, 2, 3], 40).await;

    let fund = FundRequest {
        session: Uuid::new_v4(),
        asset: bth(),
        amount: 100,
        fee: 3,
        owners: ids(&[1, 2, 3]),
    };
    let cancel = CancellationToken::new();
    let (c1, c2, c3) = (
        network.coordinator(1),
        network.coordinator(2),
        network.coordinator(3),
    );
    let (t1, t2, t3) = tokio::join!(
        c1.fund(&fund, &cancel),
        c2.fund(&fund, &cancel),
        c3.fund(&fund, &cancel),
    );
    let tx = t1.unwrap();
    assert_eq!(tx, t2.unwrap());
    assert_eq!(tx, t3.unwrap());
    let joint = tx
        .body
        .outputs
        .iter()
        .find(|o| o.features.multiparty)
        .unwrap()
        .commitment;

    for id in [1, 2, 3] {
        let record = network
            .node(id)
            .wallet
            .base()
            .database()
            .output(&joint)
            .unwrap()
            .unwrap();
        let fund = record.joint.unwrap();
        let threshold = fund.threshold.unwrap();
        assert_eq!(threshold.threshold, 2);
        assert_eq!(threshold.holders.len(), 3);
        assert_eq!(fund.dealings.len(), 3);
        assert_eq!(fund.shares.len(), 3);
    }

    // Owner 2 sits this one out.
    let (receiver, mut receipts) = network.receiver(9);
    let receiver_url = network.node(9).url.clone();
    let spend = SpendRequest {
        session: Uuid::new_v4(),
        joint_output: joint,
        amount: 50,
        fee: 2,
        present: ids(&[1, 3]),
    };
    let (t1, t3, received) = tokio::join!(
        c1.spend(&spend, &receiver_url, &cancel),
        c3.spend(&spend, &receiver_url, &cancel),
        receiver.receive_one(&mut receipts, &cancel),
    );
    let tx = t1.unwrap();
    assert_eq!(tx, t3.unwrap());
    assert_eq!(received.unwrap(), Some(spend.session));

    assert!(!network.ledger.contains(&joint).unwrap());
    assert_eq!(network.node(9).wallet.base().balance(&bth()).unwrap(), 50);

    let remaining = tx
        .body
        .outputs
        .iter()
        .find(|o| o.features.multiparty)
        .unwrap()
        .commitment;
    assert!(network.ledger.contains(&remaining).unwrap());
    for id in [1, 3] {
        let record = network
            .node(id)
            .wallet
            .base()
            .database()
            .output(&remaining)
            .unwrap()
            .unwrap();
        assert_eq!(record.value, 48);
        assert_eq!(record.status, OutputStatus::Unspent);
        let fund = record.joint.unwrap();
        assert_eq!(fund.dealings.keys().copied().collect::<Vec<_>>(), ids(&[1, 3]));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_owner_is_below_the_threshold() {
    let network = Network::start(vec![
        threshold_wallet(1, 2),
        threshold_wallet(2, 2),
        threshold_wallet(3, 2),
    ])
    .await;
    network.issue(&[1, 2, 3], 40).await;

    let fund = FundRequest {
        session: Uuid::new_v4(),
        asset: bth(),
        amount: 90,
        fee: 0,
        owners: ids(&[1, 2, 3]),
    };
    let cancel = CancellationToken::new();
    let (c1, c2, c3) = (
        network.coordinator(1),
        network.coordinator(2),
        network.coordinator(3),
    );
    let (t1, _, _) = tokio::join!(
        c1.fund(&fund, &cancel),
        c2.fund(&fund, &cancel),
        c3.fund(&fund, &cancel),
    );
    let joint = t1
        .unwrap()
        .body
        .outputs
        .iter()
        .find(|o| o.features.multiparty)
        .unwrap()
        .commitment;

    let spend = SpendRequest {
        session: Uuid::new_v4(),
        joint_output: joint,
        amount: 10,
        fee: 0,
        present: ids(&[1]),
    };
    assert!(c1.spend(&spend, "http://127.0.0.1:9", &cancel).await.is_err());
    let record = network
        .node(1)
        .wallet
        .base()
        .database()
        .output(&joint)
        .unwrap()
        .unwrap();
    assert_eq!(record.status, OutputStatus::Unspent);
}
