// Copyright (c) 2024 Botho Foundation

//! Whole sessions between in-process wallets and a toy ledger.

use assert_matches::assert_matches;
use async_trait::async_trait;
use bth_crypto_commitment::{AssetId, CompressedCommitment};
use bth_transaction_core::{validation::validate, Output, Transaction};
use bth_transaction_slate::{combine, ParticipantId, Slate};
use bth_wallet::{
    Database, FundRequest, HkdfSecretGenerator, LedgerClient, MemoryDatabase, MultipartyWallet,
    OutputStatus, SpendRequest, SubmitResult, ThresholdWallet, Wallet, WalletError,
};
use std::{collections::BTreeSet, sync::Mutex, thread};
use uuid::Uuid;

type TestWallet = Wallet<HkdfSecretGenerator, MemoryDatabase>;

#[derive(Default)]
struct TestLedger {
    unspent: Mutex<BTreeSet<CompressedCommitment>>,
}

#[async_trait]
impl LedgerClient for TestLedger {
    async fn submit(&self, tx: &Transaction) -> Result<SubmitResult, WalletError> {
        if let Err(e) = validate(tx) {
            return Ok(SubmitResult {
                accepted: false,
                log: e.to_string(),
            });
        }
        let mut unspent = self.unspent.lock().unwrap();
        if tx.body.inputs.iter().any(|i| !unspent.contains(&i.commitment)) {
            return Ok(SubmitResult {
                accepted: false,
                log: "unknown input".into(),
            });
        }
        for input in &tx.body.inputs {
            unspent.remove(&input.commitment);
        }
        unspent.extend(tx.body.outputs.iter().map(|o| o.commitment));
        Ok(SubmitResult {
            accepted: true,
            log: String::new(),
        })
    }

    async fn output_exists(&self, commitment: &CompressedCommitment) -> Result<bool, WalletError> {
        Ok(self.unspent.lock().unwrap().contains(commitment))
    }

    async fn issue(&self, output: &Output) -> Result<SubmitResult, WalletError> {
        self.unspent.lock().unwrap().insert(output.commitment);
        Ok(SubmitResult {
            accepted: true,
            log: String::new(),
        })
    }
}

fn wallet(id: u32) -> TestWallet {
    Wallet::new(
        ParticipantId(id),
        HkdfSecretGenerator::new([id as u8; 32]),
        MemoryDatabase::new(),
    )
}

fn bth() -> AssetId {
    AssetId::from("bth")
}

fn fund_request(session: u8, owners: &[u32]) -> FundRequest {
    FundRequest {
        session: Uuid::from_bytes([session; 16]),
        asset: bth(),
        amount: 100,
        fee: 3,
        owners: owners.iter().map(|id| ParticipantId(*id)).collect(),
    }
}

async fn finish(
    wallets: &[&dyn MultipartyWallet],
    combined: &Slate,
    ledger: &TestLedger,
) -> Transaction {
    let signed: Vec<Slate> = wallets.iter().map(|w| w.sign(combined).unwrap()).collect();
    let txs: Vec<Transaction> = wallets
        .iter()
        .map(|w| w.aggregate(&signed).unwrap())
        .collect();
    assert!(txs.windows(2).all(|pair| pair[0] == pair[1]));

    let result = ledger.submit(&txs[0]).await.unwrap();
    assert!(result.accepted, "{}", result.log);
    for w in wallets {
        assert!(w.confirm(&combined.id, ledger).await.unwrap());
    }
    txs[0].clone()
}

async fn fund(
    wallets: &[&dyn MultipartyWallet],
    request: &FundRequest,
    ledger: &TestLedger,
) -> CompressedCommitment {
    let initial: Vec<Slate> = wallets.iter().map(|w| w.fund(request).unwrap()).collect();
    let combined = combine(&initial).unwrap();
    let tx = finish(wallets, &combined, ledger).await;
    tx.body
        .outputs
        .iter()
        .find(|o| o.features.multiparty)
        .unwrap()
        .commitment
}

async fn spend(
    owners: &[&dyn MultipartyWallet],
    receiver: &TestWallet,
    request: &SpendRequest,
    ledger: &TestLedger,
) -> Transaction {
    let initial: Vec<Slate> = owners.iter().map(|w| w.spend(request).unwrap()).collect();
    let combined = combine(&initial).unwrap();
    let response = receiver.receive(&combined).unwrap();
    assert_eq!(receiver.receive(&combined).unwrap(), response);
    let absorbed = combined.absorb_response(response).unwrap();
    let tx = finish(owners, &absorbed, ledger).await;
    assert!(receiver.confirm(&request.session, ledger).await.unwrap());
    tx
}

async fn issue_all(wallets: &[&TestWallet], value: u64, ledger: &TestLedger) {
    for w in wallets {
        w.issue(&bth(), value, ledger).await.unwrap();
    }
}

#[tokio::test]
async fn three_owners_fund_and_spend() {
    let ledger = TestLedger::default();
    let (a, b, c, receiver) = (wallet(1), wallet(2), wallet(3), wallet(9));
    issue_all(&[&a, &b, &c], 40, &ledger).await;
    let owners: [&dyn MultipartyWallet; 3] = [&a, &b, &c];

    let joint = fund(&owners, &fund_request(1, &[1, 2, 3]), &ledger).await;
    assert_eq!(a.balance(&bth()).unwrap(), 5);
    assert_eq!(b.balance(&bth()).unwrap(), 6);
    assert_eq!(c.balance(&bth()).unwrap(), 6);
    for w in [&a, &b, &c] {
        let record = w.database().output(&joint).unwrap().unwrap();
        assert_eq!(record.value, 100);
        assert_eq!(record.status, OutputStatus::Unspent);
    }

    let request = SpendRequest {
        session: Uuid::from_bytes([2u8; 16]),
        joint_output: joint,
        amount: 60,
        fee: 2,
        present: vec![ParticipantId(1), ParticipantId(2), ParticipantId(3)],
    };
    let tx = spend(&owners, &receiver, &request, &ledger).await;
    assert_eq!(tx.body.outputs.len(), 2);
    assert!(!ledger.output_exists(&joint).await.unwrap());
    assert_eq!(receiver.balance(&bth()).unwrap(), 60);

    let remaining = tx
        .body
        .outputs
        .iter()
        .find(|o| o.features.multiparty)
        .unwrap();
    for w in [&a, &b, &c] {
        assert_eq!(
            w.database().output(&joint).unwrap().unwrap().status,
            OutputStatus::Spent
        );
        let record = w.database().output(&remaining.commitment).unwrap().unwrap();
        assert_eq!(record.value, 38);
    }
}

#[tokio::test]
async fn spending_everything_leaves_no_joint_output() {
    let ledger = TestLedger::default();
    let (a, b, receiver) = (wallet(1), wallet(2), wallet(9));
    issue_all(&[&a, &b], 60, &ledger).await;
    let owners: [&dyn MultipartyWallet; 2] = [&a, &b];
    let joint = fund(&owners, &fund_request(3, &[1, 2]), &ledger).await;

    let request = SpendRequest {
        session: Uuid::from_bytes([4u8; 16]),
        joint_output: joint,
        amount: 98,
        fee: 2,
        present: vec![ParticipantId(1), ParticipantId(2)],
    };
    let tx = spend(&owners, &receiver, &request, &ledger).await;
    assert_eq!(tx.body.outputs.len(), 1);
    assert!(tx.body.outputs.iter().all(|o| !o.features.multiparty));
    assert_eq!(receiver.balance(&bth()).unwrap(), 98);
}

#[tokio::test]
async fn two_of_three_spend_without_an_owner() {
    let ledger = TestLedger::default();
    let (a, b, c, receiver) = (wallet(1), wallet(2), wallet(3), wallet(9));
    issue_all(&[&a, &b, &c], 40, &ledger).await;
    let (a, b, c) = (
        ThresholdWallet::new(a, 2),
        ThresholdWallet::new(b, 2),
        ThresholdWallet::new(c, 2),
    );

    let joint = fund(&[&a, &b, &c], &fund_request(5, &[1, 2, 3]), &ledger).await;
    let record = b.inner().database().output(&joint).unwrap().unwrap();
    let fund = record.joint.unwrap();
    assert_eq!(fund.dealings.len(), 3);
    assert_eq!(fund.shares.len(), 3);

    // Owner 2 sits this one out; 1 leads and signs for it.
    let request = SpendRequest {
        session: Uuid::from_bytes([6u8; 16]),
        joint_output: joint,
        amount: 50,
        fee: 2,
        present: vec![ParticipantId(1), ParticipantId(3)],
    };
    let tx = spend(&[&a, &c], &receiver, &request, &ledger).await;
    assert_eq!(receiver.balance(&bth()).unwrap(), 50);

    let remaining = tx
        .body
        .outputs
        .iter()
        .find(|o| o.features.multiparty)
        .unwrap();
    let record = c.inner().database().output(&remaining.commitment).unwrap().unwrap();
    assert_eq!(record.value, 48);
    let fund = record.joint.unwrap();
    assert_eq!(
        fund.dealings.keys().copied().collect::<Vec<_>>(),
        vec![ParticipantId(1), ParticipantId(3)]
    );
    assert_eq!(fund.threshold.unwrap().holders.len(), 3);
}

#[tokio::test]
async fn owners_below_threshold_cannot_spend() {
    let ledger = TestLedger::default();
    let (a, b, c) = (wallet(1), wallet(2), wallet(3));
    issue_all(&[&a, &b, &c], 40, &ledger).await;
    let (a, b, c) = (
        ThresholdWallet::new(a, 3),
        ThresholdWallet::new(b, 3),
        ThresholdWallet::new(c, 3),
    );
    let joint = fund(&[&a, &b, &c], &fund_request(7, &[1, 2, 3]), &ledger).await;

    let request = SpendRequest {
        session: Uuid::from_bytes([8u8; 16]),
        joint_output: joint,
        amount: 10,
        fee: 1,
        present: vec![ParticipantId(1), ParticipantId(3)],
    };
    assert_matches!(a.spend(&request), Err(WalletError::InvalidRequest(_)));
}

#[tokio::test]
async fn n_of_n_needs_every_owner() {
    let ledger = TestLedger::default();
    let (a, b) = (wallet(1), wallet(2));
    issue_all(&[&a, &b], 60, &ledger).await;
    let joint = fund(&[&a, &b], &fund_request(9, &[1, 2]), &ledger).await;

    let request = SpendRequest {
        session: Uuid::from_bytes([10u8; 16]),
        joint_output: joint,
        amount: 10,
        fee: 1,
        present: vec![ParticipantId(1)],
    };
    assert_matches!(
        a.spend(&request),
        Err(WalletError::MissingOwner(ParticipantId(2)))
    );
}

#[tokio::test]
async fn funding_checks_balance_and_sessions() {
    let ledger = TestLedger::default();
    let a = wallet(1);
    issue_all(&[&a], 20, &ledger).await;

    assert_matches!(
        a.fund(&fund_request(11, &[1, 2])),
        Err(WalletError::InsufficientFunds {
            needed: 52,
            available: 20
        })
    );
    assert_matches!(
        a.fund(&fund_request(11, &[2, 3])),
        Err(WalletError::NotAnOwner(ParticipantId(1)))
    );

    let small = FundRequest {
        amount: 30,
        fee: 2,
        ..fund_request(12, &[1, 2])
    };
    a.fund(&small).unwrap();
    assert_matches!(a.fund(&small), Err(WalletError::InvalidRequest(_)));

    // The locked input comes back once the session is dropped, and its
    // change output is forgotten.
    assert_eq!(a.balance(&bth()).unwrap(), 0);
    assert_eq!(a.outputs(&bth()).unwrap().len(), 2);
    a.abandon(&small.session).unwrap();
    assert_eq!(a.balance(&bth()).unwrap(), 20);
    let outputs = a.outputs(&bth()).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].status, OutputStatus::Unspent);
}

#[tokio::test]
async fn concurrent_funds_do_not_share_an_input() {
    let ledger = TestLedger::default();
    let a = wallet(1);
    issue_all(&[&a], 50, &ledger).await;

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let a = &a;
                scope.spawn(move || {
                    a.fund(&FundRequest {
                        amount: 10,
                        fee: 0,
                        ..fund_request(20 + i, &[1, 2])
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(
            result,
            Err(WalletError::InsufficientFunds { needed: 5, available: 0 })
        );
    }
    let locked = a
        .outputs(&bth())
        .unwrap()
        .into_iter()
        .filter(|r| r.status == OutputStatus::Locked)
        .count();
    assert_eq!(locked, 1);
}

#[tokio::test]
async fn concurrent_receives_return_one_response() {
    let ledger = TestLedger::default();
    let (a, b, r) = (wallet(1), wallet(2), wallet(9));
    issue_all(&[&a, &b], 60, &ledger).await;
    let owners: [&dyn MultipartyWallet; 2] = [&a, &b];
    let joint = fund(&owners, &fund_request(14, &[1, 2]), &ledger).await;

    let request = SpendRequest {
        session: Uuid::from_bytes([15; 16]),
        joint_output: joint,
        amount: 40,
        fee: 2,
        present: vec![ParticipantId(1), ParticipantId(2)],
    };
    let initial = vec![a.spend(&request).unwrap(), b.spend(&request).unwrap()];
    let combined = combine(&initial).unwrap();

    let responses: Vec<Slate> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| r.receive(&combined).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(responses.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(r.outputs(&bth()).unwrap().len(), 1);

    // Every owner absorbs its own copy and they still agree.
    let absorbed = combined.absorb_response(responses[0].clone()).unwrap();
    assert_eq!(combined.absorb_response(responses[3].clone()).unwrap(), absorbed);
    finish(&owners, &absorbed, &ledger).await;
    assert!(r.confirm(&request.session, &ledger).await.unwrap());
    assert_eq!(r.balance(&bth()).unwrap(), 40);
}

#[tokio::test]
async fn unconfirmed_sessions_stay_pending() {
    let ledger = TestLedger::default();
    let (a, b) = (wallet(1), wallet(2));
    issue_all(&[&a, &b], 60, &ledger).await;
    let request = fund_request(13, &[1, 2]);
    let initial = vec![a.fund(&request).unwrap(), b.fund(&request).unwrap()];
    let combined = combine(&initial).unwrap();
    let signed = vec![a.sign(&combined).unwrap(), b.sign(&combined).unwrap()];
    let tx = a.aggregate(&signed).unwrap();

    assert!(!a.confirm(&request.session, &ledger).await.unwrap());

    // Never submitted: abandoning drops the joint output and the change.
    let joint = tx.body.outputs.iter().find(|o| o.features.multiparty).unwrap();
    assert!(a.database().output(&joint.commitment).unwrap().is_some());
    a.abandon(&request.session).unwrap();
    assert_eq!(a.database().output(&joint.commitment).unwrap(), None);
    let outputs = a.outputs(&bth()).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].status, OutputStatus::Unspent);
    assert_eq!(a.balance(&bth()).unwrap(), 60);
}
