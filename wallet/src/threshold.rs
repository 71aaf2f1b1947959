// Copyright (c) 2024 Botho Foundation

//! K-of-N wallet.
//!
//! Each owner's blinding share of the joint output is split with Pedersen
//! VSS among all owners while signing the session that mints it. A later
//! spend needs only `K` owners: the others' shares of an absent owner's
//! blinding share are forwarded to the leader, who reconstructs it and
//! signs in the absent owner's place.

use crate::{
    database::{Database, JointFund},
    error::Result,
    ledger::LedgerClient,
    secrets::SecretGenerator,
    wallet::{FundRequest, MultipartyWallet, SpendRequest, Wallet},
    WalletError,
};
use async_trait::async_trait;
use bth_crypto_commitment::{BlindingFactor, PublicKey};
use bth_crypto_vss::{open_blind, share_blind, verify_share, EncryptedShare};
use bth_transaction_core::Transaction;
use bth_transaction_slate::{
    combine, Dealing, ForwardedShare, ParticipantData, ParticipantId, SavedSlate, Slate,
    SlateKind, Threshold,
};
use rand_core::OsRng;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use uuid::Uuid;

pub struct ThresholdWallet<S, D> {
    inner: Wallet<S, D>,
    threshold: u32,
}

impl<S: SecretGenerator, D: Database> ThresholdWallet<S, D> {
    pub fn new(inner: Wallet<S, D>, threshold: u32) -> Self {
        Self { inner, threshold }
    }

    pub fn inner(&self) -> &Wallet<S, D> {
        &self.inner
    }

    fn me(&self) -> ParticipantId {
        self.inner.id()
    }

    fn sharing_error(participant: ParticipantId) -> impl Fn(bth_crypto_vss::Error) -> WalletError {
        move |source| WalletError::Sharing {
            participant,
            source,
        }
    }

    /// Split this owner's blinding share of the new joint output among every
    /// holder.
    fn deal(&self, slate: &mut Slate, threshold: &Threshold, blind: &BlindingFactor) -> Result<()> {
        let me = self.me();
        let err = Self::sharing_error(me);
        let (shares, commitment) =
            share_blind(threshold.share_count(), threshold.threshold, blind, &mut OsRng)
                .map_err(&err)?;
        let mut sealed = BTreeMap::new();
        for ((holder, key), share) in threshold.holders.iter().zip(&shares) {
            sealed.insert(
                *holder,
                EncryptedShare::encrypt(share, key, &mut OsRng).map_err(&err)?,
            );
        }
        slate.dealings.push(Dealing {
            dealer: me,
            commitment,
            shares: sealed,
        });
        debug!(
            "Participant {} dealt {} shares in session {}",
            me,
            shares.len(),
            slate.id
        );
        Ok(())
    }

    /// Rebuild an absent owner's blinding share from this wallet's share and
    /// those forwarded to it, and sign for it.
    fn sign_for_absentee(
        &self,
        slate: &mut Slate,
        joint: &JointFund,
        absent: ParticipantId,
    ) -> Result<()> {
        let missing = self
            .inner
            .database()
            .missing_party_slate(&slate.id, absent)?
            .ok_or(WalletError::MissingSavedSlate(slate.id))?;
        let err = Self::sharing_error(absent);
        let commitment = joint
            .dealings
            .get(&absent)
            .ok_or(WalletError::MissingDealing(absent))?;

        let share_key = self.inner.secrets().share_key()?;
        let mut shares = Vec::new();
        if let Some(own) = joint.shares.get(&absent) {
            shares.push(own.decrypt(&share_key).map_err(&err)?);
        }
        for forwarded in slate.forwarded_shares.iter().filter(|f| f.dealer == absent) {
            shares.push(forwarded.share.decrypt(&share_key).map_err(&err)?);
        }
        let blind = open_blind(&shares, commitment).map_err(&err)?;
        if joint.public_blinds.get(&absent) != Some(&PublicKey::from_secret(&blind)) {
            return Err(WalletError::ReconstructionMismatch(absent));
        }

        slate.create_partial_signature(absent, &blind, &missing.nonce)?;
        info!(
            "Participant {} signed for absent owner {} in session {}",
            self.me(),
            absent,
            slate.id
        );
        Ok(())
    }

    /// The joint fund a spend slate draws on.
    fn spent_fund(&self, slate: &Slate) -> Result<JointFund> {
        let SlateKind::Spend { joint_input } = &slate.kind else {
            return Err(WalletError::InvalidRequest("a fund has no absent owners".into()));
        };
        let hex = joint_input.commitment.to_hex();
        self.inner
            .database()
            .output(&joint_input.commitment)?
            .ok_or_else(|| WalletError::UnknownOutput(hex.clone()))?
            .joint
            .ok_or(WalletError::NotJoint(hex))
    }

    /// Check every dealing of the new joint output against its holder set,
    /// and this wallet's own shares against their commitments.
    fn verify_dealings(&self, slate: &Slate) -> Result<()> {
        let (Some(threshold), Some(_)) = (&slate.threshold, slate.joint_output()) else {
            return Ok(());
        };
        let me = self.me();
        let share_key = self.inner.secrets().share_key()?;
        for dealer in slate
            .fund_owners()
            .filter(|p| p.public_blind.is_some())
            .map(|p| p.id)
        {
            let err = Self::sharing_error(dealer);
            let dealing = slate
                .dealings
                .iter()
                .find(|d| d.dealer == dealer)
                .ok_or(WalletError::MissingDealing(dealer))?;
            if dealing.commitment.threshold != threshold.threshold
                || dealing.commitment.share_count != threshold.share_count()
                || dealing.shares.keys().ne(threshold.holders.keys())
            {
                return Err(WalletError::Sharing {
                    participant: dealer,
                    source: bth_crypto_vss::Error::InvalidThreshold {
                        threshold: dealing.commitment.threshold,
                        share_count: dealing.commitment.share_count,
                    },
                });
            }
            if let (Some(sealed), Some(index)) =
                (dealing.shares.get(&me), threshold.share_index(me))
            {
                let share = sealed.decrypt(&share_key).map_err(&err)?;
                if share.index != index {
                    return Err(err(bth_crypto_vss::Error::ShareIndexOutOfRange(share.index)));
                }
                verify_share(&share, &dealing.commitment).map_err(&err)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S: SecretGenerator, D: Database> MultipartyWallet for ThresholdWallet<S, D> {
    fn participant_id(&self) -> ParticipantId {
        self.me()
    }

    fn fund(&self, request: &FundRequest) -> Result<Slate> {
        let owners: BTreeSet<ParticipantId> = request.owners.iter().copied().collect();
        if self.threshold == 0 || self.threshold as usize > owners.len() {
            return Err(WalletError::InvalidRequest(format!(
                "threshold {} is not in 1..={}",
                self.threshold,
                owners.len()
            )));
        }
        let _guard = self.inner.session_guard()?;
        let (mut slate, saved) = self.inner.init_fund(request)?;
        slate.threshold = Some(Threshold {
            threshold: self.threshold,
            holders: BTreeMap::from([(self.me(), self.inner.secrets().public_share_key()?)]),
        });
        self.inner.begin_session(&slate, &saved)?;
        Ok(slate)
    }

    fn spend(&self, request: &SpendRequest) -> Result<Slate> {
        let guard = self.inner.session_guard()?;
        let (record, joint) = self.inner.joint_input(request)?;
        let Some(threshold) = joint.threshold.clone() else {
            drop(guard);
            return self.inner.spend(request);
        };
        let present: BTreeSet<ParticipantId> = request.present.iter().copied().collect();
        if (present.len() as u32) < threshold.threshold {
            return Err(WalletError::InvalidRequest(format!(
                "{} of {} owners present, {} needed",
                present.len(),
                threshold.share_count(),
                threshold.threshold
            )));
        }
        let absent: Vec<ParticipantId> = joint
            .public_blinds
            .keys()
            .filter(|id| !present.contains(id))
            .copied()
            .collect();
        let me = self.me();
        let leader = present.first().copied().ok_or(WalletError::NotAnOwner(me))?;

        let (mut slate, saved) = self.inner.init_spend(request, &record)?;
        slate.threshold = Some(threshold.clone());

        if me == leader {
            for id in &absent {
                let public_excess = *joint
                    .public_blinds
                    .get(id)
                    .ok_or(WalletError::NotAnOwner(*id))?;
                let nonce = self.inner.next_secret()?;
                slate.add_participant(ParticipantData {
                    id: *id,
                    is_multisig_fund_owner: true,
                    proxy: Some(me),
                    public_excess,
                    public_nonce: PublicKey::from_secret(&nonce),
                    ..Default::default()
                });
                self.inner
                    .database()
                    .put_missing_party_slate(&SavedSlate {
                        id: request.session,
                        participant_id: *id,
                        blind: BlindingFactor::ZERO,
                        asset_blind: BlindingFactor::ZERO,
                        excess_blind: BlindingFactor::ZERO,
                        nonce,
                    })?;
            }
        } else {
            let leader_key = threshold
                .holders
                .get(&leader)
                .ok_or(WalletError::NotAnOwner(leader))?;
            let share_key = self.inner.secrets().share_key()?;
            for id in &absent {
                let err = Self::sharing_error(*id);
                let Some(sealed) = joint.shares.get(id) else {
                    continue;
                };
                let share = sealed.decrypt(&share_key).map_err(&err)?;
                slate.forwarded_shares.push(ForwardedShare {
                    dealer: *id,
                    holder: me,
                    share: EncryptedShare::encrypt(&share, leader_key, &mut OsRng).map_err(&err)?,
                });
            }
        }

        if !absent.is_empty() {
            debug!(
                "Participant {} spends {} without owners {:?}",
                me, request.joint_output, absent
            );
        }
        self.inner.begin_session(&slate, &saved)?;
        Ok(slate)
    }

    fn sign(&self, combined: &Slate) -> Result<Slate> {
        let me = self.me();
        let mut slate = self.inner.sign_own(combined)?;

        let absentees: Vec<ParticipantId> = slate
            .participants
            .values()
            .filter(|p| p.proxy == Some(me))
            .map(|p| p.id)
            .collect();
        if !absentees.is_empty() {
            let joint = self.spent_fund(&slate)?;
            for id in absentees {
                self.sign_for_absentee(&mut slate, &joint, id)?;
            }
        }

        let deals = slate.participant(me)?.public_blind.is_some() && slate.joint_output().is_some();
        if let (true, Some(threshold)) = (deals, slate.threshold.clone()) {
            let saved = self
                .inner
                .database()
                .saved_slate(&slate.id)?
                .ok_or(WalletError::MissingSavedSlate(slate.id))?;
            self.deal(&mut slate, &threshold, &saved.blind)?;
        }
        self.inner.finish_sign(slate)
    }

    fn aggregate(&self, signed: &[Slate]) -> Result<Transaction> {
        let slate = combine(signed)?;
        self.verify_dealings(&slate)?;
        self.inner.finalize_session(slate)
    }

    fn receive(&self, combined: &Slate) -> Result<Slate> {
        self.inner.receive(combined)
    }

    async fn confirm(&self, session: &Uuid, ledger: &dyn LedgerClient) -> Result<bool> {
        self.inner.confirm(session, ledger).await
    }

    fn abandon(&self, session: &Uuid) -> Result<()> {
        self.inner.abandon(session)
    }
}
