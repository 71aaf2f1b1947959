// Copyright (c) 2024 Botho Foundation

//! N-of-N wallet: every owner of a joint output takes part in every session
//! that spends it.

use crate::{
    database::{Database, JointFund, OutputRecord, OutputStatus, SessionRole, TxRecord, TxStatus},
    error::Result,
    ledger::LedgerClient,
    secrets::SecretGenerator,
    WalletError,
};
use async_trait::async_trait;
use bth_crypto_commitment::{
    blind_value_asset_blind, AssetCommitment, AssetId, BlindingFactor, CompressedCommitment,
    PedersenGens, PublicKey,
};
use bth_crypto_range_proof::RangeProof;
use bth_crypto_surjection::{SurjectionInput, SurjectionProof};
use bth_transaction_core::{Output, OutputFeatures, Transaction};
use bth_transaction_slate::{
    combine, public_taus, DerivedOutput, ParticipantData, ParticipantId, SavedSlate, Slate,
    SlateKind, SlateState,
};
use rand_core::OsRng;
use std::{
    collections::BTreeSet,
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Move `amount` of `asset` into a new joint output owned by `owners`, and
/// pay `fee`. Every owner contributes an equal share of both; the leader
/// also covers the remainders.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FundRequest {
    pub session: Uuid,
    pub asset: AssetId,
    pub amount: u64,
    pub fee: u64,
    pub owners: Vec<ParticipantId>,
}

/// Pay `amount` out of the joint output `joint_output` to a receiver, with
/// `present` owners taking part.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpendRequest {
    pub session: Uuid,
    pub joint_output: CompressedCommitment,
    pub amount: u64,
    pub fee: u64,
    pub present: Vec<ParticipantId>,
}

/// One participant's side of every session round.
#[async_trait]
pub trait MultipartyWallet: Send + Sync {
    fn participant_id(&self) -> ParticipantId;

    /// Round one of a fund: this owner's initialized slate.
    fn fund(&self, request: &FundRequest) -> Result<Slate>;

    /// Round one of a spend: this owner's initialized slate.
    fn spend(&self, request: &SpendRequest) -> Result<Slate>;

    /// Round two: sign the combined slate.
    fn sign(&self, combined: &Slate) -> Result<Slate>;

    /// Round three: combine every signed slate into the final transaction,
    /// and record what this wallet now owns.
    fn aggregate(&self, signed: &[Slate]) -> Result<Transaction>;

    /// Receiver side of a spend: add the receiving output and sign.
    /// Repeated calls for one session return the same response.
    fn receive(&self, combined: &Slate) -> Result<Slate>;

    /// Settle local state once the ledger reflects the session. Returns
    /// `false` while it does not yet.
    async fn confirm(&self, session: &Uuid, ledger: &dyn LedgerClient) -> Result<bool>;

    /// Give up on a session and release its inputs.
    fn abandon(&self, session: &Uuid) -> Result<()>;
}

pub struct Wallet<S, D> {
    id: ParticipantId,
    secrets: S,
    db: D,
    /// Held from a session's first look at the database until its outputs
    /// are locked or its response is stored.
    sessions: Mutex<()>,
}

impl<S: SecretGenerator, D: Database> Wallet<S, D> {
    pub fn new(id: ParticipantId, secrets: S, db: D) -> Self {
        Self {
            id,
            secrets,
            db,
            sessions: Mutex::new(()),
        }
    }

    /// Serializes starting sessions, so two of them never select the same
    /// output and a receiver answers each session once.
    pub(crate) fn session_guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.sessions
            .lock()
            .map_err(|_| WalletError::Database("session lock poisoned".into()))
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub(crate) fn secrets(&self) -> &S {
        &self.secrets
    }

    pub(crate) fn next_secret(&self) -> Result<BlindingFactor> {
        self.secrets.secret(self.db.next_secret_index()?)
    }

    /// Every output of `asset` this wallet knows of.
    pub fn outputs(&self, asset: &AssetId) -> Result<Vec<OutputRecord>> {
        self.db.outputs_by_asset(asset)
    }

    /// Sum of the spendable outputs this wallet opens alone.
    pub fn balance(&self, asset: &AssetId) -> Result<u64> {
        self.outputs(asset)?
            .iter()
            .filter(|r| r.status == OutputStatus::Unspent && !r.is_joint())
            .try_fold(0u64, |acc, r| acc.checked_add(r.value))
            .ok_or(WalletError::AmountOverflow)
    }

    fn build_output(
        &self,
        asset: &AssetId,
        value: u64,
        blind: &BlindingFactor,
        asset_blind: &BlindingFactor,
        inputs: &[SurjectionInput],
    ) -> Result<Output> {
        let tag = asset.tag();
        let asset_commitment = AssetCommitment::new(&tag, asset_blind);
        let gens = PedersenGens::for_asset_commitment(&asset_commitment)?;
        let (range_proof, commitment) = RangeProof::prove(value, blind, &gens, &mut OsRng)?;
        let surjection_proof = if inputs.is_empty() {
            None
        } else {
            Some(SurjectionProof::create(inputs, &tag, asset_blind, &mut OsRng)?)
        };
        Ok(Output {
            features: OutputFeatures::default(),
            commitment,
            asset_commitment,
            range_proof: Some(range_proof),
            surjection_proof,
        })
    }

    /// Mint an output of `value` through a development ledger and keep it.
    pub async fn issue(
        &self,
        asset: &AssetId,
        value: u64,
        ledger: &dyn LedgerClient,
    ) -> Result<OutputRecord> {
        let blind = self.next_secret()?;
        let asset_blind = self.next_secret()?;
        let output = self.build_output(asset, value, &blind, &asset_blind, &[])?;
        let result = ledger.issue(&output).await?;
        if !result.accepted {
            return Err(WalletError::Ledger(result.log));
        }
        let record = OutputRecord {
            commitment: output.commitment,
            asset_commitment: output.asset_commitment,
            asset: asset.clone(),
            value,
            blind,
            asset_blind,
            status: OutputStatus::Unspent,
            session: None,
            joint: None,
        };
        self.db.put_output(&record)?;
        info!("Issued {} {} as {}", value, asset, record.commitment);
        Ok(record)
    }

    fn ensure_new_session(&self, session: &Uuid) -> Result<()> {
        if self.db.saved_slate(session)?.is_some() || self.db.transaction(session)?.is_some() {
            return Err(WalletError::InvalidRequest(format!(
                "session {session} was already started"
            )));
        }
        Ok(())
    }

    fn lock_output(&self, record: &OutputRecord, session: Uuid) -> Result<()> {
        let mut locked = record.clone();
        locked.status = OutputStatus::Locked;
        locked.session = Some(session);
        self.db.put_output(&locked)
    }

    /// Select and lock this owner's inputs. Callers hold `session_guard`
    /// until the session has begun.
    pub(crate) fn init_fund(&self, request: &FundRequest) -> Result<(Slate, SavedSlate)> {
        self.ensure_new_session(&request.session)?;
        let owners: BTreeSet<ParticipantId> = request.owners.iter().copied().collect();
        if !owners.contains(&self.id) {
            return Err(WalletError::NotAnOwner(self.id));
        }
        if request.amount == 0 {
            return Err(WalletError::InvalidRequest("fund amount must be positive".into()));
        }

        let n = owners.len() as u64;
        let mut contribution = request.amount / n + request.fee / n;
        if owners.first() == Some(&self.id) {
            contribution += request.amount % n + request.fee % n;
        }

        let mut selected = Vec::new();
        let mut total = 0u64;
        for record in self.db.outputs_by_asset(&request.asset)? {
            if total >= contribution {
                break;
            }
            if record.status != OutputStatus::Unspent || record.is_joint() {
                continue;
            }
            total = total
                .checked_add(record.value)
                .ok_or(WalletError::AmountOverflow)?;
            selected.push(record);
        }
        if total < contribution {
            return Err(WalletError::InsufficientFunds {
                needed: contribution,
                available: total,
            });
        }

        let tag = request.asset.tag();
        let mut excess: BlindingFactor = selected
            .iter()
            .map(|r| blind_value_asset_blind(r.value, &r.blind, &r.asset_blind))
            .sum();

        let mut slate = Slate::new(
            request.session,
            SlateKind::Fund,
            request.amount,
            request.fee,
            0,
            request.asset.clone(),
        );
        slate
            .transaction
            .body
            .inputs
            .extend(selected.iter().map(OutputRecord::to_input));

        let change = total - contribution;
        if change > 0 {
            let blind = self.next_secret()?;
            let asset_blind = self.next_secret()?;
            let inputs: Vec<SurjectionInput> = selected
                .iter()
                .map(|r| SurjectionInput::known(tag, r.asset_blind))
                .collect();
            let output = self.build_output(&request.asset, change, &blind, &asset_blind, &inputs)?;
            excess = excess - blind_value_asset_blind(change, &blind, &asset_blind);
            self.db.put_output(&OutputRecord {
                commitment: output.commitment,
                asset_commitment: output.asset_commitment,
                asset: request.asset.clone(),
                value: change,
                blind,
                asset_blind,
                status: OutputStatus::Unconfirmed,
                session: Some(request.session),
                joint: None,
            })?;
            slate.transaction.body.outputs.push(output);
        }

        let blind = self.next_secret()?;
        let nonce = self.next_secret()?;
        let offset = BlindingFactor::random(&mut OsRng);
        excess = excess - blind - offset;
        slate.transaction.offset = offset;
        slate.add_participant(ParticipantData {
            id: self.id,
            is_multisig_fund_owner: true,
            public_blind: Some(PublicKey::from_secret(&blind)),
            public_excess: PublicKey::from_secret(&excess),
            public_nonce: PublicKey::from_secret(&nonce),
            public_taus: Some(public_taus(&nonce, &request.session)),
            ..Default::default()
        });

        for record in &selected {
            self.lock_output(record, request.session)?;
        }
        debug!(
            "Funding session {}: {} inputs, contribution {}, change {}",
            request.session,
            selected.len(),
            contribution,
            change
        );

        let saved = SavedSlate {
            id: request.session,
            participant_id: self.id,
            blind,
            asset_blind: selected
                .first()
                .map(|r| r.asset_blind)
                .unwrap_or(BlindingFactor::ZERO),
            excess_blind: excess,
            nonce,
        };
        Ok((slate, saved))
    }

    /// The joint output `request` spends, checked to be spendable by the
    /// present owners. Callers hold `session_guard` until the session has
    /// begun.
    pub(crate) fn joint_input(&self, request: &SpendRequest) -> Result<(OutputRecord, JointFund)> {
        let hex = request.joint_output.to_hex();
        let record = self
            .db
            .output(&request.joint_output)?
            .ok_or_else(|| WalletError::UnknownOutput(hex.clone()))?;
        let joint = record
            .joint
            .clone()
            .ok_or_else(|| WalletError::NotJoint(hex.clone()))?;
        if record.status != OutputStatus::Unspent {
            return Err(WalletError::NotSpendable(hex));
        }
        let owners = joint.owners();
        if !request.present.contains(&self.id) {
            return Err(WalletError::NotAnOwner(self.id));
        }
        if let Some(stranger) = request.present.iter().find(|p| !owners.contains(p)) {
            return Err(WalletError::NotAnOwner(*stranger));
        }
        Ok((record, joint))
    }

    pub(crate) fn init_spend(
        &self,
        request: &SpendRequest,
        record: &OutputRecord,
    ) -> Result<(Slate, SavedSlate)> {
        self.ensure_new_session(&request.session)?;
        if request.amount == 0 {
            return Err(WalletError::InvalidRequest("spend amount must be positive".into()));
        }
        let needed = request
            .amount
            .checked_add(request.fee)
            .ok_or(WalletError::AmountOverflow)?;
        let balance = record
            .value
            .checked_sub(needed)
            .ok_or(WalletError::InsufficientFunds {
                needed,
                available: record.value,
            })?;

        // No new joint output, and so no blinding share, if nothing is left.
        let blind = if balance > 0 {
            self.next_secret()?
        } else {
            BlindingFactor::ZERO
        };
        let public_blind = (balance > 0).then(|| PublicKey::from_secret(&blind));
        let nonce = self.next_secret()?;
        let offset = BlindingFactor::random(&mut OsRng);
        let excess = record.blind - blind - offset;

        let mut slate = Slate::new(
            request.session,
            SlateKind::Spend {
                joint_input: record.to_input(),
            },
            request.amount,
            request.fee,
            balance,
            record.asset.clone(),
        );
        slate.transaction.offset = offset;
        slate.add_participant(ParticipantData {
            id: self.id,
            is_multisig_fund_owner: true,
            public_blind,
            public_excess: PublicKey::from_secret(&excess),
            public_nonce: PublicKey::from_secret(&nonce),
            public_taus: public_blind.map(|_| public_taus(&nonce, &request.session)),
            ..Default::default()
        });
        self.lock_output(record, request.session)?;

        let saved = SavedSlate {
            id: request.session,
            participant_id: self.id,
            blind,
            asset_blind: record.asset_blind,
            excess_blind: excess,
            nonce,
        };
        Ok((slate, saved))
    }

    /// Keep the secrets and the first slate of a session.
    pub(crate) fn begin_session(&self, slate: &Slate, saved: &SavedSlate) -> Result<()> {
        self.db.put_saved_slate(saved)?;
        self.db.put_transaction(&TxRecord {
            id: slate.id,
            role: SessionRole::Owner,
            status: TxStatus::Pending,
            slate: slate.clone(),
            transaction: None,
        })?;
        info!("Participant {} started session {}", self.id, slate.id);
        Ok(())
    }

    /// This wallet's partial signature and `taux` on a copy of `combined`.
    /// The copy is still combined so that more can be added to it.
    pub(crate) fn sign_own(&self, combined: &Slate) -> Result<Slate> {
        combined.expect_state(SlateState::Combined)?;
        let saved = self
            .db
            .saved_slate(&combined.id)?
            .ok_or(WalletError::MissingSavedSlate(combined.id))?;
        let entry = combined.participant(self.id)?;
        if entry.public_excess != PublicKey::from_secret(&saved.excess_blind)
            || entry.public_nonce != PublicKey::from_secret(&saved.nonce)
        {
            return Err(WalletError::EntryAltered(self.id));
        }
        let deals_blind = entry.public_blind.is_some();

        let mut slate = combined.clone();
        let mut key = saved.excess_blind;
        if slate.leader()? == self.id {
            key = key + slate.value_term_secret(&saved.asset_blind)?;
            slate.add_derived_surjection_proofs(&saved.asset_blind, &mut OsRng)?;
        }
        slate.create_partial_signature(self.id, &key, &saved.nonce)?;
        if deals_blind && slate.joint_output().is_some() {
            slate.add_taux(self.id, &saved.blind, &saved.nonce)?;
        }
        Ok(slate)
    }

    pub(crate) fn finish_sign(&self, mut slate: Slate) -> Result<Slate> {
        slate.finish_signing()?;
        self.update_session(&slate, TxStatus::Pending, None)?;
        debug!("Participant {} signed session {}", self.id, slate.id);
        Ok(slate)
    }

    fn update_session(
        &self,
        slate: &Slate,
        status: TxStatus,
        transaction: Option<Transaction>,
    ) -> Result<()> {
        let mut record = self
            .db
            .transaction(&slate.id)?
            .ok_or(WalletError::UnknownSession(slate.id))?;
        record.slate = slate.clone();
        record.status = status;
        if transaction.is_some() {
            record.transaction = transaction;
        }
        self.db.put_transaction(&record)
    }

    /// Assemble the transaction of a combined signed slate and keep this
    /// wallet's share of its joint output.
    pub(crate) fn finalize_session(&self, mut slate: Slate) -> Result<Transaction> {
        let tx = slate.finalize()?;

        if let Some(output) = slate.joint_output() {
            let saved = self
                .db
                .saved_slate(&slate.id)?
                .ok_or(WalletError::MissingSavedSlate(slate.id))?;
            let joint = JointFund {
                public_blinds: slate
                    .fund_owners()
                    .filter_map(|p| p.public_blind.map(|b| (p.id, b)))
                    .collect(),
                threshold: slate.threshold.clone(),
                dealings: slate
                    .dealings
                    .iter()
                    .map(|d| (d.dealer, d.commitment.clone()))
                    .collect(),
                shares: slate
                    .dealings
                    .iter()
                    .filter_map(|d| d.shares.get(&self.id).map(|s| (d.dealer, s.clone())))
                    .collect(),
            };
            let record = OutputRecord {
                commitment: output.commitment,
                asset_commitment: output.asset_commitment,
                asset: slate.asset.clone(),
                value: slate.joint_output_value(),
                blind: saved.blind,
                asset_blind: slate.derived_asset_blind(DerivedOutput::Joint)?,
                status: OutputStatus::Unconfirmed,
                session: Some(slate.id),
                joint: Some(joint),
            };
            self.db.put_output(&record)?;
            info!(
                "Session {} mints joint output {} of {}",
                slate.id, record.commitment, record.value
            );
        }

        self.update_session(&slate, TxStatus::Finalized, Some(tx.clone()))?;
        Ok(tx)
    }
}

#[async_trait]
impl<S: SecretGenerator, D: Database> MultipartyWallet for Wallet<S, D> {
    fn participant_id(&self) -> ParticipantId {
        self.id
    }

    fn fund(&self, request: &FundRequest) -> Result<Slate> {
        let _guard = self.session_guard()?;
        let (slate, saved) = self.init_fund(request)?;
        self.begin_session(&slate, &saved)?;
        Ok(slate)
    }

    fn spend(&self, request: &SpendRequest) -> Result<Slate> {
        let _guard = self.session_guard()?;
        let (record, joint) = self.joint_input(request)?;
        if let Some(absent) = joint
            .owners()
            .into_iter()
            .find(|o| !request.present.contains(o))
        {
            return Err(WalletError::MissingOwner(absent));
        }
        let (slate, saved) = self.init_spend(request, &record)?;
        self.begin_session(&slate, &saved)?;
        Ok(slate)
    }

    fn sign(&self, combined: &Slate) -> Result<Slate> {
        let slate = self.sign_own(combined)?;
        self.finish_sign(slate)
    }

    fn aggregate(&self, signed: &[Slate]) -> Result<Transaction> {
        self.finalize_session(combine(signed)?)
    }

    fn receive(&self, combined: &Slate) -> Result<Slate> {
        let _guard = self.session_guard()?;
        if let Some(record) = self.db.transaction(&combined.id)? {
            if record.role == SessionRole::Receiver {
                debug!("Returning cached response for session {}", combined.id);
                return Ok(record.slate);
            }
            return Err(WalletError::InvalidRequest(format!(
                "participant {} owns session {}",
                self.id, combined.id
            )));
        }
        combined.expect_state(SlateState::Combined)?;
        if combined.kind == SlateKind::Fund {
            return Err(WalletError::InvalidRequest("a fund has no receiver".into()));
        }
        if combined.participants.contains_key(&self.id) {
            return Err(WalletError::InvalidRequest(format!(
                "participant {} already takes part in session {}",
                self.id, combined.id
            )));
        }

        let blind = self.next_secret()?;
        let asset_blind = combined.derived_asset_blind(DerivedOutput::Receiver)?;
        let output = self.build_output(&combined.asset, combined.amount, &blind, &asset_blind, &[])?;
        let nonce = self.next_secret()?;
        let offset = BlindingFactor::random(&mut OsRng);
        let excess = -blind_value_asset_blind(combined.amount, &blind, &asset_blind) - offset;

        let mut response = combined.clone();
        response.transaction.offset = response.transaction.offset + offset;
        response.transaction.body.outputs.push(output.clone());
        response.add_participant(ParticipantData {
            id: self.id,
            public_excess: PublicKey::from_secret(&excess),
            public_nonce: PublicKey::from_secret(&nonce),
            ..Default::default()
        });
        response.create_partial_signature(self.id, &excess, &nonce)?;

        self.db.put_output(&OutputRecord {
            commitment: output.commitment,
            asset_commitment: output.asset_commitment,
            asset: combined.asset.clone(),
            value: combined.amount,
            blind,
            asset_blind,
            status: OutputStatus::Unconfirmed,
            session: Some(combined.id),
            joint: None,
        })?;
        self.db.put_saved_slate(&SavedSlate {
            id: combined.id,
            participant_id: self.id,
            blind,
            asset_blind,
            excess_blind: excess,
            nonce,
        })?;
        self.db.put_transaction(&TxRecord {
            id: combined.id,
            role: SessionRole::Receiver,
            status: TxStatus::Pending,
            slate: response.clone(),
            transaction: None,
        })?;
        info!(
            "Participant {} receives {} {} in session {}",
            self.id, combined.amount, combined.asset, combined.id
        );
        Ok(response)
    }

    async fn confirm(&self, session: &Uuid, ledger: &dyn LedgerClient) -> Result<bool> {
        let mut record = self
            .db
            .transaction(session)?
            .ok_or(WalletError::UnknownSession(*session))?;
        if record.status == TxStatus::Confirmed {
            return Ok(true);
        }

        let body = &record.slate.transaction.body;
        let mut created = Vec::new();
        for output in &body.outputs {
            if let Some(owned) = self.db.output(&output.commitment)? {
                if owned.status == OutputStatus::Unconfirmed && owned.session == Some(*session) {
                    created.push(owned);
                }
            }
        }

        // A new owned output proves the session landed; failing that, the
        // disappearance of its first input does.
        let landed = match (created.first(), body.inputs.first()) {
            (Some(output), _) => ledger.output_exists(&output.commitment).await?,
            (None, Some(input)) => !ledger.output_exists(&input.commitment).await?,
            (None, None) => false,
        };
        if !landed {
            return Ok(false);
        }

        for mut output in created {
            output.status = OutputStatus::Unspent;
            self.db.put_output(&output)?;
        }
        for input in &body.inputs {
            if let Some(mut spent) = self.db.output(&input.commitment)? {
                if spent.session == Some(*session) {
                    spent.status = OutputStatus::Spent;
                    self.db.put_output(&spent)?;
                }
            }
        }
        record.status = TxStatus::Confirmed;
        self.db.put_transaction(&record)?;
        info!("Session {} confirmed", session);
        Ok(true)
    }

    fn abandon(&self, session: &Uuid) -> Result<()> {
        let Some(mut record) = self.db.transaction(session)? else {
            return Ok(());
        };
        if record.status == TxStatus::Confirmed {
            return Err(WalletError::InvalidRequest(format!(
                "session {session} is already confirmed"
            )));
        }
        for input in &record.slate.transaction.body.inputs {
            if let Some(mut locked) = self.db.output(&input.commitment)? {
                if locked.status == OutputStatus::Locked && locked.session == Some(*session) {
                    locked.status = OutputStatus::Unspent;
                    locked.session = None;
                    self.db.put_output(&locked)?;
                }
            }
        }
        // Change and joint outputs the session would have created.
        for created in self.db.outputs_by_asset(&record.slate.asset)? {
            if created.status == OutputStatus::Unconfirmed && created.session == Some(*session) {
                self.db.delete_output(&created.commitment)?;
            }
        }
        record.status = TxStatus::Abandoned;
        self.db.put_transaction(&record)?;
        warn!("Participant {} abandoned session {}", self.id, session);
        Ok(())
    }
}
