// Copyright (c) 2024 Botho Foundation

//! The slate record and its state machine.

use crate::{Error, ParticipantData, ParticipantId};
use blake2::{Blake2b512, Digest};
use bth_crypto_commitment::{
    AssetCommitment, AssetId, BlindingFactor, PedersenGens, PublicKey, RistrettoPoint, Scalar,
};
use bth_crypto_vss::{EncryptedShare, SharingCommitment};
use bth_transaction_core::{
    Input, Kernel, KernelFeatures, Output, OutputFeatures, Transaction, TransactionBody,
};
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Slate wire format version.
pub const PROTOCOL_VERSION: u16 = 1;

const ASSET_BLIND_DOMAIN_TAG: &[u8] = b"bth_slate_asset_blind";

/// Where a slate is in the protocol. States only move forward.
#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SlateState {
    /// initialized
    Initialized,
    /// combined
    Combined,
    /// signed
    Signed,
    /// aggregated
    Aggregated,
}

/// What the session does with the joint fund.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SlateKind {
    /// Every owner contributes inputs to mint a new joint output of
    /// `amount`.
    Fund,
    /// Spend the joint output `joint_input`: pay `amount` to a receiver,
    /// `fee` to the ledger and mint a new joint output of the remaining
    /// `multiparty_balance`, if any.
    Spend {
        /// The joint output being spent.
        joint_input: Input,
    },
}

/// Outputs whose asset blinding is derived from public session data rather
/// than chosen by one participant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DerivedOutput {
    /// The joint output minted by the session.
    Joint,
    /// The receiver's output of a spend.
    Receiver,
}

impl DerivedOutput {
    fn as_byte(&self) -> u8 {
        match self {
            Self::Joint => 0,
            Self::Receiver => 1,
        }
    }
}

/// K-of-N sharing parameters of the joint fund.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Shares needed to act for an absent owner.
    pub threshold: u32,
    /// Every shareholder's share encryption key.
    pub holders: BTreeMap<ParticipantId, PublicKey>,
}

impl Threshold {
    /// VSS index `1..=n` of a holder, in id order.
    pub fn share_index(&self, id: ParticipantId) -> Option<u32> {
        self.holders
            .keys()
            .position(|holder| *holder == id)
            .map(|i| i as u32 + 1)
    }

    /// Number of shareholders.
    pub fn share_count(&self) -> u32 {
        self.holders.len() as u32
    }
}

/// One dealer's VSS sharing of its blinding share, each share sealed to its
/// holder.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Dealing {
    /// Whose blinding share is dealt.
    pub dealer: ParticipantId,
    /// Public commitment to the sharing polynomials.
    pub commitment: SharingCommitment,
    /// Sealed shares by holder.
    pub shares: BTreeMap<ParticipantId, EncryptedShare>,
}

/// A holder's share of an absent owner's blinding, re-sealed to the
/// participant signing on the owner's behalf.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ForwardedShare {
    /// The absent owner.
    pub dealer: ParticipantId,
    /// The holder forwarding its share.
    pub holder: ParticipantId,
    /// The share, sealed to the signing participant.
    pub share: EncryptedShare,
}

/// The transcript of one multi-party transaction.
#[serde_as]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Slate {
    /// Wire format version.
    pub version: u16,
    /// Session id.
    pub id: Uuid,
    /// Protocol state.
    pub state: SlateState,
    /// Fund or spend.
    pub kind: SlateKind,
    /// Amount moved into the joint output (fund) or to the receiver (spend).
    #[serde_as(as = "DisplayFromStr")]
    pub amount: u64,
    /// Value left in the joint fund after a spend.
    #[serde_as(as = "DisplayFromStr")]
    pub multiparty_balance: u64,
    /// Asset of every input and output.
    pub asset: AssetId,
    /// Offset, inputs, outputs and kernel under construction.
    pub transaction: Transaction,
    /// Participant entries by id.
    pub participants: BTreeMap<ParticipantId, ParticipantData>,
    /// Set for K-of-N funds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Threshold>,
    /// VSS dealings of the new joint output's blinding shares.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dealings: Vec<Dealing>,
    /// Shares of absent owners' blinding shares.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forwarded_shares: Vec<ForwardedShare>,
}

impl Slate {
    /// An empty slate for a new session.
    pub fn new(
        id: Uuid,
        kind: SlateKind,
        amount: u64,
        fee: u64,
        multiparty_balance: u64,
        asset: AssetId,
    ) -> Self {
        let kernel = Kernel {
            features: KernelFeatures::Multiparty,
            fee,
            asset: asset.clone(),
            ..Default::default()
        };
        let mut transaction = Transaction {
            offset: BlindingFactor::ZERO,
            body: TransactionBody {
                kernel,
                ..Default::default()
            },
        };
        if let SlateKind::Spend { joint_input } = &kind {
            transaction.body.inputs.push(joint_input.clone());
        }
        Self {
            version: PROTOCOL_VERSION,
            id,
            state: SlateState::Initialized,
            kind,
            amount,
            multiparty_balance,
            asset,
            transaction,
            participants: BTreeMap::new(),
            threshold: None,
            dealings: Vec::new(),
            forwarded_shares: Vec::new(),
        }
    }

    /// The kernel fee.
    pub fn fee(&self) -> u64 {
        self.transaction.body.kernel.fee
    }

    /// Fail unless the slate is in `expected`.
    pub fn expect_state(&self, expected: SlateState) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::UnexpectedState {
                expected,
                found: self.state,
            })
        }
    }

    /// A participant's entry.
    pub fn participant(&self, id: ParticipantId) -> Result<&ParticipantData, Error> {
        self.participants
            .get(&id)
            .ok_or(Error::UnknownParticipant(id))
    }

    pub(crate) fn participant_mut(
        &mut self,
        id: ParticipantId,
    ) -> Result<&mut ParticipantData, Error> {
        self.participants
            .get_mut(&id)
            .ok_or(Error::UnknownParticipant(id))
    }

    /// Add this participant's entry, replacing an earlier one.
    pub fn add_participant(&mut self, data: ParticipantData) {
        self.participants.insert(data.id, data);
    }

    /// Co-owners of the joint fund, present or not, in id order.
    pub fn fund_owners(&self) -> impl Iterator<Item = &ParticipantData> {
        self.participants
            .values()
            .filter(|p| p.is_multisig_fund_owner)
    }

    /// The lowest present owner id. The leader creates the session's
    /// surjection proofs, carries the value term in its key, signs for
    /// absent owners and assembles the joint range proof.
    pub fn leader(&self) -> Result<ParticipantId, Error> {
        self.fund_owners()
            .find(|p| p.is_present())
            .map(|p| p.id)
            .ok_or(Error::NoFundOwner)
    }

    /// Byte-wise XOR of the fund owners' compressed public nonces.
    pub fn common_nonce(&self) -> Result<[u8; 32], Error> {
        let mut nonce = [0u8; 32];
        let mut owners = 0;
        for owner in self.fund_owners() {
            for (n, b) in nonce.iter_mut().zip(owner.public_nonce.as_bytes()) {
                *n ^= b;
            }
            owners += 1;
        }
        if owners == 0 {
            return Err(Error::NoFundOwner);
        }
        Ok(nonce)
    }

    /// Asset blinding of an output that every session participant can
    /// recompute once all owners' nonces are known.
    pub fn derived_asset_blind(&self, output: DerivedOutput) -> Result<BlindingFactor, Error> {
        let mut hasher = Blake2b512::new();
        hasher.update(ASSET_BLIND_DOMAIN_TAG);
        hasher.update(self.common_nonce()?);
        hasher.update(self.id.as_bytes());
        hasher.update([output.as_byte()]);
        Ok(BlindingFactor::from(Scalar::from_hash(hasher)))
    }

    /// Asset commitment of a derived output.
    pub fn derived_asset_commitment(&self, output: DerivedOutput) -> Result<AssetCommitment, Error> {
        Ok(AssetCommitment::new(
            &self.asset.tag(),
            &self.derived_asset_blind(output)?,
        ))
    }

    /// Value of the joint input of a spend: everything it pays out.
    pub fn joint_input_value(&self) -> Result<u64, Error> {
        self.amount
            .checked_add(self.fee())
            .and_then(|v| v.checked_add(self.multiparty_balance))
            .ok_or(Error::AmountOverflow)
    }

    /// Value of the joint output this session mints; zero if none.
    pub fn joint_output_value(&self) -> u64 {
        match self.kind {
            SlateKind::Fund => self.amount,
            SlateKind::Spend { .. } => self.multiparty_balance,
        }
    }

    /// The joint output, once materialized.
    pub fn joint_output(&self) -> Option<&Output> {
        self.transaction
            .body
            .outputs
            .iter()
            .find(|o| o.features.multiparty)
    }

    pub(crate) fn joint_output_mut(&mut self) -> Option<&mut Output> {
        self.transaction
            .body
            .outputs
            .iter_mut()
            .find(|o| o.features.multiparty)
    }

    /// `Σ B_p` over the owners contributing to the joint output.
    pub fn joint_public_blind(&self) -> Result<RistrettoPoint, Error> {
        let mut sum = RistrettoPoint::default();
        for blind in self.fund_owners().filter_map(|p| p.public_blind.as_ref()) {
            sum += blind.decompress()?;
        }
        Ok(sum)
    }

    /// Add the joint output `v·H'_joint + Σ B_p`. Its proofs are attached
    /// while signing and aggregating.
    fn materialize_joint_output(&mut self) -> Result<(), Error> {
        let value = self.joint_output_value();
        if value == 0 || self.joint_output().is_some() {
            return Ok(());
        }
        if !self.fund_owners().any(|p| p.public_blind.is_some()) {
            return Err(Error::NoFundOwner);
        }
        let asset_commitment = self.derived_asset_commitment(DerivedOutput::Joint)?;
        let gens = PedersenGens::for_asset_commitment(&asset_commitment)?;
        let point = gens.value_base * Scalar::from(value) + self.joint_public_blind()?;
        self.transaction.body.outputs.push(Output {
            features: OutputFeatures { multiparty: true },
            commitment: point.into(),
            asset_commitment,
            range_proof: None,
            surjection_proof: None,
        });
        Ok(())
    }

    /// Fail unless `other` belongs to the same session with the same
    /// parameters and state.
    pub fn check_compatible(&self, other: &Slate) -> Result<(), Error> {
        if self.version != other.version {
            return Err(Error::VersionMismatch(self.version, other.version));
        }
        if self.id != other.id {
            return Err(Error::SessionMismatch);
        }
        if self.asset != other.asset {
            return Err(Error::AssetMismatch);
        }
        if self.fee() != other.fee() {
            return Err(Error::FeeMismatch);
        }
        if self.amount != other.amount {
            return Err(Error::AmountMismatch);
        }
        if self.kind != other.kind
            || self.multiparty_balance != other.multiparty_balance
            || self.transaction.body.kernel.features != other.transaction.body.kernel.features
            || self.threshold.as_ref().map(|t| t.threshold)
                != other.threshold.as_ref().map(|t| t.threshold)
        {
            return Err(Error::ParametersMismatch);
        }
        if self.state != other.state {
            return Err(Error::StateMismatch(self.state, other.state));
        }
        Ok(())
    }

    fn merge(&mut self, other: &Slate) -> Result<(), Error> {
        match self.state {
            SlateState::Initialized => {
                self.transaction.offset = self.transaction.offset + other.transaction.offset;
            }
            _ => {
                if self.transaction.offset != other.transaction.offset {
                    return Err(Error::OffsetMismatch);
                }
            }
        }

        for input in &other.transaction.body.inputs {
            if !self.transaction.body.inputs.contains(input) {
                self.transaction.body.inputs.push(input.clone());
            }
        }

        for output in &other.transaction.body.outputs {
            match self
                .transaction
                .body
                .outputs
                .iter_mut()
                .find(|o| o.commitment == output.commitment)
            {
                Some(mine) => merge_output(mine, output)?,
                None => self.transaction.body.outputs.push(output.clone()),
            }
        }

        for (id, entry) in &other.participants {
            match self.participants.get_mut(id) {
                Some(mine) => mine.merge(entry)?,
                None => {
                    self.participants.insert(*id, entry.clone());
                }
            }
        }

        if let (Some(mine), Some(theirs)) = (self.threshold.as_mut(), other.threshold.as_ref()) {
            for (id, key) in &theirs.holders {
                match mine.holders.get(id) {
                    Some(k) if k != key => return Err(Error::ParticipantMismatch(*id)),
                    Some(_) => {}
                    None => {
                        mine.holders.insert(*id, *key);
                    }
                }
            }
        }

        for dealing in &other.dealings {
            match self.dealings.iter().find(|d| d.dealer == dealing.dealer) {
                Some(d) if d != dealing => return Err(Error::ParticipantMismatch(dealing.dealer)),
                Some(_) => {}
                None => self.dealings.push(dealing.clone()),
            }
        }

        for forwarded in &other.forwarded_shares {
            match self
                .forwarded_shares
                .iter()
                .find(|f| f.dealer == forwarded.dealer && f.holder == forwarded.holder)
            {
                Some(f) if f != forwarded => {
                    return Err(Error::ParticipantMismatch(forwarded.holder))
                }
                Some(_) => {}
                None => self.forwarded_shares.push(forwarded.clone()),
            }
        }
        Ok(())
    }

    /// Canonical order so that every participant's copy serializes alike.
    fn sort(&mut self) {
        self.transaction.body.inputs.sort();
        self.transaction
            .body
            .outputs
            .sort_by(|a, b| a.commitment.cmp(&b.commitment));
        self.dealings.sort_by_key(|d| d.dealer);
        self.forwarded_shares.sort_by_key(|f| (f.dealer, f.holder));
    }

    /// Adopt the receiver's answer to this combined slate. Everything this
    /// slate holds must come back unchanged.
    pub fn absorb_response(&self, response: Slate) -> Result<Slate, Error> {
        self.expect_state(SlateState::Combined)?;
        self.check_compatible(&response)?;
        if self.transaction.body.inputs != response.transaction.body.inputs {
            return Err(Error::ParametersMismatch);
        }
        for (id, entry) in &self.participants {
            if response.participants.get(id) != Some(entry) {
                return Err(Error::ParticipantMismatch(*id));
            }
        }
        for output in &self.transaction.body.outputs {
            if !response.transaction.body.outputs.contains(output) {
                return Err(Error::OutputMismatch(output.commitment.to_hex()));
            }
        }
        if response
            .participants
            .values()
            .any(|p| p.is_multisig_fund_owner && !self.participants.contains_key(&p.id))
        {
            return Err(Error::ParametersMismatch);
        }
        let mut response = response;
        response.sort();
        Ok(response)
    }
}

fn merge_output(mine: &mut Output, theirs: &Output) -> Result<(), Error> {
    let mismatch = || Error::OutputMismatch(theirs.commitment.to_hex());
    if mine.features != theirs.features || mine.asset_commitment != theirs.asset_commitment {
        return Err(mismatch());
    }
    match (&mine.range_proof, &theirs.range_proof) {
        (Some(a), Some(b)) if a != b => return Err(mismatch()),
        (None, Some(b)) => mine.range_proof = Some(b.clone()),
        _ => {}
    }
    match (&mine.surjection_proof, &theirs.surjection_proof) {
        (Some(a), Some(b)) if a != b => return Err(mismatch()),
        (None, Some(b)) => mine.surjection_proof = Some(b.clone()),
        _ => {}
    }
    Ok(())
}

/// Merge every participant's copy of a slate.
///
/// Initialized slates have their offsets summed and become combined; the
/// joint output is added once every owner's blinding share is known. Copies
/// in a later state must carry the same offset and keep their state.
pub fn combine(slates: &[Slate]) -> Result<Slate, Error> {
    let (first, rest) = slates.split_first().ok_or(Error::NoSlates)?;
    if first.state == SlateState::Aggregated {
        return Err(Error::UnexpectedState {
            expected: SlateState::Signed,
            found: first.state,
        });
    }
    let mut out = first.clone();
    for other in rest {
        out.check_compatible(other)?;
        out.merge(other)?;
    }
    if out.state == SlateState::Initialized {
        out.state = SlateState::Combined;
        out.materialize_joint_output()?;
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bth_crypto_commitment::CompressedCommitment;
    use rand_core::SeedableRng;
    use rand_hc::Hc128Rng as RngType;

    fn owner_slate(session: Uuid, id: u32, rng: &mut RngType) -> Slate {
        let mut slate = Slate::new(session, SlateKind::Fund, 100, 3, 0, AssetId::from("bth"));
        slate.transaction.offset = BlindingFactor::random(rng);
        slate.add_participant(ParticipantData {
            id: ParticipantId(id),
            is_multisig_fund_owner: true,
            public_blind: Some(PublicKey::from_secret(&BlindingFactor::random(rng))),
            public_excess: PublicKey::from_secret(&BlindingFactor::random(rng)),
            public_nonce: PublicKey::from_secret(&BlindingFactor::random(rng)),
            ..Default::default()
        });
        slate
    }

    #[test]
    fn combine_sums_offsets_and_mints_the_joint_output() {
        let mut rng = RngType::from_seed([1u8; 32]);
        let session = Uuid::from_bytes([9u8; 16]);
        let slates: Vec<Slate> = (1..=3).map(|i| owner_slate(session, i, &mut rng)).collect();

        let combined = combine(&slates).unwrap();
        assert_eq!(combined.state, SlateState::Combined);
        assert_eq!(combined.participants.len(), 3);
        let offsets: BlindingFactor = slates.iter().map(|s| s.transaction.offset).sum();
        assert_eq!(combined.transaction.offset, offsets);

        let joint = combined.joint_output().unwrap();
        let blind = combined.derived_asset_blind(DerivedOutput::Joint).unwrap();
        let gens = PedersenGens::for_asset_commitment(&joint.asset_commitment).unwrap();
        let expected = gens.value_base * Scalar::from(100u64) + combined.joint_public_blind().unwrap();
        assert_eq!(joint.commitment, CompressedCommitment::from(expected));
        assert_eq!(
            joint.asset_commitment,
            AssetCommitment::new(&AssetId::from("bth").tag(), &blind)
        );
    }

    #[test]
    fn combine_is_order_independent() {
        let mut rng = RngType::from_seed([2u8; 32]);
        let session = Uuid::from_bytes([3u8; 16]);
        let slates: Vec<Slate> = (1..=3).map(|i| owner_slate(session, i, &mut rng)).collect();
        let reversed: Vec<Slate> = slates.iter().rev().cloned().collect();
        assert_eq!(combine(&slates).unwrap(), combine(&reversed).unwrap());
    }

    #[test]
    fn combine_rejects_disagreeing_slates() {
        let mut rng = RngType::from_seed([3u8; 32]);
        let session = Uuid::from_bytes([4u8; 16]);
        let a = owner_slate(session, 1, &mut rng);

        let mut b = owner_slate(session, 2, &mut rng);
        b.transaction.body.kernel.fee = 4;
        assert_matches!(combine(&[a.clone(), b]), Err(Error::FeeMismatch));

        let b = owner_slate(Uuid::from_bytes([5u8; 16]), 2, &mut rng);
        assert_matches!(combine(&[a.clone(), b]), Err(Error::SessionMismatch));

        let mut b = owner_slate(session, 2, &mut rng);
        b.asset = AssetId::from("gold");
        assert_matches!(combine(&[a.clone(), b]), Err(Error::AssetMismatch));

        let mut b = owner_slate(session, 2, &mut rng);
        b.version = 2;
        assert_matches!(combine(&[a.clone(), b]), Err(Error::VersionMismatch(1, 2)));

        let mut b = owner_slate(session, 2, &mut rng);
        b.state = SlateState::Signed;
        assert_matches!(
            combine(&[a.clone(), b]),
            Err(Error::StateMismatch(SlateState::Initialized, SlateState::Signed))
        );

        assert_matches!(combine(&[]), Err(Error::NoSlates));
    }

    #[test]
    fn conflicting_entries_are_attributed() {
        let mut rng = RngType::from_seed([4u8; 32]);
        let session = Uuid::from_bytes([6u8; 16]);
        let a = owner_slate(session, 1, &mut rng);
        let b = owner_slate(session, 1, &mut rng);
        assert_matches!(
            combine(&[a, b]),
            Err(Error::ParticipantMismatch(ParticipantId(1)))
        );
    }

    #[test]
    fn signed_slates_need_equal_offsets() {
        let mut rng = RngType::from_seed([5u8; 32]);
        let session = Uuid::from_bytes([7u8; 16]);
        let slates: Vec<Slate> = (1..=2).map(|i| owner_slate(session, i, &mut rng)).collect();
        let mut a = combine(&slates).unwrap();
        a.state = SlateState::Signed;
        let mut b = a.clone();
        assert_eq!(combine(&[a.clone(), b.clone()]).unwrap().state, SlateState::Signed);

        b.transaction.offset = BlindingFactor::random(&mut rng);
        assert_matches!(combine(&[a, b]), Err(Error::OffsetMismatch));
    }

    #[test]
    fn common_nonce_ignores_receivers() {
        let mut rng = RngType::from_seed([6u8; 32]);
        let session = Uuid::from_bytes([8u8; 16]);
        let mut slate = combine(&[
            owner_slate(session, 1, &mut rng),
            owner_slate(session, 2, &mut rng),
        ])
        .unwrap();
        let nonce = slate.common_nonce().unwrap();
        slate.add_participant(ParticipantData {
            id: ParticipantId(9),
            public_excess: PublicKey::from_secret(&BlindingFactor::random(&mut rng)),
            public_nonce: PublicKey::from_secret(&BlindingFactor::random(&mut rng)),
            ..Default::default()
        });
        assert_eq!(slate.common_nonce().unwrap(), nonce);
        assert_eq!(slate.leader().unwrap(), ParticipantId(1));
    }

    #[test]
    fn slate_json_uses_decimal_strings() {
        let mut rng = RngType::from_seed([7u8; 32]);
        let slate = owner_slate(Uuid::from_bytes([1u8; 16]), 1, &mut rng);
        let json = serde_json::to_value(&slate).unwrap();
        assert_eq!(json["amount"], "100");
        assert_eq!(json["transaction"]["body"]["kernel"]["fee"], "3");
        assert_eq!(json["kind"]["type"], "fund");
        assert_eq!(json["state"], "initialized");
        let back: Slate = serde_json::from_value(json).unwrap();
        assert_eq!(back, slate);
    }
}
