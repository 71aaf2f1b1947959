// Copyright (c) 2024 Botho Foundation

//! Joint Schnorr signing of the kernel, and assembly of the final
//! transaction.
//!
//! Every participant signs with its own excess key against the aggregated
//! key `X = Σ X_p + T` and nonce `R = Σ R_p`, where `T` is the public value
//! term carried by the leader: the joint outputs' values enter their
//! commitments through session-derived asset blindings, which no single
//! participant's excess covers.

use crate::{slate::DerivedOutput, Error, ParticipantId, Slate, SlateKind, SlateState};
use bth_crypto_commitment::{AssetCommitment, BlindingFactor, PublicKey, RistrettoPoint, Scalar};
use bth_crypto_multisig::{aggregate, sign_partial, verify_partial, PartialSignature, Signature};
use bth_crypto_surjection::{SurjectionInput, SurjectionProof};
use bth_transaction_core::{validation::validate, Transaction};
use rand_core::CryptoRngCore;

impl Slate {
    /// The message every participant signs.
    pub fn kernel_message(&self) -> [u8; 32] {
        self.transaction.body.kernel.message()
    }

    /// `T = v_in·(H'_in − H) − v_joint·(H'_joint − H)` over the joint input
    /// and the joint output this session mints.
    pub fn value_term(&self) -> Result<RistrettoPoint, Error> {
        let h = self.asset.tag().generator();
        let mut term = RistrettoPoint::default();
        if let SlateKind::Spend { joint_input } = &self.kind {
            let blinded = joint_input.asset_commitment.decompress()? - h;
            term += blinded * Scalar::from(self.joint_input_value()?);
        }
        if let Some(output) = self.joint_output() {
            let blinded = output.asset_commitment.decompress()? - h;
            term -= blinded * Scalar::from(self.joint_output_value());
        }
        Ok(term)
    }

    /// The scalar behind [`Slate::value_term`]. Only owners know the joint
    /// input's asset blinding.
    pub fn value_term_secret(
        &self,
        joint_input_asset_blind: &BlindingFactor,
    ) -> Result<BlindingFactor, Error> {
        let mut term = BlindingFactor::ZERO;
        if let SlateKind::Spend { .. } = self.kind {
            term = term + BlindingFactor::from(self.joint_input_value()?) * *joint_input_asset_blind;
        }
        if self.joint_output().is_some() {
            term = term
                - BlindingFactor::from(self.joint_output_value())
                    * self.derived_asset_blind(DerivedOutput::Joint)?;
        }
        Ok(term)
    }

    /// The key a participant's partial signature verifies against: its
    /// public excess, plus the value term for the leader.
    pub fn effective_public_key(&self, id: ParticipantId) -> Result<PublicKey, Error> {
        let mut key = self.participant(id)?.public_excess.decompress()?;
        if id == self.leader()? {
            key += self.value_term()?;
        }
        Ok(key.into())
    }

    /// `(X, R)`: the sum of every effective public key and every public
    /// nonce.
    pub fn aggregated_public_key_and_nonce(&self) -> Result<(PublicKey, PublicKey), Error> {
        let mut key = RistrettoPoint::default();
        let mut nonce = RistrettoPoint::default();
        for id in self.participants.keys() {
            key += self.effective_public_key(*id)?.decompress()?;
            nonce += self.participant(*id)?.public_nonce.decompress()?;
        }
        Ok((key.into(), nonce.into()))
    }

    /// Sign the kernel as `id` and record the partial signature.
    /// `secret_key` must already include the value term when `id` leads.
    pub fn create_partial_signature(
        &mut self,
        id: ParticipantId,
        secret_key: &BlindingFactor,
        secret_nonce: &BlindingFactor,
    ) -> Result<(), Error> {
        self.expect_state(SlateState::Combined)?;
        let (key, nonce) = self.aggregated_public_key_and_nonce()?;
        let msg = self.kernel_message();
        let partial = sign_partial(secret_key, secret_nonce, &nonce, &key, &msg);
        self.verify_partial_signature(id, &partial, &key, &nonce)?;
        self.participant_mut(id)?.partial_signature = Some(partial);
        Ok(())
    }

    fn verify_partial_signature(
        &self,
        id: ParticipantId,
        partial: &PartialSignature,
        key: &PublicKey,
        nonce: &PublicKey,
    ) -> Result<(), Error> {
        let entry = self.participant(id)?;
        verify_partial(
            partial,
            &entry.public_nonce,
            &self.effective_public_key(id)?,
            nonce,
            key,
            &self.kernel_message(),
        )
        .map_err(|_| Error::InvalidPartialSignature(id))
    }

    /// Verify every participant's partial signature, sum them and verify the
    /// result. Returns the aggregated key with its signature.
    pub fn aggregate_partial_signatures(&self) -> Result<(PublicKey, Signature), Error> {
        let (key, nonce) = self.aggregated_public_key_and_nonce()?;
        let mut partials = Vec::with_capacity(self.participants.len());
        for entry in self.participants.values() {
            let partial = entry
                .partial_signature
                .ok_or(Error::MissingPartialSignature(entry.id))?;
            self.verify_partial_signature(entry.id, &partial, &key, &nonce)?;
            partials.push(partial);
        }
        let signature = aggregate(&partials, &nonce)?;
        signature
            .verify(&key, &self.kernel_message())
            .map_err(|_| Error::InvalidSignature)?;
        Ok((key, signature))
    }

    /// Prove the asset of every session-derived output that lacks a
    /// surjection proof. `asset_blind` opens one of the inputs.
    pub fn add_derived_surjection_proofs(
        &mut self,
        asset_blind: &BlindingFactor,
        rng: &mut impl CryptoRngCore,
    ) -> Result<(), Error> {
        let tag = self.asset.tag();
        let known = AssetCommitment::new(&tag, asset_blind);
        let inputs: Vec<SurjectionInput> = self
            .transaction
            .body
            .inputs
            .iter()
            .map(|input| {
                if input.asset_commitment == known {
                    SurjectionInput::known(tag, *asset_blind)
                } else {
                    SurjectionInput::unknown(input.asset_commitment)
                }
            })
            .collect();

        let derived = [
            self.derived_asset_blind(DerivedOutput::Joint)?,
            self.derived_asset_blind(DerivedOutput::Receiver)?,
        ];
        for output in self.transaction.body.outputs.iter_mut() {
            if output.surjection_proof.is_some() {
                continue;
            }
            let Some(blind) = derived
                .iter()
                .find(|b| AssetCommitment::new(&tag, b) == output.asset_commitment)
            else {
                continue;
            };
            output.surjection_proof = Some(SurjectionProof::create(&inputs, &tag, blind, rng)?);
        }
        Ok(())
    }

    /// Close this participant's signing round.
    pub fn finish_signing(&mut self) -> Result<(), Error> {
        self.expect_state(SlateState::Combined)?;
        self.state = SlateState::Signed;
        Ok(())
    }

    /// Aggregate the signatures and the joint range proof, check the whole
    /// transaction and return it.
    pub fn finalize(&mut self) -> Result<Transaction, Error> {
        self.expect_state(SlateState::Signed)?;
        let (excess, signature) = self.aggregate_partial_signatures()?;

        if self.joint_output().is_some() {
            let proof = self.joint_range_proof()?;
            if let Some(output) = self.joint_output_mut() {
                output.range_proof = Some(proof);
            }
        }

        let mut tx = self.transaction.clone();
        tx.body.kernel.excess = excess;
        tx.body.kernel.excess_signature = Some(signature);
        validate(&tx)?;

        self.transaction = tx.clone();
        self.state = SlateState::Aggregated;
        Ok(tx)
    }
}
