// Copyright (c) 2024 Botho Foundation

//! Slate side of the three-round joint range proof of the joint output.
//!
//! Public taus travel with the initial slates, `taux` shares with the signed
//! ones, and the proof is assembled by [`Slate::finalize`]. Each party's tau
//! secrets are derived from its signing nonce and the session id, so nothing
//! beyond the [`crate::SavedSlate`] has to be kept between rounds.

use crate::{Error, ParticipantData, ParticipantId, Slate, SlateState};
use bth_crypto_commitment::{BlindingFactor, CompressedCommitment, PedersenGens};
use bth_crypto_range_proof::{
    mpc::{aggregate_proof, compute_taux, generate_public_taus, verify_taux, PublicTaus, TauSecrets},
    RangeProof,
};
use uuid::Uuid;

/// Round one: the public taus of a party signing with `nonce` in `session`.
pub fn public_taus(nonce: &BlindingFactor, session: &Uuid) -> PublicTaus {
    generate_public_taus(&TauSecrets::derive(nonce, session.as_bytes()))
}

struct JointProofContext {
    value: u64,
    commitment: CompressedCommitment,
    gens: PedersenGens,
    common_nonce: [u8; 32],
    total_taus: PublicTaus,
}

impl Slate {
    /// Owners contributing a blinding share to the joint output.
    fn bulletproof_parties(&self) -> impl Iterator<Item = &ParticipantData> {
        self.fund_owners().filter(|p| p.public_blind.is_some())
    }

    /// Sum of every party's public taus.
    pub fn total_public_taus(&self) -> Result<PublicTaus, Error> {
        let parts = self
            .bulletproof_parties()
            .map(|p| p.public_taus.ok_or(Error::MissingBulletproofShare(p.id)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PublicTaus::sum(&parts)?)
    }

    fn joint_proof_context(&self) -> Result<JointProofContext, Error> {
        let output = self.joint_output().ok_or(Error::NoJointOutput)?;
        Ok(JointProofContext {
            value: self.joint_output_value(),
            commitment: output.commitment,
            gens: PedersenGens::for_asset_commitment(&output.asset_commitment)?,
            common_nonce: self.common_nonce()?,
            total_taus: self.total_public_taus()?,
        })
    }

    /// Round two: record `id`'s `taux` share for its blinding share `blind`.
    pub fn add_taux(
        &mut self,
        id: ParticipantId,
        blind: &BlindingFactor,
        nonce: &BlindingFactor,
    ) -> Result<(), Error> {
        self.expect_state(SlateState::Combined)?;
        let ctx = self.joint_proof_context()?;
        let secrets = TauSecrets::derive(nonce, self.id.as_bytes());
        let taux = compute_taux(
            ctx.value,
            &ctx.commitment,
            &ctx.gens,
            &ctx.common_nonce,
            &secrets,
            &ctx.total_taus,
            blind,
        )?;
        self.participant_mut(id)?.taux = Some(taux);
        Ok(())
    }

    /// Round three: check every party's share, then assemble the proof.
    pub fn joint_range_proof(&self) -> Result<RangeProof, Error> {
        let ctx = self.joint_proof_context()?;
        let mut shares = Vec::new();
        for party in self.bulletproof_parties() {
            let (Some(taux), Some(taus), Some(blind)) =
                (party.taux, party.public_taus, party.public_blind)
            else {
                return Err(Error::MissingBulletproofShare(party.id));
            };
            verify_taux(
                ctx.value,
                &ctx.commitment,
                &ctx.gens,
                &ctx.common_nonce,
                &ctx.total_taus,
                &taus,
                &blind,
                &taux,
            )
            .map_err(|_| Error::InvalidBulletproofShare(party.id))?;
            shares.push(taux);
        }
        Ok(aggregate_proof(
            ctx.value,
            &ctx.commitment,
            &ctx.gens,
            &ctx.common_nonce,
            &ctx.total_taus,
            &shares,
        )?)
    }
}
