// Copyright (c) 2024 Botho Foundation

use crate::Error;
use bth_crypto_commitment::{encoding::option_scalar_hex, PublicKey, Scalar};
use bth_crypto_multisig::PartialSignature;
use bth_crypto_range_proof::mpc::PublicTaus;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Identifies a participant. Owners of a joint fund keep their ids across
/// the sessions that fund and spend it.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ParticipantId {
    fn from(src: u32) -> Self {
        Self(src)
    }
}

/// A participant's public record within a slate.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParticipantData {
    /// Who this entry belongs to.
    pub id: ParticipantId,
    /// Co-owner of the joint fund, as opposed to a receiver.
    #[serde(default)]
    pub is_multisig_fund_owner: bool,
    /// Set when the entry belongs to an absent shareholder and is signed by
    /// the given participant on its behalf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ParticipantId>,
    /// `b_p·G`, this participant's share of the joint output's blinding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_blind: Option<PublicKey>,
    /// `x_p·G`
    pub public_excess: PublicKey,
    /// `r_p·G`
    pub public_nonce: PublicKey,
    /// `s_p`, once signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_signature: Option<PartialSignature>,
    /// Joint range proof, round one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_taus: Option<PublicTaus>,
    /// Joint range proof, round two.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "option_scalar_hex"
    )]
    pub taux: Option<Scalar>,
}

impl ParticipantData {
    /// Whether this participant drives its own entry.
    pub fn is_present(&self) -> bool {
        self.proxy.is_none()
    }

    /// Merge another copy of the same participant's entry. Fields set in both
    /// must agree; fields set in only one are kept.
    pub(crate) fn merge(&mut self, other: &ParticipantData) -> Result<(), Error> {
        let id = self.id;
        if other.id != id
            || other.is_multisig_fund_owner != self.is_multisig_fund_owner
            || other.proxy != self.proxy
            || other.public_excess != self.public_excess
            || other.public_nonce != self.public_nonce
        {
            return Err(Error::ParticipantMismatch(id));
        }
        merge_field(id, &mut self.public_blind, &other.public_blind)?;
        merge_field(id, &mut self.partial_signature, &other.partial_signature)?;
        merge_field(id, &mut self.public_taus, &other.public_taus)?;
        merge_field(id, &mut self.taux, &other.taux)?;
        Ok(())
    }
}

fn merge_field<T: Copy + PartialEq>(
    id: ParticipantId,
    mine: &mut Option<T>,
    theirs: &Option<T>,
) -> Result<(), Error> {
    match (mine.as_ref(), theirs) {
        (Some(a), Some(b)) if a != b => Err(Error::ParticipantMismatch(id)),
        (None, Some(b)) => {
            *mine = Some(*b);
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bth_crypto_commitment::BlindingFactor;

    fn entry(id: u32) -> ParticipantData {
        ParticipantData {
            id: ParticipantId(id),
            is_multisig_fund_owner: true,
            public_excess: PublicKey::from_secret(&BlindingFactor::from(id as u64 + 1)),
            public_nonce: PublicKey::from_secret(&BlindingFactor::from(id as u64 + 100)),
            ..Default::default()
        }
    }

    #[test]
    fn merge_fills_missing_fields() {
        let mut a = entry(1);
        let mut b = entry(1);
        b.partial_signature = Some(PartialSignature(Scalar::from(5u64)));
        a.merge(&b).unwrap();
        assert_eq!(a.partial_signature, b.partial_signature);

        // Merging the older copy back does not erase anything.
        let older = entry(1);
        a.merge(&older).unwrap();
        assert!(a.partial_signature.is_some());
    }

    #[test]
    fn conflicting_fields_name_the_participant() {
        let mut a = entry(2);
        a.taux = Some(Scalar::from(1u64));
        let mut b = entry(2);
        b.taux = Some(Scalar::from(2u64));
        assert_matches!(a.merge(&b), Err(Error::ParticipantMismatch(ParticipantId(2))));

        let mut c = entry(2);
        c.public_nonce = entry(3).public_nonce;
        assert_matches!(
            entry(2).merge(&c),
            Err(Error::ParticipantMismatch(ParticipantId(2)))
        );
    }

    #[test]
    fn ids_are_map_keys_on_the_wire() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(ParticipantId(7), entry(7));
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.starts_with("{\"7\":"));
        let back: std::collections::BTreeMap<ParticipantId, ParticipantData> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
