// Copyright (c) 2024 Botho Foundation

//! Asset identifiers, tags and (blinded) asset generators.

use crate::{
    commitment::compressed_point, encoding::array_from_slice, hash_to_point, BlindingFactor, Error,
    ASSET_GENERATOR_DOMAIN_TAG, ASSET_TAG_DOMAIN_TAG,
};
use blake2::{Blake2b512, Digest};
use core::fmt;
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT, ristretto::RistrettoPoint, scalar::Scalar,
    traits::MultiscalarMul,
};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

/// Human-readable asset identifier, e.g. `"bth"`.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// The tag committed to on chain.
    pub fn tag(&self) -> AssetTag {
        let mut hasher = Blake2b512::new();
        hasher.update(ASSET_TAG_DOMAIN_TAG);
        hasher.update(self.0.as_bytes());
        let digest = hasher.finalize();
        let mut tag = [0u8; 32];
        tag.copy_from_slice(&digest[..32]);
        AssetTag(tag)
    }
}

impl From<&str> for AssetId {
    fn from(src: &str) -> Self {
        Self(src.to_owned())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 32-byte asset tag, the hash of an [`AssetId`].
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AssetTag(pub [u8; 32]);

impl AssetTag {
    /// Decode from 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        array_from_slice(bytes).map(Self)
    }

    /// The unblinded value generator `H_a`.
    pub fn generator(&self) -> RistrettoPoint {
        hash_to_point(ASSET_GENERATOR_DOMAIN_TAG, &self.0)
    }

    /// Generators `(H_a, G)`, used for fees and issuance.
    pub fn unblinded_gens(&self) -> PedersenGens {
        PedersenGens {
            value_base: self.generator(),
            blinding_base: RISTRETTO_BASEPOINT_POINT,
        }
    }
}

impl fmt::Debug for AssetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetTag({})", hex::encode(self.0))
    }
}

impl Serialize for AssetTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for AssetTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(D::Error::custom)?;
        Self::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

compressed_point!(
    /// A blinded asset generator `H'_a = H_a + assetBlind·G`.
    AssetCommitment
);

impl AssetCommitment {
    /// Blind the generator of `tag`.
    pub fn new(tag: &AssetTag, asset_blinding: &BlindingFactor) -> Self {
        Self::from(tag.generator() + asset_blinding.to_public_point())
    }
}

/// A pair of generators: values are committed against `value_base`, blinds
/// against `blinding_base`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PedersenGens {
    /// Value generator, `H_a` or a blinded `H'_a`.
    pub value_base: RistrettoPoint,
    /// Blinding generator `G`.
    pub blinding_base: RistrettoPoint,
}

impl PedersenGens {
    /// Generators for an output whose value is committed against its asset
    /// commitment.
    pub fn for_asset_commitment(asset_commitment: &AssetCommitment) -> Result<Self, Error> {
        Ok(Self {
            value_base: asset_commitment.decompress()?,
            blinding_base: RISTRETTO_BASEPOINT_POINT,
        })
    }

    /// `value·value_base + blinding·blinding_base`.
    pub fn commit(&self, value: Scalar, blinding: Scalar) -> RistrettoPoint {
        RistrettoPoint::multiscalar_mul([value, blinding], [self.value_base, self.blinding_base])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_distinct_per_asset() {
        let a = AssetId::from("bth").tag();
        let b = AssetId::from("gold").tag();
        assert_ne!(a, b);
        assert_ne!(a.generator(), b.generator());
        assert_eq!(a, AssetId::from("bth").tag());
    }

    #[test]
    fn zero_asset_blind_leaves_generator_unblinded() {
        let tag = AssetId::from("bth").tag();
        let commitment = AssetCommitment::new(&tag, &BlindingFactor::ZERO);
        assert_eq!(commitment.decompress().unwrap(), tag.generator());
    }

    #[test]
    fn tag_serde_is_hex() {
        let tag = AssetId::from("bth").tag();
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json.len(), 66);
        assert_eq!(serde_json::from_str::<AssetTag>(&json).unwrap(), tag);
    }
}
