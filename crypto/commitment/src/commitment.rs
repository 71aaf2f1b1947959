// Copyright (c) 2024 Botho Foundation

//! Value commitments and their sums.

use crate::{
    encoding::point_from_slice, AssetCommitment, BlindingFactor, Error, PedersenGens,
};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::Identity};

/// Declares a wire type wrapping a compressed Ristretto point, hex-encoded
/// in serde and ordered by its bytes.
macro_rules! compressed_point {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Default, Eq, PartialEq)]
        pub struct $name(pub ::curve25519_dalek::ristretto::CompressedRistretto);

        impl $name {
            /// Decode from 32 bytes without checking that the point decompresses.
            pub fn from_bytes(bytes: &[u8]) -> Result<Self, $crate::Error> {
                let arr = $crate::encoding::array_from_slice(bytes)?;
                Ok(Self(::curve25519_dalek::ristretto::CompressedRistretto(arr)))
            }

            /// The compressed encoding.
            pub fn to_bytes(&self) -> [u8; 32] {
                self.0.to_bytes()
            }

            /// The compressed encoding as a slice.
            pub fn as_bytes(&self) -> &[u8; 32] {
                self.0.as_bytes()
            }

            /// Decompress to a curve point.
            pub fn decompress(
                &self,
            ) -> Result<::curve25519_dalek::ristretto::RistrettoPoint, $crate::Error> {
                self.0.decompress().ok_or($crate::Error::InvalidCurvePoint)
            }

            /// Lower-case hex of the compressed encoding.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0.as_bytes())
            }

            /// Parse lower- or upper-case hex.
            pub fn from_hex(s: &str) -> Result<Self, $crate::Error> {
                Self::from_bytes(&hex::decode(s)?)
            }
        }

        impl From<&::curve25519_dalek::ristretto::RistrettoPoint> for $name {
            fn from(src: &::curve25519_dalek::ristretto::RistrettoPoint) -> Self {
                Self(src.compress())
            }
        }

        impl From<::curve25519_dalek::ristretto::RistrettoPoint> for $name {
            fn from(src: ::curve25519_dalek::ristretto::RistrettoPoint) -> Self {
                Self(src.compress())
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> ::core::cmp::Ordering {
                self.0.as_bytes().cmp(other.0.as_bytes())
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<::core::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl ::core::hash::Hash for $name {
            fn hash<H: ::core::hash::Hasher>(&self, state: &mut H) {
                ::core::hash::Hash::hash(self.0.as_bytes(), state)
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(<D::Error as ::serde::de::Error>::custom)
            }
        }
    };
}

pub(crate) use compressed_point;

compressed_point!(
    /// A compressed commitment as it appears on the wire and in the ledger.
    CompressedCommitment
);

compressed_point!(
    /// A compressed public key `x·G`.
    PublicKey
);

impl PublicKey {
    /// The public key of a secret scalar.
    pub fn from_secret(secret: &BlindingFactor) -> Self {
        Self::from(secret.to_public_point())
    }
}

/// A decompressed commitment `value·H + blind·G`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Commitment {
    /// The commitment point.
    pub point: RistrettoPoint,
}

impl Default for Commitment {
    fn default() -> Self {
        Self {
            point: RistrettoPoint::identity(),
        }
    }
}

impl Commitment {
    /// Commit to a value under the given generators.
    pub fn new(value: u64, blinding: &BlindingFactor, gens: &PedersenGens) -> Self {
        Self {
            point: gens.commit(Scalar::from(value), *blinding.as_scalar()),
        }
    }

    /// Decode and decompress.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            point: point_from_slice(bytes)?,
        })
    }

    /// Compress for the wire.
    pub fn compress(&self) -> CompressedCommitment {
        CompressedCommitment::from(&self.point)
    }

    /// Reinterpret a commitment to zero as a public key. The caller is
    /// responsible for the value component actually being zero.
    pub fn to_public_key(&self) -> PublicKey {
        PublicKey::from(&self.point)
    }
}

impl TryFrom<&CompressedCommitment> for Commitment {
    type Error = Error;

    fn try_from(src: &CompressedCommitment) -> Result<Self, Error> {
        Ok(Self {
            point: src.decompress()?,
        })
    }
}

/// `value·H'_a + blind·G` for an output whose asset generator is
/// `asset_commitment`.
pub fn commit(
    value: u64,
    blinding: &BlindingFactor,
    asset_commitment: &AssetCommitment,
) -> Result<Commitment, Error> {
    let gens = PedersenGens::for_asset_commitment(asset_commitment)?;
    Ok(Commitment::new(value, blinding, &gens))
}

/// `Σ positives − Σ negatives`.
pub fn commit_sum(positives: &[Commitment], negatives: &[Commitment]) -> Commitment {
    let pos: RistrettoPoint = positives.iter().map(|c| c.point).sum();
    let neg: RistrettoPoint = negatives.iter().map(|c| c.point).sum();
    Commitment { point: pos - neg }
}

/// [`commit_sum`] over wire encodings; fails on the first point that does
/// not decompress.
pub fn commit_sum_compressed(
    positives: &[CompressedCommitment],
    negatives: &[CompressedCommitment],
) -> Result<Commitment, Error> {
    let pos = positives
        .iter()
        .map(Commitment::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let neg = negatives
        .iter()
        .map(Commitment::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(commit_sum(&pos, &neg))
}

/// `Σ positives − Σ negatives` modulo the group order.
pub fn blind_sum(positives: &[BlindingFactor], negatives: &[BlindingFactor]) -> BlindingFactor {
    positives.iter().sum::<BlindingFactor>() - negatives.iter().sum::<BlindingFactor>()
}

/// The effective `G`-coefficient of an output: `blind + value·assetBlind`.
pub fn blind_value_asset_blind(
    value: u64,
    blinding: &BlindingFactor,
    asset_blinding: &BlindingFactor,
) -> BlindingFactor {
    *blinding + BlindingFactor::from(value) * *asset_blinding
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetId, B_BLINDING};
    use proptest::prelude::*;
    use rand_core::SeedableRng;
    use rand_hc::Hc128Rng as RngType;

    proptest! {
        #[test]
        fn commitment_expands_to_effective_blind(
            value in any::<u64>(),
            seed in any::<[u8; 32]>(),
        ) {
            let mut rng = RngType::from_seed(seed);
            let blind = BlindingFactor::random(&mut rng);
            let asset_blind = BlindingFactor::random(&mut rng);
            let tag = AssetId::from("gold").tag();

            let asset_commitment = AssetCommitment::new(&tag, &asset_blind);
            let c = commit(value, &blind, &asset_commitment).unwrap();

            let effective = blind_value_asset_blind(value, &blind, &asset_blind);
            let expected = Scalar::from(value) * tag.generator()
                + effective.as_scalar() * B_BLINDING;
            prop_assert_eq!(c.point, expected);
        }

        #[test]
        fn sums_are_homomorphic(
            values in proptest::collection::vec(0u64..1_000_000, 1..6),
            seed in any::<[u8; 32]>(),
        ) {
            let mut rng = RngType::from_seed(seed);
            let gens = AssetId::from("silver").tag().unblinded_gens();
            let blinds: Vec<BlindingFactor> =
                values.iter().map(|_| BlindingFactor::random(&mut rng)).collect();
            let commitments: Vec<Commitment> = values
                .iter()
                .zip(&blinds)
                .map(|(v, b)| Commitment::new(*v, b, &gens))
                .collect();

            let total: u64 = values.iter().sum();
            let total_blind = blind_sum(&blinds, &[]);
            prop_assert_eq!(
                commit_sum(&commitments, &[]),
                Commitment::new(total, &total_blind, &gens)
            );
        }
    }

    #[test]
    fn difference_of_equal_values_is_public_key() {
        let mut rng = RngType::from_seed([3u8; 32]);
        let gens = AssetId::from("gold").tag().unblinded_gens();
        let a = BlindingFactor::random(&mut rng);
        let b = BlindingFactor::random(&mut rng);
        let diff = commit_sum(
            &[Commitment::new(50, &a, &gens)],
            &[Commitment::new(50, &b, &gens)],
        );
        assert_eq!(
            diff.to_public_key(),
            PublicKey::from_secret(&blind_sum(&[a], &[b]))
        );
    }

    #[test]
    fn malformed_encodings_are_reported() {
        let bad = CompressedCommitment::from_bytes(&[0xffu8; 32]).unwrap();
        assert_eq!(
            commit_sum_compressed(&[bad], &[]).unwrap_err(),
            Error::InvalidCurvePoint
        );
        assert_eq!(
            CompressedCommitment::from_hex("zz").unwrap_err(),
            Error::InvalidHex
        );
        assert_eq!(
            PublicKey::from_bytes(&[0u8; 5]).unwrap_err(),
            Error::LengthMismatch(5, 32)
        );
    }

    #[test]
    fn serde_round_trips_as_hex() {
        let pk = PublicKey::from_secret(&BlindingFactor::from(9u64));
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"{}\"", pk.to_hex()));
        assert_eq!(serde_json::from_str::<PublicKey>(&json).unwrap(), pk);
    }
}
