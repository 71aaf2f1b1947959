// Copyright (c) 2024 Botho Foundation

//! Secret scalars: blinding factors, excesses and offsets.

use crate::{encoding::scalar_from_slice, Error};
use core::{
    fmt,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub},
};
use curve25519_dalek::{constants::RISTRETTO_BASEPOINT_POINT, scalar::Scalar};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

/// A secret scalar used as a commitment blind, a kernel excess share or a
/// transaction offset.
///
/// The zero value is valid and is what callers use as the neutral element of
/// blind sums.
#[derive(Clone, Copy, Default, Zeroize)]
pub struct BlindingFactor(Scalar);

impl BlindingFactor {
    /// The zero blind.
    pub const ZERO: Self = Self(Scalar::ZERO);

    /// Wrap a scalar.
    pub fn new(scalar: Scalar) -> Self {
        Self(scalar)
    }

    /// A uniformly random blind.
    pub fn random(rng: &mut impl CryptoRngCore) -> Self {
        Self(Scalar::random(rng))
    }

    /// Reduce 64 uniformly random bytes into a blind.
    pub fn from_bytes_mod_order_wide(bytes: &[u8; 64]) -> Self {
        Self(Scalar::from_bytes_mod_order_wide(bytes))
    }

    /// Decode a canonical 32-byte blind.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        scalar_from_slice(bytes).map(Self)
    }

    /// Encode as 32 little-endian bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// The underlying scalar.
    pub fn as_scalar(&self) -> &Scalar {
        &self.0
    }

    /// Whether this is the zero blind.
    pub fn is_zero(&self) -> bool {
        self.ct_eq(&Self::ZERO).into()
    }

    /// The public point `self·G`.
    pub fn to_public_point(&self) -> curve25519_dalek::ristretto::RistrettoPoint {
        self.0 * RISTRETTO_BASEPOINT_POINT
    }
}

impl From<Scalar> for BlindingFactor {
    fn from(src: Scalar) -> Self {
        Self(src)
    }
}

impl From<BlindingFactor> for Scalar {
    fn from(src: BlindingFactor) -> Self {
        src.0
    }
}

impl From<u64> for BlindingFactor {
    fn from(src: u64) -> Self {
        Self(Scalar::from(src))
    }
}

impl ConstantTimeEq for BlindingFactor {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

impl PartialEq for BlindingFactor {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for BlindingFactor {}

// Secrets never land in logs.
impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlindingFactor(<redacted>)")
    }
}

impl Add for BlindingFactor {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for BlindingFactor {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for BlindingFactor {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Mul for BlindingFactor {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self(self.0 * rhs.0)
    }
}

impl Sum for BlindingFactor {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, b| acc + b)
    }
}

impl<'a> Sum<&'a BlindingFactor> for BlindingFactor {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, b| acc + *b)
    }
}

impl Serialize for BlindingFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        crate::encoding::scalar_hex::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for BlindingFactor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        crate::encoding::scalar_hex::deserialize(deserializer).map(Self)
    }
}
