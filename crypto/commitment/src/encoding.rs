// Copyright (c) 2024 Botho Foundation

//! Byte and hex encodings shared by every wire type in the workspace.
//!
//! Scalars and points travel as lowercase hex strings. Decoding always
//! rejects non-canonical scalars and non-decompressible points.

use crate::Error;
use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};

/// Decode a canonical little-endian scalar.
pub fn scalar_from_slice(bytes: &[u8]) -> Result<Scalar, Error> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::LengthMismatch(bytes.len(), 32))?;
    Option::from(Scalar::from_canonical_bytes(arr)).ok_or(Error::InvalidScalar)
}

/// Decode and decompress a Ristretto point.
pub fn point_from_slice(bytes: &[u8]) -> Result<RistrettoPoint, Error> {
    CompressedRistretto::from_slice(bytes)
        .map_err(|_| Error::LengthMismatch(bytes.len(), 32))?
        .decompress()
        .ok_or(Error::InvalidCurvePoint)
}

/// Decode a 32-byte array.
pub fn array_from_slice(bytes: &[u8]) -> Result<[u8; 32], Error> {
    bytes
        .try_into()
        .map_err(|_| Error::LengthMismatch(bytes.len(), 32))
}

/// Serde adapter encoding a [`Scalar`] as hex.
pub mod scalar_hex {
    use super::scalar_from_slice;
    use curve25519_dalek::scalar::Scalar;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    /// Serialize as a hex string.
    pub fn serialize<S: Serializer>(scalar: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(scalar.as_bytes()))
    }

    /// Deserialize from a hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(D::Error::custom)?;
        scalar_from_slice(&bytes).map_err(D::Error::custom)
    }
}

/// Serde adapter encoding an `Option<Scalar>` as an optional hex string.
pub mod option_scalar_hex {
    use super::scalar_from_slice;
    use curve25519_dalek::scalar::Scalar;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    /// Serialize as an optional hex string.
    pub fn serialize<S: Serializer>(
        scalar: &Option<Scalar>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match scalar {
            Some(s) => serializer.serialize_some(&hex::encode(s.as_bytes())),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from an optional hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Scalar>, D::Error> {
        let opt = Option::<String>::deserialize(deserializer)?;
        opt.map(|s| {
            let bytes = hex::decode(s).map_err(D::Error::custom)?;
            scalar_from_slice(&bytes).map_err(D::Error::custom)
        })
        .transpose()
    }
}

/// Serde adapter encoding a byte vector as hex.
pub mod bytes_hex {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    /// Serialize as a hex string.
    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(
        bytes: &T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes.as_ref()))
    }

    /// Deserialize from a hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(D::Error::custom)
    }
}
