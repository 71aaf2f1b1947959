// Copyright (c) 2024 Botho Foundation

use crate::Error;
use blake2::{Blake2b512, Digest};
use bth_crypto_commitment::{
    encoding::scalar_from_slice,
    BlindingFactor, PublicKey, B_BLINDING,
};
use core::fmt;
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::IsIdentity};
use rand_core::CryptoRngCore;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

const CHALLENGE_DOMAIN_TAG: &[u8] = b"bth_multisig_challenge";

/// The Fiat-Shamir challenge `e = H(R, X, msg)`.
pub fn challenge(public_nonce: &PublicKey, public_key: &PublicKey, message: &[u8]) -> Scalar {
    let mut hasher = Blake2b512::new();
    hasher.update(CHALLENGE_DOMAIN_TAG);
    hasher.update(public_nonce.as_bytes());
    hasher.update(public_key.as_bytes());
    hasher.update(message);
    Scalar::from_hash(hasher)
}

/// One signer's share `s_p` of an aggregate signature.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct PartialSignature(pub Scalar);

impl PartialSignature {
    /// Decode a canonical scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self(scalar_from_slice(bytes)?))
    }

    /// Encode as 32 bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl fmt::Debug for PartialSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartialSignature({})", hex::encode(self.0.as_bytes()))
    }
}

impl Serialize for PartialSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        bth_crypto_commitment::encoding::scalar_hex::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for PartialSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        bth_crypto_commitment::encoding::scalar_hex::deserialize(deserializer).map(Self)
    }
}

/// A Schnorr signature `(R, s)`, hex-encoded on the wire as 64 bytes.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct Signature {
    /// The aggregated public nonce `R`.
    pub public_nonce: PublicKey,
    /// The aggregated response `s`.
    pub s: Scalar,
}

impl Signature {
    /// Single-signer Schnorr signature.
    pub fn sign(
        secret_key: &BlindingFactor,
        message: &[u8],
        rng: &mut impl CryptoRngCore,
    ) -> Self {
        let nonce = BlindingFactor::random(rng);
        let public_nonce = PublicKey::from_secret(&nonce);
        let public_key = PublicKey::from_secret(secret_key);
        let partial = sign_partial(secret_key, &nonce, &public_nonce, &public_key, message);
        Self {
            public_nonce,
            s: partial.0,
        }
    }

    /// Check `s·G == R + e·X`.
    pub fn verify(&self, public_key: &PublicKey, message: &[u8]) -> Result<(), Error> {
        let r = self.public_nonce.decompress()?;
        let x = public_key.decompress()?;
        if x.is_identity() {
            return Err(Error::InvalidSignature);
        }
        let e = challenge(&self.public_nonce, public_key, message);
        if self.s * B_BLINDING == r + e * x {
            Ok(())
        } else {
            Err(Error::InvalidSignature)
        }
    }

    /// `R ‖ s`.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.public_nonce.as_bytes());
        out[32..].copy_from_slice(self.s.as_bytes());
        out
    }

    /// Decode `R ‖ s`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 64 {
            return Err(bth_crypto_commitment::Error::LengthMismatch(bytes.len(), 64).into());
        }
        Ok(Self {
            public_nonce: PublicKey::from_bytes(&bytes[..32])?,
            s: scalar_from_slice(&bytes[32..])?,
        })
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.to_bytes()))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(D::Error::custom)?;
        Self::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

/// `Σ keys`, for nonces and excess keys alike.
pub fn aggregate_public_keys<'a>(
    keys: impl IntoIterator<Item = &'a PublicKey>,
) -> Result<PublicKey, Error> {
    let mut sum = RistrettoPoint::default();
    for key in keys {
        sum += key.decompress()?;
    }
    Ok(PublicKey::from(sum))
}

/// `s_p = r_p + H(R, X, msg)·x_p`, against the aggregated `R` and `X`.
pub fn sign_partial(
    secret_key: &BlindingFactor,
    secret_nonce: &BlindingFactor,
    aggregated_nonce: &PublicKey,
    aggregated_key: &PublicKey,
    message: &[u8],
) -> PartialSignature {
    let e = challenge(aggregated_nonce, aggregated_key, message);
    PartialSignature(secret_nonce.as_scalar() + e * secret_key.as_scalar())
}

/// Check `s_p·G == R_p + H(R, X, msg)·X_p`.
pub fn verify_partial(
    partial: &PartialSignature,
    public_nonce: &PublicKey,
    public_key: &PublicKey,
    aggregated_nonce: &PublicKey,
    aggregated_key: &PublicKey,
    message: &[u8],
) -> Result<(), Error> {
    let r = public_nonce.decompress()?;
    let x = public_key.decompress()?;
    let e = challenge(aggregated_nonce, aggregated_key, message);
    if partial.0 * B_BLINDING == r + e * x {
        Ok(())
    } else {
        Err(Error::InvalidPartialSignature)
    }
}

/// Sum verified partial signatures into `(R, Σ s_p)`.
pub fn aggregate(
    partials: &[PartialSignature],
    aggregated_nonce: &PublicKey,
) -> Result<Signature, Error> {
    if partials.is_empty() {
        return Err(Error::NoPartialSignatures);
    }
    Ok(Signature {
        public_nonce: *aggregated_nonce,
        s: partials.iter().map(|p| p.0).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rand_core::SeedableRng;
    use rand_hc::Hc128Rng as RngType;

    struct Signer {
        key: BlindingFactor,
        nonce: BlindingFactor,
    }

    fn signers(n: usize, rng: &mut RngType) -> Vec<Signer> {
        (0..n)
            .map(|_| Signer {
                key: BlindingFactor::random(rng),
                nonce: BlindingFactor::random(rng),
            })
            .collect()
    }

    fn run(signers: &[Signer], message: &[u8]) -> (PublicKey, PublicKey, Vec<PartialSignature>) {
        let keys: Vec<PublicKey> = signers.iter().map(|s| PublicKey::from_secret(&s.key)).collect();
        let nonces: Vec<PublicKey> =
            signers.iter().map(|s| PublicKey::from_secret(&s.nonce)).collect();
        let x = aggregate_public_keys(&keys).unwrap();
        let r = aggregate_public_keys(&nonces).unwrap();
        let partials = signers
            .iter()
            .map(|s| sign_partial(&s.key, &s.nonce, &r, &x, message))
            .collect();
        (x, r, partials)
    }

    proptest! {
        #[test]
        fn aggregate_verifies(n in 1usize..6, seed in any::<[u8; 32]>()) {
            let mut rng = RngType::from_seed(seed);
            let signers = signers(n, &mut rng);
            let (x, r, partials) = run(&signers, b"kernel");

            for (signer, partial) in signers.iter().zip(&partials) {
                verify_partial(
                    partial,
                    &PublicKey::from_secret(&signer.nonce),
                    &PublicKey::from_secret(&signer.key),
                    &r,
                    &x,
                    b"kernel",
                ).unwrap();
            }
            let sig = aggregate(&partials, &r).unwrap();
            prop_assert!(sig.verify(&x, b"kernel").is_ok());
            prop_assert!(sig.verify(&x, b"other").is_err());
        }
    }

    #[test]
    fn flipped_bit_fails_partial_and_aggregate() {
        let mut rng = RngType::from_seed([7u8; 32]);
        let signers = signers(3, &mut rng);
        let (x, r, mut partials) = run(&signers, b"kernel");

        let mut bytes = partials[1].to_bytes();
        bytes[0] ^= 1;
        partials[1] = PartialSignature::from_bytes(&bytes).unwrap();

        assert_matches!(
            verify_partial(
                &partials[1],
                &PublicKey::from_secret(&signers[1].nonce),
                &PublicKey::from_secret(&signers[1].key),
                &r,
                &x,
                b"kernel",
            ),
            Err(Error::InvalidPartialSignature)
        );
        let sig = aggregate(&partials, &r).unwrap();
        assert_matches!(sig.verify(&x, b"kernel"), Err(Error::InvalidSignature));
    }

    #[test]
    fn single_signer_round_trips_through_json() {
        let mut rng = RngType::from_seed([8u8; 32]);
        let key = BlindingFactor::random(&mut rng);
        let sig = Signature::sign(&key, b"msg", &mut rng);
        let json = serde_json::to_string(&sig).unwrap();
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
        back.verify(&PublicKey::from_secret(&key), b"msg").unwrap();
    }

    #[test]
    fn empty_aggregate_is_rejected() {
        assert_matches!(
            aggregate(&[], &PublicKey::default()),
            Err(Error::NoPartialSignatures)
        );
    }
}
