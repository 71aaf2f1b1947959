// Copyright (c) 2024 Botho Foundation

//! Deterministic session secrets.
//!
//! Every blind, nonce and asset blind a wallet uses is derived from its seed
//! and a monotonically increasing index kept by the [`crate::Database`], so a
//! restored seed regenerates the same secrets in the same order. Index 0 is
//! reserved for the share encryption key.

use crate::{error::Result, WalletError};
use bth_crypto_commitment::{BlindingFactor, PublicKey};
use hkdf::Hkdf;
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

const SECRET_DOMAIN_TAG: &[u8] = b"bth_wallet_secret";

/// Index of the share encryption key.
pub const SHARE_KEY_INDEX: u64 = 0;

/// Derives the wallet's secret scalars.
pub trait SecretGenerator: Send + Sync {
    /// The secret at `index`.
    fn secret(&self, index: u64) -> Result<BlindingFactor>;

    /// Secret key that VSS shares are sealed to.
    fn share_key(&self) -> Result<BlindingFactor> {
        self.secret(SHARE_KEY_INDEX)
    }

    /// Public counterpart of [`SecretGenerator::share_key`].
    fn public_share_key(&self) -> Result<PublicKey> {
        Ok(PublicKey::from_secret(&self.share_key()?))
    }
}

/// HKDF-SHA512 over a 32-byte seed.
pub struct HkdfSecretGenerator {
    seed: Zeroizing<[u8; 32]>,
}

impl HkdfSecretGenerator {
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            seed: Zeroizing::new(seed),
        }
    }

    /// Parse a hex-encoded seed.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = hex::decode(s.trim()).map_err(|e| WalletError::InvalidSeed(e.to_string()))?;
        if bytes.len() != 32 {
            let len = bytes.len();
            bytes.zeroize();
            return Err(WalletError::InvalidSeed(format!(
                "expected 32 bytes, got {len}"
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self::new(seed))
    }
}

#[cfg(test)]
impl core::fmt::Debug for HkdfSecretGenerator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("HkdfSecretGenerator(..)")
    }
}

impl SecretGenerator for HkdfSecretGenerator {
    fn secret(&self, index: u64) -> Result<BlindingFactor> {
        let hk = Hkdf::<Sha512>::new(Some(SECRET_DOMAIN_TAG), &self.seed[..]);
        let mut okm = Zeroizing::new([0u8; 64]);
        hk.expand(&index.to_le_bytes(), &mut okm[..])
            .map_err(|_| WalletError::KeyDerivation)?;
        Ok(BlindingFactor::from_bytes_mod_order_wide(&okm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn secrets_are_deterministic_per_index() {
        let a = HkdfSecretGenerator::new([7u8; 32]);
        let b = HkdfSecretGenerator::new([7u8; 32]);
        assert_eq!(a.secret(5).unwrap(), b.secret(5).unwrap());
        assert_ne!(a.secret(5).unwrap(), a.secret(6).unwrap());
        assert_eq!(a.share_key().unwrap(), a.secret(SHARE_KEY_INDEX).unwrap());

        let other = HkdfSecretGenerator::new([8u8; 32]);
        assert_ne!(a.secret(5).unwrap(), other.secret(5).unwrap());
    }

    #[test]
    fn hex_seeds() {
        let seed = HkdfSecretGenerator::from_hex(&"11".repeat(32)).unwrap();
        assert_eq!(
            seed.secret(1).unwrap(),
            HkdfSecretGenerator::new([0x11; 32]).secret(1).unwrap()
        );
        assert_matches!(
            HkdfSecretGenerator::from_hex("abcd"),
            Err(WalletError::InvalidSeed(_))
        );
        assert_matches!(
            HkdfSecretGenerator::from_hex("zz"),
            Err(WalletError::InvalidSeed(_))
        );
    }
}
