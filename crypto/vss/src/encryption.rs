// Copyright (c) 2024 Botho Foundation

//! Shares travel encrypted to the shareholder's share key: an ephemeral
//! Diffie-Hellman over Ristretto keys a ChaCha20-Poly1305 box.

use crate::{Error, VerifiableShare};
use blake2::{Blake2b512, Digest};
use bth_crypto_commitment::{encoding::bytes_hex, BlindingFactor, PublicKey};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

const SHARE_KEY_DOMAIN_TAG: &[u8] = b"bth_vss_share_encryption";

/// A [`VerifiableShare`] sealed to one shareholder.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EncryptedShare {
    /// Ephemeral public key `e·G`.
    pub ephemeral: PublicKey,
    /// AEAD nonce.
    #[serde(with = "bytes_hex")]
    pub nonce: Vec<u8>,
    /// Sealed share.
    #[serde(with = "bytes_hex")]
    pub ciphertext: Vec<u8>,
}

fn cipher(shared: &PublicKey, ephemeral: &PublicKey, recipient: &PublicKey) -> ChaCha20Poly1305 {
    let mut hasher = Blake2b512::new();
    hasher.update(SHARE_KEY_DOMAIN_TAG);
    hasher.update(shared.as_bytes());
    hasher.update(ephemeral.as_bytes());
    hasher.update(recipient.as_bytes());
    let mut digest = hasher.finalize();
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&digest[..32]));
    digest.as_mut_slice().zeroize();
    cipher
}

impl EncryptedShare {
    /// Seal `share` to `recipient`.
    pub fn encrypt(
        share: &VerifiableShare,
        recipient: &PublicKey,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Self, Error> {
        let ephemeral_secret = BlindingFactor::random(rng);
        let ephemeral = PublicKey::from_secret(&ephemeral_secret);
        let shared = PublicKey::from(ephemeral_secret.as_scalar() * recipient.decompress()?);

        let mut nonce = vec![0u8; 12];
        rng.fill_bytes(&mut nonce);
        let mut plaintext = share.to_bytes();
        let ciphertext = cipher(&shared, &ephemeral, recipient)
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|_| Error::Decryption)?;
        plaintext.zeroize();

        Ok(Self {
            ephemeral,
            nonce,
            ciphertext,
        })
    }

    /// Open with the shareholder's secret share key.
    pub fn decrypt(&self, secret_key: &BlindingFactor) -> Result<VerifiableShare, Error> {
        if self.nonce.len() != 12 {
            return Err(Error::Decryption);
        }
        let recipient = PublicKey::from_secret(secret_key);
        let shared = PublicKey::from(secret_key.as_scalar() * self.ephemeral.decompress()?);
        let mut plaintext = cipher(&shared, &self.ephemeral, &recipient)
            .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_ref())
            .map_err(|_| Error::Decryption)?;
        let share = VerifiableShare::from_bytes(&plaintext);
        plaintext.zeroize();
        share
    }
}
