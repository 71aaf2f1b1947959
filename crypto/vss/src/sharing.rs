// Copyright (c) 2024 Botho Foundation

use crate::Error;
use bth_crypto_commitment::{hash_to_point, BlindingFactor, PublicKey, B_BLINDING};
use core::fmt;
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::MultiscalarMul};
use lazy_static::lazy_static;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use zeroize::{Zeroize, ZeroizeOnDrop};

const VSS_GENERATOR_DOMAIN_TAG: &[u8] = b"bth_vss_blinding_generator";

lazy_static! {
    /// Second generator `H` of the sharing commitments.
    static ref H_VSS: RistrettoPoint = hash_to_point(VSS_GENERATOR_DOMAIN_TAG, b"");
}

/// One shareholder's evaluation `(i, f(i), g(i))`.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct VerifiableShare {
    /// Shareholder index, starting at 1.
    pub index: u32,
    /// `f(index)`
    pub value: BlindingFactor,
    /// `g(index)`
    pub blinding: BlindingFactor,
}

impl fmt::Debug for VerifiableShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifiableShare({}, <redacted>)", self.index)
    }
}

impl VerifiableShare {
    pub(crate) fn to_bytes(&self) -> [u8; 68] {
        let mut out = [0u8; 68];
        out[..4].copy_from_slice(&self.index.to_le_bytes());
        out[4..36].copy_from_slice(&self.value.to_bytes());
        out[36..].copy_from_slice(&self.blinding.to_bytes());
        out
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 68 {
            return Err(bth_crypto_commitment::Error::LengthMismatch(bytes.len(), 68).into());
        }
        let mut index = [0u8; 4];
        index.copy_from_slice(&bytes[..4]);
        Ok(Self {
            index: u32::from_le_bytes(index),
            value: BlindingFactor::from_bytes(&bytes[4..36])?,
            blinding: BlindingFactor::from_bytes(&bytes[36..])?,
        })
    }
}

/// The dealer's public commitment to both sharing polynomials.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SharingCommitment {
    /// Shares needed to reconstruct.
    pub threshold: u32,
    /// Shares dealt.
    pub share_count: u32,
    /// `C_j = a_j·G + b_j·H` for `j` in `0..threshold`.
    pub coefficients: Vec<PublicKey>,
}

impl SharingCommitment {
    /// `Σ_j C_j·i^j`, the commitment to share `i`.
    fn evaluate(&self, index: u32) -> Result<RistrettoPoint, Error> {
        let x = Scalar::from(index);
        let mut power = Scalar::ONE;
        let mut powers = Vec::with_capacity(self.coefficients.len());
        for _ in 0..self.coefficients.len() {
            powers.push(power);
            power *= x;
        }
        let points = self
            .coefficients
            .iter()
            .map(PublicKey::decompress)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RistrettoPoint::multiscalar_mul(&powers, &points))
    }
}

fn evaluate_polynomial(coefficients: &[Scalar], index: u32) -> Scalar {
    let x = Scalar::from(index);
    coefficients
        .iter()
        .rev()
        .fold(Scalar::ZERO, |acc, coefficient| acc * x + coefficient)
}

/// Split `secret` into `share_count` shares, any `threshold` of which
/// reconstruct it. Shareholder indices are `1..=share_count`.
pub fn share_blind(
    share_count: u32,
    threshold: u32,
    secret: &BlindingFactor,
    rng: &mut impl CryptoRngCore,
) -> Result<(Vec<VerifiableShare>, SharingCommitment), Error> {
    if threshold == 0 || threshold > share_count {
        return Err(Error::InvalidThreshold {
            threshold,
            share_count,
        });
    }

    let mut f = Vec::with_capacity(threshold as usize);
    f.push(*secret.as_scalar());
    f.extend((1..threshold).map(|_| Scalar::random(rng)));
    let g: Vec<Scalar> = (0..threshold).map(|_| Scalar::random(rng)).collect();

    let coefficients = f
        .iter()
        .zip(&g)
        .map(|(a, b)| PublicKey::from(a * B_BLINDING + b * *H_VSS))
        .collect();

    let shares = (1..=share_count)
        .map(|index| VerifiableShare {
            index,
            value: evaluate_polynomial(&f, index).into(),
            blinding: evaluate_polynomial(&g, index).into(),
        })
        .collect();

    f.zeroize();
    Ok((
        shares,
        SharingCommitment {
            threshold,
            share_count,
            coefficients,
        },
    ))
}

/// Check `f(i)·G + g(i)·H == Σ_j C_j·i^j`.
pub fn verify_share(share: &VerifiableShare, commitment: &SharingCommitment) -> Result<(), Error> {
    if share.index == 0 || share.index > commitment.share_count {
        return Err(Error::ShareIndexOutOfRange(share.index));
    }
    let expected = commitment.evaluate(share.index)?;
    let actual = share.value.as_scalar() * B_BLINDING + share.blinding.as_scalar() * *H_VSS;
    if expected == actual {
        Ok(())
    } else {
        Err(Error::InvalidShare(share.index))
    }
}

fn lagrange_at_zero(indices: &[u32], values: &[Scalar]) -> Scalar {
    let xs: Vec<Scalar> = indices.iter().map(|i| Scalar::from(*i)).collect();
    xs.iter()
        .zip(values)
        .enumerate()
        .map(|(i, (x_i, y_i))| {
            let (num, den) = xs
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .fold((Scalar::ONE, Scalar::ONE), |(num, den), (_, x_j)| {
                    (num * x_j, den * (x_j - x_i))
                });
            y_i * num * den.invert()
        })
        .sum()
}

/// Reconstruct the shared secret from at least `threshold` distinct shares,
/// every one of which must verify against `commitment`.
pub fn open_blind(
    shares: &[VerifiableShare],
    commitment: &SharingCommitment,
) -> Result<BlindingFactor, Error> {
    let need = commitment.threshold as usize;
    let mut seen = BTreeSet::new();
    for share in shares {
        if !seen.insert(share.index) {
            return Err(Error::DuplicateShareIndex(share.index));
        }
        verify_share(share, commitment)?;
    }
    if shares.len() < need {
        return Err(Error::InsufficientShares {
            got: shares.len(),
            need,
        });
    }

    let chosen = &shares[..need];
    let indices: Vec<u32> = chosen.iter().map(|s| s.index).collect();
    let values: Vec<Scalar> = chosen.iter().map(|s| *s.value.as_scalar()).collect();
    let blindings: Vec<Scalar> = chosen.iter().map(|s| *s.blinding.as_scalar()).collect();

    let secret = lagrange_at_zero(&indices, &values);
    let blinding = lagrange_at_zero(&indices, &blindings);

    // The opening must match C_0.
    let c0 = commitment
        .coefficients
        .first()
        .ok_or(Error::InsufficientShares { got: 0, need })?
        .decompress()?;
    if secret * B_BLINDING + blinding * *H_VSS != c0 {
        return Err(Error::InvalidShare(chosen[0].index));
    }
    Ok(secret.into())
}
