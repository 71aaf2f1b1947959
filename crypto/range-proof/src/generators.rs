// Copyright (c) 2024 Botho Foundation

//! Fixed vector generators for 64-bit proofs.

use bth_crypto_commitment::{hash_to_point, RistrettoPoint};
use lazy_static::lazy_static;

/// Bit width of every range proof.
pub const BITS: usize = 64;

const G_DOMAIN_TAG: &[u8] = b"bth_bulletproof_g";
const H_DOMAIN_TAG: &[u8] = b"bth_bulletproof_h";

fn vector(domain: &[u8]) -> Vec<RistrettoPoint> {
    (0..BITS as u32)
        .map(|i| hash_to_point(domain, &i.to_le_bytes()))
        .collect()
}

lazy_static! {
    /// `G_0 .. G_63`.
    pub static ref G_VEC: Vec<RistrettoPoint> = vector(G_DOMAIN_TAG);
    /// `H_0 .. H_63`.
    pub static ref H_VEC: Vec<RistrettoPoint> = vector(H_DOMAIN_TAG);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_are_distinct() {
        assert_eq!(G_VEC.len(), BITS);
        assert_eq!(H_VEC.len(), BITS);
        for i in 0..BITS {
            assert_ne!(G_VEC[i], H_VEC[i]);
        }
        assert_ne!(G_VEC[0], G_VEC[1]);
    }
}
