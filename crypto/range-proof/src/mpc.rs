// Copyright (c) 2024 Botho Foundation

//! Three-round joint range proof for a commitment whose blinding is split
//! across several parties.
//!
//! 1. Every party derives [`TauSecrets`] and publishes its [`PublicTaus`].
//! 2. Once all public taus and the common nonce are known, every party
//!    computes its `taux` share with [`compute_taux`].
//! 3. One party sums the shares with [`aggregate_proof`], which only returns
//!    a proof that verifies.
//!
//! The bit commitments `A`, `S` and the polynomial blinds are derived from
//! the common nonce, so every party computes identical values for them. Only
//! the `tau` polynomial blinds and the commitment blinding stay private.

use crate::{range_proof::ProverState, Error, RangeProof};
use blake2::{Blake2b512, Digest};
use bth_crypto_commitment::{
    BlindingFactor, CompressedCommitment, PedersenGens, PublicKey, B_BLINDING,
};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

const TAU1_DOMAIN_TAG: &[u8] = b"bth_bulletproof_tau1";
const TAU2_DOMAIN_TAG: &[u8] = b"bth_bulletproof_tau2";

/// One party's private blinds of the `t1`, `t2` polynomial coefficients.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TauSecrets {
    tau1: Scalar,
    tau2: Scalar,
}

impl TauSecrets {
    /// Derive from a party's private nonce and the session it is used in.
    pub fn derive(private_nonce: &BlindingFactor, session: &[u8]) -> Self {
        let derive = |domain: &[u8]| {
            let mut hasher = Blake2b512::new();
            hasher.update(domain);
            hasher.update(private_nonce.to_bytes());
            hasher.update(session);
            Scalar::from_hash(hasher)
        };
        Self {
            tau1: derive(TAU1_DOMAIN_TAG),
            tau2: derive(TAU2_DOMAIN_TAG),
        }
    }

    /// Fresh random secrets.
    pub fn random(rng: &mut impl CryptoRngCore) -> Self {
        Self {
            tau1: Scalar::random(rng),
            tau2: Scalar::random(rng),
        }
    }

    /// `(τ1·G, τ2·G)`.
    pub fn public_taus(&self) -> PublicTaus {
        PublicTaus {
            tau1: PublicKey::from(self.tau1 * B_BLINDING),
            tau2: PublicKey::from(self.tau2 * B_BLINDING),
        }
    }
}

/// A party's published tau points, or their sum over all parties.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicTaus {
    /// `τ1·G`
    pub tau1: PublicKey,
    /// `τ2·G`
    pub tau2: PublicKey,
}

impl PublicTaus {
    /// Sum the contributions of every party.
    pub fn sum<'a>(parts: impl IntoIterator<Item = &'a PublicTaus>) -> Result<Self, Error> {
        let mut tau1 = RistrettoPoint::default();
        let mut tau2 = RistrettoPoint::default();
        for part in parts {
            tau1 += part.tau1.decompress()?;
            tau2 += part.tau2.decompress()?;
        }
        Ok(Self {
            tau1: tau1.into(),
            tau2: tau2.into(),
        })
    }
}

/// Round one: publish the tau points of `secrets`.
pub fn generate_public_taus(secrets: &TauSecrets) -> PublicTaus {
    secrets.public_taus()
}

/// Round two: this party's `taux = τ2·x² + τ1·x + z²·γ_p`, where `γ_p` is its
/// share of the commitment blinding.
pub fn compute_taux(
    value: u64,
    commitment: &CompressedCommitment,
    gens: &PedersenGens,
    common_nonce: &[u8; 32],
    secrets: &TauSecrets,
    total_taus: &PublicTaus,
    blinding_share: &BlindingFactor,
) -> Result<Scalar, Error> {
    let mut state = ProverState::new(value, commitment, gens, common_nonce);
    let (T_1, T_2) = state.poly_commitments(total_taus)?;
    let x = state.challenge_x(&T_1, &T_2);
    let z = state.z();
    Ok(secrets.tau2 * x * x + secrets.tau1 * x + z * z * blinding_share.as_scalar())
}

/// Check one party's `taux` against what it published:
/// `taux·G == x²·T2_p + x·T1_p + z²·Γ_p`, where `Γ_p = γ_p·G` is its public
/// blinding share.
#[allow(clippy::too_many_arguments)]
pub fn verify_taux(
    value: u64,
    commitment: &CompressedCommitment,
    gens: &PedersenGens,
    common_nonce: &[u8; 32],
    total_taus: &PublicTaus,
    party_taus: &PublicTaus,
    public_blinding_share: &PublicKey,
    taux: &Scalar,
) -> Result<(), Error> {
    let mut state = ProverState::new(value, commitment, gens, common_nonce);
    let (T_1, T_2) = state.poly_commitments(total_taus)?;
    let x = state.challenge_x(&T_1, &T_2);
    let z = state.z();
    let expected = x * x * party_taus.tau2.decompress()?
        + x * party_taus.tau1.decompress()?
        + z * z * public_blinding_share.decompress()?;
    if taux * B_BLINDING == expected {
        Ok(())
    } else {
        Err(Error::VerificationError)
    }
}

/// Round three: assemble the proof from every party's `taux` and verify it.
pub fn aggregate_proof(
    value: u64,
    commitment: &CompressedCommitment,
    gens: &PedersenGens,
    common_nonce: &[u8; 32],
    total_taus: &PublicTaus,
    taux_shares: &[Scalar],
) -> Result<RangeProof, Error> {
    if taux_shares.is_empty() {
        return Err(Error::MissingTauxShares);
    }
    let mut state = ProverState::new(value, commitment, gens, common_nonce);
    let (T_1, T_2) = state.poly_commitments(total_taus)?;
    let x = state.challenge_x(&T_1, &T_2);
    let taux: Scalar = taux_shares.iter().sum();
    let proof = state.finish(x, T_1, T_2, taux);
    proof.verify(commitment, gens)?;
    Ok(proof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bth_crypto_commitment::{blind_sum, AssetCommitment, AssetId};
    use rand_core::{RngCore, SeedableRng};
    use rand_hc::Hc128Rng as RngType;

    struct Party {
        blind: BlindingFactor,
        secrets: TauSecrets,
    }

    fn setup(n: usize, rng: &mut RngType) -> (Vec<Party>, PedersenGens) {
        let parties = (0..n)
            .map(|i| Party {
                blind: BlindingFactor::random(rng),
                secrets: TauSecrets::derive(&BlindingFactor::random(rng), &[i as u8; 16]),
            })
            .collect();
        let asset_commitment =
            AssetCommitment::new(&AssetId::from("bth").tag(), &BlindingFactor::random(rng));
        let gens = PedersenGens::for_asset_commitment(&asset_commitment).unwrap();
        (parties, gens)
    }

    fn joint_commitment(value: u64, parties: &[Party], gens: &PedersenGens) -> CompressedCommitment {
        let blinds: Vec<BlindingFactor> = parties.iter().map(|p| p.blind).collect();
        let total = blind_sum(&blinds, &[]);
        CompressedCommitment::from(gens.commit(Scalar::from(value), *total.as_scalar()))
    }

    #[test]
    fn three_parties_produce_a_valid_proof() {
        let mut rng = RngType::from_seed([11u8; 32]);
        let (parties, gens) = setup(3, &mut rng);
        let value = 100;
        let commitment = joint_commitment(value, &parties, &gens);
        let mut nonce = [0u8; 32];
        rng.fill_bytes(&mut nonce);

        let public: Vec<PublicTaus> = parties
            .iter()
            .map(|p| generate_public_taus(&p.secrets))
            .collect();
        let total = PublicTaus::sum(&public).unwrap();

        let shares: Vec<Scalar> = parties
            .iter()
            .map(|p| {
                compute_taux(value, &commitment, &gens, &nonce, &p.secrets, &total, &p.blind)
                    .unwrap()
            })
            .collect();

        let proof = aggregate_proof(value, &commitment, &gens, &nonce, &total, &shares).unwrap();
        proof.verify(&commitment, &gens).unwrap();
    }

    #[test]
    fn common_nonce_mismatch_fails() {
        let mut rng = RngType::from_seed([12u8; 32]);
        let (parties, gens) = setup(3, &mut rng);
        let value = 77;
        let commitment = joint_commitment(value, &parties, &gens);
        let total = PublicTaus::sum(
            &parties
                .iter()
                .map(|p| p.secrets.public_taus())
                .collect::<Vec<_>>(),
        )
        .unwrap();

        let nonce = [1u8; 32];
        let other = [2u8; 32];
        let shares: Vec<Scalar> = parties
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let n = if i == 2 { &other } else { &nonce };
                compute_taux(value, &commitment, &gens, n, &p.secrets, &total, &p.blind).unwrap()
            })
            .collect();

        assert_matches!(
            aggregate_proof(value, &commitment, &gens, &nonce, &total, &shares),
            Err(Error::VerificationError)
        );
    }

    #[test]
    fn missing_party_fails() {
        let mut rng = RngType::from_seed([13u8; 32]);
        let (parties, gens) = setup(2, &mut rng);
        let value = 5;
        let commitment = joint_commitment(value, &parties, &gens);
        let total = PublicTaus::sum(&[parties[0].secrets.public_taus()]).unwrap();
        let nonce = [3u8; 32];
        let share = compute_taux(
            value,
            &commitment,
            &gens,
            &nonce,
            &parties[0].secrets,
            &total,
            &parties[0].blind,
        )
        .unwrap();
        assert!(aggregate_proof(value, &commitment, &gens, &nonce, &total, &[share]).is_err());
        assert_matches!(
            aggregate_proof(value, &commitment, &gens, &nonce, &total, &[]),
            Err(Error::MissingTauxShares)
        );
    }

    #[test]
    fn taux_shares_are_checked_per_party() {
        let mut rng = RngType::from_seed([14u8; 32]);
        let (parties, gens) = setup(2, &mut rng);
        let value = 40;
        let commitment = joint_commitment(value, &parties, &gens);
        let nonce = [4u8; 32];
        let public: Vec<PublicTaus> = parties.iter().map(|p| p.secrets.public_taus()).collect();
        let total = PublicTaus::sum(&public).unwrap();

        for (party, taus) in parties.iter().zip(&public) {
            let taux = compute_taux(
                value,
                &commitment,
                &gens,
                &nonce,
                &party.secrets,
                &total,
                &party.blind,
            )
            .unwrap();
            let share = PublicKey::from_secret(&party.blind);
            verify_taux(value, &commitment, &gens, &nonce, &total, taus, &share, &taux).unwrap();

            let bad = taux + Scalar::ONE;
            assert_matches!(
                verify_taux(value, &commitment, &gens, &nonce, &total, taus, &share, &bad),
                Err(Error::VerificationError)
            );
        }
    }

    #[test]
    fn derived_secrets_depend_on_session() {
        let nonce = BlindingFactor::from(9u64);
        let a = TauSecrets::derive(&nonce, b"session-a").public_taus();
        let b = TauSecrets::derive(&nonce, b"session-b").public_taus();
        assert_ne!(a, b);
        assert_eq!(a, TauSecrets::derive(&nonce, b"session-a").public_taus());
    }
}
