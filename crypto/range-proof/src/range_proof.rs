// Copyright (c) 2024 Botho Foundation

use crate::{
    generators::{BITS, G_VEC, H_VEC},
    inner_product_proof::InnerProductProof,
    mpc::{self, PublicTaus, TauSecrets},
    transcript::{range_proof_transcript, TranscriptProtocol},
    util::{bits, exp_iter, inner_product, sum_of_powers, vec_poly_eval},
    Error,
};
use blake2::{Blake2b512, Digest};
use bth_crypto_commitment::{
    encoding::scalar_from_slice, BlindingFactor, CompressedCommitment, PedersenGens,
};
use core::fmt;
use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::{MultiscalarMul, VartimeMultiscalarMul},
};
use merlin::Transcript;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRngCore, SeedableRng};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

/// Encoded size of a 64-bit proof.
pub const RANGE_PROOF_SIZE: usize = 4 * 32 + 3 * 32 + 2 * 6 * 32 + 2 * 32;

const COMMON_SEED_DOMAIN_TAG: &[u8] = b"bth_bulletproof_common";

/// A 64-bit range proof.
#[derive(Clone, Eq, PartialEq)]
pub struct RangeProof {
    A: CompressedRistretto,
    S: CompressedRistretto,
    T_1: CompressedRistretto,
    T_2: CompressedRistretto,
    t_x: Scalar,
    t_x_blinding: Scalar,
    e_blinding: Scalar,
    ipp_proof: InnerProductProof,
}

/// Prover state shared by every party of a proof: the bit commitments and
/// polynomial coefficients derived from the common nonce, plus the
/// transcript up to the `y`, `z` challenges.
pub(crate) struct ProverState {
    transcript: Transcript,
    gens: PedersenGens,
    A: CompressedRistretto,
    S: CompressedRistretto,
    alpha: Scalar,
    rho: Scalar,
    y: Scalar,
    z: Scalar,
    l0: Vec<Scalar>,
    l1: Vec<Scalar>,
    r0: Vec<Scalar>,
    r1: Vec<Scalar>,
    t1: Scalar,
    t2: Scalar,
}

impl ProverState {
    pub(crate) fn new(
        value: u64,
        commitment: &CompressedCommitment,
        gens: &PedersenGens,
        common_nonce: &[u8; 32],
    ) -> Self {
        let mut rng = ChaCha20Rng::from_seed(common_seed(common_nonce));
        let alpha = Scalar::random(&mut rng);
        let rho = Scalar::random(&mut rng);
        let s_L: Vec<Scalar> = (0..BITS).map(|_| Scalar::random(&mut rng)).collect();
        let s_R: Vec<Scalar> = (0..BITS).map(|_| Scalar::random(&mut rng)).collect();

        let a_L = bits(value, BITS);
        let a_R: Vec<Scalar> = a_L.iter().map(|b| b - Scalar::ONE).collect();

        let A = RistrettoPoint::multiscalar_mul(
            core::iter::once(&alpha).chain(&a_L).chain(&a_R),
            core::iter::once(&gens.blinding_base)
                .chain(G_VEC.iter())
                .chain(H_VEC.iter()),
        )
        .compress();
        let S = RistrettoPoint::multiscalar_mul(
            core::iter::once(&rho).chain(&s_L).chain(&s_R),
            core::iter::once(&gens.blinding_base)
                .chain(G_VEC.iter())
                .chain(H_VEC.iter()),
        )
        .compress();

        let mut transcript = range_proof_transcript();
        transcript.rangeproof_domain_sep(BITS as u64);
        transcript.append_point(b"V", &commitment.0);
        transcript.append_point(b"A", &A);
        transcript.append_point(b"S", &S);
        let y = transcript.challenge_scalar(b"y");
        let z = transcript.challenge_scalar(b"z");
        let zz = z * z;

        let l0: Vec<Scalar> = a_L.iter().map(|a| a - z).collect();
        let l1 = s_L;
        let r0: Vec<Scalar> = a_R
            .iter()
            .zip(exp_iter(y))
            .zip(exp_iter(Scalar::from(2u64)))
            .map(|((a, y_i), two_i)| y_i * (a + z) + zz * two_i)
            .collect();
        let r1: Vec<Scalar> = s_R.iter().zip(exp_iter(y)).map(|(s, y_i)| y_i * s).collect();

        let t1 = inner_product(&l0, &r1) + inner_product(&l1, &r0);
        let t2 = inner_product(&l1, &r1);

        Self {
            transcript,
            gens: *gens,
            A,
            S,
            alpha,
            rho,
            y,
            z,
            l0,
            l1,
            r0,
            r1,
            t1,
            t2,
        }
    }

    pub(crate) fn z(&self) -> Scalar {
        self.z
    }

    /// `T_1 = t1·B + Σ T1_p` and `T_2 = t2·B + Σ T2_p`.
    pub(crate) fn poly_commitments(
        &self,
        total_taus: &PublicTaus,
    ) -> Result<(CompressedRistretto, CompressedRistretto), Error> {
        let T_1 = self.t1 * self.gens.value_base + total_taus.tau1.decompress()?;
        let T_2 = self.t2 * self.gens.value_base + total_taus.tau2.decompress()?;
        Ok((T_1.compress(), T_2.compress()))
    }

    /// Append `T_1`, `T_2` and draw `x`.
    pub(crate) fn challenge_x(
        &mut self,
        T_1: &CompressedRistretto,
        T_2: &CompressedRistretto,
    ) -> Scalar {
        self.transcript.append_point(b"T_1", T_1);
        self.transcript.append_point(b"T_2", T_2);
        self.transcript.challenge_scalar(b"x")
    }

    /// Assemble the proof once the aggregated `taux` is known.
    pub(crate) fn finish(
        mut self,
        x: Scalar,
        T_1: CompressedRistretto,
        T_2: CompressedRistretto,
        t_x_blinding: Scalar,
    ) -> RangeProof {
        let e_blinding = self.alpha + self.rho * x;
        let l = vec_poly_eval(&self.l0, &self.l1, &x);
        let r = vec_poly_eval(&self.r0, &self.r1, &x);
        let t_x = inner_product(&l, &r);

        self.transcript.append_scalar(b"t_x", &t_x);
        self.transcript.append_scalar(b"t_x_blinding", &t_x_blinding);
        self.transcript.append_scalar(b"e_blinding", &e_blinding);
        let w = self.transcript.challenge_scalar(b"w");
        let Q = w * self.gens.value_base;

        let H_prime: Vec<RistrettoPoint> = H_VEC
            .iter()
            .zip(exp_iter(self.y.invert()))
            .map(|(H, y_inv_i)| H * y_inv_i)
            .collect();
        let ipp_proof =
            InnerProductProof::create(&mut self.transcript, &Q, G_VEC.to_vec(), H_prime, l, r);

        RangeProof {
            A: self.A,
            S: self.S,
            T_1,
            T_2,
            t_x,
            t_x_blinding,
            e_blinding,
            ipp_proof,
        }
    }
}

fn common_seed(common_nonce: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Blake2b512::new();
    hasher.update(COMMON_SEED_DOMAIN_TAG);
    hasher.update(common_nonce);
    let digest = hasher.finalize();
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest[..32]);
    seed
}

impl RangeProof {
    /// Prove that `commitment = value·B + blinding·B̃` opens to a 64-bit value.
    /// Returns the proof together with the commitment it proves.
    pub fn prove(
        value: u64,
        blinding: &BlindingFactor,
        gens: &PedersenGens,
        rng: &mut impl CryptoRngCore,
    ) -> Result<(Self, CompressedCommitment), Error> {
        let commitment =
            CompressedCommitment::from(gens.commit(Scalar::from(value), *blinding.as_scalar()));
        let mut common_nonce = [0u8; 32];
        rng.fill_bytes(&mut common_nonce);
        let secrets = TauSecrets::random(rng);
        let taus = secrets.public_taus();
        let taux = mpc::compute_taux(
            value,
            &commitment,
            gens,
            &common_nonce,
            &secrets,
            &taus,
            blinding,
        )?;
        let proof = mpc::aggregate_proof(value, &commitment, gens, &common_nonce, &taus, &[taux])?;
        Ok((proof, commitment))
    }

    /// Verify against the commitment and the generators it was made with.
    pub fn verify(
        &self,
        commitment: &CompressedCommitment,
        gens: &PedersenGens,
    ) -> Result<(), Error> {
        let n = BITS;
        let mut transcript = range_proof_transcript();
        transcript.rangeproof_domain_sep(n as u64);
        transcript.append_point(b"V", &commitment.0);
        transcript.validate_and_append_point(b"A", &self.A)?;
        transcript.validate_and_append_point(b"S", &self.S)?;
        let y = transcript.challenge_scalar(b"y");
        let z = transcript.challenge_scalar(b"z");
        transcript.validate_and_append_point(b"T_1", &self.T_1)?;
        transcript.validate_and_append_point(b"T_2", &self.T_2)?;
        let x = transcript.challenge_scalar(b"x");
        transcript.append_scalar(b"t_x", &self.t_x);
        transcript.append_scalar(b"t_x_blinding", &self.t_x_blinding);
        transcript.append_scalar(b"e_blinding", &self.e_blinding);
        let w = transcript.challenge_scalar(b"w");

        let (u, s) = self.ipp_proof.verification_scalars(n, &mut transcript)?;

        let decompress = |p: &CompressedRistretto| p.decompress().ok_or(Error::VerificationError);
        let V = commitment.decompress()?;
        let A = decompress(&self.A)?;
        let S = decompress(&self.S)?;
        let T_1 = decompress(&self.T_1)?;
        let T_2 = decompress(&self.T_2)?;
        let B = gens.value_base;
        let B_blinding = gens.blinding_base;

        // t̂·B + τx·B̃ == z²·V + δ(y,z)·B + x·T_1 + x²·T_2
        let zz = z * z;
        let delta = (z - zz) * sum_of_powers(&y, n) - zz * z * sum_of_powers(&Scalar::from(2u64), n);
        let lhs = RistrettoPoint::vartime_multiscalar_mul(
            [self.t_x, self.t_x_blinding],
            [B, B_blinding],
        );
        let rhs = RistrettoPoint::vartime_multiscalar_mul(
            [zz, delta, x, x * x],
            [V, B, T_1, T_2],
        );
        if lhs != rhs {
            return Err(Error::VerificationError);
        }

        let a = self.ipp_proof.a;
        let b = self.ipp_proof.b;
        let y_inv = y.invert();
        let g_scalars = s.iter().map(|s_i| a * s_i + z);
        let h_scalars = s
            .iter()
            .zip(exp_iter(y_inv))
            .zip(exp_iter(Scalar::from(2u64)))
            .map(|((s_i, y_inv_i), two_i)| (b * s_i.invert() - zz * two_i) * y_inv_i - z);
        let mut ipp_points = Vec::with_capacity(2 * u.len());
        let mut ipp_scalars = Vec::with_capacity(2 * u.len());
        for ((L, R), u_j) in self.ipp_proof.L_vec.iter().zip(&self.ipp_proof.R_vec).zip(&u) {
            let uu = u_j * u_j;
            ipp_points.push(decompress(L)?);
            ipp_scalars.push(-uu);
            ipp_points.push(decompress(R)?);
            ipp_scalars.push(-uu.invert());
        }

        let check = RistrettoPoint::vartime_multiscalar_mul(
            g_scalars
                .chain(h_scalars)
                .chain([(a * b - self.t_x) * w, self.e_blinding, -Scalar::ONE, -x])
                .chain(ipp_scalars),
            G_VEC
                .iter()
                .chain(H_VEC.iter())
                .chain([&B, &B_blinding, &A, &S])
                .chain(ipp_points.iter()),
        );
        if check == RistrettoPoint::default() {
            Ok(())
        } else {
            Err(Error::VerificationError)
        }
    }

    /// `A ‖ S ‖ T_1 ‖ T_2 ‖ t_x ‖ t_x_blinding ‖ e_blinding ‖ ipp`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RANGE_PROOF_SIZE);
        out.extend_from_slice(self.A.as_bytes());
        out.extend_from_slice(self.S.as_bytes());
        out.extend_from_slice(self.T_1.as_bytes());
        out.extend_from_slice(self.T_2.as_bytes());
        out.extend_from_slice(self.t_x.as_bytes());
        out.extend_from_slice(self.t_x_blinding.as_bytes());
        out.extend_from_slice(self.e_blinding.as_bytes());
        out.extend(self.ipp_proof.to_bytes());
        out
    }

    /// Decode; scalars must be canonical.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != RANGE_PROOF_SIZE {
            return Err(Error::Format(format!(
                "range proof of {} bytes, expected {RANGE_PROOF_SIZE}",
                bytes.len()
            )));
        }
        let point = |i: usize| -> Result<CompressedRistretto, Error> {
            CompressedRistretto::from_slice(&bytes[i * 32..(i + 1) * 32])
                .map_err(|e| Error::Format(e.to_string()))
        };
        Ok(Self {
            A: point(0)?,
            S: point(1)?,
            T_1: point(2)?,
            T_2: point(3)?,
            t_x: scalar_from_slice(&bytes[4 * 32..5 * 32])?,
            t_x_blinding: scalar_from_slice(&bytes[5 * 32..6 * 32])?,
            e_blinding: scalar_from_slice(&bytes[6 * 32..7 * 32])?,
            ipp_proof: InnerProductProof::from_bytes(&bytes[7 * 32..])?,
        })
    }
}

impl fmt::Debug for RangeProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RangeProof({}..)", hex::encode(&self.A.as_bytes()[..8]))
    }
}

impl Serialize for RangeProof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for RangeProof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(D::Error::custom)?;
        Self::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bth_crypto_commitment::{AssetCommitment, AssetId};
    use proptest::prelude::*;
    use rand_hc::Hc128Rng as RngType;

    fn asset_gens(rng: &mut RngType) -> PedersenGens {
        let tag = AssetId::from("bth").tag();
        let asset_commitment = AssetCommitment::new(&tag, &BlindingFactor::random(rng));
        PedersenGens::for_asset_commitment(&asset_commitment).unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn proofs_verify(value in any::<u64>(), seed in any::<[u8; 32]>()) {
            let mut rng = RngType::from_seed(seed);
            let gens = asset_gens(&mut rng);
            let blinding = BlindingFactor::random(&mut rng);
            let (proof, commitment) = RangeProof::prove(value, &blinding, &gens, &mut rng).unwrap();
            prop_assert!(proof.verify(&commitment, &gens).is_ok());
        }
    }

    #[test]
    fn proof_is_bound_to_commitment() {
        let mut rng = RngType::from_seed([1u8; 32]);
        let gens = asset_gens(&mut rng);
        let blinding = BlindingFactor::random(&mut rng);
        let (proof, _) = RangeProof::prove(100, &blinding, &gens, &mut rng).unwrap();
        let other = CompressedCommitment::from(gens.commit(Scalar::from(101u64), *blinding.as_scalar()));
        assert_matches!(proof.verify(&other, &gens), Err(Error::VerificationError));
    }

    #[test]
    fn proof_is_bound_to_generators() {
        let mut rng = RngType::from_seed([2u8; 32]);
        let gens = asset_gens(&mut rng);
        let blinding = BlindingFactor::random(&mut rng);
        let (proof, commitment) = RangeProof::prove(5, &blinding, &gens, &mut rng).unwrap();
        let other_gens = asset_gens(&mut rng);
        assert!(proof.verify(&commitment, &other_gens).is_err());
    }

    #[test]
    fn encoding_round_trips() {
        let mut rng = RngType::from_seed([3u8; 32]);
        let gens = asset_gens(&mut rng);
        let blinding = BlindingFactor::random(&mut rng);
        let (proof, commitment) = RangeProof::prove(42, &blinding, &gens, &mut rng).unwrap();
        let bytes = proof.to_bytes();
        assert_eq!(bytes.len(), RANGE_PROOF_SIZE);

        let json = serde_json::to_string(&proof).unwrap();
        let decoded: RangeProof = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, proof);
        decoded.verify(&commitment, &gens).unwrap();
    }

    #[test]
    fn tampered_proof_fails() {
        let mut rng = RngType::from_seed([4u8; 32]);
        let gens = asset_gens(&mut rng);
        let blinding = BlindingFactor::random(&mut rng);
        let (proof, commitment) = RangeProof::prove(42, &blinding, &gens, &mut rng).unwrap();
        let mut bytes = proof.to_bytes();
        // Low byte of t_x.
        bytes[4 * 32] ^= 1;
        let tampered = RangeProof::from_bytes(&bytes).unwrap();
        assert!(tampered.verify(&commitment, &gens).is_err());
    }

    #[test]
    fn wrong_length_is_a_format_error() {
        assert_matches!(RangeProof::from_bytes(&[0u8; 10]), Err(Error::Format(_)));
    }
}
