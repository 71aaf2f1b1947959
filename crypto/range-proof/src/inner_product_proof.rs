// Copyright (c) 2024 Botho Foundation

//! Logarithmic inner-product argument.
//!
//! Each round halves the vectors and publishes `L`, `R`:
//!
//! ```text
//! L = <a_lo, G_hi> + <b_hi, H_lo> + <a_lo, b_hi>·Q
//! R = <a_hi, G_lo> + <b_lo, H_hi> + <a_hi, b_lo>·Q
//! a' = a_lo·u + a_hi·u⁻¹      G' = G_lo·u⁻¹ + G_hi·u
//! b' = b_lo·u⁻¹ + b_hi·u      H' = H_lo·u + H_hi·u⁻¹
//! ```
//!
//! so that `P' = P + u²·L + u⁻²·R` is a commitment to the folded vectors.

use crate::{transcript::TranscriptProtocol, util::inner_product, Error};
use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::VartimeMultiscalarMul,
};
use merlin::Transcript;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InnerProductProof {
    pub L_vec: Vec<CompressedRistretto>,
    pub R_vec: Vec<CompressedRistretto>,
    pub a: Scalar,
    pub b: Scalar,
}

impl InnerProductProof {
    /// Prove knowledge of `a`, `b` opening `P = <a,G> + <b,H> + <a,b>·Q`.
    pub fn create(
        transcript: &mut Transcript,
        Q: &RistrettoPoint,
        mut G: Vec<RistrettoPoint>,
        mut H: Vec<RistrettoPoint>,
        mut a: Vec<Scalar>,
        mut b: Vec<Scalar>,
    ) -> Self {
        let mut n = G.len();
        debug_assert!(n.is_power_of_two());
        transcript.innerproduct_domain_sep(n as u64);

        let rounds = n.trailing_zeros() as usize;
        let mut L_vec = Vec::with_capacity(rounds);
        let mut R_vec = Vec::with_capacity(rounds);

        while n != 1 {
            n /= 2;
            let (a_lo, a_hi) = a.split_at(n);
            let (b_lo, b_hi) = b.split_at(n);
            let (G_lo, G_hi) = G.split_at(n);
            let (H_lo, H_hi) = H.split_at(n);

            let c_L = inner_product(a_lo, b_hi);
            let c_R = inner_product(a_hi, b_lo);

            let L = RistrettoPoint::vartime_multiscalar_mul(
                a_lo.iter().chain(b_hi).chain(core::iter::once(&c_L)),
                G_hi.iter().chain(H_lo).chain(core::iter::once(Q)),
            )
            .compress();
            let R = RistrettoPoint::vartime_multiscalar_mul(
                a_hi.iter().chain(b_lo).chain(core::iter::once(&c_R)),
                G_lo.iter().chain(H_hi).chain(core::iter::once(Q)),
            )
            .compress();

            transcript.append_point(b"L", &L);
            transcript.append_point(b"R", &R);
            L_vec.push(L);
            R_vec.push(R);

            let u = transcript.challenge_scalar(b"u");
            let u_inv = u.invert();

            let a_next = (0..n).map(|i| a_lo[i] * u + a_hi[i] * u_inv).collect();
            let b_next = (0..n).map(|i| b_lo[i] * u_inv + b_hi[i] * u).collect();
            let G_next = (0..n).map(|i| G_lo[i] * u_inv + G_hi[i] * u).collect();
            let H_next = (0..n).map(|i| H_lo[i] * u + H_hi[i] * u_inv).collect();
            a = a_next;
            b = b_next;
            G = G_next;
            H = H_next;
        }

        Self {
            L_vec,
            R_vec,
            a: a[0],
            b: b[0],
        }
    }

    /// Replay the transcript and return the round challenges `u_j` and the
    /// folding coefficients `s_i = Π_j u_j^{±1}` of the `G` generators. The
    /// `H` generators fold with `s_i⁻¹`.
    pub fn verification_scalars(
        &self,
        n: usize,
        transcript: &mut Transcript,
    ) -> Result<(Vec<Scalar>, Vec<Scalar>), Error> {
        let rounds = self.L_vec.len();
        if rounds >= 32 || n != (1 << rounds) || self.R_vec.len() != rounds {
            return Err(Error::VerificationError);
        }
        transcript.innerproduct_domain_sep(n as u64);

        let mut challenges = Vec::with_capacity(rounds);
        for (L, R) in self.L_vec.iter().zip(&self.R_vec) {
            transcript.validate_and_append_point(b"L", L)?;
            transcript.validate_and_append_point(b"R", R)?;
            challenges.push(transcript.challenge_scalar(b"u"));
        }

        let inverses: Vec<Scalar> = challenges.iter().map(Scalar::invert).collect();
        let s = (0..n)
            .map(|i| {
                (0..rounds)
                    .map(|j| {
                        // Round j splits on bit (rounds - 1 - j) of the index.
                        if (i >> (rounds - 1 - j)) & 1 == 1 {
                            challenges[j]
                        } else {
                            inverses[j]
                        }
                    })
                    .product()
            })
            .collect();
        Ok((challenges, s))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.L_vec.len() * 64 + 64);
        for (L, R) in self.L_vec.iter().zip(&self.R_vec) {
            out.extend_from_slice(L.as_bytes());
            out.extend_from_slice(R.as_bytes());
        }
        out.extend_from_slice(self.a.as_bytes());
        out.extend_from_slice(self.b.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() % 32 != 0 || bytes.len() < 64 || (bytes.len() / 32) % 2 != 0 {
            return Err(Error::Format(format!(
                "inner product proof of {} bytes",
                bytes.len()
            )));
        }
        let rounds = (bytes.len() / 32 - 2) / 2;
        let point = |i: usize| -> Result<CompressedRistretto, Error> {
            CompressedRistretto::from_slice(&bytes[i * 32..(i + 1) * 32])
                .map_err(|e| Error::Format(e.to_string()))
        };
        let mut L_vec = Vec::with_capacity(rounds);
        let mut R_vec = Vec::with_capacity(rounds);
        for j in 0..rounds {
            L_vec.push(point(2 * j)?);
            R_vec.push(point(2 * j + 1)?);
        }
        let pos = rounds * 64;
        let a = bth_crypto_commitment::encoding::scalar_from_slice(&bytes[pos..pos + 32])?;
        let b = bth_crypto_commitment::encoding::scalar_from_slice(&bytes[pos + 32..pos + 64])?;
        Ok(Self { L_vec, R_vec, a, b })
    }
}
