// Copyright (c) 2024 Botho Foundation

use crate::Error;
use blake2::{Blake2b512, Digest};
use bth_crypto_commitment::{
    encoding::scalar_from_slice, AssetCommitment, AssetTag, BlindingFactor, B_BLINDING,
};
use core::fmt;
use curve25519_dalek::{
    ristretto::RistrettoPoint,
    scalar::Scalar,
    traits::VartimeMultiscalarMul,
};
use rand::seq::index;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRngCore, SeedableRng};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

/// Ring members per proof, when that many inputs exist.
pub const MAX_RING_SIZE: usize = 3;

/// Ring samples tried before giving up.
pub const MAX_ITERATIONS: usize = 100;

const MESSAGE_DOMAIN_TAG: &[u8] = b"bth_surjection_message";
const RING_DOMAIN_TAG: &[u8] = b"bth_surjection_ring";

/// A candidate input of a surjection proof.
#[derive(Clone, Debug)]
pub struct SurjectionInput {
    /// The input's blinded asset generator.
    pub asset_commitment: AssetCommitment,
    /// The input's asset tag and asset blind, if the prover knows them.
    pub opening: Option<(AssetTag, BlindingFactor)>,
}

impl SurjectionInput {
    /// An input whose opening the prover knows.
    pub fn known(tag: AssetTag, asset_blinding: BlindingFactor) -> Self {
        Self {
            asset_commitment: AssetCommitment::new(&tag, &asset_blinding),
            opening: Some((tag, asset_blinding)),
        }
    }

    /// An input the prover can only use as a decoy.
    pub fn unknown(asset_commitment: AssetCommitment) -> Self {
        Self {
            asset_commitment,
            opening: None,
        }
    }
}

/// A ring signature showing the output asset matches one ring member's.
#[derive(Clone, Eq, PartialEq)]
pub struct SurjectionProof {
    ring: Vec<AssetCommitment>,
    challenge: Scalar,
    responses: Vec<Scalar>,
}

fn message(output: &AssetCommitment, ring: &[AssetCommitment]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(MESSAGE_DOMAIN_TAG);
    hasher.update(output.as_bytes());
    for member in ring {
        hasher.update(member.as_bytes());
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn ring_challenge(message: &[u8; 64], index: usize, point: &RistrettoPoint) -> Scalar {
    let mut hasher = Blake2b512::new();
    hasher.update(RING_DOMAIN_TAG);
    hasher.update(message);
    hasher.update((index as u32).to_le_bytes());
    hasher.update(point.compress().as_bytes());
    Scalar::from_hash(hasher)
}

impl SurjectionProof {
    /// Prove that the output with asset `output_tag` and asset blind
    /// `output_asset_blinding` surjects onto `inputs`.
    ///
    /// A ring of up to [`MAX_RING_SIZE`] inputs is sampled from a seed drawn
    /// from `rng`; samples that contain no usable input are redrawn, up to
    /// [`MAX_ITERATIONS`] times.
    pub fn create(
        inputs: &[SurjectionInput],
        output_tag: &AssetTag,
        output_asset_blinding: &BlindingFactor,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Self, Error> {
        let usable = |input: &SurjectionInput| {
            matches!(&input.opening, Some((tag, _)) if tag == output_tag)
        };
        if !inputs.iter().any(usable) {
            return Err(Error::InputNotFound);
        }

        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let mut rng = ChaCha20Rng::from_seed(seed);
        let ring_size = inputs.len().min(MAX_RING_SIZE);

        for _ in 0..MAX_ITERATIONS {
            let mut picked = index::sample(&mut rng, inputs.len(), ring_size).into_vec();
            picked.sort_unstable();
            let Some(real) = picked.iter().position(|i| usable(&inputs[*i])) else {
                continue;
            };
            let ring: Vec<SurjectionInput> = picked.iter().map(|i| inputs[*i].clone()).collect();
            return Self::sign(&ring, real, output_tag, output_asset_blinding, &mut rng);
        }
        Err(Error::TooManyIterations(MAX_ITERATIONS))
    }

    fn sign(
        ring: &[SurjectionInput],
        real: usize,
        output_tag: &AssetTag,
        output_asset_blinding: &BlindingFactor,
        rng: &mut ChaCha20Rng,
    ) -> Result<Self, Error> {
        let n = ring.len();
        let output = AssetCommitment::new(output_tag, output_asset_blinding);
        let output_point = output.decompress()?;
        let members: Vec<AssetCommitment> = ring.iter().map(|r| r.asset_commitment).collect();
        let keys = members
            .iter()
            .map(|m| Ok(output_point - m.decompress()?))
            .collect::<Result<Vec<RistrettoPoint>, Error>>()?;
        let msg = message(&output, &members);

        let secret = match &ring[real].opening {
            Some((_, input_blinding)) => {
                *output_asset_blinding.as_scalar() - input_blinding.as_scalar()
            }
            None => return Err(Error::InputNotFound),
        };

        let k = Scalar::random(rng);
        let mut challenges = vec![Scalar::ZERO; n];
        let mut responses = vec![Scalar::ZERO; n];

        challenges[(real + 1) % n] = ring_challenge(&msg, real, &(k * B_BLINDING));
        let mut i = (real + 1) % n;
        while i != real {
            responses[i] = Scalar::random(rng);
            let point = RistrettoPoint::vartime_multiscalar_mul(
                [responses[i], -challenges[i]],
                [B_BLINDING, keys[i]],
            );
            challenges[(i + 1) % n] = ring_challenge(&msg, i, &point);
            i = (i + 1) % n;
        }
        responses[real] = k + challenges[real] * secret;

        Ok(Self {
            ring: members,
            challenge: challenges[0],
            responses,
        })
    }

    /// Verify that `output` surjects onto the proof's ring, every member of
    /// which must be one of `inputs`.
    pub fn verify(
        &self,
        inputs: &[AssetCommitment],
        output: &AssetCommitment,
    ) -> Result<(), Error> {
        let n = self.ring.len();
        if n == 0 || self.responses.len() != n {
            return Err(Error::VerificationError);
        }
        for (i, member) in self.ring.iter().enumerate() {
            if !inputs.contains(member) {
                return Err(Error::UnknownRingMember(i));
            }
        }

        let output_point = output.decompress()?;
        let msg = message(output, &self.ring);
        let mut challenge = self.challenge;
        for (i, (member, response)) in self.ring.iter().zip(&self.responses).enumerate() {
            let key = output_point - member.decompress()?;
            let point = RistrettoPoint::vartime_multiscalar_mul(
                [*response, -challenge],
                [B_BLINDING, key],
            );
            challenge = ring_challenge(&msg, i, &point);
        }

        if challenge == self.challenge {
            Ok(())
        } else {
            Err(Error::VerificationError)
        }
    }

    /// The ring members, in proof order.
    pub fn ring(&self) -> &[AssetCommitment] {
        &self.ring
    }

    /// `ring ‖ challenge ‖ responses`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 * self.ring.len() + 32);
        for member in &self.ring {
            out.extend_from_slice(member.as_bytes());
        }
        out.extend_from_slice(self.challenge.as_bytes());
        for response in &self.responses {
            out.extend_from_slice(response.as_bytes());
        }
        out
    }

    /// Decode `ring ‖ challenge ‖ responses`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 96 || (bytes.len() - 32) % 64 != 0 {
            return Err(Error::Format(bytes.len()));
        }
        let n = (bytes.len() - 32) / 64;
        let chunk = |i: usize| &bytes[i * 32..(i + 1) * 32];
        let ring = (0..n)
            .map(|i| AssetCommitment::from_bytes(chunk(i)))
            .collect::<Result<Vec<_>, _>>()?;
        let challenge = scalar_from_slice(chunk(n))?;
        let responses = (n + 1..2 * n + 1)
            .map(|i| scalar_from_slice(chunk(i)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            ring,
            challenge,
            responses,
        })
    }
}

impl fmt::Debug for SurjectionProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurjectionProof(ring of {})", self.ring.len())
    }
}

impl Serialize for SurjectionProof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for SurjectionProof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(D::Error::custom)?;
        Self::from_bytes(&bytes).map_err(D::Error::custom)
    }
}
