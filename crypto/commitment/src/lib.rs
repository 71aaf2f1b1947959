// Copyright (c) 2024 Botho Foundation

//! Pedersen commitment algebra for confidential, multi-asset outputs.
//!
//! Every output commits to `value·H' + blind·G`, where `G` is the Ristretto
//! basepoint and `H' = H_a + assetBlind·G` is the asset generator of the
//! output's asset type `a`, re-blinded so the commitment also hides which
//! asset it carries. Expanding the product gives
//! `value·H_a + (blind + value·assetBlind)·G`, which is why
//! [`blind_value_asset_blind`] shows up wherever an output's value has to
//! be folded into a signing key.

#![deny(missing_docs)]

mod asset;
mod blinding;
mod commitment;
mod domain_separators;
mod error;

pub mod encoding;

pub use crate::{
    asset::{AssetCommitment, AssetId, AssetTag, PedersenGens},
    blinding::BlindingFactor,
    commitment::{
        blind_sum, blind_value_asset_blind, commit, commit_sum, commit_sum_compressed, Commitment,
        CompressedCommitment, PublicKey,
    },
    domain_separators::*,
    error::Error,
};

pub use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT as B_BLINDING,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};

use sha2::Sha512;

/// Hash arbitrary bytes to a Ristretto point with a domain separator.
pub fn hash_to_point(domain: &[u8], data: &[u8]) -> RistrettoPoint {
    let mut bytes = Vec::with_capacity(domain.len() + data.len());
    bytes.extend_from_slice(domain);
    bytes.extend_from_slice(data);
    RistrettoPoint::hash_from_bytes::<Sha512>(&bytes)
}
