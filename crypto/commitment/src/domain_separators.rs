// Copyright (c) 2024 Botho Foundation

//! Domain separation tags used when hashing into the curve or the scalar
//! field.

/// Derives an [`crate::AssetTag`] from an asset identifier.
pub const ASSET_TAG_DOMAIN_TAG: &[u8] = b"bth_asset_tag";

/// Derives the unblinded value generator of an asset.
pub const ASSET_GENERATOR_DOMAIN_TAG: &[u8] = b"bth_asset_generator";
