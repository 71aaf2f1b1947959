// Copyright (c) 2018-2022 The Botho Foundation
// Copyright (c) 2024 Botho Foundation

//! Botho confidential multi-asset transaction data types and validation
//! routines.

#![deny(missing_docs)]

pub mod constants;
pub mod tx;
pub mod validation;

pub use crate::tx::{
    Input, Kernel, KernelFeatures, Output, OutputFeatures, Transaction, TransactionBody,
};

pub use bth_crypto_commitment::{
    AssetCommitment, AssetId, AssetTag, BlindingFactor, Commitment, CompressedCommitment,
    PublicKey,
};
