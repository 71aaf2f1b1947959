// Copyright (c) 2024 Botho Foundation

//! Ledger transaction records.

use crate::constants::KERNEL_MESSAGE_DOMAIN_TAG;
use blake2::{Blake2b512, Digest};
use bth_crypto_commitment::{
    commit_sum_compressed, AssetCommitment, AssetId, BlindingFactor, Commitment,
    CompressedCommitment, Error as CommitmentError, PublicKey, Scalar,
};
use bth_crypto_multisig::Signature;
use bth_crypto_range_proof::RangeProof;
use bth_crypto_surjection::SurjectionProof;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

/// Output flags.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct OutputFeatures {
    /// The output's blinding is held jointly by several parties.
    pub multiparty: bool,
}

/// A reference to the output being spent.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Input {
    /// Commitment of the spent output.
    pub commitment: CompressedCommitment,
    /// Asset commitment of the spent output.
    pub asset_commitment: AssetCommitment,
}

/// A new output. Proofs may be absent while the transaction is still being
/// negotiated, but are required by validation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// Flags.
    pub features: OutputFeatures,
    /// `value·H' + blind·G`.
    pub commitment: CompressedCommitment,
    /// `H' = H_a + assetBlind·G`.
    pub asset_commitment: AssetCommitment,
    /// Proof that the committed value is in range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_proof: Option<RangeProof>,
    /// Proof that the asset is one of the inputs' assets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surjection_proof: Option<SurjectionProof>,
}

impl Output {
    /// The input spending this output.
    pub fn to_input(&self) -> Input {
        Input {
            commitment: self.commitment,
            asset_commitment: self.asset_commitment,
        }
    }
}

/// Kernel flags.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelFeatures {
    /// An ordinary transaction.
    #[default]
    Plain,
    /// A transaction negotiated by several parties.
    Multiparty,
}

impl KernelFeatures {
    fn as_byte(&self) -> u8 {
        match self {
            Self::Plain => 0,
            Self::Multiparty => 1,
        }
    }
}

/// The transaction kernel: fee, excess and the signature proving that the
/// excess is a commitment to zero.
#[serde_as]
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    /// Flags.
    pub features: KernelFeatures,
    /// Fee, paid in `asset`.
    #[serde_as(as = "DisplayFromStr")]
    pub fee: u64,
    /// Asset the fee is paid in.
    pub asset: AssetId,
    /// `ΣC_in − ΣC_out − fee·H − offset·G`.
    pub excess: PublicKey,
    /// Signature by the excess over [`Kernel::message`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excess_signature: Option<Signature>,
}

impl Kernel {
    /// The message signed by the excess.
    pub fn message(&self) -> [u8; 32] {
        Self::message_for(self.features, self.fee, &self.asset)
    }

    /// The message of a kernel with the given fields.
    pub fn message_for(features: KernelFeatures, fee: u64, asset: &AssetId) -> [u8; 32] {
        let mut hasher = Blake2b512::new();
        hasher.update(KERNEL_MESSAGE_DOMAIN_TAG);
        hasher.update([features.as_byte()]);
        hasher.update(fee.to_le_bytes());
        hasher.update(asset.tag().0);
        let mut msg = [0u8; 32];
        msg.copy_from_slice(&hasher.finalize()[..32]);
        msg
    }
}

/// Inputs, outputs and the kernel.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionBody {
    /// Spent outputs.
    pub inputs: Vec<Input>,
    /// New outputs.
    pub outputs: Vec<Output>,
    /// The kernel.
    pub kernel: Kernel,
}

/// A complete ledger transaction.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Public part of the excess blinding.
    pub offset: BlindingFactor,
    /// Body.
    pub body: TransactionBody,
}

impl Transaction {
    /// `ΣC_in − ΣC_out − fee·H_asset − offset·G`; a commitment to zero in a
    /// balanced transaction.
    pub fn excess_commitment(&self) -> Result<Commitment, CommitmentError> {
        let inputs: Vec<CompressedCommitment> =
            self.body.inputs.iter().map(|i| i.commitment).collect();
        let outputs: Vec<CompressedCommitment> =
            self.body.outputs.iter().map(|o| o.commitment).collect();
        let sum = commit_sum_compressed(&inputs, &outputs)?;

        let gens = self.body.kernel.asset.tag().unblinded_gens();
        let fee = Commitment::new(self.body.kernel.fee, &BlindingFactor::ZERO, &gens);
        let offset = Commitment {
            point: gens.commit(Scalar::ZERO, *self.offset.as_scalar()),
        };
        Ok(Commitment {
            point: sum.point - fee.point - offset.point,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_message_binds_every_field() {
        let bth = AssetId::from("bth");
        let base = Kernel::message_for(KernelFeatures::Plain, 3, &bth);
        assert_ne!(base, Kernel::message_for(KernelFeatures::Multiparty, 3, &bth));
        assert_ne!(base, Kernel::message_for(KernelFeatures::Plain, 4, &bth));
        assert_ne!(
            base,
            Kernel::message_for(KernelFeatures::Plain, 3, &AssetId::from("gold"))
        );
    }

    #[test]
    fn fee_is_a_decimal_string() {
        let kernel = Kernel {
            fee: u64::MAX,
            asset: AssetId::from("bth"),
            ..Default::default()
        };
        let json = serde_json::to_value(&kernel).unwrap();
        assert_eq!(json["fee"], "18446744073709551615");
        assert_eq!(json["features"], "plain");
        assert!(json.get("excess_signature").is_none());
        let back: Kernel = serde_json::from_value(json).unwrap();
        assert_eq!(back, kernel);
    }
}
