// Copyright (c) 2018-2022 The Botho Foundation
// Copyright (c) 2024 Botho Foundation

//! Transaction validation.

use super::error::{TransactionValidationError, TransactionValidationResult};
use crate::{
    constants::{MAX_INPUTS, MAX_OUTPUTS},
    tx::Transaction,
};
use bth_crypto_commitment::{AssetCommitment, PedersenGens};
use std::collections::HashSet;

/// Determines if the transaction is valid on its own.
///
/// Checks, in order: input and output counts, uniqueness, every output's
/// range and surjection proof, the kernel signature and finally that the
/// transaction balances to the kernel excess. Whether the inputs exist in the
/// ledger must be checked by the caller.
pub fn validate(tx: &Transaction) -> TransactionValidationResult<()> {
    validate_number_of_inputs(tx, MAX_INPUTS)?;

    validate_number_of_outputs(tx, MAX_OUTPUTS)?;

    validate_inputs_are_unique(tx)?;

    validate_outputs_are_unique(tx)?;

    validate_range_proofs(tx)?;

    validate_surjection_proofs(tx)?;

    validate_kernel_signature(tx)?;

    validate_zero_excess(tx)?;

    Ok(())
}

/// The transaction must have at least one input, and no more than the maximum
/// allowed number of inputs.
pub fn validate_number_of_inputs(
    tx: &Transaction,
    maximum_allowed_inputs: usize,
) -> TransactionValidationResult<()> {
    let num_inputs = tx.body.inputs.len();

    // Each transaction must have at least one input.
    if num_inputs == 0 {
        return Err(TransactionValidationError::NoInputs);
    }

    // Each transaction must have no more than the maximum allowed number of
    // inputs.
    if num_inputs > maximum_allowed_inputs {
        return Err(TransactionValidationError::TooManyInputs);
    }

    Ok(())
}

/// The transaction must have at least one output, and no more than the
/// maximum allowed number of outputs.
pub fn validate_number_of_outputs(
    tx: &Transaction,
    maximum_allowed_outputs: usize,
) -> TransactionValidationResult<()> {
    let num_outputs = tx.body.outputs.len();

    if num_outputs == 0 {
        return Err(TransactionValidationError::NoOutputs);
    }

    if num_outputs > maximum_allowed_outputs {
        return Err(TransactionValidationError::TooManyOutputs);
    }

    Ok(())
}

/// No input may be spent twice within one transaction.
pub fn validate_inputs_are_unique(tx: &Transaction) -> TransactionValidationResult<()> {
    if check_unique(tx.body.inputs.iter().map(|i| i.commitment)) {
        Ok(())
    } else {
        Err(TransactionValidationError::DuplicateInputs)
    }
}

/// No two outputs may share a commitment.
pub fn validate_outputs_are_unique(tx: &Transaction) -> TransactionValidationResult<()> {
    if check_unique(tx.body.outputs.iter().map(|o| o.commitment)) {
        Ok(())
    } else {
        Err(TransactionValidationError::DuplicateOutputs)
    }
}

/// Every output carries a range proof against its own asset commitment.
pub fn validate_range_proofs(tx: &Transaction) -> TransactionValidationResult<()> {
    for (i, output) in tx.body.outputs.iter().enumerate() {
        let proof = output
            .range_proof
            .as_ref()
            .ok_or(TransactionValidationError::MissingRangeProof(i))?;
        let gens = PedersenGens::for_asset_commitment(&output.asset_commitment)?;
        proof
            .verify(&output.commitment, &gens)
            .map_err(|e| TransactionValidationError::InvalidRangeProof(i, e))?;
    }
    Ok(())
}

/// Every output's asset commitment surjects onto the inputs' asset
/// commitments.
pub fn validate_surjection_proofs(tx: &Transaction) -> TransactionValidationResult<()> {
    let input_assets: Vec<AssetCommitment> =
        tx.body.inputs.iter().map(|i| i.asset_commitment).collect();
    for (i, output) in tx.body.outputs.iter().enumerate() {
        let proof = output
            .surjection_proof
            .as_ref()
            .ok_or(TransactionValidationError::MissingSurjectionProof(i))?;
        proof
            .verify(&input_assets, &output.asset_commitment)
            .map_err(|e| TransactionValidationError::InvalidSurjectionProof(i, e))?;
    }
    Ok(())
}

/// The kernel is signed by its excess.
pub fn validate_kernel_signature(tx: &Transaction) -> TransactionValidationResult<()> {
    let kernel = &tx.body.kernel;
    let signature = kernel
        .excess_signature
        .as_ref()
        .ok_or(TransactionValidationError::MissingKernelSignature)?;
    signature
        .verify(&kernel.excess, &kernel.message())
        .map_err(TransactionValidationError::InvalidKernelSignature)
}

/// `ΣC_in − ΣC_out − fee·H − offset·G` must equal the kernel excess.
pub fn validate_zero_excess(tx: &Transaction) -> TransactionValidationResult<()> {
    let excess = tx.excess_commitment()?;
    if excess.to_public_key() == tx.body.kernel.excess {
        Ok(())
    } else {
        Err(TransactionValidationError::ExcessMismatch)
    }
}

fn check_unique<T: Eq + core::hash::Hash>(items: impl Iterator<Item = T>) -> bool {
    let mut seen = HashSet::new();
    items.into_iter().all(|item| seen.insert(item))
}
