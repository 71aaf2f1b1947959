// Copyright (c) 2018-2022 The Botho Foundation
// Copyright (c) 2024 Botho Foundation

//! Validation routines for a Botho transaction

mod error;
mod validate;

pub use self::{
    error::{TransactionValidationError, TransactionValidationResult},
    validate::{
        validate, validate_inputs_are_unique, validate_kernel_signature,
        validate_number_of_inputs, validate_number_of_outputs, validate_outputs_are_unique,
        validate_range_proofs, validate_surjection_proofs, validate_zero_excess,
    },
};
