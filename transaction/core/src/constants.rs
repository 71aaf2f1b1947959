// Copyright (c) 2024 Botho Foundation

//! Transaction limits.

/// Maximum number of inputs in a transaction.
pub const MAX_INPUTS: usize = 16;

/// Maximum number of outputs in a transaction.
pub const MAX_OUTPUTS: usize = 16;

/// Domain separator of the kernel signature message.
pub const KERNEL_MESSAGE_DOMAIN_TAG: &[u8] = b"bth_kernel_msg";
