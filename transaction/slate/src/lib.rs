// Copyright (c) 2024 Botho Foundation

//! The slate is the transcript of one multi-party transaction. Every round
//! each participant adds its own public contributions to a copy of the
//! slate, and the copies are merged with [`combine`] until the kernel can be
//! signed and the transaction assembled.
//!
//! Secrets never enter the slate; a participant keeps them in its
//! [`SavedSlate`] between rounds.

#![deny(missing_docs)]

mod bulletproof;
mod error;
mod participant;
mod saved;
mod signing;
mod slate;

pub use crate::{
    bulletproof::public_taus,
    error::Error,
    participant::{ParticipantData, ParticipantId},
    saved::SavedSlate,
    slate::{
        combine, Dealing, DerivedOutput, ForwardedShare, Slate, SlateKind, SlateState, Threshold,
        PROTOCOL_VERSION,
    },
};
