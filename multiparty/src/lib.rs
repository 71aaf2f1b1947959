// Copyright (c) 2024 Botho Foundation

//! Botho multi-party joint funds.
//!
//! Participants run this node to fund joint outputs with co-owners and to
//! spend from them, exchanging slates over HTTP. A node can also act as the
//! receiver of a spend, and a development ledger is included for local
//! networks.

pub mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod telemetry;

pub use coordinator::{Coordinator, Receiver, Settings};
pub use error::ExchangeError;
