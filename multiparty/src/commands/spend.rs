// Copyright (c) 2024 Botho Foundation

use anyhow::{Context, Result};
use bth_crypto_commitment::CompressedCommitment;
use bth_wallet::SpendRequest;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    ledger_client, parse_participants, peer_urls, session_wallet, until_interrupted, Endpoints,
};
use crate::{
    config::Config,
    coordinator::{Coordinator, Settings},
};

/// Arguments of the spend command
pub struct SpendArgs<'a> {
    pub session: Uuid,
    pub joint_output: &'a str,
    pub amount: u64,
    pub fee: u64,
    pub present: &'a str,
    pub receiver: &'a str,
}

/// Run the spend command. Every present owner runs it with the same
/// arguments.
pub async fn run(config_path: &Path, args: SpendArgs<'_>) -> Result<()> {
    let config = Config::load(config_path)?;
    let present = parse_participants(args.present)?;
    let joint_output = CompressedCommitment::from_hex(args.joint_output)
        .with_context(|| format!("Invalid commitment '{}'", args.joint_output))?;

    let wallet = session_wallet(&config)?;
    let (endpoints, _receipts) = Endpoints::start(&config, wallet.clone()).await?;
    let coordinator = Coordinator::new(
        wallet,
        endpoints.inbox.clone(),
        peer_urls(&config),
        ledger_client(&config)?,
        Settings::from(&config),
    )?;

    let request = SpendRequest {
        session: args.session,
        joint_output,
        amount: args.amount,
        fee: args.fee,
        present,
    };
    let cancel = CancellationToken::new();
    let result = until_interrupted(
        coordinator.spend(&request, args.receiver, &cancel),
        &cancel,
        tokio::signal::ctrl_c(),
    )
    .await;
    endpoints.stop().await;
    let tx = result.with_context(|| format!("Session {} failed", args.session))?;

    println!("Paid {} from {}", args.amount, joint_output);
    match tx.body.outputs.iter().find(|o| o.features.multiparty) {
        Some(joint) => println!("New joint output: {}", joint.commitment),
        None => println!("The joint output was spent in full"),
    }
    Ok(())
}
