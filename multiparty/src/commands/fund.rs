// Copyright (c) 2024 Botho Foundation

use anyhow::{bail, Context, Result};
use bth_crypto_commitment::AssetId;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::{
    ledger_client, parse_participants, peer_urls, session_wallet, until_interrupted, Endpoints,
};
use crate::{
    config::Config,
    coordinator::{Coordinator, Settings},
};
use bth_wallet::FundRequest;

/// Run the fund command. Every owner runs it with the same arguments.
pub async fn run(
    config_path: &Path,
    session: Uuid,
    asset: &str,
    amount: u64,
    fee: u64,
    owners: &str,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let owners = parse_participants(owners)?;
    if !owners.contains(&config.node.participant_id) {
        bail!(
            "Participant {} is not among the owners {:?}",
            config.node.participant_id,
            owners
        );
    }

    let wallet = session_wallet(&config)?;
    let (endpoints, _receipts) = Endpoints::start(&config, wallet.clone()).await?;
    let coordinator = Coordinator::new(
        wallet,
        endpoints.inbox.clone(),
        peer_urls(&config),
        ledger_client(&config)?,
        Settings::from(&config),
    )?;

    let request = FundRequest {
        session,
        asset: AssetId::from(asset),
        amount,
        fee,
        owners,
    };
    let cancel = CancellationToken::new();
    let result = until_interrupted(
        coordinator.fund(&request, &cancel),
        &cancel,
        tokio::signal::ctrl_c(),
    )
    .await;
    endpoints.stop().await;
    let tx = result.with_context(|| format!("Session {session} failed"))?;

    let joint = tx
        .body
        .outputs
        .iter()
        .find(|o| o.features.multiparty)
        .context("Transaction has no joint output")?;
    info!("Funded session {}", session);
    println!("Joint output: {}", joint.commitment);
    println!("Value:        {} {}", amount, asset);
    Ok(())
}
