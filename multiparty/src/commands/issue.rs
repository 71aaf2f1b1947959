// Copyright (c) 2024 Botho Foundation

use anyhow::{Context, Result};
use bth_crypto_commitment::AssetId;
use std::path::Path;

use super::{ledger_client, open_wallet};
use crate::config::Config;

/// Mint an output into this node's wallet through a development ledger.
pub async fn run(config_path: &Path, asset: &str, amount: u64) -> Result<()> {
    let config = Config::load(config_path)?;
    let wallet = open_wallet(&config)?;
    let ledger = ledger_client(&config)?;
    let asset = AssetId::from(asset);

    let record = wallet
        .issue(&asset, amount, ledger.as_ref())
        .await
        .context("Issuance failed")?;
    println!("Issued {} {} as {}", amount, asset, record.commitment);
    println!("Balance: {} {}", wallet.balance(&asset)?, asset);
    Ok(())
}
