// Copyright (c) 2024 Botho Foundation

use anyhow::Result;
use bth_crypto_commitment::AssetId;
use bth_wallet::{OutputRecord, OutputStatus};
use std::path::Path;

use super::open_wallet;
use crate::config::Config;

fn status_label(status: OutputStatus) -> &'static str {
    match status {
        OutputStatus::Unconfirmed => "unconfirmed",
        OutputStatus::Unspent => "unspent",
        OutputStatus::Locked => "locked",
        OutputStatus::Spent => "spent",
    }
}

fn describe(record: &OutputRecord) -> String {
    let mut line = format!(
        "  {}  {:>12}  {:<11}",
        record.commitment,
        record.value,
        status_label(record.status)
    );
    if let Some(joint) = &record.joint {
        let owners: Vec<String> = joint.owners().iter().map(|o| o.to_string()).collect();
        line.push_str(&format!("  joint [{}]", owners.join(",")));
        if let Some(threshold) = &joint.threshold {
            line.push_str(&format!(" {}-of-{}", threshold.threshold, threshold.share_count()));
        }
    }
    line
}

/// Show this node's outputs of `asset`.
pub fn run(config_path: &Path, asset: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let wallet = open_wallet(&config)?;
    let asset = AssetId::from(asset);

    println!("Participant: {}", config.node.participant_id);
    println!("Listening:   {}", config.node.listen);
    println!("Ledger:      {}", config.ledger.url);
    println!("Peers:       {}", config.peers.len());
    println!();
    println!("Spendable:   {} {}", wallet.balance(&asset)?, asset);

    let outputs = wallet.outputs(&asset)?;
    if outputs.is_empty() {
        println!("No {} outputs", asset);
        return Ok(());
    }
    println!("Outputs:");
    for record in &outputs {
        println!("{}", describe(record));
    }
    Ok(())
}
