// Copyright (c) 2024 Botho Foundation

use anyhow::{Context, Result};
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ledger_client, session_wallet, Endpoints};
use crate::{
    config::Config,
    coordinator::{Receiver, Settings},
};

/// Run the receive command: answer `/receive` and confirm what was received.
pub async fn run(config_path: &Path, once: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    let wallet = session_wallet(&config)?;
    let (endpoints, mut receipts) = Endpoints::start(&config, wallet.clone()).await?;
    let receiver = Arc::new(Receiver::new(
        wallet,
        ledger_client(&config)?,
        Settings::from(&config),
    ));
    let cancel = CancellationToken::new();

    if once {
        let received = tokio::select! {
            received = receiver.receive_one(&mut receipts, &cancel) => received,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                Ok(None)
            }
        };
        endpoints.stop().await;
        if let Some(session) = received.context("Receiving failed")? {
            println!("Received session {session}");
        }
        return Ok(());
    }

    let worker = tokio::spawn(receiver.run(receipts, cancel.clone()));
    info!("Waiting for spends, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    cancel.cancel();
    endpoints.stop().await;
    worker.await.context("Receiver task failed")?;
    Ok(())
}
