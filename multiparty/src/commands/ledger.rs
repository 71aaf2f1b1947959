// Copyright (c) 2024 Botho Foundation

use anyhow::{Context, Result};
use std::{path::Path, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::Config,
    ledger::{rpc::serve, Ledger},
};

/// Run a development ledger until Ctrl-C. Its state lives in memory only.
pub async fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let listener = TcpListener::bind(config.ledger.listen)
        .await
        .with_context(|| format!("Failed to listen on {}", config.ledger.listen))?;

    let ledger = Arc::new(Ledger::new());
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, ledger.clone(), shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down with {} unspent outputs", ledger.len());
    shutdown.cancel();
    server.await.context("Ledger task failed")??;
    Ok(())
}
