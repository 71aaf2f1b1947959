// Copyright (c) 2024 Botho Foundation

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use botho_multiparty::{commands, config, telemetry};

#[derive(Parser)]
#[command(name = "botho-multiparty")]
#[command(about = "Fund and spend jointly owned Botho outputs", long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.botho-multiparty/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move funds into a new joint output with the other owners
    Fund {
        /// Session id, shared by every owner
        #[arg(long)]
        session: Uuid,

        /// Amount for the joint output
        #[arg(long)]
        amount: u64,

        /// Fee, split between the owners
        #[arg(long, default_value_t = 0)]
        fee: u64,

        /// Asset to fund
        #[arg(long, default_value = "bth")]
        asset: String,

        /// Comma-separated owner ids, e.g. 1,2,3
        #[arg(long)]
        owners: String,
    },

    /// Pay a receiver out of a joint output
    Spend {
        /// Session id, shared by every present owner
        #[arg(long)]
        session: Uuid,

        /// Commitment of the joint output to spend (hex)
        #[arg(long)]
        joint_output: String,

        /// Amount for the receiver
        #[arg(long)]
        amount: u64,

        #[arg(long, default_value_t = 0)]
        fee: u64,

        /// Comma-separated ids of the owners taking part
        #[arg(long)]
        present: String,

        /// Base URL of the receiver's endpoints
        #[arg(long)]
        receiver: String,
    },

    /// Answer spends paying this wallet
    Receive {
        /// Stop after the first confirmed receipt
        #[arg(long)]
        once: bool,
    },

    /// Run a development ledger
    Ledger,

    /// Mint an output through a development ledger
    Issue {
        #[arg(long)]
        amount: u64,

        #[arg(long, default_value = "bth")]
        asset: String,
    },

    /// Show wallet outputs
    Status {
        #[arg(long, default_value = "bth")]
        asset: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing(cli.verbose);

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(config::default_config_path);

    match cli.command {
        Commands::Fund {
            session,
            amount,
            fee,
            asset,
            owners,
        } => commands::fund::run(&config_path, session, &asset, amount, fee, &owners).await,
        Commands::Spend {
            session,
            joint_output,
            amount,
            fee,
            present,
            receiver,
        } => {
            commands::spend::run(
                &config_path,
                commands::spend::SpendArgs {
                    session,
                    joint_output: &joint_output,
                    amount,
                    fee,
                    present: &present,
                    receiver: &receiver,
                },
            )
            .await
        }
        Commands::Receive { once } => commands::receive::run(&config_path, once).await,
        Commands::Ledger => commands::ledger::run(&config_path).await,
        Commands::Issue { amount, asset } => {
            commands::issue::run(&config_path, &asset, amount).await
        }
        Commands::Status { asset } => commands::status::run(&config_path, &asset),
    }
}
