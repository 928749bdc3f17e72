//! # hongbao
//!
//! Randomized token distribution to the holders of a collection.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod holders;
mod run;

use config::RunParams;

#[derive(Debug, Parser)]
#[command(name = "hongbao", about = "Randomized token distribution")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "hongbao.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a fixed amount to every mapped destination whose source is a
    /// current holder. Used to confirm an override table before a real run.
    VerifyMapping {
        /// Per-destination amount, decimal tokens.
        #[arg(long)]
        amount: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let params = RunParams::load(&cli.config)?;

    match cli.command {
        Some(Command::VerifyMapping { amount }) => run::verify_mapping(&params, &amount).await,
        None => run::run_airdrop(&params).await,
    }
}
