use anyhow::Result;
use clap::Parser;
use point_ledger::{cli::Cli, config::LedgerConfig, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = LedgerConfig::from_env()?;
    telemetry::init(&config.log).map_err(|err| anyhow::anyhow!(err))?;

    cli.run(config).await
}
