use clap::Parser;

use turn_relay::{config::RelayConfig, server};

#[derive(Debug, Parser)]
struct Args {
    /// Path to the relay YAML config.
    #[arg(long)]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::info!(config = %args.config, "starting");

    let cfg_bytes = tokio::fs::read(&args.config).await?;
    let cfg = RelayConfig::from_yaml_bytes(&cfg_bytes)?;

    server::run(cfg).await
}
