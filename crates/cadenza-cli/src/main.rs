use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use cadenza_etl::Config;

mod commands;

/// Build the songplays star schema from a song catalog and listening
/// events.
///
/// With no flags, runs the whole batch job: reads the catalog and event
/// logs under `input_data`, and publishes the songs, artists, users, time,
/// and songplay tables as partitioned Parquet under `output_data`.
#[derive(Debug, Parser)]
#[command(name = "cadenza", version, about)]
struct Cli {
    /// Path to the config file (default: ~/.config/cadenza/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write an example config file and exit
    #[arg(long, conflicts_with = "show_config")]
    init_config: bool,

    /// Print the effective configuration (secrets redacted) and exit
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.init_config {
        return commands::init_config(cli.config.as_deref());
    }

    let config = Config::load_from(cli.config.as_deref())?;

    if cli.show_config {
        commands::show_config(&config, cli.config.as_deref());
        return Ok(());
    }

    commands::run_batch(&config).await
}
