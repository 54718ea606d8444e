use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use fleetmedic::config::EngineConfig;

#[derive(Parser)]
#[command(
    name = "fleetmedic",
    about = "Fleet-grade vehicle telematics anomaly detection",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the engine: synthetic producer, detectors, log sinks, and the
    /// interactive shell
    Run {
        /// Producer sample rate in readings per second
        #[arg(long, default_value = "20")]
        rate_hz: u64,

        /// Directory for the CSV log sinks
        #[arg(long, default_value = "data")]
        log_dir: PathBuf,

        /// Path to a TOML config file (defaults to FLEETMEDIC_CONFIG or
        /// /etc/fleetmedic/fleetmedic.toml, then compiled-in defaults)
        #[arg(long)]
        config: Option<PathBuf>,
    },
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

    match cli.command {
        Commands::Run {
            rate_hz,
            log_dir,
            config,
        } => {
            let config = EngineConfig::resolve(config.as_deref())?;
            tracing::info!(rate_hz, log_dir = %log_dir.display(), "starting fleetmedic");
            fleetmedic::run(config, rate_hz, &log_dir).await?;
        }
    }

    Ok(())
}
