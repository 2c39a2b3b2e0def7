mod frame;
mod generate;
mod replay;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use generate::GenerateConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use replay::ReplayConfig;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Produces and consumes device telemetry event streams
#[derive(Debug, Parser)]
#[command(name = "simulator", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Emit simulated telemetry as newline-delimited JSON events on stdout
    Generate(GenerateConfig),
    /// Fold an event stream into device states and print the final snapshot
    Replay(ReplayConfig),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging, stdout carries the event stream
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Generate(config) => generate(config).await,
        Command::Replay(config) => replay(config).await,
    }
}

async fn generate(config: GenerateConfig) -> Result<()> {
    info!("Starting telemetry simulator");

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut stdout = tokio::io::stdout();

    tokio::select! {
        result = generate::run_generate(&config, &mut rng, &mut stdout) => {
            let report = result?;
            info!(
                "Emitted {} telemetry events and {} snapshots",
                report.telemetry, report.snapshots
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    stdout.flush().await?;
    Ok(())
}

async fn replay(config: ReplayConfig) -> Result<()> {
    let (registry, report) = match &config.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            replay::run_replay(BufReader::new(file), config.strict).await?
        }
        None => replay::run_replay(BufReader::new(tokio::io::stdin()), config.strict).await?,
    };

    info!(
        "Replayed {} frames: {} telemetry, {} snapshots, {} skipped, {} devices",
        report.frames,
        report.telemetry,
        report.snapshots,
        report.skipped,
        registry.len()
    );

    let mut stdout = tokio::io::stdout();
    frame::write_frame(&mut stdout, &registry.snapshot()).await?;
    stdout.flush().await?;
    Ok(())
}
