use crate::frame::write_frame;
use crate::telemetry::Fleet;
use anyhow::{ensure, Result};
use chrono::Utc;
use clap::Args;
use contracts::{DeviceRegistry, WsEvent};
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

const PROGRESS_EVERY: u64 = 1000;

#[derive(Debug, Clone, Args)]
pub struct GenerateConfig {
    /// Number of simulated devices
    #[arg(long, env = "DEVICES", default_value_t = 3)]
    pub devices: usize,

    /// Device ids are `<prefix>-001`, `<prefix>-002`, ...
    #[arg(long, env = "DEVICE_PREFIX", default_value = "gate")]
    pub device_prefix: String,

    /// Telemetry events to emit, 0 for no limit
    #[arg(long, env = "COUNT", default_value_t = 0)]
    pub count: u64,

    /// Pause after each round over all devices, 0 to disable
    #[arg(long, env = "INTERVAL_MS", default_value_t = 1000)]
    pub interval_ms: u64,

    /// Emit a snapshot after every N telemetry events, 0 to disable
    #[arg(long, env = "SNAPSHOT_EVERY", default_value_t = 0)]
    pub snapshot_every: u64,

    /// Seed for reproducible output
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    pub telemetry: u64,
    pub snapshots: u64,
}

/// Emits telemetry frames for the simulated fleet until `count` is reached
pub async fn run_generate<W, R>(
    config: &GenerateConfig,
    rng: &mut R,
    out: &mut W,
) -> Result<GenerateReport>
where
    W: AsyncWrite + Unpin,
    R: Rng,
{
    ensure!(config.devices > 0, "at least one device is required");

    let mut fleet = Fleet::new(&config.device_prefix, config.devices, rng);
    let mut registry = DeviceRegistry::new();
    let mut report = GenerateReport::default();
    let interval = Duration::from_millis(config.interval_ms);

    info!(
        "Simulating {} devices, interval {:?}, limit {}",
        fleet.len(),
        interval,
        if config.count == 0 { "none".to_string() } else { config.count.to_string() }
    );

    'rounds: loop {
        let round_start = Instant::now();

        for device in fleet.devices_mut() {
            if config.count > 0 && report.telemetry >= config.count {
                break 'rounds;
            }

            let telemetry = device.next_reading(rng, Utc::now());
            debug!("{} => {:?}", telemetry.device_id, telemetry.metrics);
            registry.apply(telemetry.clone(), Utc::now());
            write_frame(out, &WsEvent::Telemetry(telemetry)).await?;
            report.telemetry += 1;

            if config.snapshot_every > 0 && report.telemetry % config.snapshot_every == 0 {
                write_frame(out, &registry.snapshot()).await?;
                report.snapshots += 1;
            }

            if report.telemetry % PROGRESS_EVERY == 0 {
                info!("Emitted {} telemetry events", report.telemetry);
            }
        }

        out.flush().await?;

        if interval.is_zero() {
            continue;
        }
        let elapsed = round_start.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        } else {
            warn!("Round took {:?}, target was {:?}", elapsed, interval);
        }
    }

    out.flush().await?;
    Ok(report)
}
