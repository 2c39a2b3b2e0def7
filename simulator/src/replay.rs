use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use contracts::{validate, validate_state, DeviceRegistry, WsEvent};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

#[derive(Debug, Clone, Args)]
pub struct ReplayConfig {
    /// NDJSON file of events, stdin when omitted
    #[arg(long, env = "REPLAY_INPUT")]
    pub input: Option<PathBuf>,

    /// Fail on the first malformed or invalid line instead of skipping it
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub frames: u64,
    pub telemetry: u64,
    pub snapshots: u64,
    pub skipped: u64,
}

/// Folds a stream of event lines into a registry
pub async fn run_replay<R>(reader: R, strict: bool) -> Result<(DeviceRegistry, ReplayReport)>
where
    R: AsyncBufRead + Unpin,
{
    let mut registry = DeviceRegistry::new();
    let mut report = ReplayReport::default();
    let mut lines = reader.split(b'\n');
    let mut line_no = 0u64;

    while let Some(raw) = lines.next_segment().await? {
        line_no += 1;

        let outcome = match std::str::from_utf8(&raw) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                report.frames += 1;
                apply_frame(&mut registry, &mut report, line, Utc::now())
                    .map_err(anyhow::Error::from)
            }
            Err(e) => {
                report.frames += 1;
                Err(anyhow::Error::from(e).context("invalid UTF-8"))
            }
        };

        if let Err(e) = outcome {
            if strict {
                return Err(e).with_context(|| format!("line {}", line_no));
            }
            warn!("Skipping line {}: {:#}", line_no, e);
            report.skipped += 1;
        }
    }

    Ok((registry, report))
}

fn apply_frame(
    registry: &mut DeviceRegistry,
    report: &mut ReplayReport,
    line: &str,
    received_at: DateTime<Utc>,
) -> contracts::Result<()> {
    match serde_json::from_str::<WsEvent>(line)? {
        WsEvent::Telemetry(telemetry) => {
            validate(&telemetry)?;
            registry.apply(telemetry, received_at);
            report.telemetry += 1;
        }
        WsEvent::Snapshot(states) => {
            // All or nothing
            for state in &states {
                validate_state(state)?;
            }
            for state in states {
                registry.restore(state);
            }
            report.snapshots += 1;
        }
    }
    Ok(())
}
