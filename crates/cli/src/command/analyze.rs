// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gwctl analyze capture` (design note 6). A read-only consumer of the telemetry
//! pipeline's `/api/v1/stats` snapshot (design note 1: "analytics aggregation" is an
//! external, read-only collaborator, not core gateway logic).

use std::path::PathBuf;
use std::time::Duration;

use crate::client::{ClientError, GatewayClient};
use crate::ConnectionArgs;

#[derive(Debug, clap::Args)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub action: AnalyzeAction,
}

#[derive(Debug, clap::Subcommand)]
pub enum AnalyzeAction {
    /// Poll gateway stats at a fixed interval and write one JSON object per line.
    Capture(CaptureArgs),
}

#[derive(Debug, clap::Args)]
pub struct CaptureArgs {
    /// Number of samples to capture.
    #[arg(long, default_value_t = 10)]
    pub samples: u32,
    /// Milliseconds between samples.
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,
    /// Write JSON lines here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub async fn run(args: AnalyzeArgs, connection: &ConnectionArgs) -> Result<(), ClientError> {
    let AnalyzeAction::Capture(capture) = args.action;
    let client = GatewayClient::new(connection);

    let mut lines = Vec::with_capacity(capture.samples as usize);
    for i in 0..capture.samples {
        let stats = client.stats().await?;
        lines.push(serde_json::to_string(&stats).unwrap_or_default());
        if i + 1 < capture.samples {
            tokio::time::sleep(Duration::from_millis(capture.interval_ms)).await;
        }
    }

    let rendered = lines.join("\n");
    match &capture.out {
        Some(path) => {
            std::fs::write(path, format!("{rendered}\n")).map_err(|e| ClientError::new(format!("writing {}: {e}", path.display())))?;
            println!("captured {} samples to {}", capture.samples, path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
