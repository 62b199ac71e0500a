// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gwctl monitor stats` (design note 6).

use crate::client::{ClientError, GatewayClient};
use crate::ConnectionArgs;

#[derive(Debug, clap::Args)]
pub struct MonitorArgs {
    #[command(subcommand)]
    pub action: MonitorAction,
}

#[derive(Debug, clap::Subcommand)]
pub enum MonitorAction {
    /// Print a snapshot of session, device, and telemetry-pipeline counts.
    Stats,
}

pub async fn run(args: MonitorArgs, connection: &ConnectionArgs) -> Result<(), ClientError> {
    let MonitorAction::Stats = args.action;
    let client = GatewayClient::new(connection);
    let stats = client.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());
    Ok(())
}
