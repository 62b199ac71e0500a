// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gwctl simulate start` (design note 6). Registers a loopback device against a
//! running gateway so the rest of the CLI and a developer's own test client have
//! something to exercise without real hardware; the wire details of physical device
//! families are explicitly out of scope (design note 1).

use serde_json::json;
use uuid::Uuid;

use crate::client::{ClientError, GatewayClient};
use crate::ConnectionArgs;

#[derive(Debug, clap::Args)]
pub struct SimulateArgs {
    #[command(subcommand)]
    pub action: SimulateAction,
}

#[derive(Debug, clap::Subcommand)]
pub enum SimulateAction {
    /// Register (and attempt to connect) a simulated device.
    Start(StartArgs),
}

#[derive(Debug, clap::Args)]
pub struct StartArgs {
    /// Device identifier; a random one is generated when omitted.
    #[arg(long)]
    pub id: Option<String>,
    /// Device kind token (design note 3: `stroke-controller`, `haptic-controller`, ...).
    #[arg(long, default_value = "generic-vibrator")]
    pub kind: String,
    /// Protocol tag the adapter factory is keyed on.
    #[arg(long, default_value = "duplex-stream")]
    pub protocol: String,
    /// Wire address the adapter connects to.
    #[arg(long, default_value = "ws://127.0.0.1:7999/simulated")]
    pub address: String,
    /// Comma-separated capability tokens.
    #[arg(long, default_value = "vibrate")]
    pub capabilities: String,
    /// Skip the connect attempt after registration.
    #[arg(long)]
    pub no_connect: bool,
}

pub async fn run(args: SimulateArgs, connection: &ConnectionArgs) -> Result<(), ClientError> {
    let SimulateAction::Start(start) = args.action;
    let client = GatewayClient::new(connection);

    let id = start.id.clone().unwrap_or_else(|| format!("sim-{}", Uuid::new_v4()));
    let capabilities: Vec<&str> = start.capabilities.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();

    let record = client
        .register_device(json!({
            "id": id,
            "kind": start.kind,
            "protocol": start.protocol,
            "address": start.address,
            "capabilities": capabilities,
        }))
        .await?;
    println!("registered: {}", serde_json::to_string_pretty(&record).unwrap_or_default());

    if !start.no_connect {
        match client.connect_device(&id).await {
            Ok(status) => println!("connect: {}", serde_json::to_string_pretty(&status).unwrap_or_default()),
            Err(e) => println!("connect failed (device remains registered): {e}"),
        }
    }
    Ok(())
}
