// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gwctl devices` / `gwctl connect` / `gwctl disconnect` (design note 6).

use crate::client::{ClientError, GatewayClient};
use crate::ConnectionArgs;

#[derive(Debug, clap::Args)]
pub struct DevicesArgs {
    /// Print the raw JSON device records instead of a summary table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, clap::Args)]
pub struct ConnectArgs {
    /// Device identifier.
    pub id: String,
}

#[derive(Debug, clap::Args)]
pub struct DisconnectArgs {
    /// Device identifier.
    pub id: String,
}

pub async fn run_list(args: DevicesArgs, connection: &ConnectionArgs) -> Result<(), ClientError> {
    let client = GatewayClient::new(connection);
    let devices = client.list_devices().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&devices).unwrap_or_default());
        return Ok(());
    }

    let rows = devices.as_array().cloned().unwrap_or_default();
    if rows.is_empty() {
        println!("no devices registered");
        return Ok(());
    }

    println!("{:<20} {:<22} {:<12} {:<10}", "ID", "KIND", "PROTOCOL", "STATUS");
    for row in rows {
        let id = row.get("id").and_then(|v| v.as_str()).unwrap_or("-");
        let kind = row.get("kind").and_then(|v| v.as_str()).unwrap_or("-");
        let protocol = row.get("protocol").and_then(|v| v.as_str()).unwrap_or("-");
        let status = row.get("status").and_then(|v| v.as_str()).unwrap_or("-");
        println!("{id:<20} {kind:<22} {protocol:<12} {status:<10}");
    }
    Ok(())
}

pub async fn run_connect(args: ConnectArgs, connection: &ConnectionArgs) -> Result<(), ClientError> {
    let client = GatewayClient::new(connection);
    let result = client.connect_device(&args.id).await?;
    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
    Ok(())
}

pub async fn run_disconnect(args: DisconnectArgs, connection: &ConnectionArgs) -> Result<(), ClientError> {
    let client = GatewayClient::new(connection);
    let result = client.disconnect_device(&args.id).await?;
    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
    Ok(())
}
