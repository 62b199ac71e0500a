// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand definitions and dispatch (design note 6: `devices`, `connect`,
//! `disconnect`, `pattern (create|validate)`, `simulate start`, `analyze capture`,
//! `monitor stats`).

pub mod analyze;
pub mod devices;
pub mod monitor;
pub mod pattern;
pub mod simulate;

use crate::client::ClientError;
use crate::ConnectionArgs;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// List registered devices.
    Devices(devices::DevicesArgs),
    /// Connect a device's bound protocol adapter.
    Connect(devices::ConnectArgs),
    /// Disconnect a device's bound protocol adapter.
    Disconnect(devices::DisconnectArgs),
    /// Create or validate a pattern definition.
    Pattern(pattern::PatternArgs),
    /// Drive a local simulated device, standing in for real hardware.
    Simulate(simulate::SimulateArgs),
    /// Read-only telemetry analysis.
    Analyze(analyze::AnalyzeArgs),
    /// Process and telemetry-pipeline monitoring.
    Monitor(monitor::MonitorArgs),
}

impl Command {
    pub async fn run(self, connection: &ConnectionArgs) -> Result<(), ClientError> {
        match self {
            Command::Devices(args) => devices::run_list(args, connection).await,
            Command::Connect(args) => devices::run_connect(args, connection).await,
            Command::Disconnect(args) => devices::run_disconnect(args, connection).await,
            Command::Pattern(args) => pattern::run(args, connection).await,
            Command::Simulate(args) => simulate::run(args, connection).await,
            Command::Analyze(args) => analyze::run(args, connection).await,
            Command::Monitor(args) => monitor::run(args, connection).await,
        }
    }
}
