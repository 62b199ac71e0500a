// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gwctl`: the thin, out-of-core operator CLI (design note 6, "CLI surface").
//!
//! Talks to a running `gatewayd` over its HTTP control API only — it never embeds
//! registry, command-processor, or pattern-engine logic. Exit codes: `0` success,
//! `1` handled error, `2` invalid usage (the latter is clap's own exit code for
//! argument-parsing failures).

pub mod client;
pub mod command;

use clap::Parser;

/// Connection details shared by every subcommand.
#[derive(Debug, Clone, clap::Args)]
pub struct ConnectionArgs {
    /// Base URL of the running gatewayd control plane.
    #[arg(long, global = true, default_value = "http://127.0.0.1:7890", env = "GWCTL_GATEWAY_URL")]
    pub gateway_url: String,

    /// Bearer token presented to the gateway's HTTP control endpoints.
    #[arg(long, global = true, env = "GWCTL_TOKEN")]
    pub token: Option<String>,
}

#[derive(Debug, Parser)]
#[command(name = "gwctl", version, about = "Operator CLI for the device control gateway")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: command::Command,
}
