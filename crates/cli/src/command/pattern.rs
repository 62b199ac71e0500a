// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gwctl pattern create|validate` (design note 6). Pattern JSON mirrors the wire shape
//! of `gateway::pattern::model::Pattern` (the `kind`-tagged enum); this crate does not
//! depend on the gateway library, so the shape is reconstructed here from flags.

use std::path::PathBuf;

use serde_json::{json, Value};

use crate::client::{ClientError, GatewayClient};
use crate::ConnectionArgs;

#[derive(Debug, clap::Args)]
pub struct PatternArgs {
    #[command(subcommand)]
    pub action: PatternAction,
}

#[derive(Debug, clap::Subcommand)]
pub enum PatternAction {
    /// Build a pattern definition from flags and write it as JSON.
    Create(CreateArgs),
    /// Submit a pattern definition file to the gateway for validation.
    Validate(ValidateArgs),
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum PatternKind {
    Constant,
    Wave,
    Ramp,
    Pulse,
    Escalation,
}

#[derive(Debug, clap::Args)]
pub struct CreateArgs {
    /// Generator shape.
    #[arg(long, value_enum)]
    pub kind: PatternKind,
    /// Minimum intensity (`wave`), start (`ramp`), or low (`pulse`), in `[0, 100]`.
    #[arg(long, default_value_t = 0)]
    pub min: u8,
    /// Maximum intensity (`wave`), end (`ramp`), or high (`pulse`), in `[0, 100]`.
    #[arg(long, default_value_t = 100)]
    pub max: u8,
    /// Period/duration in milliseconds, meaning depends on `kind`.
    #[arg(long, default_value_t = 1000)]
    pub duration_ms: u64,
    /// Escalation step size; ignored for other kinds.
    #[arg(long, default_value_t = 5)]
    pub step: u8,
    /// Write the pattern JSON to this file instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

fn build_pattern(args: &CreateArgs) -> Value {
    match args.kind {
        PatternKind::Constant => json!({ "kind": "constant", "intensity": args.max }),
        PatternKind::Wave => json!({ "kind": "wave", "min": args.min, "max": args.max, "period_ms": args.duration_ms }),
        PatternKind::Ramp => json!({ "kind": "ramp", "start": args.min, "end": args.max, "duration_ms": args.duration_ms }),
        PatternKind::Pulse => {
            json!({ "kind": "pulse", "high": args.max, "low": args.min, "on_ms": args.duration_ms, "off_ms": args.duration_ms })
        }
        PatternKind::Escalation => {
            json!({ "kind": "escalation", "start": args.min, "step": args.step, "step_ms": args.duration_ms, "max": args.max })
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct ValidateArgs {
    /// Path to a pattern JSON file.
    pub path: PathBuf,
}

pub async fn run(args: PatternArgs, connection: &ConnectionArgs) -> Result<(), ClientError> {
    match args.action {
        PatternAction::Create(create) => run_create(create),
        PatternAction::Validate(validate) => run_validate(validate, connection).await,
    }
}

fn run_create(args: CreateArgs) -> Result<(), ClientError> {
    let pattern = build_pattern(&args);
    let rendered = serde_json::to_string_pretty(&pattern).unwrap_or_default();
    match &args.out {
        Some(path) => {
            std::fs::write(path, &rendered).map_err(|e| ClientError::new(format!("writing {}: {e}", path.display())))?;
            println!("wrote {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

async fn run_validate(args: ValidateArgs, connection: &ConnectionArgs) -> Result<(), ClientError> {
    let contents = std::fs::read_to_string(&args.path).map_err(|e| ClientError::new(format!("reading {}: {e}", args.path.display())))?;
    let pattern: Value = serde_json::from_str(&contents).map_err(|e| ClientError::new(format!("parsing {}: {e}", args.path.display())))?;

    let client = GatewayClient::new(connection);
    let result = client.validate_pattern(pattern).await?;
    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
    Ok(())
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
