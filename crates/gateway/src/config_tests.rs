// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

#[derive(Parser)]
struct Wrapper {
    #[command(flatten)]
    config: GatewayConfig,
}

fn parse(args: &[&str]) -> GatewayConfig {
    Wrapper::parse_from(std::iter::once("gatewayd").chain(args.iter().copied())).config
}

#[test]
fn defaults_are_sane() {
    let config = parse(&[]);
    assert_eq!(config.port, 7890);
    assert_eq!(config.max_concurrent_sessions, 256);
    assert!(!config.encryption_enabled);
}

#[test]
fn duration_helpers_convert_units() {
    let config = parse(&["--retention-days", "7"]);
    assert_eq!(config.retention(), std::time::Duration::from_secs(7 * 86_400));
}

#[test]
fn flags_override_defaults() {
    let config = parse(&["--port", "9000", "--max-concurrent-sessions", "10"]);
    assert_eq!(config.port, 9000);
    assert_eq!(config.max_concurrent_sessions, 10);
}
