// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn constant_pattern_always_allowed() {
    let config = DeviceConfig { allowed_patterns: ["wave".to_owned()].into(), ..Default::default() };
    assert!(config.allows_pattern(Some("constant")));
    assert!(config.allows_pattern(None));
    assert!(config.allows_pattern(Some("wave")));
    assert!(!config.allows_pattern(Some("pulse")));
}

#[test]
fn empty_allow_list_permits_anything() {
    let config = DeviceConfig::default();
    assert!(config.allows_pattern(Some("anything")));
}

#[test]
fn new_record_starts_unknown_and_enabled() {
    let info = DeviceInfo {
        id: "dev-1".into(),
        kind: "stroke-controller".into(),
        protocol: "duplex-stream".into(),
        address: "tcp://127.0.0.1:9000".into(),
        capabilities: ["vibrate".to_owned()].into(),
        firmware: Firmware::default(),
    };
    let record = DeviceRecord::new(info, DeviceConfig::default(), 1000);
    assert_eq!(record.status, DeviceStatus::Unknown);
    assert!(record.enabled);
    assert_eq!(record.error_count, 0);
    assert!(record.has_capability("vibrate"));
}
