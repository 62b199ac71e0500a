// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device record data model (design note 3).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub type DeviceId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Unknown,
    Offline,
    Online,
    Error,
    Disabled,
    Maintenance,
}

/// Per-device policy, configurable at admission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub intensity_cap: u8,
    pub allowed_patterns: HashSet<String>,
    pub cooldown_ms: u64,
    pub max_session_duration_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub auto_connect: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            intensity_cap: 100,
            allowed_patterns: HashSet::new(),
            cooldown_ms: 0,
            max_session_duration_ms: None,
            auto_connect: true,
        }
    }
}

impl DeviceConfig {
    /// A pattern reference is allowed if the set is empty (no restriction), the set contains
    /// it, or it is the always-allowed `"constant"` generator (design note 8, invariant 1).
    pub fn allows_pattern(&self, pattern_ref: Option<&str>) -> bool {
        match pattern_ref {
            None => true,
            Some("constant") => true,
            Some(p) => self.allowed_patterns.is_empty() || self.allowed_patterns.contains(p),
        }
    }
}

/// Firmware version triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firmware {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

/// A device's stable record, owned exclusively by the registry (design note 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub kind: String,
    pub protocol: String,
    pub address: String,
    pub capabilities: HashSet<String>,
    pub firmware: Firmware,
    pub status: DeviceStatus,
    pub last_seen_ms: u64,
    pub error_count: u32,
    pub config: DeviceConfig,
    pub enabled: bool,
    pub last_connected_ms: Option<u64>,
}

/// Fields supplied by a caller admitting or updating a device; `last_connected`,
/// `error_count`, and `enabled` are preserved from any existing record (design note 4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub kind: String,
    pub protocol: String,
    pub address: String,
    pub capabilities: HashSet<String>,
    #[serde(default)]
    pub firmware: Firmware,
}

impl DeviceRecord {
    pub fn new(info: DeviceInfo, config: DeviceConfig, now_ms: u64) -> Self {
        Self {
            id: info.id,
            kind: info.kind,
            protocol: info.protocol,
            address: info.address,
            capabilities: info.capabilities,
            firmware: info.firmware,
            status: DeviceStatus::Unknown,
            last_seen_ms: now_ms,
            error_count: 0,
            config,
            enabled: true,
            last_connected_ms: None,
        }
    }

    pub fn has_capability(&self, token: &str) -> bool {
        self.capabilities.contains(token)
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
