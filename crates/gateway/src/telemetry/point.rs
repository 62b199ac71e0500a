// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry point data model (design note 3, "Telemetry point").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The subsystem a point originated from; also the collection/partition key alongside
/// `source` and `timestamp_ms` (design note 6, "Persisted records").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    Command,
    Device,
    Session,
    Security,
    Pattern,
    Meta,
}

/// `(kind, source, timestamp_ms, values_by_name, optional_context)` (design note 3).
/// Stored append-only; producers never mutate a point once tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPoint {
    pub kind: TelemetryKind,
    pub source: String,
    pub timestamp_ms: u64,
    pub values: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl TelemetryPoint {
    pub fn new(kind: TelemetryKind, source: impl Into<String>, timestamp_ms: u64) -> Self {
        Self { kind, source: source.into(), timestamp_ms, values: HashMap::new(), context: None }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

#[cfg(test)]
#[path = "point_tests.rs"]
mod tests;
