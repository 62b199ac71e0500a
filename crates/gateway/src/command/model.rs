// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command data model (design note 3, "Command").

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Vibrate,
    Rotate,
    Position,
    PatternStart,
    PatternStop,
    Stop,
}

/// An opaque-to-core command envelope destined for exactly one device (design note 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub device_id: String,
    pub kind: CommandKind,
    pub intensity: u8,
    #[serde(default)]
    pub pattern_ref: Option<String>,
    #[serde(default)]
    pub pattern_params: Option<Value>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    pub priority: Priority,
    /// Monotonic per-session sequence number, used for de-duplication of replays within
    /// the recovery window (design note 3).
    pub session_seq: u64,
    pub session_id: String,
    #[serde(default)]
    pub attempt: u32,
    pub enqueued_at_ms: u64,
}

impl Command {
    /// `(kind, pattern_ref)` key used by the command processor's batch-level dedup
    /// (design note 4.5).
    pub fn dedup_key(&self) -> (CommandKind, Option<String>) {
        (self.kind, self.pattern_ref.clone())
    }

    pub fn is_stale(&self, now_ms: u64, max_age_ms: u64) -> bool {
        now_ms.saturating_sub(self.enqueued_at_ms) > max_age_ms
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
