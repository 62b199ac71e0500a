// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Security-event and threat observability: every admission decision produces an event;
//! threats are retained in-memory with auto-expiry for non-critical kinds (design note 4.2).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    BruteForce,
    Ddos,
    RateLimit,
    SuspiciousPattern,
    UnauthorizedAccess,
}

impl ThreatKind {
    /// Only `BruteForce` and `Ddos` are treated as critical; critical threats never expire
    /// automatically, the rest are swept on the security guard's sweep cadence.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::BruteForce | Self::Ddos)
    }
}

/// A retained threat record.
#[derive(Debug, Clone)]
pub struct Threat {
    pub kind: ThreatKind,
    pub source: String,
    pub detail: String,
    pub created_at: Instant,
    pub expires_at: Option<Instant>,
}

/// One admission or authorization decision, kept for short-term observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub source: String,
    pub action: String,
    pub allowed: bool,
    pub reason: Option<String>,
    pub timestamp_ms: u64,
}

/// Bounded ring of security events plus a threat table with auto-expiry, shared by every
/// [`super::guard::SecurityGuard`] instance (design note 4.2).
pub struct ThreatLog {
    events: parking_lot::Mutex<VecDeque<SecurityEvent>>,
    events_capacity: usize,
    threats: parking_lot::Mutex<Vec<Threat>>,
}

impl ThreatLog {
    pub fn new(events_capacity: usize) -> Self {
        Self {
            events: parking_lot::Mutex::new(VecDeque::with_capacity(events_capacity)),
            events_capacity,
            threats: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn record_event(&self, event: SecurityEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.events_capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn recent_events(&self, limit: usize) -> Vec<SecurityEvent> {
        self.events.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Create a threat record. Non-critical kinds expire after `ttl`; critical kinds are
    /// retained until an explicit sweep removes them or the process restarts.
    pub fn raise(&self, kind: ThreatKind, source: impl Into<String>, detail: impl Into<String>, ttl: Duration) {
        let now = Instant::now();
        let expires_at = if kind.is_critical() { None } else { Some(now + ttl) };
        self.threats.lock().push(Threat { kind, source: source.into(), detail: detail.into(), created_at: now, expires_at });
    }

    pub fn threats(&self) -> Vec<Threat> {
        self.threats.lock().clone()
    }

    /// Drop expired non-critical threats. Run on the same sweep cadence as the registry's
    /// lifecycle sweep.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.threats.lock().retain(|t| t.expires_at.is_none_or(|at| at > now));
    }
}

#[cfg(test)]
#[path = "threat_tests.rs"]
mod tests;
