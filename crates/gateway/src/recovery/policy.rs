// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-kind recovery strategy and a process-wide, dedup-aware error pipeline.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::recovery::taxonomy::{Category, FaultError, FaultKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
}

/// Recovery policy for one `FaultKind`.
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl RecoveryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = match self.backoff {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Linear => self.initial_delay * attempt.max(1),
            BackoffStrategy::Exponential => {
                self.initial_delay.saturating_mul(1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX))
            }
        };
        let capped = base.min(self.max_delay);
        if self.jitter && self.backoff == BackoffStrategy::Exponential {
            let jitter_frac = rand::rng().random_range(-0.10..=0.10);
            let millis = capped.as_millis() as f64 * (1.0 + jitter_frac);
            Duration::from_millis(millis.max(0.0) as u64)
        } else {
            capped
        }
    }

    fn default_for(kind: FaultKind) -> Self {
        match kind {
            FaultKind::Connection | FaultKind::Timeout | FaultKind::DeviceBusy => Self {
                max_attempts: 3,
                backoff: BackoffStrategy::Exponential,
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(5),
                jitter: true,
            },
            FaultKind::Command | FaultKind::Device => Self {
                max_attempts: 3,
                backoff: BackoffStrategy::Linear,
                initial_delay: Duration::from_millis(50),
                max_delay: Duration::from_secs(2),
                jitter: false,
            },
            _ => Self {
                max_attempts: 1,
                backoff: BackoffStrategy::Fixed,
                initial_delay: Duration::from_millis(0),
                max_delay: Duration::from_millis(0),
                jitter: false,
            },
        }
    }
}

/// Per-kind table of recovery policies, with a dedup window for log storms.
pub struct RecoveryTable {
    policies: HashMap<FaultKind, RecoveryPolicy>,
    error_window: Duration,
    recent: parking_lot::Mutex<HashMap<(FaultKind, String), Instant>>,
}

impl RecoveryTable {
    pub fn new(error_window: Duration) -> Self {
        let mut policies = HashMap::new();
        for kind in [
            FaultKind::Connection,
            FaultKind::Timeout,
            FaultKind::Protocol,
            FaultKind::Device,
            FaultKind::DeviceBusy,
            FaultKind::Command,
            FaultKind::InvalidCommand,
            FaultKind::InvalidResponse,
            FaultKind::Resource,
            FaultKind::Configuration,
            FaultKind::Validation,
            FaultKind::Auth,
            FaultKind::Authorization,
            FaultKind::RateLimit,
            FaultKind::Security,
            FaultKind::Unknown,
        ] {
            policies.insert(kind, RecoveryPolicy::default_for(kind));
        }
        Self { policies, error_window, recent: parking_lot::Mutex::new(HashMap::new()) }
    }

    pub fn set_policy(&mut self, kind: FaultKind, policy: RecoveryPolicy) {
        self.policies.insert(kind, policy);
    }

    pub fn policy_for(&self, kind: FaultKind) -> RecoveryPolicy {
        self.policies.get(&kind).cloned().unwrap_or_else(|| RecoveryPolicy::default_for(kind))
    }

    /// `fatal` category faults skip recovery entirely regardless of kind.
    pub fn should_recover(&self, err: &FaultError) -> bool {
        !matches!(err.category, Category::Fatal)
    }

    /// Returns `true` the first time this `(kind, message)` is seen within `error_window`;
    /// `false` on repeats, so the caller can suppress logging after the first occurrence.
    pub fn should_log(&self, err: &FaultError) -> bool {
        let key = err.dedup_key();
        let now = Instant::now();
        let mut recent = self.recent.lock();
        match recent.get(&key) {
            Some(last) if now.duration_since(*last) < self.error_window => false,
            _ => {
                recent.insert(key, now);
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
