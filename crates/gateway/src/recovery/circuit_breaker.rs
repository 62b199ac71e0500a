// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Three-state circuit breaker wrapping a named call site (design note 4.7).

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::recovery::taxonomy::{Category, FaultError, FaultKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

/// A circuit breaker over one named call site.
///
/// `CLOSED -> OPEN` after `failure_threshold` consecutive failures.
/// `OPEN -> HALF_OPEN` after `recovery_timeout` elapses.
/// `HALF_OPEN -> CLOSED` after `success_threshold` consecutive successes in the half-open
/// probe, else back to `OPEN` on any failure.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    success_threshold: u32,
    recovery_timeout: Duration,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        failure_threshold: u32,
        success_threshold: u32,
        recovery_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            success_threshold,
            recovery_timeout,
            state: AtomicU8::new(BreakerState::Closed.as_u8()),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            opened_at: Mutex::new(None),
        }
    }

    pub fn state(&self) -> BreakerState {
        let current = BreakerState::from_u8(self.state.load(Ordering::Acquire));
        if current == BreakerState::Open {
            let opened_at: Option<Instant> = *self.opened_at.lock();
            let elapsed = opened_at.map(|at| at.elapsed());
            if elapsed.is_some_and(|e| e >= self.recovery_timeout) {
                self.transition(BreakerState::HalfOpen);
                return BreakerState::HalfOpen;
            }
        }
        current
    }

    fn transition(&self, to: BreakerState) {
        self.state.store(to.as_u8(), Ordering::Release);
        match to {
            BreakerState::Open => *self.opened_at.lock() = Some(Instant::now()),
            BreakerState::Closed => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                self.consecutive_successes.store(0, Ordering::Relaxed);
                *self.opened_at.lock() = None;
            }
            BreakerState::HalfOpen => self.consecutive_successes.store(0, Ordering::Relaxed),
        }
    }

    /// Check whether a call may proceed; returns a breaker-open fault if not.
    pub fn guard(&self) -> Result<(), FaultError> {
        match self.state() {
            BreakerState::Open => Err(FaultError::new(
                FaultKind::Resource,
                crate::recovery::taxonomy::Severity::Warning,
                Category::Transient,
                format!("circuit '{}' is open", self.name),
            )),
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
        }
    }

    pub fn record_success(&self) {
        match self.state() {
            BreakerState::HalfOpen => {
                let successes = self.consecutive_successes.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.success_threshold {
                    self.transition(BreakerState::Closed);
                }
            }
            _ => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
            }
        }
    }

    pub fn record_failure(&self) {
        match self.state() {
            BreakerState::HalfOpen => self.transition(BreakerState::Open),
            BreakerState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.failure_threshold {
                    self.transition(BreakerState::Open);
                }
            }
            BreakerState::Open => {}
        }
    }
}

#[cfg(test)]
#[path = "circuit_breaker_tests.rs"]
mod tests;
