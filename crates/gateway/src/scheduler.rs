// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Central scheduler: cancellable sleeps, cancellable interval tasks, and deadlines.
//!
//! Every timer in the gateway (ping, batch, alert, retention, pattern tick) goes through
//! here so cancellation composes the way design note 5 requires: a session close fires
//! the cancellation signal for every operation the session initiated, and in-flight work
//! either drains or is discarded, never left to run unbounded.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// An absolute deadline plus the cancellation signal that should abort work early.
#[derive(Clone)]
pub struct Deadline {
    pub at: Instant,
    pub cancel: CancellationToken,
}

impl Deadline {
    pub fn after(duration: Duration, cancel: CancellationToken) -> Self {
        Self { at: Instant::now() + duration, cancel }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Outcome of a deadline-guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineOutcome<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

/// Central scheduler facade. Stateless beyond the shutdown token it is built from; every
/// spawned task is independently cancellable via the token passed to it.
#[derive(Clone)]
pub struct Scheduler {
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }

    /// A child token that is cancelled when either the scheduler shuts down or the caller
    /// cancels it directly.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Sleep for `duration`, returning early if `cancel` fires. Returns `true` if the sleep
    /// completed, `false` if it was cancelled.
    pub async fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = cancel.cancelled() => false,
        }
    }

    /// Race a future against a deadline, yielding whichever resolves first.
    pub async fn run_with_deadline<F, T>(&self, deadline: Deadline, fut: F) -> DeadlineOutcome<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            out = fut => DeadlineOutcome::Completed(out),
            _ = tokio::time::sleep(deadline.remaining()) => DeadlineOutcome::TimedOut,
            _ = deadline.cancel.cancelled() => DeadlineOutcome::Cancelled,
        }
    }

    /// Spawn a cancellable periodic task. `f` is called once per tick until `cancel` fires
    /// (or the scheduler shuts down). Missed ticks are skipped rather than bursting.
    pub fn spawn_interval<F, Fut>(&self, period: Duration, cancel: CancellationToken, mut f: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = cancel.cancelled() => break,
                    _ = timer.tick() => {}
                }
                f().await;
            }
        });
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
