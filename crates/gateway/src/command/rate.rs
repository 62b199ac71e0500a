// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-device token bucket. Unlike the security guard's rate limiter, an exhausted device
//! bucket never drops a command: callers wait for the next refill, trading latency for loss
//! (design note 4.5, "Rate limiting per device").

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct DeviceRateConfig {
    pub burst_size: u64,
    pub tokens_per_interval: u64,
    pub interval: Duration,
}

struct State {
    tokens: u64,
    last_refill: Instant,
}

pub struct DeviceTokenBucket {
    config: DeviceRateConfig,
    state: Mutex<State>,
}

impl DeviceTokenBucket {
    pub fn new(config: DeviceRateConfig) -> Self {
        Self { config, state: Mutex::new(State { tokens: config.burst_size, last_refill: Instant::now() }) }
    }

    fn refill(&self, state: &mut State, now: Instant) {
        let interval_ms = self.config.interval.as_millis().max(1) as u64;
        let elapsed_ms = now.duration_since(state.last_refill).as_millis() as u64;
        let added = (elapsed_ms * self.config.tokens_per_interval) / interval_ms;
        if added > 0 {
            state.tokens = (state.tokens + added).min(self.config.burst_size);
            state.last_refill = now;
        }
    }

    /// Time until at least one token will be available, given the current state.
    fn wait_hint(&self, state: &State) -> Duration {
        if state.tokens >= 1 {
            return Duration::ZERO;
        }
        let interval_ms = self.config.interval.as_millis().max(1) as u64;
        let per_token_ms = interval_ms / self.config.tokens_per_interval.max(1);
        Duration::from_millis(per_token_ms.max(1))
    }

    /// Block until a token is available (sleeping, never dropping), then consume it.
    /// Returns the total time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let hint = {
                let mut state = self.state.lock().await;
                self.refill(&mut state, Instant::now());
                if state.tokens >= 1 {
                    state.tokens -= 1;
                    return waited;
                }
                self.wait_hint(&state)
            };
            tokio::time::sleep(hint).await;
            waited += hint;
        }
    }
}

#[cfg(test)]
#[path = "rate_tests.rs"]
mod tests;
