// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate limiting at three independent scopes (global, connection, user), each choosing one
//! of three algorithms (design note 4.2).

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitAlgorithm {
    FixedWindow,
    SlidingWindow,
    TokenBucket,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub algorithm: RateLimitAlgorithm,
    pub limit: u64,
    pub window: Duration,
    /// Soft-block timeout once a bucket's count exceeds `limit * 1.5`.
    pub soft_block_timeout: Duration,
}

/// Outcome of a single `check` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCheck {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at_ms: u64,
    pub retry_after_s: u64,
}

struct FixedWindowState {
    window_start: Instant,
    count: u64,
}

struct SlidingWindowState {
    count: f64,
    last_request: Instant,
}

struct TokenBucketState {
    tokens: u64,
    last_refill: Instant,
    /// Consecutive denied requests since the bucket last received tokens; the bucket
    /// analog of "count" for the generic soft-block rule below.
    overrun: u64,
}

enum Algo {
    Fixed(FixedWindowState),
    Sliding(SlidingWindowState),
    Bucket(TokenBucketState),
}

struct Entry {
    algo: Algo,
    soft_blocked_until: Option<Instant>,
}

/// One rate limiter instance covering many keyed identifiers (source address, user id,
/// connection id, or the sentinel `"*"` for the global scope) at a single `RateLimiterConfig`.
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: parking_lot::Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self { config, entries: parking_lot::Mutex::new(HashMap::new()) }
    }

    /// Non-blocking, constant-time check-and-increment for `key` (design note 5:
    /// "parsing, validation, queue enqueue, and token-bucket check are all synchronous").
    pub fn check(&self, key: &str) -> RateCheck {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_owned()).or_insert_with(|| Entry {
            algo: self.new_algo(now),
            soft_blocked_until: None,
        });

        if let Some(until) = entry.soft_blocked_until {
            if now < until {
                return RateCheck {
                    allowed: false,
                    remaining: 0,
                    reset_at_ms: instant_to_reset_ms(until, now),
                    retry_after_s: until.saturating_duration_since(now).as_secs().max(1),
                };
            }
            entry.soft_blocked_until = None;
        }

        let (allowed, remaining, reset_at_ms, count_after) = match &mut entry.algo {
            Algo::Fixed(state) => self.check_fixed(state, now),
            Algo::Sliding(state) => self.check_sliding(state, now),
            Algo::Bucket(state) => self.check_bucket(state, now),
        };

        if (count_after as f64) > (self.config.limit as f64 * 1.5) {
            entry.soft_blocked_until = Some(now + self.config.soft_block_timeout);
        }

        RateCheck {
            allowed,
            remaining,
            reset_at_ms,
            retry_after_s: if allowed { 0 } else { self.config.window.as_secs().max(1) },
        }
    }

    /// Clears any soft-block and resets the counter for `key`.
    pub fn reset(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn new_algo(&self, now: Instant) -> Algo {
        match self.config.algorithm {
            RateLimitAlgorithm::FixedWindow => Algo::Fixed(FixedWindowState { window_start: now, count: 0 }),
            RateLimitAlgorithm::SlidingWindow => Algo::Sliding(SlidingWindowState { count: 0.0, last_request: now }),
            RateLimitAlgorithm::TokenBucket => {
                Algo::Bucket(TokenBucketState { tokens: self.config.limit, last_refill: now, overrun: 0 })
            }
        }
    }

    fn check_fixed(&self, state: &mut FixedWindowState, now: Instant) -> (bool, u64, u64, u64) {
        if now.duration_since(state.window_start) >= self.config.window {
            state.window_start = now;
            state.count = 0;
        }
        state.count += 1;
        let allowed = state.count <= self.config.limit;
        let remaining = self.config.limit.saturating_sub(state.count);
        let reset_at_ms = instant_to_reset_ms(state.window_start + self.config.window, now);
        (allowed, remaining, reset_at_ms, state.count)
    }

    fn check_sliding(&self, state: &mut SlidingWindowState, now: Instant) -> (bool, u64, u64, u64) {
        let elapsed = now.duration_since(state.last_request);
        if elapsed > self.config.window {
            state.count = 0.0;
        } else {
            let decay = elapsed.as_secs_f64() / self.config.window.as_secs_f64();
            state.count *= (1.0 - decay).max(0.0);
        }
        state.count += 1.0;
        state.last_request = now;
        let allowed = state.count <= self.config.limit as f64;
        let remaining = (self.config.limit as f64 - state.count).max(0.0) as u64;
        let reset_at_ms = instant_to_reset_ms(now + self.config.window, now);
        (allowed, remaining, reset_at_ms, state.count as u64)
    }

    /// Refills by exactly `floor(elapsed_ms * limit / window_ms)`, capped at `limit`.
    /// `last_refill` only advances when tokens are actually added, so sub-token elapsed
    /// time carries forward instead of being lost. `overrun` counts consecutive denials
    /// since the last refill, so a client hammering an exhausted bucket can still trip
    /// the generic `count_after > limit * 1.5` soft-block below.
    fn check_bucket(&self, state: &mut TokenBucketState, now: Instant) -> (bool, u64, u64, u64) {
        let window_ms = self.config.window.as_millis().max(1) as u64;
        let elapsed_ms = now.duration_since(state.last_refill).as_millis() as u64;
        let added = (elapsed_ms * self.config.limit) / window_ms;
        if added > 0 {
            state.tokens = (state.tokens + added).min(self.config.limit);
            state.last_refill = now;
            state.overrun = 0;
        }

        if state.tokens >= 1 {
            state.tokens -= 1;
            (true, state.tokens, instant_to_reset_ms(now, now), 0)
        } else {
            state.overrun += 1;
            (false, 0, instant_to_reset_ms(now + self.config.window, now), state.overrun)
        }
    }
}

fn instant_to_reset_ms(target: Instant, now: Instant) -> u64 {
    let now_ms = crate::security::token::now_ms();
    now_ms + target.saturating_duration_since(now).as_millis() as u64
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
