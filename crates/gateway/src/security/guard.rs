// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The security guard: one value holding every piece of process-wide security state
//! (rate-limit buckets, blacklists, keyring, threat log) behind a single shared lock
//! released around every I/O call (design note 5, "Shared state and mutation").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::security::encryption::{CipherEnvelope, EncryptionError, KeyRing};
use crate::security::rate_limit::{RateCheck, RateLimitAlgorithm, RateLimiter, RateLimiterConfig};
use crate::security::threat::{SecurityEvent, ThreatKind, ThreatLog};
use crate::security::token::{Principal, TokenVerifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    Blacklisted,
    AuthFailed,
    Capacity,
}

/// Configuration for the three rate-limit scopes plus brute-force/DDoS thresholds
/// (design note 4.2; defaults sourced from [`crate::config::GatewayConfig`]).
pub struct SecurityGuardConfig {
    pub global: RateLimiterConfig,
    pub connection: RateLimiterConfig,
    pub user: RateLimiterConfig,
    pub failed_login_threshold: u32,
    pub blacklist_window: Duration,
    pub blacklist_duration: Duration,
    pub connection_limit: u32,
    pub connection_window: Duration,
    pub threat_ttl: Duration,
}

impl Default for SecurityGuardConfig {
    fn default() -> Self {
        let base = RateLimiterConfig {
            algorithm: RateLimitAlgorithm::SlidingWindow,
            limit: 1000,
            window: Duration::from_secs(60),
            soft_block_timeout: Duration::from_secs(30),
        };
        Self {
            global: base,
            connection: RateLimiterConfig { limit: 100, ..base },
            user: RateLimiterConfig { limit: 200, ..base },
            failed_login_threshold: 5,
            blacklist_window: Duration::from_secs(60),
            blacklist_duration: Duration::from_secs(3600),
            connection_limit: 20,
            connection_window: Duration::from_secs(10),
            threat_ttl: Duration::from_secs(600),
        }
    }
}

struct FailedAttempts {
    count: u32,
    window_start: Instant,
}

struct ConnectionCount {
    count: u32,
    window_start: Instant,
}

struct Blacklist {
    until: Instant,
}

/// Owns every piece of guarded security state. Constructed once at process startup and
/// shared behind an `Arc` (design note 9, "Singletons -> explicit dependency injection").
pub struct SecurityGuard {
    config: SecurityGuardConfig,
    verifier: Arc<dyn TokenVerifier>,
    global_limiter: RateLimiter,
    connection_limiter: RateLimiter,
    user_limiter: RateLimiter,
    failed_attempts: parking_lot::Mutex<HashMap<String, FailedAttempts>>,
    blacklist: parking_lot::Mutex<HashMap<String, Blacklist>>,
    connection_counts: parking_lot::Mutex<HashMap<String, ConnectionCount>>,
    pub threats: ThreatLog,
    pub keyring: Option<KeyRing>,
}

impl SecurityGuard {
    pub fn new(config: SecurityGuardConfig, verifier: Arc<dyn TokenVerifier>, keyring: Option<KeyRing>) -> Self {
        Self {
            global_limiter: RateLimiter::new(config.global),
            connection_limiter: RateLimiter::new(config.connection),
            user_limiter: RateLimiter::new(config.user),
            failed_attempts: parking_lot::Mutex::new(HashMap::new()),
            blacklist: parking_lot::Mutex::new(HashMap::new()),
            connection_counts: parking_lot::Mutex::new(HashMap::new()),
            threats: ThreatLog::new(1024),
            keyring,
            config,
            verifier,
        }
    }

    /// Synchronous rejection for blacklisted sources, checked before any credential
    /// verification work (design note 4.2).
    pub fn is_blacklisted(&self, source_addr: &str) -> bool {
        let now = Instant::now();
        let blacklist = self.blacklist.lock();
        blacklist.get(source_addr).is_some_and(|b| b.until > now)
    }

    /// Per-source DDoS connection counting; call once per accepted transport before
    /// authentication begins.
    pub fn admit_connection(&self, source_addr: &str) -> Result<(), AdmissionError> {
        if self.is_blacklisted(source_addr) {
            self.threats.record_event(SecurityEvent {
                source: source_addr.to_owned(),
                action: "connect".into(),
                allowed: false,
                reason: Some("blacklisted".into()),
                timestamp_ms: now_ms(),
            });
            return Err(AdmissionError::Blacklisted);
        }

        let now = Instant::now();
        let mut counts = self.connection_counts.lock();
        let entry = counts.entry(source_addr.to_owned()).or_insert_with(|| ConnectionCount { count: 0, window_start: now });
        if now.duration_since(entry.window_start) > self.config.connection_window {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count += 1;
        let count = entry.count;

        if count > self.config.connection_limit {
            drop(counts);
            self.blacklist.lock().insert(
                source_addr.to_owned(),
                Blacklist { until: now + self.config.connection_window },
            );
            self.threats.raise(
                ThreatKind::Ddos,
                source_addr,
                format!("{count} connections within {:?}", self.config.connection_window),
                self.config.connection_window,
            );
            return Err(AdmissionError::Blacklisted);
        }

        Ok(())
    }

    /// Verify a session token and fold the outcome into the brute-force counter. On success
    /// the failed-attempt counter for `source_addr` is cleared.
    pub fn authenticate(&self, source_addr: &str, token: &str) -> Result<Principal, AdmissionError> {
        if self.is_blacklisted(source_addr) {
            return Err(AdmissionError::Blacklisted);
        }

        match self.verifier.verify(token, now_ms()) {
            Ok(principal) => {
                self.failed_attempts.lock().remove(source_addr);
                self.threats.record_event(SecurityEvent {
                    source: source_addr.to_owned(),
                    action: "authenticate".into(),
                    allowed: true,
                    reason: None,
                    timestamp_ms: now_ms(),
                });
                Ok(principal)
            }
            Err(e) => {
                self.record_failed_login(source_addr);
                self.threats.record_event(SecurityEvent {
                    source: source_addr.to_owned(),
                    action: "authenticate".into(),
                    allowed: false,
                    reason: Some(e.message.clone()),
                    timestamp_ms: now_ms(),
                });
                Err(AdmissionError::AuthFailed)
            }
        }
    }

    fn record_failed_login(&self, source_addr: &str) {
        let now = Instant::now();
        let mut attempts = self.failed_attempts.lock();
        let entry = attempts.entry(source_addr.to_owned()).or_insert_with(|| FailedAttempts { count: 0, window_start: now });
        if now.duration_since(entry.window_start) > self.config.blacklist_window {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count += 1;

        if entry.count >= self.config.failed_login_threshold {
            let until = now + self.config.blacklist_duration;
            drop(attempts);
            self.blacklist.lock().insert(source_addr.to_owned(), Blacklist { until });
            self.threats.raise(
                ThreatKind::BruteForce,
                source_addr,
                format!("{} failed logins within {:?}", self.config.failed_login_threshold, self.config.blacklist_window),
                self.config.blacklist_duration,
            );
        }
    }

    /// Rate-limit check at one of the three scopes. Returns the raw [`RateCheck`] so callers
    /// can surface `retry_after_s`.
    pub fn check_rate(&self, scope: RateScope, key: &str) -> RateCheck {
        let check = match scope {
            RateScope::Global => self.global_limiter.check(key),
            RateScope::Connection => self.connection_limiter.check(key),
            RateScope::User => self.user_limiter.check(key),
        };
        if !check.allowed {
            self.threats.raise(ThreatKind::RateLimit, key, format!("{scope:?} scope exceeded"), self.config.threat_ttl);
        }
        check
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Option<CipherEnvelope>, EncryptionError> {
        match &self.keyring {
            Some(ring) => ring.encrypt(plaintext).map(Some),
            None => Ok(None),
        }
    }

    pub fn decrypt(&self, envelope: &CipherEnvelope) -> Result<Vec<u8>, EncryptionError> {
        match &self.keyring {
            Some(ring) => ring.decrypt(envelope),
            None => Err(EncryptionError::Internal),
        }
    }

    /// Periodic sweep: expire stale blacklist entries and non-critical threats. Run on the
    /// same cadence as the registry's lifecycle sweep.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.blacklist.lock().retain(|_, b| b.until > now);
        self.threats.sweep();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    Global,
    Connection,
    User,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
