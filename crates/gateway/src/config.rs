// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide configuration, sourced from CLI flags and environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the device control gateway.
#[derive(Debug, Clone, clap::Args)]
pub struct GatewayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "GATEWAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 7890, env = "GATEWAY_PORT")]
    pub port: u16,

    /// HMAC secret used to verify session tokens. Required unless `--no-auth` is set.
    #[arg(long, env = "GATEWAY_TOKEN_SECRET")]
    pub token_secret: Option<String>,

    /// Disable authentication entirely (development only).
    #[arg(long, default_value_t = false, env = "GATEWAY_NO_AUTH")]
    pub no_auth: bool,

    /// Maximum number of concurrent client sessions.
    #[arg(long, default_value_t = 256, env = "GATEWAY_MAX_SESSIONS")]
    pub max_concurrent_sessions: usize,

    /// Heartbeat ping interval in milliseconds.
    #[arg(long, default_value_t = 15000, env = "GATEWAY_PING_INTERVAL_MS")]
    pub ping_interval_ms: u64,

    /// Heartbeat pong deadline in milliseconds.
    #[arg(long, default_value_t = 5000, env = "GATEWAY_PING_TIMEOUT_MS")]
    pub ping_timeout_ms: u64,

    /// Enable AEAD message-envelope encryption.
    #[arg(long, default_value_t = false, env = "GATEWAY_ENCRYPTION")]
    pub encryption_enabled: bool,

    /// Key-rotation grace period in milliseconds (time the previous key stays valid).
    #[arg(long, default_value_t = 300_000, env = "GATEWAY_KEY_GRACE_MS")]
    pub key_grace_period_ms: u64,

    /// Device-record persistence key prefix.
    #[arg(long, default_value = "device", env = "GATEWAY_STORAGE_PREFIX")]
    pub storage_prefix: String,

    /// Directory of per-device-type `<type>.json` catalog files.
    #[arg(long, env = "GATEWAY_DEVICE_CONFIG_DIR")]
    pub device_config_dir: Option<PathBuf>,

    /// Registry lifecycle sweep interval in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "GATEWAY_SWEEP_INTERVAL_MS")]
    pub sweep_interval_ms: u64,

    /// Seconds of silence after which an online device is considered stale.
    #[arg(long, default_value_t = 120, env = "GATEWAY_STALE_TIMEOUT_SECS")]
    pub stale_timeout_secs: u64,

    /// Consecutive adapter errors before a device transitions to `error`.
    #[arg(long, default_value_t = 5, env = "GATEWAY_MAX_ERROR_COUNT")]
    pub max_error_count: u32,

    /// Telemetry ring-buffer capacity.
    #[arg(long, default_value_t = 4096, env = "GATEWAY_TELEMETRY_BUFFER")]
    pub telemetry_buffer_size: usize,

    /// Telemetry flush batch size.
    #[arg(long, default_value_t = 128, env = "GATEWAY_TELEMETRY_BATCH")]
    pub telemetry_batch_size: usize,

    /// Telemetry retention window in days.
    #[arg(long, default_value_t = 30, env = "GATEWAY_RETENTION_DAYS")]
    pub retention_days: u32,

    /// Global rate-limit: requests allowed per `rate_limit_global_window_ms`.
    #[arg(long, default_value_t = 1000, env = "GATEWAY_RATE_LIMIT_GLOBAL")]
    pub rate_limit_global_limit: u64,

    #[arg(long, default_value_t = 60_000, env = "GATEWAY_RATE_LIMIT_GLOBAL_WINDOW_MS")]
    pub rate_limit_global_window_ms: u64,

    /// Failed-login threshold before a source address is blacklisted.
    #[arg(long, default_value_t = 5, env = "GATEWAY_FAILED_LOGIN_THRESHOLD")]
    pub failed_login_threshold: u32,

    /// Window, in milliseconds, over which failed logins accumulate toward the threshold.
    #[arg(long, default_value_t = 60_000, env = "GATEWAY_BLACKLIST_WINDOW_MS")]
    pub blacklist_window_ms: u64,

    /// Blacklist duration in milliseconds once triggered.
    #[arg(long, default_value_t = 3_600_000, env = "GATEWAY_BLACKLIST_DURATION_MS")]
    pub blacklist_duration_ms: u64,

    /// Per-source connection count over `connection_window_ms` before DDoS eviction.
    #[arg(long, default_value_t = 20, env = "GATEWAY_CONNECTION_LIMIT")]
    pub connection_limit: u32,

    #[arg(long, default_value_t = 10_000, env = "GATEWAY_CONNECTION_WINDOW_MS")]
    pub connection_window_ms: u64,
}

impl GatewayConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn key_grace_period(&self) -> Duration {
        Duration::from_millis(self.key_grace_period_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_timeout_secs)
    }

    pub fn blacklist_window(&self) -> Duration {
        Duration::from_millis(self.blacklist_window_ms)
    }

    pub fn blacklist_duration(&self) -> Duration {
        Duration::from_millis(self.blacklist_duration_ms)
    }

    pub fn connection_window(&self) -> Duration {
        Duration::from_millis(self.connection_window_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days as u64 * 86_400)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
