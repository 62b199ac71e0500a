// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device control gateway: a duplex WebSocket transport and thin HTTP control plane in
//! front of a device registry, command processor, pattern engine, and telemetry pipeline.

pub mod adapter;
pub mod command;
pub mod config;
pub mod error;
pub mod pattern;
pub mod recovery;
pub mod registry;
pub mod scheduler;
pub mod security;
pub mod session;
pub mod telemetry;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::adapter::AdapterFactory;
use crate::command::processor::{CommandProcessor, CommandProcessorConfig};
use crate::config::GatewayConfig;
use crate::pattern::engine::{PatternEngine, PatternEngineConfig};
use crate::recovery::RecoveryTable;
use crate::registry::catalog::DeviceCatalog;
use crate::registry::store::{DeviceStore, InMemoryStore, JsonFileStore};
use crate::registry::{Registry, RegistryConfig};
use crate::scheduler::Scheduler;
use crate::security::encryption::KeyRing;
use crate::security::guard::{SecurityGuard, SecurityGuardConfig};
use crate::security::rate_limit::{RateLimitAlgorithm, RateLimiterConfig};
use crate::security::token::HmacTokenVerifier;
use crate::session::state::GatewayState;
use crate::telemetry::{InMemoryTelemetryStore, TelemetryConfig, TelemetryPipeline};

/// Directory device records persist under when no explicit storage directory is wired in
/// (there is none in `GatewayConfig` — devices persist relative to process state, following
/// the usual XDG state-directory convention).
fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GATEWAY_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("device-gateway");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/device-gateway");
    }
    PathBuf::from(".device-gateway")
}

fn build_guard_config(config: &GatewayConfig) -> SecurityGuardConfig {
    let defaults = SecurityGuardConfig::default();
    SecurityGuardConfig {
        global: RateLimiterConfig {
            algorithm: RateLimitAlgorithm::SlidingWindow,
            limit: config.rate_limit_global_limit,
            window: Duration::from_millis(config.rate_limit_global_window_ms),
            soft_block_timeout: defaults.global.soft_block_timeout,
        },
        failed_login_threshold: config.failed_login_threshold,
        blacklist_window: config.blacklist_window(),
        blacklist_duration: config.blacklist_duration(),
        connection_limit: config.connection_limit,
        connection_window: config.connection_window(),
        ..defaults
    }
}

/// Run the gateway until shutdown.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(shutdown.clone());

    if !config.no_auth && config.token_secret.is_none() {
        anyhow::bail!("--token-secret is required unless --no-auth is set");
    }

    let store: Arc<dyn DeviceStore> = if std::env::var("GATEWAY_IN_MEMORY_STORE").is_ok() {
        Arc::new(InMemoryStore::default())
    } else {
        Arc::new(JsonFileStore::new(state_dir().join("devices"), config.storage_prefix.clone()))
    };

    let registry = Arc::new(Registry::new(
        store,
        AdapterFactory::with_defaults(),
        RegistryConfig {
            connect_retries: 3,
            reconnect_delay: Duration::from_millis(500),
            stale_timeout: config.stale_timeout(),
            max_error_count: config.max_error_count,
            breaker_failure_threshold: 5,
            breaker_success_threshold: 2,
            breaker_recovery_timeout: Duration::from_secs(30),
        },
    ));
    registry.load_persisted().await?;

    if let Some(dir) = &config.device_config_dir {
        let catalog = DeviceCatalog::load_dir(dir).await?;
        tracing::info!(entries = catalog.len(), "loaded device catalog");
        registry.set_catalog(catalog);
    }

    let recovery = Arc::new(RecoveryTable::new(Duration::from_secs(300)));
    let processor = CommandProcessor::new(registry.clone(), recovery.clone(), scheduler.clone(), CommandProcessorConfig::default());
    let patterns = PatternEngine::new(registry.clone(), processor.clone(), scheduler.clone(), PatternEngineConfig::default());

    let telemetry_config = TelemetryConfig {
        buffer_size: config.telemetry_buffer_size,
        batch_size: config.telemetry_batch_size,
        retention: config.retention(),
        ..TelemetryConfig::default()
    };
    let telemetry = TelemetryPipeline::new(Arc::new(InMemoryTelemetryStore::default()), telemetry_config, Vec::new(), Vec::new(), scheduler.clone());
    telemetry.spawn_tasks();

    let verifier = Arc::new(HmacTokenVerifier::new(config.token_secret.clone().unwrap_or_default().into_bytes()));
    let keyring = if config.encryption_enabled { Some(KeyRing::new(config.key_grace_period())?) } else { None };
    let guard = Arc::new(SecurityGuard::new(build_guard_config(&config), verifier, keyring));

    let state = Arc::new(GatewayState::new(
        registry.clone(),
        guard.clone(),
        processor,
        patterns,
        telemetry,
        recovery,
        scheduler.clone(),
        config.clone(),
        shutdown.clone(),
    ));

    let sweep_registry = registry.clone();
    scheduler.spawn_interval(config.sweep_interval(), shutdown.child_token(), move || {
        let registry = sweep_registry.clone();
        async move { registry.sweep().await }
    });
    scheduler.spawn_interval(Duration::from_secs(30), shutdown.child_token(), move || {
        let guard = guard.clone();
        async move { guard.sweep() }
    });

    let router = session::build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, no_auth = config.no_auth, "device gateway listening");
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
