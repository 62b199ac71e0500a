// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway-wide shared state: every subsystem, the session table, and per-device
//! control ownership (design note 3, "exactly one connection may hold control of a
//! given device at a time").

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::command::processor::CommandProcessor;
use crate::config::GatewayConfig;
use crate::pattern::engine::PatternEngine;
use crate::recovery::RecoveryTable;
use crate::registry::device::DeviceId;
use crate::registry::Registry;
use crate::scheduler::Scheduler;
use crate::security::token::Principal;
use crate::security::SecurityGuard;
use crate::telemetry::TelemetryPipeline;

/// A live, authenticated session (design note 3, "Session").
pub struct SessionHandle {
    pub session_id: String,
    pub user_id: String,
    /// Behind a lock so an `auth_refresh` request can swap in a freshly verified
    /// principal without reconnecting (design note 4.1, inbound message kind
    /// `auth-refresh`).
    pub principal: RwLock<Principal>,
    pub source_addr: String,
    pub subscriptions: RwLock<HashSet<DeviceId>>,
    pub seq: AtomicU64,
    pub cancel: CancellationToken,
}

impl SessionHandle {
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

/// Every subsystem the session gateway dispatches into, plus the session table itself.
/// Constructed once at process startup and shared behind an `Arc`
/// (design note 9, "Singletons -> explicit dependency injection").
pub struct GatewayState {
    pub registry: Arc<Registry>,
    pub guard: Arc<SecurityGuard>,
    pub processor: Arc<CommandProcessor>,
    pub patterns: Arc<PatternEngine>,
    pub telemetry: Arc<TelemetryPipeline>,
    pub recovery: Arc<RecoveryTable>,
    pub scheduler: Scheduler,
    pub config: GatewayConfig,
    pub shutdown: CancellationToken,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    controllers: parking_lot::Mutex<HashMap<DeviceId, String>>,
}

impl GatewayState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<Registry>,
        guard: Arc<SecurityGuard>,
        processor: Arc<CommandProcessor>,
        patterns: Arc<PatternEngine>,
        telemetry: Arc<TelemetryPipeline>,
        recovery: Arc<RecoveryTable>,
        scheduler: Scheduler,
        config: GatewayConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            guard,
            processor,
            patterns,
            telemetry,
            recovery,
            scheduler,
            config,
            shutdown,
            sessions: RwLock::new(HashMap::new()),
            controllers: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Reject new sessions once `max_concurrent_sessions` is reached, checked before any
    /// authentication work (design note 4.1).
    pub async fn at_capacity(&self) -> bool {
        self.session_count().await >= self.config.max_concurrent_sessions
    }

    pub async fn register_session(&self, handle: Arc<SessionHandle>) {
        self.sessions.write().await.insert(handle.session_id.clone(), handle);
    }

    /// Remove the session and release every device it controlled.
    pub async fn remove_session(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
        let mut controllers = self.controllers.lock();
        controllers.retain(|_, owner| owner != session_id);
    }

    /// Claim exclusive control of `device_id` for `session_id`. Succeeds if uncontrolled or
    /// already held by this session; fails if another session holds it
    /// (design note 3, session invariant).
    pub fn try_take_control(&self, device_id: &DeviceId, session_id: &str) -> bool {
        let mut controllers = self.controllers.lock();
        match controllers.get(device_id) {
            Some(owner) if owner != session_id => false,
            _ => {
                controllers.insert(device_id.clone(), session_id.to_owned());
                true
            }
        }
    }

    pub fn controlling_session(&self, device_id: &DeviceId) -> Option<String> {
        self.controllers.lock().get(device_id).cloned()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
