// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device registry: the source of truth for device records in the running process,
//! bound one-to-one with protocol adapters while a device is `online` (design note 4.3).

pub mod catalog;
pub mod device;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::RwLock as SyncRwLock;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::adapter::{AdapterEvent, AdapterFactory, ProtocolAdapter};
use crate::error::{ErrorKind, GatewayError};
use crate::recovery::circuit_breaker::CircuitBreaker;
use crate::recovery::taxonomy::FaultError;
use crate::registry::catalog::DeviceCatalog;
use crate::registry::device::{DeviceConfig, DeviceId, DeviceInfo, DeviceRecord, DeviceStatus};
use crate::registry::store::DeviceStore;

/// Events the registry emits as device state changes; the session gateway forwards a
/// filtered view of these to subscribed clients (`device_event` in design note 6).
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    DeviceUpdated(DeviceRecord),
    DeviceRemoved(DeviceId),
}

struct Binding {
    adapter: Arc<dyn ProtocolAdapter>,
}

/// Registry configuration, mirrored from [`crate::config::GatewayConfig`] at construction.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub connect_retries: u32,
    pub reconnect_delay: Duration,
    pub stale_timeout: Duration,
    pub max_error_count: u32,
    /// Consecutive connect/send failures before a device's circuit breaker opens.
    pub breaker_failure_threshold: u32,
    /// Consecutive half-open probe successes required to close the breaker again.
    pub breaker_success_threshold: u32,
    /// How long a breaker stays open before allowing a half-open probe.
    pub breaker_recovery_timeout: Duration,
}

/// Owns device records, persists them through a [`DeviceStore`], and binds online devices
/// to exactly one adapter instance each (design note 3 invariant).
pub struct Registry {
    store: Arc<dyn DeviceStore>,
    factory: AdapterFactory,
    catalog: SyncRwLock<DeviceCatalog>,
    records: tokio::sync::RwLock<IndexMap<DeviceId, DeviceRecord>>,
    bindings: tokio::sync::RwLock<IndexMap<DeviceId, Binding>>,
    breakers: tokio::sync::RwLock<IndexMap<DeviceId, Arc<CircuitBreaker>>>,
    config: RegistryConfig,
    events: broadcast::Sender<RegistryEvent>,
}

impl Registry {
    pub fn new(store: Arc<dyn DeviceStore>, factory: AdapterFactory, config: RegistryConfig) -> Self {
        let (events, _) = broadcast::channel(512);
        Self {
            store,
            factory,
            catalog: SyncRwLock::new(DeviceCatalog::default()),
            records: tokio::sync::RwLock::new(IndexMap::new()),
            bindings: tokio::sync::RwLock::new(IndexMap::new()),
            breakers: tokio::sync::RwLock::new(IndexMap::new()),
            config,
            events,
        }
    }

    /// The per-device circuit breaker, created on first use (design note 4.7).
    async fn breaker_for(&self, id: &DeviceId) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(id) {
            return breaker.clone();
        }
        self.breakers
            .write()
            .await
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    id.to_string(),
                    self.config.breaker_failure_threshold,
                    self.config.breaker_success_threshold,
                    self.config.breaker_recovery_timeout,
                ))
            })
            .clone()
    }

    pub fn set_catalog(&self, catalog: DeviceCatalog) {
        *self.catalog.write() = catalog;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        let _ = self.events.send(event);
    }

    pub async fn get(&self, id: &DeviceId) -> Option<DeviceRecord> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<DeviceRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Insert or merge a device record. `last_connected`, `error_count`, and `enabled` are
    /// preserved from any existing record; auto-connects when the merged config allows it.
    pub async fn add_or_update(&self, info: DeviceInfo, config: Option<DeviceConfig>) -> Result<DeviceRecord, GatewayError> {
        if let Some(entry) = self.catalog.read().get(&info.kind) {
            for capability in &info.capabilities {
                if !entry.features.iter().any(|f| f == capability) {
                    return Err(GatewayError::new(
                        ErrorKind::Validation,
                        format!("device kind '{}' does not declare capability '{capability}'", info.kind),
                    ));
                }
            }
        } else if !self.catalog.read().is_empty() {
            return Err(GatewayError::new(
                ErrorKind::Validation,
                format!("device kind '{}' is not a recognized device type", info.kind),
            ));
        }

        let now_ms = now_ms();
        let mut records = self.records.write().await;
        let existing = records.get(&info.id).cloned();

        let mut record = DeviceRecord::new(info, config.unwrap_or_default(), now_ms);
        if let Some(prev) = existing {
            record.last_connected_ms = prev.last_connected_ms;
            record.error_count = prev.error_count;
            record.enabled = prev.enabled;
            record.status = prev.status;
        }

        records.insert(record.id.clone(), record.clone());
        drop(records);

        self.store
            .put(&record)
            .await
            .map_err(|e| GatewayError::new(ErrorKind::Internal, e.to_string()))?;
        self.emit(RegistryEvent::DeviceUpdated(record.clone()));

        if record.enabled && record.config.auto_connect {
            let id = record.id.clone();
            let _ = self.connect(&id).await;
        }

        Ok(record)
    }

    /// Disconnects, deletes the persisted record, and drops the adapter binding.
    pub async fn remove(&self, id: &DeviceId) -> Result<(), GatewayError> {
        self.disconnect(id).await;
        self.records.write().await.shift_remove(id);
        self.breakers.write().await.shift_remove(id);
        self.store.delete(id).await.map_err(|e| GatewayError::new(ErrorKind::Internal, e.to_string()))?;
        self.emit(RegistryEvent::DeviceRemoved(id.clone()));
        Ok(())
    }

    /// Creates (if absent) the adapter for `id` via the protocol factory, retrying up to
    /// `connect_retries` times with `reconnect_delay` between attempts.
    pub async fn connect(&self, id: &DeviceId) -> Result<(), GatewayError> {
        let record = self
            .get(id)
            .await
            .ok_or_else(|| GatewayError::new(ErrorKind::DeviceNotFound, format!("device '{id}' not found")))?;

        if !record.enabled {
            return Err(GatewayError::new(ErrorKind::Validation, "device is disabled"));
        }

        {
            let bindings = self.bindings.read().await;
            if bindings.contains_key(id) {
                return Ok(());
            }
        }

        let breaker = self.breaker_for(id).await;
        if breaker.guard().is_err() {
            return Err(GatewayError::new(ErrorKind::CircuitOpen, format!("circuit open for device '{id}'")));
        }

        let adapter = self
            .factory
            .create(&record.protocol, &record.address, &Value::Null)
            .map_err(|e| GatewayError::new(ErrorKind::Internal, e.to_string()))?;

        let mut last_err: Option<FaultError> = None;
        let mut attempts = 0u32;
        while attempts < self.config.connect_retries.max(1) {
            match adapter.connect().await {
                Ok(()) => {
                    last_err = None;
                    breaker.record_success();
                    break;
                }
                Err(e) => {
                    last_err = Some(e);
                    breaker.record_failure();
                    attempts += 1;
                    if attempts < self.config.connect_retries.max(1) {
                        tokio::time::sleep(self.config.reconnect_delay).await;
                    }
                }
            }
        }

        if let Some(err) = last_err {
            self.bump_error(id).await;
            return Err(GatewayError::new(ErrorKind::DeviceDisconnected, err.to_string()));
        }

        self.bindings.write().await.insert(id.clone(), Binding { adapter: adapter.clone() });
        self.set_status(id, DeviceStatus::Online).await;
        self.reset_error(id).await;
        Ok(())
    }

    pub async fn disconnect(&self, id: &DeviceId) {
        if let Some(binding) = self.bindings.write().await.shift_remove(id) {
            binding.adapter.disconnect().await;
        }
        self.set_status(id, DeviceStatus::Offline).await;
    }

    /// Disables or enables a device; disconnects first when transitioning to disabled while
    /// the device is currently online.
    pub async fn set_enabled(&self, id: &DeviceId, enabled: bool) -> Result<(), GatewayError> {
        let was_online = {
            let records = self.records.read().await;
            records.get(id).map(|r| r.status == DeviceStatus::Online).unwrap_or(false)
        };

        if !enabled && was_online {
            self.disconnect(id).await;
        }

        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| GatewayError::new(ErrorKind::DeviceNotFound, format!("device '{id}' not found")))?;
        record.enabled = enabled;
        record.status = if enabled { record.status } else { DeviceStatus::Disabled };
        let snapshot = record.clone();
        drop(records);

        let _ = self.store.put(&snapshot).await;
        self.emit(RegistryEvent::DeviceUpdated(snapshot));
        Ok(())
    }

    /// Routes `payload` to the device's bound adapter. Bumps the error counter on failure and
    /// transitions the device to `error` once `max_error_count` is exceeded (design note 4.3).
    pub async fn send(&self, id: &DeviceId, payload: &Value) -> Result<Value, GatewayError> {
        let adapter = {
            let bindings = self.bindings.read().await;
            bindings.get(id).map(|b| b.adapter.clone())
        };

        let adapter = match adapter {
            Some(a) => a,
            None => return Err(GatewayError::new(ErrorKind::DeviceDisconnected, format!("device '{id}' has no live adapter"))),
        };

        let breaker = self.breaker_for(id).await;
        if breaker.guard().is_err() {
            return Err(GatewayError::new(ErrorKind::CircuitOpen, format!("circuit open for device '{id}'")));
        }

        match adapter.send(payload).await {
            Ok(v) => {
                breaker.record_success();
                self.touch(id).await;
                Ok(v)
            }
            Err(e) => {
                breaker.record_failure();
                self.bump_error(id).await;
                Err(GatewayError::new(ErrorKind::CommandFailed, e.to_string()))
            }
        }
    }

    async fn touch(&self, id: &DeviceId) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(id) {
            record.last_seen_ms = now_ms();
        }
    }

    async fn reset_error(&self, id: &DeviceId) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(id) {
            record.error_count = 0;
        }
    }

    async fn bump_error(&self, id: &DeviceId) {
        let snapshot = {
            let mut records = self.records.write().await;
            let Some(record) = records.get_mut(id) else { return };
            record.error_count += 1;
            if record.error_count > self.config.max_error_count {
                record.status = DeviceStatus::Error;
            }
            record.clone()
        };
        let _ = self.store.put(&snapshot).await;
        self.emit(RegistryEvent::DeviceUpdated(snapshot));
    }

    async fn set_status(&self, id: &DeviceId, status: DeviceStatus) {
        let snapshot = {
            let mut records = self.records.write().await;
            let Some(record) = records.get_mut(id) else { return };
            record.status = status;
            if status == DeviceStatus::Online {
                record.last_connected_ms = Some(now_ms());
            }
            record.clone()
        };
        let _ = self.store.put(&snapshot).await;
        self.emit(RegistryEvent::DeviceUpdated(snapshot));
    }

    /// Periodic lifecycle sweep: force-disconnects devices that are nominally online but
    /// have gone quiet past `stale_timeout`, and marks any device over `max_error_count` as
    /// `error`. Never holds a lock across the I/O it triggers (design note 4.3).
    pub async fn sweep(&self) {
        let now = now_ms();
        let stale_ms = self.config.stale_timeout.as_millis() as u64;

        let stale_ids: Vec<DeviceId> = {
            let records = self.records.read().await;
            records
                .values()
                .filter(|r| r.status == DeviceStatus::Online && now.saturating_sub(r.last_seen_ms) > stale_ms)
                .map(|r| r.id.clone())
                .collect()
        };

        for id in stale_ids {
            tracing::warn!(device_id = %id, "device stale, forcing disconnect");
            self.disconnect(&id).await;
        }

        let error_ids: Vec<DeviceId> = {
            let records = self.records.read().await;
            records
                .values()
                .filter(|r| r.error_count > self.config.max_error_count && r.status != DeviceStatus::Error)
                .map(|r| r.id.clone())
                .collect()
        };

        for id in error_ids {
            self.set_status(&id, DeviceStatus::Error).await;
        }
    }

    /// Listens to every bound adapter's event stream and republishes `StatusChanged` as a
    /// registry-level update, folding unsolicited disconnects back into device state.
    pub async fn subscribe_adapter_events(&self, id: &DeviceId) -> Option<broadcast::Receiver<AdapterEvent>> {
        let bindings = self.bindings.read().await;
        bindings.get(id).map(|b| b.adapter.subscribe())
    }

    /// Network + processing latency last reported by the device's bound adapter, or zero
    /// if the device has none (design note 4.6, "Latency compensation").
    pub async fn adapter_latency(&self, id: &DeviceId) -> Duration {
        self.bindings.read().await.get(id).map(|b| b.adapter.latency_estimate()).unwrap_or(Duration::ZERO)
    }

    pub async fn load_persisted(&self) -> anyhow::Result<()> {
        let records = self.store.list().await?;
        let mut guard = self.records.write().await;
        for record in records {
            guard.insert(record.id.clone(), record);
        }
        Ok(())
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
