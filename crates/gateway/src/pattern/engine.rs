// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pattern engine: starts, ticks, and stops time-varying command streams on devices,
//! enforcing safety invariants ahead of every emission (design note 4.6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::command::model::{Command, CommandKind, Priority};
use crate::command::processor::CommandProcessor;
use crate::error::{ErrorKind, GatewayError};
use crate::pattern::model::Pattern;
use crate::pattern::modifier::{BiometricBaseline, BiometricSample, MediaSample, Modifiers, SpatialSample};
use crate::registry::device::DeviceId;
use crate::registry::Registry;
use crate::scheduler::Scheduler;

/// Safety ceiling enforced independently of any single device's configured intensity cap
/// (design note 4.6, "Safety invariants").
#[derive(Debug, Clone, Copy)]
pub struct SafetyConfig {
    pub max_intensity: u8,
    pub max_duration: Duration,
    pub cooldown_period: Duration,
    pub max_intensity_fraction: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_intensity: 100,
            max_duration: Duration::from_secs(3600),
            cooldown_period: Duration::ZERO,
            max_intensity_fraction: 1.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatternEngineConfig {
    pub tick_resolution: Duration,
    pub safety: SafetyConfig,
}

impl Default for PatternEngineConfig {
    fn default() -> Self {
        Self { tick_resolution: Duration::from_millis(50), safety: SafetyConfig::default() }
    }
}

#[derive(Debug, Clone)]
pub enum PatternEvent {
    Started { device_id: DeviceId },
    Stopped { device_id: DeviceId, reason: String },
    SafetyTripped { device_id: DeviceId, reason: String },
}

struct Instance {
    started_at: Instant,
    modifiers: AsyncMutex<Modifiers>,
    cancel: CancellationToken,
}

/// Owns in-flight pattern state per device exclusively (design note 3, "Ownership").
pub struct PatternEngine {
    registry: Arc<Registry>,
    processor: Arc<CommandProcessor>,
    scheduler: Scheduler,
    config: PatternEngineConfig,
    instances: AsyncMutex<HashMap<DeviceId, Arc<Instance>>>,
    last_stop: AsyncMutex<HashMap<DeviceId, Instant>>,
    events: broadcast::Sender<PatternEvent>,
}

impl PatternEngine {
    pub fn new(registry: Arc<Registry>, processor: Arc<CommandProcessor>, scheduler: Scheduler, config: PatternEngineConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            registry,
            processor,
            scheduler,
            config,
            instances: AsyncMutex::new(HashMap::new()),
            last_stop: AsyncMutex::new(HashMap::new()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PatternEvent> {
        self.events.subscribe()
    }

    /// Start a pattern on `device_id`, rejecting a start within the device's cooldown
    /// window since its last stop (design note 4.6, "`now - last_stop_for_device >=
    /// safety.cooldown_period` when starting").
    pub async fn start(self: &Arc<Self>, device_id: DeviceId, pattern: Pattern, session_id: String) -> Result<(), GatewayError> {
        {
            let last_stop = self.last_stop.lock().await;
            if let Some(stopped_at) = last_stop.get(&device_id) {
                if stopped_at.elapsed() < self.config.safety.cooldown_period {
                    return Err(GatewayError::new(ErrorKind::Validation, "device is within its safety cooldown period"));
                }
            }
        }

        let record = self
            .registry
            .get(&device_id)
            .await
            .ok_or_else(|| GatewayError::new(ErrorKind::DeviceNotFound, format!("device '{device_id}' not found")))?;

        if !record.config.allows_pattern(pattern.type_at(0).as_deref()) {
            return Err(GatewayError::new(ErrorKind::Validation, "pattern not allowed on this device"));
        }

        let cancel = self.scheduler.child_token();
        let instance = Arc::new(Instance { started_at: Instant::now(), modifiers: AsyncMutex::new(Modifiers::default()), cancel: cancel.clone() });
        self.instances.lock().await.insert(device_id.clone(), instance.clone());

        let _ = self.events.send(PatternEvent::Started { device_id: device_id.clone() });

        let engine = self.clone();
        let device_for_task = device_id.clone();
        let session_for_task = session_id.clone();
        tokio::spawn(async move {
            engine.run_ticks(device_for_task, pattern, session_for_task, instance, cancel).await;
        });

        Ok(())
    }

    /// Cancel `device_id`'s tick task, issue a zero-intensity command, and clear the
    /// instance (design note 4.6, "Termination").
    pub async fn stop(self: &Arc<Self>, device_id: &DeviceId, session_id: &str) {
        let instance = self.instances.lock().await.remove(device_id);
        let Some(instance) = instance else { return };
        instance.cancel.cancel();

        self.last_stop.lock().await.insert(device_id.clone(), Instant::now());

        if let Some(record) = self.registry.get(device_id).await {
            let zero = Command {
                device_id: device_id.clone(),
                kind: CommandKind::Stop,
                intensity: 0,
                pattern_ref: None,
                pattern_params: None,
                deadline_ms: None,
                priority: Priority::Critical,
                session_seq: 0,
                session_id: session_id.to_owned(),
                attempt: 0,
                enqueued_at_ms: now_ms(),
            };
            if let Ok(rx) = self.processor.submit(zero, &record.config).await {
                let _ = rx.await;
            }
        }

        let _ = self.events.send(PatternEvent::Stopped { device_id: device_id.clone(), reason: "stopped".into() });
    }

    pub async fn attach_media(&self, device_id: &DeviceId, sample: MediaSample) {
        if let Some(instance) = self.instances.lock().await.get(device_id) {
            instance.modifiers.lock().await.media = Some(sample);
        }
    }

    pub async fn attach_biometric(&self, device_id: &DeviceId, sample: BiometricSample, baseline: BiometricBaseline) {
        if let Some(instance) = self.instances.lock().await.get(device_id) {
            instance.modifiers.lock().await.biometric = Some((sample, baseline));
        }
    }

    pub async fn attach_spatial(&self, device_id: &DeviceId, sample: SpatialSample) {
        if let Some(instance) = self.instances.lock().await.get(device_id) {
            instance.modifiers.lock().await.spatial = Some(sample);
        }
    }

    pub async fn is_running(&self, device_id: &DeviceId) -> bool {
        self.instances.lock().await.contains_key(device_id)
    }

    async fn run_ticks(self: Arc<Self>, device_id: DeviceId, pattern: Pattern, session_id: String, instance: Arc<Instance>, cancel: CancellationToken) {
        let mut seq = 0u64;
        loop {
            let latency = self.registry.adapter_latency(&device_id).await;
            let offset = latency + Duration::from_millis(50);
            let sleep_for = self.config.tick_resolution.saturating_sub(offset.min(self.config.tick_resolution));

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(sleep_for.max(Duration::from_millis(1))) => {}
            }

            if cancel.is_cancelled() {
                return;
            }

            seq += 1;
            match self.tick(&device_id, &pattern, &session_id, &instance, seq).await {
                TickOutcome::Continue => {}
                TickOutcome::Finished | TickOutcome::SafetyTripped(_) => {
                    self.stop(&device_id, &session_id).await;
                    return;
                }
            }
        }
    }

    async fn tick(self: &Arc<Self>, device_id: &DeviceId, pattern: &Pattern, session_id: &str, instance: &Instance, seq: u64) -> TickOutcome {
        let elapsed = instance.started_at.elapsed();

        if elapsed >= self.config.safety.max_duration {
            let _ = self.events.send(PatternEvent::Stopped { device_id: device_id.clone(), reason: "max_duration".into() });
            return TickOutcome::Finished;
        }

        if let Some(duration) = pattern.duration_ms() {
            if elapsed.as_millis() as u64 >= duration {
                return TickOutcome::Finished;
            }
        }

        let Some(record) = self.registry.get(device_id).await else {
            return TickOutcome::Finished;
        };

        let modifiers = instance.modifiers.lock().await.clone();
        let warped_elapsed_ms = (elapsed.as_millis() as f64 * modifiers.timing_warp(elapsed.as_millis() as u64)) as u64;
        let raw_intensity = pattern.intensity_at(warped_elapsed_ms) as f64;
        let modifier = modifiers.intensity_modifier(self.config.safety.max_intensity_fraction);
        let raw_target = raw_intensity * modifier;

        if raw_target > self.config.safety.max_intensity as f64 {
            let reason = format!("target intensity {raw_target:.1} exceeds safety.max_intensity {}", self.config.safety.max_intensity);
            let _ = self.events.send(PatternEvent::SafetyTripped { device_id: device_id.clone(), reason: reason.clone() });
            tracing::warn!(device_id = %device_id, reason = %reason, "pattern safety threshold exceeded");
            return TickOutcome::SafetyTripped(reason);
        }

        let cap = (self.config.safety.max_intensity as f64).min(record.config.intensity_cap as f64);
        let intensity = raw_target.round().clamp(0.0, cap) as u8;

        let command = Command {
            device_id: device_id.clone(),
            kind: CommandKind::Vibrate,
            intensity,
            pattern_ref: pattern.type_at(warped_elapsed_ms),
            pattern_params: pattern.metadata_at(warped_elapsed_ms),
            deadline_ms: None,
            priority: Priority::Normal,
            session_seq: seq,
            session_id: session_id.to_owned(),
            attempt: 0,
            enqueued_at_ms: now_ms(),
        };

        if let Err(e) = self.processor.submit(command, &record.config).await {
            tracing::debug!(device_id = %device_id, err = %e, "pattern tick command rejected");
        }

        TickOutcome::Continue
    }
}

enum TickOutcome {
    Continue,
    Finished,
    SafetyTripped(String),
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
