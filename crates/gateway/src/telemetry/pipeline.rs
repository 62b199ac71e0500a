// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The telemetry pipeline: non-blocking ingestion, batched egress, alert evaluation, and
//! retention (design note 4.8). Every other component writes into this through
//! [`TelemetryPipeline::track`]; nothing downstream of it ever blocks a producer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::scheduler::Scheduler;
use crate::telemetry::alert::{AlertEvaluator, AlertRule, TriggeredAlert};
use crate::telemetry::point::{TelemetryKind, TelemetryPoint};
use crate::telemetry::store::{MinuteAggregate, TelemetryStore};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub buffer_size: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub alert_interval: Duration,
    pub retention_interval: Duration,
    pub retention: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            buffer_size: 4096,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            alert_interval: Duration::from_secs(60),
            retention_interval: Duration::from_secs(3600),
            retention: Duration::from_secs(30 * 86_400),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    AlertTriggered(TriggeredAlert),
}

/// A minute-bucket key for window aggregation: `(kind, source, minute_start_ms)`.
type WindowKey = (TelemetryKind, String, u64);

/// Accept non-blocking `track` calls from every component; batch to a [`TelemetryStore`];
/// evaluate alert rules inline and over per-minute windows; trim by retention
/// (design note 4.8).
pub struct TelemetryPipeline {
    config: TelemetryConfig,
    store: Arc<dyn TelemetryStore>,
    buffer: parking_lot::Mutex<VecDeque<TelemetryPoint>>,
    pending_alerts: parking_lot::Mutex<Vec<TriggeredAlert>>,
    dropped: AtomicU64,
    inline_evaluator: AlertEvaluator,
    window_evaluator: AlertEvaluator,
    windows: parking_lot::Mutex<HashMap<WindowKey, MinuteAggregate>>,
    events: broadcast::Sender<TelemetryEvent>,
    scheduler: Scheduler,
}

impl TelemetryPipeline {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        config: TelemetryConfig,
        inline_rules: Vec<AlertRule>,
        window_rules: Vec<AlertRule>,
        scheduler: Scheduler,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            config,
            store,
            buffer: parking_lot::Mutex::new(VecDeque::new()),
            pending_alerts: parking_lot::Mutex::new(Vec::new()),
            dropped: AtomicU64::new(0),
            inline_evaluator: AlertEvaluator::new(inline_rules),
            window_evaluator: AlertEvaluator::new(window_rules),
            windows: parking_lot::Mutex::new(HashMap::new()),
            events,
            scheduler,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.events.subscribe()
    }

    /// Accept a point. Synchronous and constant-time: drops the oldest point and bumps the
    /// drop counter when the ring buffer is full, never blocks the caller (design note 5,
    /// "Telemetry ring buffer... producers never suspend").
    pub fn track(&self, point: TelemetryPoint) {
        let fired = self.inline_evaluator.evaluate(&point.values, point.timestamp_ms);
        self.fold_into_window(&point);

        {
            let mut buffer = self.buffer.lock();
            if buffer.len() >= self.config.buffer_size {
                buffer.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            buffer.push_back(point);
        }

        if !fired.is_empty() {
            let mut pending = self.pending_alerts.lock();
            for alert in fired {
                let _ = self.events.send(TelemetryEvent::AlertTriggered(alert.clone()));
                pending.push(alert);
            }
        }
    }

    fn fold_into_window(&self, point: &TelemetryPoint) {
        let minute_start_ms = (point.timestamp_ms / 60_000) * 60_000;
        let key = (point.kind, point.source.clone(), minute_start_ms);
        let bytes = serde_json::to_vec(point).map(|v| v.len() as u64).unwrap_or(0);

        let mut windows = self.windows.lock();
        let entry = windows.entry(key).or_insert_with(|| MinuteAggregate {
            minute_start_ms,
            kind: format!("{:?}", point.kind),
            source: point.source.clone(),
            count: 0,
            bytes: 0,
        });
        entry.count += 1;
        entry.bytes += bytes;
    }

    /// Spawn the egress, alert-window, and retention tasks on `self.scheduler`. Call once
    /// after construction; cancellation is tied to the scheduler's own shutdown signal.
    pub fn spawn_tasks(self: &Arc<Self>) {
        let flush_pipeline = self.clone();
        self.scheduler.spawn_interval(self.config.flush_interval, self.scheduler.child_token(), move || {
            let pipeline = flush_pipeline.clone();
            async move { pipeline.flush().await }
        });

        let alert_pipeline = self.clone();
        self.scheduler.spawn_interval(self.config.alert_interval, self.scheduler.child_token(), move || {
            let pipeline = alert_pipeline.clone();
            async move { pipeline.evaluate_windows().await }
        });

        let retention_pipeline = self.clone();
        self.scheduler.spawn_interval(self.config.retention_interval, self.scheduler.child_token(), move || {
            let pipeline = retention_pipeline.clone();
            async move { pipeline.apply_retention().await }
        });
    }

    /// Drain up to `batch_size` points (plus any pending alerts) and persist them. The
    /// dropped-point counter is folded in as one coalesced meta-point rather than pushed
    /// back through `track`, which would create a feedback loop (design note 4.8).
    async fn flush(&self) {
        let mut batch = Vec::new();
        {
            let mut buffer = self.buffer.lock();
            while batch.len() < self.config.batch_size {
                match buffer.pop_front() {
                    Some(point) => batch.push(point),
                    None => break,
                }
            }
        }

        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            batch.push(TelemetryPoint::new(TelemetryKind::Meta, "telemetry", now_ms()).with_value("dropped", dropped as f64));
        }

        if !batch.is_empty() {
            if let Err(e) = self.store.insert_points(&batch).await {
                tracing::warn!(err = %e, "telemetry batch flush failed");
            }
        }

        let alerts: Vec<TriggeredAlert> = std::mem::take(&mut *self.pending_alerts.lock());
        for alert in alerts {
            if let Err(e) = self.store.insert_alert(alert).await {
                tracing::warn!(err = %e, "telemetry alert persist failed");
            }
        }
    }

    /// Evaluate window rules over each completed minute bucket, persist the aggregate, and
    /// emit/persist any alerts the window predicate trips (design note 4.8).
    async fn evaluate_windows(&self) {
        let snapshot: Vec<MinuteAggregate> = {
            let mut windows = self.windows.lock();
            std::mem::take(&mut *windows).into_values().collect()
        };

        for aggregate in snapshot {
            let fields = HashMap::from([
                ("count".to_owned(), aggregate.count as f64),
                ("bytes".to_owned(), aggregate.bytes as f64),
            ]);
            let fired = self.window_evaluator.evaluate(&fields, now_ms());

            if let Err(e) = self.store.insert_aggregate(aggregate).await {
                tracing::warn!(err = %e, "telemetry aggregate persist failed");
            }

            for alert in fired {
                let _ = self.events.send(TelemetryEvent::AlertTriggered(alert.clone()));
                if let Err(e) = self.store.insert_alert(alert).await {
                    tracing::warn!(err = %e, "telemetry alert persist failed");
                }
            }
        }
    }

    async fn apply_retention(&self) {
        let cutoff = now_ms().saturating_sub(self.config.retention.as_millis() as u64);
        match self.store.prune_before(cutoff).await {
            Ok(counts) => {
                if counts.points > 0 || counts.aggregates > 0 || counts.alerts > 0 {
                    tracing::info!(
                        points = counts.points,
                        aggregates = counts.aggregates,
                        alerts = counts.alerts,
                        "telemetry retention swept"
                    );
                }
            }
            Err(e) => tracing::warn!(err = %e, "telemetry retention sweep failed"),
        }
    }

    /// Number of points currently buffered but not yet flushed; exposed for tests.
    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Snapshot for the `monitor stats` CLI surface (design note 6).
    pub async fn stats(&self) -> anyhow::Result<TelemetryStats> {
        Ok(TelemetryStats {
            buffered_points: self.buffered_len(),
            dropped_points: self.dropped_count(),
            stored_points: self.store.point_count().await?,
            stored_alerts: self.store.alert_count().await?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct TelemetryStats {
    pub buffered_points: usize,
    pub dropped_points: u64,
    pub stored_points: usize,
    pub stored_alerts: usize,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
