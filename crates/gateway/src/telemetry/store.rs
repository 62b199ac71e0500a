// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry persistence, treated as an external collaborator (design note 6:
//! `telemetry_points`, `telemetry_stats`, `telemetry_alerts`, indexed on
//! `(timestamp, kind, source)`).

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::telemetry::alert::TriggeredAlert;
use crate::telemetry::point::TelemetryPoint;

/// A per-minute rolling aggregate for one `(kind, source)` pair (design note 4.8, "Egress").
#[derive(Debug, Clone, Default)]
pub struct MinuteAggregate {
    pub minute_start_ms: u64,
    pub kind: String,
    pub source: String,
    pub count: u64,
    pub bytes: u64,
}

/// Counts removed by one retention sweep, for observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneCounts {
    pub points: usize,
    pub aggregates: usize,
    pub alerts: usize,
}

/// Persistence contract for the telemetry pipeline's egress side. The gateway treats the
/// backing store as an external collaborator (design note 1); only an in-memory default
/// is provided here, used by tests and single-process deployments with no external sink.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn insert_points(&self, points: &[TelemetryPoint]) -> anyhow::Result<()>;
    async fn insert_aggregate(&self, aggregate: MinuteAggregate) -> anyhow::Result<()>;
    async fn insert_alert(&self, alert: TriggeredAlert) -> anyhow::Result<()>;
    async fn prune_before(&self, timestamp_ms: u64) -> anyhow::Result<PruneCounts>;
    async fn point_count(&self) -> anyhow::Result<usize>;
    async fn alert_count(&self) -> anyhow::Result<usize>;
}

#[derive(Default)]
pub struct InMemoryTelemetryStore {
    points: RwLock<Vec<TelemetryPoint>>,
    aggregates: RwLock<Vec<MinuteAggregate>>,
    alerts: RwLock<Vec<TriggeredAlert>>,
}

#[async_trait]
impl TelemetryStore for InMemoryTelemetryStore {
    async fn insert_points(&self, points: &[TelemetryPoint]) -> anyhow::Result<()> {
        self.points.write().await.extend_from_slice(points);
        Ok(())
    }

    async fn insert_aggregate(&self, aggregate: MinuteAggregate) -> anyhow::Result<()> {
        self.aggregates.write().await.push(aggregate);
        Ok(())
    }

    async fn insert_alert(&self, alert: TriggeredAlert) -> anyhow::Result<()> {
        self.alerts.write().await.push(alert);
        Ok(())
    }

    async fn prune_before(&self, timestamp_ms: u64) -> anyhow::Result<PruneCounts> {
        let mut points = self.points.write().await;
        let before = points.len();
        points.retain(|p| p.timestamp_ms >= timestamp_ms);
        let points_removed = before - points.len();

        let mut aggregates = self.aggregates.write().await;
        let before = aggregates.len();
        aggregates.retain(|a| a.minute_start_ms >= timestamp_ms);
        let aggregates_removed = before - aggregates.len();

        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|a| a.timestamp_ms >= timestamp_ms);
        let alerts_removed = before - alerts.len();

        Ok(PruneCounts { points: points_removed, aggregates: aggregates_removed, alerts: alerts_removed })
    }

    async fn point_count(&self) -> anyhow::Result<usize> {
        Ok(self.points.read().await.len())
    }

    async fn alert_count(&self) -> anyhow::Result<usize> {
        Ok(self.alerts.read().await.len())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
