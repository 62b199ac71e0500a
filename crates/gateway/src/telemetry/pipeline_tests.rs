use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::telemetry::store::InMemoryTelemetryStore;
use tokio_util::sync::CancellationToken;

fn pipeline(buffer_size: usize) -> Arc<TelemetryPipeline> {
    let config = TelemetryConfig { buffer_size, batch_size: 8, ..TelemetryConfig::default() };
    TelemetryPipeline::new(
        Arc::new(InMemoryTelemetryStore::default()),
        config,
        Vec::new(),
        Vec::new(),
        Scheduler::new(CancellationToken::new()),
    )
}

#[test]
fn track_buffers_points_without_blocking() {
    let pipeline = pipeline(16);
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 1));
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 2));
    assert_eq!(pipeline.buffered_len(), 2);
    assert_eq!(pipeline.dropped_count(), 0);
}

#[test]
fn track_drops_oldest_when_buffer_full() {
    let pipeline = pipeline(2);
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 1));
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 2));
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 3));
    assert_eq!(pipeline.buffered_len(), 2);
    assert_eq!(pipeline.dropped_count(), 1);
}

#[test]
fn inline_rule_emits_event_on_track() {
    let config = TelemetryConfig::default();
    let rule = AlertRule {
        name: "hot".into(),
        predicate: Predicate::Gt { field: "temp".into(), threshold: 90.0 },
        severity: crate::recovery::taxonomy::Severity::Warning,
        message: "too hot".into(),
        cooldown: Duration::from_secs(60),
    };
    let pipeline = TelemetryPipeline::new(
        Arc::new(InMemoryTelemetryStore::default()),
        config,
        vec![rule],
        Vec::new(),
        Scheduler::new(CancellationToken::new()),
    );
    let mut events = pipeline.subscribe();
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 1).with_value("temp", 99.0));

    let TelemetryEvent::AlertTriggered(alert) = events.try_recv().expect("event");
    assert_eq!(alert.rule_name, "hot");
}

#[tokio::test]
async fn flush_moves_points_and_pending_alerts_into_store() {
    let store = Arc::new(InMemoryTelemetryStore::default());
    let pipeline = TelemetryPipeline::new(
        store.clone(),
        TelemetryConfig { buffer_size: 16, batch_size: 8, ..TelemetryConfig::default() },
        Vec::new(),
        Vec::new(),
        Scheduler::new(CancellationToken::new()),
    );
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 1));
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 2));

    pipeline.flush().await;

    assert_eq!(pipeline.buffered_len(), 0);
    assert_eq!(store.point_count().await.expect("count"), 2);
}

#[tokio::test]
async fn flush_coalesces_drops_into_single_meta_point() {
    let store = Arc::new(InMemoryTelemetryStore::default());
    let pipeline = TelemetryPipeline::new(
        store.clone(),
        TelemetryConfig { buffer_size: 1, batch_size: 8, ..TelemetryConfig::default() },
        Vec::new(),
        Vec::new(),
        Scheduler::new(CancellationToken::new()),
    );
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 1));
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 2));
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 3));
    assert_eq!(pipeline.dropped_count(), 2);

    pipeline.flush().await;

    assert_eq!(pipeline.dropped_count(), 0);
    let points = store.point_count().await.expect("count");
    assert_eq!(points, 2, "one retained point plus one coalesced meta point");
}

#[tokio::test]
async fn evaluate_windows_persists_one_aggregate_per_bucket() {
    let store = Arc::new(InMemoryTelemetryStore::default());
    let pipeline = TelemetryPipeline::new(
        store.clone(),
        TelemetryConfig { buffer_size: 64, batch_size: 8, ..TelemetryConfig::default() },
        Vec::new(),
        Vec::new(),
        Scheduler::new(CancellationToken::new()),
    );
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 1_000));
    pipeline.track(TelemetryPoint::new(TelemetryKind::Device, "dev-1", 2_000));

    pipeline.evaluate_windows().await;

    assert_eq!(store.point_count().await.expect("count"), 0, "points unaffected by window evaluation");
}
