// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::*;

struct CountingAdapter {
    calls: AtomicUsize,
    events_tx: broadcast::Sender<AdapterEvent>,
}

#[async_trait]
impl ProtocolAdapter for CountingAdapter {
    async fn connect(&self) -> Result<(), FaultError> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn send(&self, _payload: &Value) -> Result<Value, FaultError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    }

    async fn status(&self) -> DeviceStatus {
        DeviceStatus::Online
    }

    fn subscribe(&self) -> broadcast::Receiver<AdapterEvent> {
        self.events_tx.subscribe()
    }
}

fn counting_adapter() -> Arc<CountingAdapter> {
    let (events_tx, _events_rx) = broadcast::channel(8);
    Arc::new(CountingAdapter { calls: AtomicUsize::new(0), events_tx })
}

#[tokio::test]
async fn full_batch_flushes_immediately_as_a_single_send() {
    let counting = counting_adapter();
    let batching = BatchingAdapter::new(counting.clone(), 2, Duration::from_secs(10));

    let (r1, r2) = tokio::join!(
        batching.send(&serde_json::json!({"intensity": 1})),
        batching.send(&serde_json::json!({"intensity": 2})),
    );
    assert!(r1.is_ok());
    assert!(r2.is_ok());
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1, "two requests at batch_size=2 must coalesce to one send");
}

#[tokio::test]
async fn single_request_passes_through_unbatched_on_the_window_tick() {
    let counting = counting_adapter();
    let batching = BatchingAdapter::new(counting.clone(), 4, Duration::from_millis(20));

    let result = batching.send(&serde_json::json!({"intensity": 5})).await;
    assert!(result.is_ok());
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
}
