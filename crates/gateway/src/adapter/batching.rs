// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A thin adapter wrapper that coalesces outstanding requests into one wire frame when the
//! downstream transport supports it, falling back to per-request framing otherwise (design
//! note 4.4, "Batching adapter wrapper"). This is distinct from the command processor's
//! own batching (design note 4.5): that batches *before* a command reaches an adapter at
//! all; this batches multiple adapter-level sends that land in the same tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use super::{AdapterEvent, ProtocolAdapter};
use crate::recovery::taxonomy::FaultError;
use crate::registry::device::DeviceStatus;

struct PendingSend {
    payload: Value,
    reply: oneshot::Sender<Result<Value, FaultError>>,
}

/// Wraps any [`ProtocolAdapter`] and coalesces up to `batch_size` outstanding `send` calls,
/// issued within `batch_window`, into a single `{"batch": [...]}` frame carrying an embedded
/// correlation id per entry. The inner adapter's own `send` is used verbatim when only one
/// request is pending at flush time, so non-batching transports still work correctly.
pub struct BatchingAdapter {
    inner: Arc<dyn ProtocolAdapter>,
    batch_size: usize,
    pending: Mutex<Vec<PendingSend>>,
    cancel: CancellationToken,
}

impl BatchingAdapter {
    pub fn new(inner: Arc<dyn ProtocolAdapter>, batch_size: usize, batch_window: Duration) -> Arc<Self> {
        let adapter = Arc::new(Self {
            inner,
            batch_size: batch_size.max(1),
            pending: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        });

        let ticker = Arc::clone(&adapter);
        let cancel = adapter.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(batch_window) => {}
                }
                ticker.flush().await;
            }
        });

        adapter
    }

    async fn flush(&self) {
        let batch: Vec<PendingSend> = {
            let mut guard = self.pending.lock().await;
            std::mem::take(&mut *guard)
        };
        if batch.is_empty() {
            return;
        }

        if batch.len() == 1 {
            let mut batch = batch;
            if let Some(entry) = batch.pop() {
                let result = self.inner.send(&entry.payload).await;
                let _ = entry.reply.send(result);
            }
            return;
        }

        let frame = Value::Object(
            [(
                "batch".to_owned(),
                Value::Array(
                    batch
                        .iter()
                        .enumerate()
                        .map(|(i, p)| serde_json::json!({ "correlation_id": i, "payload": p.payload }))
                        .collect(),
                ),
            )]
            .into_iter()
            .collect(),
        );

        match self.inner.send(&frame).await {
            Ok(Value::Object(map)) => {
                let replies = map.get("replies").and_then(Value::as_array).cloned().unwrap_or_default();
                for (i, entry) in batch.into_iter().enumerate() {
                    let value = replies.get(i).cloned().unwrap_or(Value::Null);
                    let _ = entry.reply.send(Ok(value));
                }
            }
            Ok(other) => {
                for entry in batch {
                    let _ = entry.reply.send(Ok(other.clone()));
                }
            }
            Err(e) => {
                for entry in batch {
                    let _ = entry.reply.send(Err(e.clone()));
                }
            }
        }
    }
}

#[async_trait]
impl ProtocolAdapter for BatchingAdapter {
    async fn connect(&self) -> Result<(), FaultError> {
        self.inner.connect().await
    }

    async fn disconnect(&self) {
        self.cancel.cancel();
        self.inner.disconnect().await
    }

    async fn send(&self, payload: &Value) -> Result<Value, FaultError> {
        let (tx, rx) = oneshot::channel();
        let should_flush_immediately = {
            let mut guard = self.pending.lock().await;
            guard.push(PendingSend { payload: payload.clone(), reply: tx });
            guard.len() >= self.batch_size
        };

        if should_flush_immediately {
            self.flush().await;
        }

        rx.await.unwrap_or_else(|_| Err(FaultError::transient(crate::recovery::taxonomy::FaultKind::Connection, "batch flush dropped this entry")))
    }

    async fn status(&self) -> DeviceStatus {
        self.inner.status().await
    }

    fn subscribe(&self) -> broadcast::Receiver<AdapterEvent> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
#[path = "batching_tests.rs"]
mod tests;
