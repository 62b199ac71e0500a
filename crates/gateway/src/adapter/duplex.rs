// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The duplex-stream protocol adapter: a persistent WebSocket to the device, reconnected
//! with exponential backoff on drop, with responses correlated back to callers by a
//! per-frame id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::transport::{ByteTransport, WsTransport};
use super::{AdapterEvent, ProtocolAdapter};
use crate::recovery::taxonomy::{Category, FaultError, FaultKind, Severity};
use crate::registry::device::DeviceStatus;

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct OutgoingFrame {
    id: u64,
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct IncomingFrame {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    payload: Value,
}

pub struct DuplexStreamAdapter {
    address: String,
    status: Arc<RwLock<DeviceStatus>>,
    events_tx: broadcast::Sender<AdapterEvent>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
    next_id: AtomicU64,
    transport: Arc<RwLock<Option<Arc<dyn ByteTransport>>>>,
    cancel: Mutex<Option<CancellationToken>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DuplexStreamAdapter {
    pub fn new(address: String) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            address,
            status: Arc::new(RwLock::new(DeviceStatus::Offline)),
            events_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            transport: Arc::new(RwLock::new(None)),
            cancel: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    fn set_status(&self, status: DeviceStatus) {
        *self.status.write() = status;
        let _ = self.events_tx.send(AdapterEvent::StatusChanged(status));
    }

    /// Reads frames off `transport` until it closes, errors, or `cancel` fires.
    async fn serve(
        transport: &Arc<dyn ByteTransport>,
        pending: &Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
        events_tx: &broadcast::Sender<AdapterEvent>,
        cancel: &CancellationToken,
    ) {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = transport.close().await;
                    return;
                }
                frame = transport.recv() => frame,
            };

            match frame {
                Ok(Some(bytes)) => {
                    if let Ok(incoming) = serde_json::from_slice::<IncomingFrame>(&bytes) {
                        if let Some(id) = incoming.id {
                            if let Some(tx) = pending.lock().remove(&id) {
                                let _ = tx.send(incoming.payload);
                                continue;
                            }
                        }
                        let _ = events_tx.send(AdapterEvent::Telemetry(incoming.payload));
                    }
                }
                Ok(None) => {
                    let _ = events_tx.send(AdapterEvent::Disconnected { reason: "closed".into() });
                    return;
                }
                Err(e) => {
                    let _ = events_tx.send(AdapterEvent::Fault(FaultError::transient(
                        FaultKind::Connection,
                        format!("duplex-stream read error: {e}"),
                    )));
                    return;
                }
            }
        }
    }

    /// Serves `initial_transport` (already connected by [`ProtocolAdapter::connect`]), then
    /// reconnects with exponential backoff forever whenever the link drops.
    async fn run_loop(
        address: String,
        initial_transport: Arc<dyn ByteTransport>,
        transport_slot: Arc<RwLock<Option<Arc<dyn ByteTransport>>>>,
        pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
        events_tx: broadcast::Sender<AdapterEvent>,
        status_slot: Arc<RwLock<DeviceStatus>>,
        cancel: CancellationToken,
    ) {
        let mut backoff = INITIAL_BACKOFF;
        let mut transport = Some(initial_transport);

        loop {
            if cancel.is_cancelled() {
                return;
            }

            let active = match transport.take() {
                Some(t) => t,
                None => {
                    let connected = tokio::select! {
                        _ = cancel.cancelled() => return,
                        result = WsTransport::connect(&address) => result,
                    };

                    match connected {
                        Ok(t) => {
                            backoff = INITIAL_BACKOFF;
                            let t: Arc<dyn ByteTransport> = Arc::new(t);
                            *status_slot.write() = DeviceStatus::Online;
                            *transport_slot.write() = Some(t.clone());
                            let _ = events_tx.send(AdapterEvent::Connected);
                            t
                        }
                        Err(e) => {
                            let _ = events_tx.send(AdapterEvent::Fault(FaultError::transient(
                                FaultKind::Connection,
                                format!("duplex-stream connect to {address} failed: {e}"),
                            )));
                            let jitter = rand::rng().random_range(0..100);
                            tokio::select! {
                                _ = cancel.cancelled() => return,
                                _ = tokio::time::sleep(backoff + Duration::from_millis(jitter)) => {}
                            }
                            backoff = (backoff * 2).min(MAX_BACKOFF);
                            continue;
                        }
                    }
                }
            };

            Self::serve(&active, &pending, &events_tx, &cancel).await;

            *transport_slot.write() = None;
            *status_slot.write() = DeviceStatus::Offline;
        }
    }
}

#[async_trait]
impl ProtocolAdapter for DuplexStreamAdapter {
    async fn connect(&self) -> Result<(), FaultError> {
        {
            let cancel_slot = self.cancel.lock();
            if cancel_slot.is_some() {
                return Ok(());
            }
        }

        let transport: Arc<dyn ByteTransport> = Arc::new(WsTransport::connect(&self.address).await.map_err(|e| {
            FaultError::transient(FaultKind::Connection, format!("duplex-stream connect to {} failed: {e}", self.address))
        })?);

        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());
        *self.transport.write() = Some(transport.clone());
        self.set_status(DeviceStatus::Online);
        let _ = self.events_tx.send(AdapterEvent::Connected);

        let address = self.address.clone();
        let transport_slot = self.transport.clone();
        let pending = self.pending.clone();
        let events_tx = self.events_tx.clone();
        let status_slot = self.status.clone();

        let handle = tokio::spawn(Self::run_loop(
            address,
            transport,
            transport_slot,
            pending,
            events_tx,
            status_slot,
            token,
        ));
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.await;
        }
        *self.transport.write() = None;
        self.set_status(DeviceStatus::Offline);
    }

    async fn send(&self, payload: &Value) -> Result<Value, FaultError> {
        let transport = self
            .transport
            .read()
            .clone()
            .ok_or_else(|| FaultError::transient(FaultKind::Connection, "adapter not connected"))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let frame = OutgoingFrame { id, payload: payload.clone() };
        let bytes = serde_json::to_vec(&frame)
            .map_err(|e| FaultError::new(FaultKind::InvalidCommand, Severity::Error, Category::Persistent, e.to_string()))?;

        if let Err(e) = transport.send(bytes).await {
            self.pending.lock().remove(&id);
            return Err(FaultError::transient(FaultKind::Connection, format!("send failed: {e}")));
        }

        match tokio::time::timeout(SEND_TIMEOUT, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(FaultError::transient(FaultKind::Connection, "adapter dropped before reply")),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(FaultError::transient(FaultKind::Timeout, "device did not reply in time"))
            }
        }
    }

    async fn status(&self) -> DeviceStatus {
        *self.status.read()
    }

    fn subscribe(&self) -> broadcast::Receiver<AdapterEvent> {
        self.events_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "duplex_tests.rs"]
mod tests;
