// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Illustrative radio-link adapter (design note 4.4): service/characteristic addressing,
//! length-limited opcode-prefixed binary frames, status notifications on a separate
//! characteristic. No concrete radio stack is in the ambient dependency set (see
//! DESIGN.md); this drives a generic [`ByteTransport`] so the framing and reconnect shape
//! can be exercised without one.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::transport::ByteTransport;
use super::{AdapterEvent, ProtocolAdapter};
use crate::recovery::taxonomy::{FaultError, FaultKind};
use crate::registry::device::DeviceStatus;

const MAX_FRAME_LEN: usize = 20;
const OPCODE_INTENSITY: u8 = 0x01;
const OPCODE_PATTERN_START: u8 = 0x02;
const OPCODE_PATTERN_STOP: u8 = 0x03;
const OPCODE_STATUS: u8 = 0xF0;

fn encode(payload: &Value) -> Result<Vec<u8>, FaultError> {
    let opcode = match payload.get("kind").and_then(Value::as_str) {
        Some("pattern_start") => OPCODE_PATTERN_START,
        Some("pattern_stop") => OPCODE_PATTERN_STOP,
        _ => OPCODE_INTENSITY,
    };
    let intensity = payload.get("intensity").and_then(Value::as_u64).unwrap_or(0).min(100) as u8;
    let frame = vec![opcode, intensity];
    if frame.len() > MAX_FRAME_LEN {
        return Err(FaultError::new(
            FaultKind::InvalidCommand,
            crate::recovery::taxonomy::Severity::Error,
            crate::recovery::taxonomy::Category::Persistent,
            "encoded radio-link frame exceeds the characteristic's write length",
        ));
    }
    Ok(frame)
}

fn decode_status(frame: &[u8]) -> Option<Value> {
    if frame.first() != Some(&OPCODE_STATUS) {
        return None;
    }
    let level = frame.get(1).copied().unwrap_or(0);
    Some(serde_json::json!({ "battery_level": level }))
}

/// A radio-link adapter bound to one `ByteTransport` (in production, a BLE
/// characteristic pair; in tests, [`super::transport::MockTransport`]).
pub struct RadioLinkAdapter {
    address: String,
    channel: u8,
    status: Arc<RwLock<DeviceStatus>>,
    events_tx: broadcast::Sender<AdapterEvent>,
    transport: Arc<RwLock<Option<Arc<dyn ByteTransport>>>>,
    cancel: parking_lot::Mutex<Option<CancellationToken>>,
    reconnect_attempts: AtomicU8,
    max_reconnect_attempts: u8,
}

impl RadioLinkAdapter {
    pub fn new(address: String, channel: u8) -> Self {
        let (events_tx, _) = broadcast::channel(128);
        Self {
            address,
            channel,
            status: Arc::new(RwLock::new(DeviceStatus::Offline)),
            events_tx,
            transport: Arc::new(RwLock::new(None)),
            cancel: parking_lot::Mutex::new(None),
            reconnect_attempts: AtomicU8::new(0),
            max_reconnect_attempts: 3,
        }
    }

    /// Test/embedding seam: inject a transport constructor instead of dialing real hardware.
    pub async fn with_transport(self, transport: Arc<dyn ByteTransport>) -> Self {
        *self.transport.write() = Some(transport);
        *self.status.write() = DeviceStatus::Online;
        self
    }

    fn notify_listener(events_tx: broadcast::Sender<AdapterEvent>, status: Arc<RwLock<DeviceStatus>>, transport: Arc<dyn ByteTransport>, cancel: CancellationToken) {
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = cancel.cancelled() => return,
                    f = transport.recv() => f,
                };
                match frame {
                    Ok(Some(bytes)) => {
                        if let Some(status_value) = decode_status(&bytes) {
                            let _ = events_tx.send(AdapterEvent::Telemetry(status_value));
                        }
                    }
                    Ok(None) => {
                        *status.write() = DeviceStatus::Offline;
                        let _ = events_tx.send(AdapterEvent::Disconnected { reason: "characteristic closed".into() });
                        return;
                    }
                    Err(e) => {
                        let _ = events_tx.send(AdapterEvent::Fault(FaultError::transient(
                            FaultKind::Connection,
                            format!("radio-link notify error: {e}"),
                        )));
                        return;
                    }
                }
            }
        });
    }
}

#[async_trait]
impl ProtocolAdapter for RadioLinkAdapter {
    async fn connect(&self) -> Result<(), FaultError> {
        // Real hardware dialing is out of scope (design note 1); a transport is expected
        // to already be installed via `with_transport` in tests or by the embedding binary.
        let transport = self.transport.read().clone();
        match transport {
            Some(t) => {
                let token = CancellationToken::new();
                *self.cancel.lock() = Some(token.clone());
                *self.status.write() = DeviceStatus::Online;
                let _ = self.events_tx.send(AdapterEvent::Connected);
                Self::notify_listener(self.events_tx.clone(), self.status.clone(), t, token);
                Ok(())
            }
            None => Err(FaultError::transient(
                FaultKind::Connection,
                format!("radio-link channel {} at {} has no bound transport", self.channel, self.address),
            )),
        }
    }

    async fn disconnect(&self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        if let Some(transport) = self.transport.read().clone() {
            let _ = transport.close().await;
        }
        *self.status.write() = DeviceStatus::Offline;
    }

    async fn send(&self, payload: &Value) -> Result<Value, FaultError> {
        let transport = self
            .transport
            .read()
            .clone()
            .ok_or_else(|| FaultError::transient(FaultKind::Connection, "radio-link adapter not connected"))?;

        let frame = encode(payload)?;
        if let Err(e) = transport.send(frame).await {
            self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
            if self.reconnect_attempts.load(Ordering::Relaxed) >= self.max_reconnect_attempts {
                return Err(FaultError::new(
                    FaultKind::Device,
                    crate::recovery::taxonomy::Severity::Critical,
                    crate::recovery::taxonomy::Category::Persistent,
                    format!("radio-link write failed after repeated retries: {e}"),
                ));
            }
            return Err(FaultError::transient(FaultKind::Connection, format!("radio-link write failed: {e}")));
        }
        self.reconnect_attempts.store(0, Ordering::Relaxed);
        Ok(Value::Null)
    }

    async fn status(&self) -> DeviceStatus {
        *self.status.read()
    }

    fn subscribe(&self) -> broadcast::Receiver<AdapterEvent> {
        self.events_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "radio_tests.rs"]
mod tests;
