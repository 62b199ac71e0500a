// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol adapters bridge the registry's device-shaped operations to wire bytes. Each
//! device is bound to exactly one adapter instance, created through an [`AdapterFactory`]
//! keyed by the device's protocol tag (design note 4, "Protocol Adapters").

pub mod batching;
pub mod duplex;
pub mod radio;
pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::recovery::taxonomy::FaultError;
use crate::registry::device::DeviceStatus;

/// Out-of-band events an adapter emits while it runs: link state changes and unsolicited
/// device reports. Command *results* flow back through `send`'s return value instead.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    Connected,
    Disconnected { reason: String },
    StatusChanged(DeviceStatus),
    Telemetry(Value),
    Fault(FaultError),
}

/// The contract every protocol adapter implements. Adapters own their reconnect policy;
/// the registry only calls `connect`/`disconnect`/`send` and listens on `subscribe`.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    async fn connect(&self) -> Result<(), FaultError>;
    async fn disconnect(&self);
    async fn send(&self, payload: &Value) -> Result<Value, FaultError>;
    async fn status(&self) -> DeviceStatus;
    fn subscribe(&self) -> broadcast::Receiver<AdapterEvent>;

    /// Network + processing latency estimate, used by the pattern engine to schedule ticks
    /// early (design note 4.6, "Latency compensation"). Adapters with no better estimate
    /// default to zero; this is not itself a suspension point.
    fn latency_estimate(&self) -> Duration {
        Duration::ZERO
    }
}

type AdapterConstructor =
    Arc<dyn Fn(&str, &Value) -> anyhow::Result<Arc<dyn ProtocolAdapter>> + Send + Sync>;

/// Maps a device's `protocol` tag (e.g. `"duplex-stream"`, `"radio-link"`) to the adapter
/// implementation that speaks it. New protocols register a constructor at startup.
#[derive(Clone, Default)]
pub struct AdapterFactory {
    constructors: HashMap<String, AdapterConstructor>,
}

impl AdapterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, protocol: impl Into<String>, ctor: F)
    where
        F: Fn(&str, &Value) -> anyhow::Result<Arc<dyn ProtocolAdapter>> + Send + Sync + 'static,
    {
        self.constructors.insert(protocol.into(), Arc::new(ctor));
    }

    pub fn create(&self, protocol: &str, address: &str, options: &Value) -> anyhow::Result<Arc<dyn ProtocolAdapter>> {
        let ctor = self
            .constructors
            .get(protocol)
            .ok_or_else(|| anyhow::anyhow!("no adapter registered for protocol '{protocol}'"))?;
        ctor(address, options)
    }

    /// The factory pre-wired with the two protocols this gateway ships adapters for.
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register("duplex-stream", |address, _options| {
            Ok(Arc::new(duplex::DuplexStreamAdapter::new(address.to_owned())) as Arc<dyn ProtocolAdapter>)
        });
        factory.register("radio-link", |address, options| {
            let channel = options
                .get("channel")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u8;
            Ok(Arc::new(radio::RadioLinkAdapter::new(address.to_owned(), channel)) as Arc<dyn ProtocolAdapter>)
        });
        factory
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
