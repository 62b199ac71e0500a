// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client transport wire format: length-delimited-at-the-websocket-layer JSON frames
//! (design note 6, "Client transport").

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::model::{CommandKind, Priority};
use crate::error::{ErrorKind, GatewayError};
use crate::pattern::model::Pattern;

/// `{ id, type, payload, timestamp }` — the one frame shape used for both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    pub timestamp: u64,
}

/// A parsed `device_command` payload, covering both plain commands and pattern control.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCommandPayload {
    pub device_id: String,
    pub kind: CommandKind,
    #[serde(default)]
    pub intensity: u8,
    #[serde(default)]
    pub pattern: Option<Pattern>,
    #[serde(default)]
    pub pattern_params: Option<Value>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default = "default_priority")]
    pub priority: Priority,
}

fn default_priority() -> Priority {
    Priority::Normal
}

/// Requests a client session may send, parsed from a [`Frame`]'s `type`/`payload`
/// (design note 4.1).
#[derive(Debug, Clone)]
pub enum ClientRequest {
    Ping,
    DeviceCommand(DeviceCommandPayload),
    DeviceStatus { device_id: String },
    SubscribeDevice { device_id: String },
    UnsubscribeDevice { device_id: String },
    ListDevices { capability: Option<String> },
    AuthRefresh { token: String },
}

impl ClientRequest {
    /// Decode a frame's `type` and `payload`. Unknown kinds are rejected with a typed
    /// `Protocol` error but must not terminate the session (design note 4.1).
    pub fn parse(frame: &Frame) -> Result<Self, GatewayError> {
        match frame.kind.as_str() {
            "ping" => Ok(ClientRequest::Ping),
            "device_command" => {
                let payload: DeviceCommandPayload = serde_json::from_value(frame.payload.clone())
                    .map_err(|e| GatewayError::new(ErrorKind::Validation, format!("invalid device_command payload: {e}")))?;
                Ok(ClientRequest::DeviceCommand(payload))
            }
            "device_status" => {
                let device_id = payload_device_id(&frame.payload)?;
                Ok(ClientRequest::DeviceStatus { device_id })
            }
            "subscribe_device" => {
                let device_id = payload_device_id(&frame.payload)?;
                Ok(ClientRequest::SubscribeDevice { device_id })
            }
            "unsubscribe_device" => {
                let device_id = payload_device_id(&frame.payload)?;
                Ok(ClientRequest::UnsubscribeDevice { device_id })
            }
            "list_devices" => {
                let capability = frame.payload.get("capability").and_then(Value::as_str).map(str::to_owned);
                Ok(ClientRequest::ListDevices { capability })
            }
            "auth_refresh" => {
                let token = frame
                    .payload
                    .get("token")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| GatewayError::new(ErrorKind::Validation, "payload missing 'token'"))?;
                Ok(ClientRequest::AuthRefresh { token })
            }
            other => Err(GatewayError::new(ErrorKind::Protocol, format!("unknown request type '{other}'"))),
        }
    }
}

fn payload_device_id(payload: &Value) -> Result<String, GatewayError> {
    payload
        .get("device_id")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| GatewayError::new(ErrorKind::Validation, "payload missing 'device_id'"))
}

/// Replies a server session may send, each mapped onto the `type` values in design note 6.
#[derive(Debug, Clone)]
pub enum ServerReply {
    Welcome { session_id: String, ping_interval_ms: u64, ping_timeout_ms: u64 },
    Pong,
    CommandSuccess { result: Value },
    DeviceStatus { device: Value },
    DeviceList { devices: Value },
    DeviceEvent { event: Value },
    SubscriptionSuccess { device_id: String },
    UnsubscriptionSuccess { device_id: String },
    AuthRefreshed { exp_ms: u64 },
    Error(GatewayError),
}

impl ServerReply {
    /// Render into the outbound [`Frame`], echoing `correlation_id` from the request that
    /// produced this reply (empty for server-initiated pushes such as `device_event`).
    pub fn into_frame(self, correlation_id: impl Into<String>, now_ms: u64) -> Frame {
        let (kind, payload) = match self {
            ServerReply::Welcome { session_id, ping_interval_ms, ping_timeout_ms } => (
                "welcome",
                serde_json::json!({
                    "session_id": session_id,
                    "heartbeat": { "ping_interval_ms": ping_interval_ms, "ping_timeout_ms": ping_timeout_ms },
                }),
            ),
            ServerReply::Pong => ("pong", Value::Null),
            ServerReply::CommandSuccess { result } => ("command_success", result),
            ServerReply::DeviceStatus { device } => ("device_status", device),
            ServerReply::DeviceList { devices } => ("device_list", serde_json::json!({ "devices": devices })),
            ServerReply::DeviceEvent { event } => ("device_event", event),
            ServerReply::SubscriptionSuccess { device_id } => {
                ("subscription_success", serde_json::json!({ "device_id": device_id }))
            }
            ServerReply::UnsubscriptionSuccess { device_id } => {
                ("unsubscription_success", serde_json::json!({ "device_id": device_id }))
            }
            ServerReply::AuthRefreshed { exp_ms } => ("auth_refresh_success", serde_json::json!({ "exp_ms": exp_ms })),
            ServerReply::Error(err) => ("error", serde_json::to_value(err.to_error_body()).unwrap_or(Value::Null)),
        };

        Frame { id: correlation_id.into(), kind: kind.to_owned(), payload, timestamp: now_ms }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
