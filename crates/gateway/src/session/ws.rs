// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport: admission, authentication, per-connection FIFO dispatch, heartbeat,
//! and subscription-filtered event forwarding (design note 4.1).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::command::model::Command;
use crate::error::{ErrorKind, GatewayError};
use crate::registry::RegistryEvent;
use crate::security::guard::AdmissionError;
use crate::session::message::{ClientRequest, Frame, ServerReply};
use crate::session::state::{GatewayState, SessionHandle};

#[derive(Debug, Clone, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// `GET /ws` — the one duplex transport endpoint (design note 6, "Client transport").
pub async fn ws_handler(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<WsQuery>,
    headers: axum::http::HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // Capacity is checked before any authentication work (design note 4.1).
    if state.at_capacity().await {
        return GatewayError::new(ErrorKind::Internal, "gateway at capacity")
            .with_details(serde_json::json!({ "code": "CAPACITY" }))
            .into_response();
    }

    let source_addr = addr.ip().to_string();

    if let Err(e) = state.guard.admit_connection(&source_addr) {
        return admission_error_response(e);
    }

    let principal = if state.config.no_auth {
        default_principal()
    } else {
        let token = query
            .token
            .clone()
            .or_else(|| bearer_token(&headers))
            .unwrap_or_default();
        match state.guard.authenticate(&source_addr, &token) {
            Ok(p) => p,
            Err(e) => return admission_error_response(e),
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, principal, source_addr)).into_response()
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn default_principal() -> crate::security::token::Principal {
    crate::security::token::Principal {
        user_id: "anonymous".into(),
        can_control: true,
        can_configure: true,
        can_monitor: true,
        allowed_patterns: Default::default(),
        intensity_cap: 100,
        time_window: None,
        exp_ms: u64::MAX,
    }
}

fn admission_error(e: AdmissionError) -> GatewayError {
    match e {
        AdmissionError::Blacklisted => GatewayError::new(ErrorKind::Authz, "source is temporarily blocked"),
        AdmissionError::AuthFailed => GatewayError::new(ErrorKind::Auth, "authentication failed"),
        AdmissionError::Capacity => GatewayError::new(ErrorKind::Internal, "gateway at capacity"),
    }
}

fn admission_error_response(e: AdmissionError) -> axum::response::Response {
    admission_error(e).into_response()
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<GatewayState>,
    principal: crate::security::token::Principal,
    source_addr: String,
) {
    let session_id = Uuid::new_v4().to_string();
    let handle = Arc::new(SessionHandle {
        session_id: session_id.clone(),
        user_id: principal.user_id.clone(),
        principal: tokio::sync::RwLock::new(principal),
        source_addr,
        subscriptions: tokio::sync::RwLock::new(Default::default()),
        seq: std::sync::atomic::AtomicU64::new(0),
        cancel: state.scheduler.child_token(),
    });
    state.register_session(handle.clone()).await;
    tracing::info!(session_id = %session_id, "session opened");
    state.telemetry.track(
        crate::telemetry::TelemetryPoint::new(crate::telemetry::TelemetryKind::Session, "gateway", now_ms())
            .with_value("opened", 1.0)
            .with_context(serde_json::json!({ "session_id": session_id })),
    );

    let (mut tx, mut rx) = socket.split();
    let welcome = ServerReply::Welcome {
        session_id: session_id.clone(),
        ping_interval_ms: state.config.ping_interval_ms,
        ping_timeout_ms: state.config.ping_timeout_ms,
    }
    .into_frame("", now_ms());
    if send_frame(&mut tx, &welcome).await.is_err() {
        state.remove_session(&session_id).await;
        return;
    }

    let mut registry_events = state.registry.subscribe();
    let mut ping_timer = tokio::time::interval(state.config.ping_interval());
    let mut awaiting_pong = false;
    let mut missed_deadline = tokio::time::Instant::now() + state.config.ping_timeout();

    loop {
        tokio::select! {
            _ = handle.cancel.cancelled() => break,

            _ = ping_timer.tick() => {
                if awaiting_pong && tokio::time::Instant::now() >= missed_deadline {
                    tracing::warn!(session_id = %session_id, "heartbeat lost, closing session");
                    break;
                }
                if tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
                missed_deadline = tokio::time::Instant::now() + state.config.ping_timeout();
            }

            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Text(text))) => {
                        awaiting_pong = false;
                        match serde_json::from_str::<Frame>(&text) {
                            Ok(frame) => {
                                let reply = dispatch(&state, &handle, frame.clone()).await;
                                let fatal = matches!(&reply, ServerReply::Error(e) if e.kind.terminates_session());
                                if send_frame(&mut tx, &reply.into_frame(frame.id, now_ms())).await.is_err() {
                                    break;
                                }
                                if fatal {
                                    tracing::warn!(session_id = %session_id, "terminating session after fatal message handler error");
                                    break;
                                }
                            }
                            Err(e) => {
                                let err = GatewayError::new(ErrorKind::Protocol, format!("malformed frame: {e}"));
                                let reply = ServerReply::Error(err).into_frame("", now_ms());
                                let _ = send_frame(&mut tx, &reply).await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }

            event = registry_events.recv() => {
                match event {
                    Ok(RegistryEvent::DeviceUpdated(record)) => {
                        if handle.subscriptions.read().await.contains(&record.id) {
                            let payload = serde_json::json!({ "event": "device_updated", "device": record });
                            let reply = ServerReply::DeviceEvent { event: payload }.into_frame("", now_ms());
                            if send_frame(&mut tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(RegistryEvent::DeviceRemoved(id)) => {
                        if handle.subscriptions.read().await.contains(&id) {
                            let payload = serde_json::json!({ "event": "device_removed", "device_id": id });
                            let reply = ServerReply::DeviceEvent { event: payload }.into_frame("", now_ms());
                            if send_frame(&mut tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    state.remove_session(&session_id).await;
    tracing::info!(session_id = %session_id, "session closed");
    state.telemetry.track(
        crate::telemetry::TelemetryPoint::new(crate::telemetry::TelemetryKind::Session, "gateway", now_ms())
            .with_value("closed", 1.0)
            .with_context(serde_json::json!({ "session_id": session_id })),
    );
}

async fn send_frame(tx: &mut futures_util::stream::SplitSink<WebSocket, Message>, frame: &Frame) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_else(|_| "{}".to_owned());
    tx.send(Message::Text(text.into())).await
}

/// Dispatch one inbound request to completion before the next is read, preserving the
/// per-connection FIFO guarantee (design note 4.1).
async fn dispatch(state: &Arc<GatewayState>, handle: &Arc<SessionHandle>, frame: Frame) -> ServerReply {
    let request = match ClientRequest::parse(&frame) {
        Ok(r) => r,
        Err(e) => return ServerReply::Error(e),
    };

    match request {
        ClientRequest::Ping => ServerReply::Pong,
        ClientRequest::ListDevices { capability } => {
            let mut devices: Vec<_> = state.registry.list().await;
            if let Some(token) = capability {
                devices.retain(|d| d.has_capability(&token));
            }
            ServerReply::DeviceList { devices: serde_json::to_value(devices).unwrap_or(Value::Null) }
        }
        ClientRequest::DeviceStatus { device_id } => match state.registry.get(&device_id).await {
            Some(record) => ServerReply::DeviceStatus { device: serde_json::to_value(record).unwrap_or(Value::Null) },
            None => ServerReply::Error(GatewayError::new(ErrorKind::DeviceNotFound, format!("device '{device_id}' not found"))),
        },
        ClientRequest::SubscribeDevice { device_id } => {
            handle.subscriptions.write().await.insert(device_id.clone());
            ServerReply::SubscriptionSuccess { device_id }
        }
        ClientRequest::UnsubscribeDevice { device_id } => {
            handle.subscriptions.write().await.remove(&device_id);
            ServerReply::UnsubscriptionSuccess { device_id }
        }
        ClientRequest::DeviceCommand(payload) => dispatch_command(state, handle, payload).await,
        ClientRequest::AuthRefresh { token } => match state.guard.authenticate(&handle.source_addr, &token) {
            Ok(principal) => {
                let exp_ms = principal.exp_ms;
                *handle.principal.write().await = principal;
                ServerReply::AuthRefreshed { exp_ms }
            }
            Err(e) => ServerReply::Error(admission_error(e)),
        },
    }
}

async fn dispatch_command(
    state: &Arc<GatewayState>,
    handle: &Arc<SessionHandle>,
    payload: crate::session::message::DeviceCommandPayload,
) -> ServerReply {
    let principal = handle.principal.read().await.clone();
    if !principal.can_control {
        return ServerReply::Error(GatewayError::new(ErrorKind::Authz, "session is not permitted to control devices"));
    }
    if !principal.is_within_time_window(now_ms()) {
        return ServerReply::Error(GatewayError::new(ErrorKind::Authz, "outside the session's permitted time window"));
    }
    if !state.try_take_control(&payload.device_id, &handle.session_id) {
        return ServerReply::Error(GatewayError::new(ErrorKind::DeviceBusy, "device is controlled by another session"));
    }

    let record = match state.registry.get(&payload.device_id).await {
        Some(r) => r,
        None => return ServerReply::Error(GatewayError::new(ErrorKind::DeviceNotFound, format!("device '{}' not found", payload.device_id))),
    };

    let intensity = payload.intensity.min(principal.intensity_cap);

    if let Some(pattern) = payload.pattern {
        return match payload.kind {
            crate::command::model::CommandKind::PatternStop => {
                state.patterns.stop(&payload.device_id, &handle.session_id).await;
                ServerReply::CommandSuccess { result: serde_json::json!({ "stopped": true }) }
            }
            _ => match state.patterns.start(payload.device_id.clone(), pattern, handle.session_id.clone()).await {
                Ok(()) => ServerReply::CommandSuccess { result: serde_json::json!({ "started": true }) },
                Err(e) => ServerReply::Error(e),
            },
        };
    }

    let command = Command {
        device_id: payload.device_id,
        kind: payload.kind,
        intensity,
        pattern_ref: None,
        pattern_params: payload.pattern_params,
        deadline_ms: payload.deadline_ms,
        priority: payload.priority,
        session_seq: handle.next_seq(),
        session_id: handle.session_id.clone(),
        attempt: 0,
        enqueued_at_ms: now_ms(),
    };

    match state.processor.submit(command, &record.config).await {
        Ok(rx) => match rx.await {
            Ok(Ok(result)) => ServerReply::CommandSuccess { result },
            Ok(Err(e)) => ServerReply::Error(e),
            Err(_) => ServerReply::Error(GatewayError::new(ErrorKind::Internal, "command dropped before dispatch")),
        },
        Err(e) => ServerReply::Error(e),
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or(Duration::ZERO).as_millis() as u64
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
