// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use futures_util::{SinkExt, StreamExt};

use super::*;
use crate::registry::device::DeviceStatus;

#[tokio::test]
async fn fresh_adapter_starts_offline() {
    let adapter = DuplexStreamAdapter::new("ws://127.0.0.1:1/unreachable".to_owned());
    assert_eq!(adapter.status().await, DeviceStatus::Offline);
}

#[tokio::test]
async fn send_before_connect_is_a_connection_fault() {
    let adapter = DuplexStreamAdapter::new("ws://127.0.0.1:1/unreachable".to_owned());
    let err = adapter.send(&serde_json::json!({"intensity": 10})).await.unwrap_err();
    assert_eq!(err.kind, crate::recovery::taxonomy::FaultKind::Connection);
}

#[tokio::test]
async fn disconnect_before_connect_is_a_no_op() {
    let adapter = DuplexStreamAdapter::new("ws://127.0.0.1:1/unreachable".to_owned());
    adapter.disconnect().await;
    assert_eq!(adapter.status().await, DeviceStatus::Offline);
}

#[tokio::test]
async fn connect_to_an_unreachable_address_fails_fast() {
    let adapter = DuplexStreamAdapter::new("ws://127.0.0.1:1/unreachable".to_owned());
    let err = adapter.connect().await.unwrap_err();
    assert_eq!(err.kind, crate::recovery::taxonomy::FaultKind::Connection);
    assert_eq!(adapter.status().await, DeviceStatus::Offline);
}

/// Binds a loopback TCP listener, accepts one WebSocket handshake, and echoes every
/// frame back until the peer closes.
async fn spawn_echo_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                let (mut write, mut read) = ws.split();
                while let Some(Ok(msg)) = read.next().await {
                    if msg.is_close() {
                        break;
                    }
                    if write.send(msg).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    format!("ws://{addr}")
}

#[tokio::test]
async fn double_connect_reuses_the_same_run_loop() {
    let address = spawn_echo_server().await;
    let adapter = DuplexStreamAdapter::new(address);

    adapter.connect().await.unwrap();
    assert_eq!(adapter.status().await, DeviceStatus::Online);
    adapter.connect().await.unwrap();
    assert_eq!(adapter.status().await, DeviceStatus::Online);

    adapter.disconnect().await;
    assert_eq!(adapter.status().await, DeviceStatus::Offline);
}

#[tokio::test]
async fn send_after_connect_round_trips_through_the_echo_server() {
    let address = spawn_echo_server().await;
    let adapter = DuplexStreamAdapter::new(address);
    adapter.connect().await.unwrap();

    let reply = adapter.send(&serde_json::json!({"intensity": 42})).await.unwrap();
    assert_eq!(reply, serde_json::json!({"intensity": 42}));

    adapter.disconnect().await;
}
