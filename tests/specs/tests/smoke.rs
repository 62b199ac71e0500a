// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `gatewayd` binary and drive it over its
//! external HTTP control plane and duplex WebSocket transport (design note 6).

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use gateway_specs::GatewayProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

fn device_body(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "kind": "generic-vibrator",
        "protocol": "duplex-stream",
        "address": "ws://127.0.0.1:1/unreachable",
        "capabilities": ["vibrate"],
        "config": {
            "intensity_cap": 80,
            "allowed_patterns": [],
            "cooldown_ms": 0,
            "max_session_duration_ms": null,
            "auto_connect": false,
        },
    })
}

#[tokio::test]
async fn http_health_reports_zero_devices_on_startup() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::get(format!("{}/api/v1/health", gw.base_url())).await?.json().await?;
    assert_eq!(resp["status"], "ok");
    assert_eq!(resp["device_count"], 0);

    Ok(())
}

#[tokio::test]
async fn http_stats_exposes_telemetry_counters() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::get(format!("{}/api/v1/stats", gw.base_url())).await?.json().await?;
    assert_eq!(resp["session_count"], 0);
    assert!(resp["telemetry"]["buffered_points"].is_number());

    Ok(())
}

#[tokio::test]
async fn device_register_then_list_then_get() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let registered: serde_json::Value =
        client.post(format!("{}/api/v1/devices", gw.base_url())).json(&device_body("dev-1")).send().await?.json().await?;
    assert_eq!(registered["id"], "dev-1");
    assert_eq!(registered["status"], "unknown");

    let list: serde_json::Value = client.get(format!("{}/api/v1/devices", gw.base_url())).send().await?.json().await?;
    assert_eq!(list.as_array().map(|a| a.len()), Some(1));

    let fetched: serde_json::Value = client.get(format!("{}/api/v1/devices/dev-1", gw.base_url())).send().await?.json().await?;
    assert_eq!(fetched["id"], "dev-1");
    assert_eq!(fetched["config"]["intensity_cap"], 80);

    Ok(())
}

#[tokio::test]
async fn device_get_missing_returns_device_not_found() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/api/v1/devices/does-not-exist", gw.base_url())).send().await?;
    assert_eq!(resp.status().as_u16(), 404);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "DEVICE_NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn connect_unreachable_device_surfaces_device_disconnected() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    client.post(format!("{}/api/v1/devices", gw.base_url())).json(&device_body("dev-2")).send().await?;

    let resp = client.post(format!("{}/api/v1/devices/dev-2/connect", gw.base_url())).send().await?;
    assert_eq!(resp.status().as_u16(), 409);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "DEVICE_DISCONNECTED");

    Ok(())
}

#[tokio::test]
async fn device_config_dir_rejects_unrecognized_kind_and_undeclared_capability() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    tokio::fs::write(
        dir.path().join("generic-vibrator.json"),
        serde_json::json!({
            "type": "generic-vibrator",
            "name": "Generic Vibrator",
            "version": "1.0.0",
            "features": ["vibrate"],
        })
        .to_string(),
    )
    .await?;

    let gw = GatewayProcess::start(&["--device-config-dir", dir.path().to_str().expect("utf8 path")])?;
    gw.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    // Recognized kind, declared capability: accepted.
    let ok = client.post(format!("{}/api/v1/devices", gw.base_url())).json(&device_body("dev-cat-1")).send().await?;
    assert_eq!(ok.status().as_u16(), 200);

    // Recognized kind, undeclared capability: rejected before reaching the registry record.
    let mut undeclared = device_body("dev-cat-2");
    undeclared["capabilities"] = serde_json::json!(["rotate"]);
    let resp = client.post(format!("{}/api/v1/devices", gw.base_url())).json(&undeclared).send().await?;
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Unrecognized kind, once the catalog is non-empty: rejected.
    let mut unknown_kind = device_body("dev-cat-3");
    unknown_kind["kind"] = serde_json::json!("not-a-real-kind");
    let resp = client.post(format!("{}/api/v1/devices", gw.base_url())).json(&unknown_kind).send().await?;
    assert_eq!(resp.status().as_u16(), 400);

    Ok(())
}

#[tokio::test]
async fn disconnect_is_idempotent_for_offline_device() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    client.post(format!("{}/api/v1/devices", gw.base_url())).json(&device_body("dev-3")).send().await?;

    let resp: serde_json::Value =
        client.post(format!("{}/api/v1/devices/dev-3/disconnect", gw.base_url())).send().await?.json().await?;
    assert_eq!(resp["connected"], false);

    Ok(())
}

#[tokio::test]
async fn pattern_validate_accepts_an_in_envelope_wave() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let pattern = json!({ "kind": "wave", "min": 10, "max": 90, "period_ms": 2000 });
    let resp: serde_json::Value = client
        .post(format!("{}/api/v1/patterns/validate", gw.base_url()))
        .json(&json!({ "pattern": pattern }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["valid"], true);
    assert_eq!(resp["dimensions"], 1);

    Ok(())
}

#[tokio::test]
async fn ws_welcome_carries_negotiated_heartbeat() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&["--ping-interval-ms", "9000", "--ping-timeout-ms", "3000"])?;
    gw.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(gw.ws_url()).await?;
    let msg = tokio::time::timeout(TIMEOUT, ws.next()).await?.ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
    let text = match msg {
        Message::Text(t) => t.to_string(),
        other => anyhow::bail!("expected text ws message, got: {other:?}"),
    };
    let parsed: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(parsed["type"], "welcome");
    assert_eq!(parsed["payload"]["heartbeat"]["ping_interval_ms"], 9000);
    assert_eq!(parsed["payload"]["heartbeat"]["ping_timeout_ms"], 3000);

    Ok(())
}

#[tokio::test]
async fn ws_ping_pong_round_trip() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(gw.ws_url()).await?;
    let _welcome = tokio::time::timeout(TIMEOUT, ws.next()).await?;

    ws.send(Message::Text(r#"{"id":"c1","type":"ping","payload":{},"timestamp":0}"#.into())).await?;
    let msg = tokio::time::timeout(TIMEOUT, ws.next()).await?.ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
    let text = match msg {
        Message::Text(t) => t.to_string(),
        other => anyhow::bail!("expected text ws message, got: {other:?}"),
    };
    let parsed: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(parsed["type"], "pong");
    assert_eq!(parsed["id"], "c1");

    Ok(())
}

#[tokio::test]
async fn ws_unknown_frame_kind_does_not_close_the_session() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(gw.ws_url()).await?;
    let _welcome = tokio::time::timeout(TIMEOUT, ws.next()).await?;

    ws.send(Message::Text(r#"{"id":"c1","type":"not_a_real_type","payload":{},"timestamp":0}"#.into())).await?;
    let err_msg = tokio::time::timeout(TIMEOUT, ws.next()).await?.ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
    let parsed: serde_json::Value = serde_json::from_str(&err_msg.into_text()?)?;
    assert_eq!(parsed["type"], "error");
    assert_eq!(parsed["payload"]["code"], "PROTOCOL_ERROR");

    // The session must still be alive: a follow-up ping gets a pong.
    ws.send(Message::Text(r#"{"id":"c2","type":"ping","payload":{},"timestamp":0}"#.into())).await?;
    let pong = tokio::time::timeout(TIMEOUT, ws.next()).await?.ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
    let parsed: serde_json::Value = serde_json::from_str(&pong.into_text()?)?;
    assert_eq!(parsed["type"], "pong");

    Ok(())
}

#[tokio::test]
async fn ws_list_devices_and_subscribe_roundtrip() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();
    client.post(format!("{}/api/v1/devices", gw.base_url())).json(&device_body("dev-4")).send().await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(gw.ws_url()).await?;
    let _welcome = tokio::time::timeout(TIMEOUT, ws.next()).await?;

    ws.send(Message::Text(r#"{"id":"c1","type":"list_devices","payload":{},"timestamp":0}"#.into())).await?;
    let msg = tokio::time::timeout(TIMEOUT, ws.next()).await?.ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
    let parsed: serde_json::Value = serde_json::from_str(&msg.into_text()?)?;
    assert_eq!(parsed["type"], "device_list");
    assert_eq!(parsed["payload"]["devices"].as_array().map(|a| a.len()), Some(1));

    ws.send(Message::Text(r#"{"id":"c2","type":"subscribe_device","payload":{"device_id":"dev-4"},"timestamp":0}"#.into()))
        .await?;
    let msg = tokio::time::timeout(TIMEOUT, ws.next()).await?.ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
    let parsed: serde_json::Value = serde_json::from_str(&msg.into_text()?)?;
    assert_eq!(parsed["type"], "subscription_success");
    assert_eq!(parsed["payload"]["device_id"], "dev-4");

    Ok(())
}

#[tokio::test]
async fn ws_device_command_on_unknown_device_fails_without_reaching_an_adapter() -> anyhow::Result<()> {
    let gw = GatewayProcess::start(&[])?;
    gw.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(gw.ws_url()).await?;
    let _welcome = tokio::time::timeout(TIMEOUT, ws.next()).await?;

    let payload = json!({
        "id": "c1",
        "type": "device_command",
        "payload": { "device_id": "ghost", "kind": "vibrate", "intensity": 50 },
        "timestamp": 0,
    });
    ws.send(Message::Text(payload.to_string().into())).await?;
    let msg = tokio::time::timeout(TIMEOUT, ws.next()).await?.ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
    let parsed: serde_json::Value = serde_json::from_str(&msg.into_text()?)?;
    assert_eq!(parsed["type"], "error");
    assert_eq!(parsed["payload"]["code"], "DEVICE_NOT_FOUND");

    Ok(())
}
