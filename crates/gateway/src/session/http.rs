// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP control-plane handlers backing the thin `gwctl` CLI surface (design note 6,
//! "CLI surface") and process health checks.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, GatewayError};
use crate::pattern::model::Pattern;
use crate::registry::device::{DeviceConfig, DeviceInfo, DeviceRecord};
use crate::session::state::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub session_count: usize,
    pub device_count: usize,
}

pub async fn health(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        session_count: state.session_count().await,
        device_count: state.registry.list().await.len(),
    })
}

pub async fn list_devices(State(state): State<Arc<GatewayState>>) -> Json<Vec<DeviceRecord>> {
    Json(state.registry.list().await)
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub session_count: usize,
    pub device_count: usize,
    pub telemetry: crate::telemetry::TelemetryStats,
}

/// Backs `gwctl monitor stats` (design note 6, "CLI surface").
pub async fn stats(State(state): State<Arc<GatewayState>>) -> Result<Json<StatsResponse>, GatewayError> {
    let telemetry = state
        .telemetry
        .stats()
        .await
        .map_err(|e| GatewayError::new(ErrorKind::Internal, e.to_string()))?;
    Ok(Json(StatsResponse {
        session_count: state.session_count().await,
        device_count: state.registry.list().await.len(),
        telemetry,
    }))
}

pub async fn get_device(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<DeviceRecord>, GatewayError> {
    state
        .registry
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| GatewayError::new(ErrorKind::DeviceNotFound, format!("device '{id}' not found")))
}

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    #[serde(flatten)]
    pub info: DeviceInfo,
    #[serde(default)]
    pub config: Option<DeviceConfig>,
}

pub async fn register_device(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<Json<DeviceRecord>, GatewayError> {
    state.registry.add_or_update(req.info, req.config).await.map(Json)
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub id: String,
    pub connected: bool,
}

pub async fn connect_device(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<ConnectResponse>, GatewayError> {
    state.registry.connect(&id).await?;
    Ok(Json(ConnectResponse { id, connected: true }))
}

pub async fn disconnect_device(State(state): State<Arc<GatewayState>>, Path(id): Path<String>) -> impl IntoResponse {
    state.registry.disconnect(&id).await;
    Json(ConnectResponse { id, connected: false })
}

#[derive(Debug, Deserialize)]
pub struct ValidatePatternRequest {
    pub pattern: Pattern,
}

#[derive(Debug, Serialize)]
pub struct ValidatePatternResponse {
    pub valid: bool,
    pub duration_ms: Option<u64>,
    pub dimensions: u8,
}

/// Resample a few points across the pattern's own declared timeline and confirm every
/// sample stays within its declared envelope (design note 3 invariant, "every sample
/// returns intensity within the pattern's declared [min, max] envelope").
pub async fn validate_pattern(Json(req): Json<ValidatePatternRequest>) -> Result<Json<ValidatePatternResponse>, GatewayError> {
    let pattern = req.pattern;
    let (min, max) = pattern.envelope();
    let probe_duration = pattern.duration_ms().unwrap_or(10_000);
    let steps = 10u64;
    for step in 0..=steps {
        let t = probe_duration * step / steps;
        let sample = pattern.intensity_at(t);
        if sample < min || sample > max {
            return Err(GatewayError::new(
                ErrorKind::Validation,
                format!("pattern sample at t={t}ms ({sample}) falls outside declared envelope [{min}, {max}]"),
            ));
        }
    }

    Ok(Json(ValidatePatternResponse { valid: true, duration_ms: pattern.duration_ms(), dimensions: pattern.dimensions() }))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
