// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session gateway: the duplex transport endpoint, its control-plane HTTP companion, and
//! the shared state they both dispatch into (design note 4.1).

pub mod http;
pub mod message;
pub mod state;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::session::state::GatewayState;

/// Build the axum `Router` exposing the WebSocket transport and the thin HTTP control
/// plane `gwctl` talks to (design note 6).
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/stats", get(http::stats))
        .route("/api/v1/devices", get(http::list_devices).post(http::register_device))
        .route("/api/v1/devices/{id}", get(http::get_device))
        .route("/api/v1/devices/{id}/connect", post(http::connect_device))
        .route("/api/v1/devices/{id}/disconnect", post(http::disconnect_device))
        .route("/api/v1/patterns/validate", post(http::validate_pattern))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
