// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for `gatewayd`'s control plane (design note 6). `gwctl` is a pure
//! consumer of this API; the wire shapes here are duplicated from, not imported from,
//! the `gateway` crate so the CLI never embeds gateway logic.

use std::time::Duration;

use serde_json::Value;

use crate::ConnectionArgs;

/// A handled failure talking to the gateway: maps to exit code `1` (design note 6).
#[derive(Debug)]
pub struct ClientError {
    pub message: String,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self { message: e.to_string() }
    }
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

pub struct GatewayClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(args: &ConnectionArgs) -> Self {
        Self {
            base_url: args.gateway_url.trim_end_matches('/').to_owned(),
            token: args.token.clone(),
            http: reqwest::Client::builder().timeout(Duration::from_secs(10)).build().unwrap_or_default(),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, ClientError> {
        let response = self.authorize(builder).send().await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_owned();
            return Err(ClientError::new(format!("{status}: {message}")));
        }
        Ok(body)
    }

    pub async fn list_devices(&self) -> Result<Value, ClientError> {
        let url = format!("{}/api/v1/devices", self.base_url);
        self.send(self.http.get(url)).await
    }

    pub async fn register_device(&self, body: Value) -> Result<Value, ClientError> {
        let url = format!("{}/api/v1/devices", self.base_url);
        self.send(self.http.post(url).json(&body)).await
    }

    pub async fn connect_device(&self, id: &str) -> Result<Value, ClientError> {
        let url = format!("{}/api/v1/devices/{id}/connect", self.base_url);
        self.send(self.http.post(url)).await
    }

    pub async fn disconnect_device(&self, id: &str) -> Result<Value, ClientError> {
        let url = format!("{}/api/v1/devices/{id}/disconnect", self.base_url);
        self.send(self.http.post(url)).await
    }

    pub async fn validate_pattern(&self, pattern: Value) -> Result<Value, ClientError> {
        let url = format!("{}/api/v1/patterns/validate", self.base_url);
        self.send(self.http.post(url).json(&serde_json::json!({ "pattern": pattern }))).await
    }

    pub async fn stats(&self) -> Result<Value, ClientError> {
        let url = format!("{}/api/v1/stats", self.base_url);
        self.send(self.http.get(url)).await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
