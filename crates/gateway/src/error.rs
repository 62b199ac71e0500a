// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-facing error taxonomy (API error codes, see design note 7).

use std::fmt;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Error codes surfaced to clients over HTTP/WS/gRPC-shaped replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Auth,
    Authz,
    RateLimitExceeded,
    DeviceNotFound,
    DeviceDisconnected,
    DeviceBusy,
    CommandFailed,
    Protocol,
    Timeout,
    CircuitOpen,
    Internal,
}

impl ErrorKind {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Auth => 401,
            Self::Authz => 403,
            Self::RateLimitExceeded => 429,
            Self::DeviceNotFound => 404,
            Self::DeviceDisconnected => 409,
            Self::DeviceBusy => 409,
            Self::CommandFailed => 502,
            Self::Protocol => 400,
            Self::Timeout => 504,
            Self::CircuitOpen => 503,
            Self::Internal => 500,
        }
    }

    /// Whether a session that produced this error as a message-handler result must be
    /// torn down rather than continue reading further frames (design note 4.1, "A failed
    /// message handler does not terminate the session unless the error kind is `auth`,
    /// `protocol-violation`, or `fatal`"). `Internal` stands in for "fatal" here: every
    /// other kind is a per-request outcome the session can recover from.
    pub fn terminates_session(&self) -> bool {
        matches!(self, Self::Auth | Self::Protocol | Self::Internal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Auth => "AUTH_ERROR",
            Self::Authz => "AUTHZ_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::DeviceNotFound => "DEVICE_NOT_FOUND",
            Self::DeviceDisconnected => "DEVICE_DISCONNECTED",
            Self::DeviceBusy => "DEVICE_BUSY",
            Self::CommandFailed => "COMMAND_FAILED",
            Self::Protocol => "PROTOCOL_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-facing error: a code plus a human message and optional structured detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.kind.as_str().to_owned(),
            message: self.message.clone(),
            details: self.details.clone(),
        }
    }

    pub fn to_http_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse { error: self.to_error_body() }))
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        self.to_http_response().into_response()
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code, human message, and optional detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
