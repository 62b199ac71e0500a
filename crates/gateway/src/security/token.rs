// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-token verification. Stateless: a token carries everything needed to recover a
//! [`Principal`] and its permission set without a database round trip (design note 4.2).

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, GatewayError};

/// Authenticated principal plus the permission set carried by its token (design note 3,
/// "Session").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub can_control: bool,
    pub can_configure: bool,
    pub can_monitor: bool,
    pub allowed_patterns: HashSet<String>,
    pub intensity_cap: u8,
    /// Optional `[start_minute, end_minute)` time-of-day window, minutes since UTC midnight.
    pub time_window: Option<(u16, u16)>,
    pub exp_ms: u64,
}

impl Principal {
    pub fn is_within_time_window(&self, now_ms: u64) -> bool {
        let Some((start, end)) = self.time_window else { return true };
        let minute_of_day = ((now_ms / 60_000) % 1440) as u16;
        if start <= end {
            minute_of_day >= start && minute_of_day < end
        } else {
            // Window wraps past midnight.
            minute_of_day >= start || minute_of_day < end
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.exp_ms
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    principal: Principal,
}

/// Verifies a short-lived signed credential and yields the [`Principal`] it authorizes.
/// Pluggable so asymmetric schemes can replace the default HMAC implementation without
/// touching the security guard (design note 9, "Deep class hierarchies").
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str, now_ms: u64) -> Result<Principal, GatewayError>;
}

/// Default verifier: a compact `header.payload.signature` token, base64url segments,
/// HMAC-SHA256 over `header.payload` (design note 4.2, "short-lived signed credential").
pub struct HmacTokenVerifier {
    key: hmac::Key,
}

impl HmacTokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self { key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_ref()) }
    }

    /// Issue a token for `principal`, for use by tests and `gwctl`'s credential minting.
    pub fn issue(&self, principal: &Principal) -> Result<String, GatewayError> {
        let header = base64url_encode(b"{\"alg\":\"HS256\"}");
        let payload_json = serde_json::to_vec(&TokenPayload { principal: principal.clone() })
            .map_err(|e| GatewayError::new(ErrorKind::Internal, e.to_string()))?;
        let payload = base64url_encode(&payload_json);
        let signing_input = format!("{header}.{payload}");
        let tag = hmac::sign(&self.key, signing_input.as_bytes());
        let signature = base64url_encode(tag.as_ref());
        Ok(format!("{signing_input}.{signature}"))
    }
}

impl TokenVerifier for HmacTokenVerifier {
    fn verify(&self, token: &str, now_ms: u64) -> Result<Principal, GatewayError> {
        let mut parts = token.split('.');
        let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(GatewayError::new(ErrorKind::Auth, "malformed token")),
        };

        let signing_input = format!("{header}.{payload}");
        let signature_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| GatewayError::new(ErrorKind::Auth, "malformed token signature"))?;
        hmac::verify(&self.key, signing_input.as_bytes(), &signature_bytes)
            .map_err(|_| GatewayError::new(ErrorKind::Auth, "token signature mismatch"))?;

        let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| GatewayError::new(ErrorKind::Auth, "malformed token payload"))?;
        let parsed: TokenPayload = serde_json::from_slice(&payload_bytes)
            .map_err(|_| GatewayError::new(ErrorKind::Auth, "malformed token payload"))?;

        if parsed.principal.is_expired(now_ms) {
            return Err(GatewayError::new(ErrorKind::Auth, "token expired"));
        }

        Ok(parsed.principal)
    }
}

fn base64url_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
