// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Internal fault classification. Distinct from the client-facing [`crate::error::ErrorKind`]:
/// several fault kinds (e.g. `DeviceBusy` retries) may resolve to the same client code, or to
/// none at all if recovery succeeds before the caller ever sees a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    Connection,
    Timeout,
    Protocol,
    Device,
    DeviceBusy,
    Command,
    InvalidCommand,
    InvalidResponse,
    Resource,
    Configuration,
    Validation,
    Auth,
    Authorization,
    RateLimit,
    Security,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Transient,
    Persistent,
    Fatal,
}

/// A classified fault flowing through the recovery pipeline.
#[derive(Debug, Clone)]
pub struct FaultError {
    pub kind: FaultKind,
    pub severity: Severity,
    pub category: Category,
    pub message: String,
}

impl FaultError {
    pub fn new(kind: FaultKind, severity: Severity, category: Category, message: impl Into<String>) -> Self {
        Self { kind, severity, category, message: message.into() }
    }

    /// Shorthand for a transient fault of `Error` severity, the common case for adapter I/O.
    pub fn transient(kind: FaultKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, Category::Transient, message)
    }

    pub fn fatal(kind: FaultKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Critical, Category::Fatal, message)
    }

    /// A `(kind, message)` key used for log-storm dedup within `error_window`.
    pub fn dedup_key(&self) -> (FaultKind, String) {
        (self.kind, self.message.clone())
    }
}

impl fmt::Display for FaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.kind, self.category, self.message)
    }
}

impl std::error::Error for FaultError {}

#[cfg(test)]
#[path = "taxonomy_tests.rs"]
mod tests;
