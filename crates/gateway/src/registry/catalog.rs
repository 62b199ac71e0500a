// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-device-type catalog: loads `<type>.json` files from a directory and validates
//! them against the device schema.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, GatewayError};
use crate::registry::store::list_json_files;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingInfo {
    pub currency: String,
    pub amount: f64,
}

/// A validated device-type catalog entry (design note 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTypeEntry {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    pub features: Vec<String>,
    #[serde(default)]
    pub pricing: Option<PricingInfo>,
    #[serde(default)]
    pub requirements: Option<serde_json::Value>,
}

impl DeviceTypeEntry {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.type_name.trim().is_empty() {
            return Err(GatewayError::new(ErrorKind::Validation, "device type: `type` is required"));
        }
        if self.name.trim().is_empty() || self.name.len() > 64 {
            return Err(GatewayError::new(
                ErrorKind::Validation,
                "device type: `name` must be 1..=64 chars",
            ));
        }
        if parse_semver(&self.version).is_none() {
            return Err(GatewayError::new(
                ErrorKind::Validation,
                format!("device type '{}': version '{}' is not semver", self.type_name, self.version),
            ));
        }
        // Feature tokens are free-form per design note 3 ("vibrate, rotate, pattern,
        // position, sync, ..."); `Registry::add_or_update` is the gate that matters,
        // checking a device's capabilities against this entry's own declared `features`.
        Ok(())
    }
}

fn parse_semver(s: &str) -> Option<(u64, u64, u64)> {
    let mut parts = s.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

/// A loaded, validated catalog keyed by device type name.
#[derive(Debug, Default, Clone)]
pub struct DeviceCatalog {
    entries: HashMap<String, DeviceTypeEntry>,
}

impl DeviceCatalog {
    pub fn get(&self, type_name: &str) -> Option<&DeviceTypeEntry> {
        self.entries.get(type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Load and validate every `*.json` file in `dir`. A malformed file is a configuration
    /// error that should abort startup per design note 7; a feature token reused across
    /// two types is a warning, not a rejection.
    pub async fn load_dir(dir: &Path) -> anyhow::Result<Self> {
        let files = list_json_files(dir).await?;
        let mut entries = HashMap::new();
        let mut seen_features: HashSet<String> = HashSet::new();

        for path in files {
            let contents = tokio::fs::read_to_string(&path).await?;
            let entry: DeviceTypeEntry = serde_json::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
            entry.validate().map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;

            for feature in &entry.features {
                if !seen_features.insert(feature.clone()) {
                    tracing::warn!(feature = %feature, type_name = %entry.type_name, "feature token reused across device types");
                }
            }

            entries.insert(entry.type_name.clone(), entry);
        }

        Ok(Self { entries })
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
