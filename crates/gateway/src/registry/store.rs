// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device-record persistence, treated as an external key-value collaborator
//! (design note 6: `<prefix>:<device_id>` -> JSON record).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::registry::device::{DeviceId, DeviceRecord};

/// Persistence contract for device records. The gateway treats the backing store as an
/// external collaborator; only the in-memory default and a JSON-directory implementation
/// are provided here, deliberately staying out of the business of being a database.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn get(&self, id: &DeviceId) -> anyhow::Result<Option<DeviceRecord>>;
    async fn put(&self, record: &DeviceRecord) -> anyhow::Result<()>;
    async fn delete(&self, id: &DeviceId) -> anyhow::Result<()>;
    async fn list(&self) -> anyhow::Result<Vec<DeviceRecord>>;
}

/// In-memory store. Default for tests and for deployments with no external KV collaborator.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<DeviceId, DeviceRecord>>,
}

#[async_trait]
impl DeviceStore for InMemoryStore {
    async fn get(&self, id: &DeviceId) -> anyhow::Result<Option<DeviceRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn put(&self, record: &DeviceRecord) -> anyhow::Result<()> {
        self.records.write().await.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &DeviceId) -> anyhow::Result<()> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<DeviceRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

/// JSON-file-per-key store, one file per `<prefix>:<device_id>` key under `dir`.
/// Writes are atomic (write to a temp file, then rename), mirroring the credential
/// persistence pattern this gateway's teacher uses for its own durable state.
pub struct JsonFileStore {
    dir: PathBuf,
    prefix: String,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self { dir: dir.into(), prefix: prefix.into() }
    }

    fn path_for(&self, id: &DeviceId) -> PathBuf {
        self.dir.join(format!("{}_{}.json", self.prefix, id))
    }
}

#[async_trait]
impl DeviceStore for JsonFileStore {
    async fn get(&self, id: &DeviceId) -> anyhow::Result<Option<DeviceRecord>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = tokio::fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn put(&self, record: &DeviceRecord) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&record.id);
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, id: &DeviceId) -> anyhow::Result<()> {
        let path = self.path_for(id);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<DeviceRecord>> {
        let mut out = Vec::new();
        if !self.dir.exists() {
            return Ok(out);
        }
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(contents) = tokio::fs::read_to_string(&path).await {
                if let Ok(record) = serde_json::from_str(&contents) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }
}

/// Enumerate `*.json` catalog files in a directory.
pub async fn list_json_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
