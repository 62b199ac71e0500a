// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::registry::device::{DeviceConfig, DeviceInfo, Firmware};

fn sample(id: &str) -> DeviceRecord {
    DeviceRecord::new(
        DeviceInfo {
            id: id.to_owned(),
            kind: "stroke-controller".into(),
            protocol: "duplex-stream".into(),
            address: "tcp://127.0.0.1:9000".into(),
            capabilities: ["vibrate".to_owned()].into(),
            firmware: Firmware::default(),
        },
        DeviceConfig::default(),
        0,
    )
}

#[tokio::test]
async fn in_memory_store_round_trips() {
    let store = InMemoryStore::default();
    let record = sample("dev-1");
    store.put(&record).await.unwrap();
    let loaded = store.get(&"dev-1".to_owned()).await.unwrap().unwrap();
    assert_eq!(loaded.id, record.id);
    assert_eq!(loaded.kind, record.kind);
    store.delete(&"dev-1".to_owned()).await.unwrap();
    assert!(store.get(&"dev-1".to_owned()).await.unwrap().is_none());
}

#[tokio::test]
async fn json_file_store_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path(), "device");
    let record = sample("dev-2");
    store.put(&record).await.unwrap();
    let loaded = store.get(&"dev-2".to_owned()).await.unwrap().unwrap();
    assert_eq!(loaded.id, "dev-2");

    let all = store.list().await.unwrap();
    assert_eq!(all.len(), 1);

    store.delete(&"dev-2".to_owned()).await.unwrap();
    assert!(store.get(&"dev-2".to_owned()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_json_files_enumerates_directory() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("a.json"), "{}").await.unwrap();
    tokio::fs::write(dir.path().join("b.json"), "{}").await.unwrap();
    tokio::fs::write(dir.path().join("ignore.txt"), "x").await.unwrap();
    let files = list_json_files(dir.path()).await.unwrap();
    assert_eq!(files.len(), 2);
}
