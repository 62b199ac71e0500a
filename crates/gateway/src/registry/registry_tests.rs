// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::registry::store::InMemoryStore;

fn factory() -> AdapterFactory {
    AdapterFactory::with_defaults()
}

fn registry() -> Registry {
    Registry::new(
        Arc::new(InMemoryStore::default()),
        factory(),
        RegistryConfig {
            connect_retries: 2,
            reconnect_delay: Duration::from_millis(1),
            stale_timeout: Duration::from_secs(60),
            max_error_count: 3,
            breaker_failure_threshold: 100,
            breaker_success_threshold: 1,
            breaker_recovery_timeout: Duration::from_millis(1),
        },
    )
}

fn info(id: &str) -> DeviceInfo {
    DeviceInfo {
        id: id.to_owned(),
        kind: "generic-vibrator".to_owned(),
        protocol: "duplex-stream".to_owned(),
        address: "ws://127.0.0.1:1/device".to_owned(),
        capabilities: HashSet::from(["vibrate".to_owned()]),
        firmware: Default::default(),
    }
}

#[tokio::test]
async fn add_or_update_preserves_enabled_and_error_count_across_merge() {
    let reg = registry();
    let rec = reg.add_or_update(info("d1"), None).await.unwrap();
    assert!(rec.enabled);

    reg.set_enabled(&"d1".to_owned(), false).await.unwrap();
    let merged = reg.add_or_update(info("d1"), None).await.unwrap();
    assert!(!merged.enabled, "enabled flag must survive a merge");
}

#[tokio::test]
async fn remove_drops_record_and_binding() {
    let reg = registry();
    reg.add_or_update(info("d1"), None).await.unwrap();
    reg.remove(&"d1".to_owned()).await.unwrap();
    assert!(reg.get(&"d1".to_owned()).await.is_none());
}

#[tokio::test]
async fn connect_unknown_device_fails_not_found() {
    let reg = registry();
    let err = reg.connect(&"missing".to_owned()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::DeviceNotFound);
}

#[tokio::test]
async fn set_enabled_false_while_online_disconnects_first() {
    let reg = registry();
    let cfg = DeviceConfig { auto_connect: false, ..Default::default() };
    reg.add_or_update(info("d1"), Some(cfg)).await.unwrap();
    reg.set_enabled(&"d1".to_owned(), false).await.unwrap();
    let rec = reg.get(&"d1".to_owned()).await.unwrap();
    assert_eq!(rec.status, DeviceStatus::Disabled);
}

#[tokio::test]
async fn connect_fails_fast_once_breaker_is_open() {
    let reg = registry();
    let cfg = DeviceConfig { auto_connect: false, ..Default::default() };
    reg.add_or_update(info("d1"), Some(cfg)).await.unwrap();
    let id = "d1".to_owned();

    let breaker = reg.breaker_for(&id).await;
    for _ in 0..100 {
        breaker.record_failure();
    }

    let err = reg.connect(&id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::CircuitOpen);
}

#[tokio::test]
async fn send_to_unbound_device_is_device_disconnected() {
    let reg = registry();
    let cfg = DeviceConfig { auto_connect: false, ..Default::default() };
    reg.add_or_update(info("d1"), Some(cfg)).await.unwrap();
    let err = reg.send(&"d1".to_owned(), &Value::Null).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::DeviceDisconnected);
}

#[tokio::test]
async fn sweep_marks_stale_online_device_offline() {
    let reg = registry();
    let cfg = DeviceConfig { auto_connect: false, ..Default::default() };
    reg.add_or_update(info("d1"), Some(cfg)).await.unwrap();
    reg.set_status(&"d1".to_owned(), DeviceStatus::Online).await;
    {
        let mut records = reg.records.write().await;
        records.get_mut("d1").unwrap().last_seen_ms = 0;
    }
    reg.sweep().await;
    let rec = reg.get(&"d1".to_owned()).await.unwrap();
    assert_eq!(rec.status, DeviceStatus::Offline);
}

#[tokio::test]
async fn unknown_kind_rejected_once_catalog_is_nonempty() {
    let reg = registry();
    let catalog = load_catalog_with_one_entry("generic-vibrator", &["vibrate"]).await;
    reg.set_catalog(catalog);
    let mut other = info("d1");
    other.kind = "not-a-real-kind".to_owned();
    let result = reg.add_or_update(other, None).await;
    assert_eq!(result.unwrap_err().kind, ErrorKind::Validation);
}

#[tokio::test]
async fn empty_catalog_is_permissive() {
    let reg = registry();
    let result = reg.add_or_update(info("d1"), None).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn recognized_kind_with_declared_capability_is_accepted() {
    let reg = registry();
    let catalog = load_catalog_with_one_entry("generic-vibrator", &["vibrate", "pattern"]).await;
    reg.set_catalog(catalog);
    let result = reg.add_or_update(info("d1"), None).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn recognized_kind_with_undeclared_capability_is_rejected() {
    let reg = registry();
    let catalog = load_catalog_with_one_entry("generic-vibrator", &["rotate"]).await;
    reg.set_catalog(catalog);
    let result = reg.add_or_update(info("d1"), None).await;
    assert_eq!(result.unwrap_err().kind, ErrorKind::Validation);
}

async fn load_catalog_with_one_entry(type_name: &str, features: &[&str]) -> crate::registry::catalog::DeviceCatalog {
    let dir = tempfile::tempdir().expect("tempdir");
    let entry = serde_json::json!({
        "type": type_name,
        "name": type_name,
        "version": "1.0.0",
        "features": features,
    });
    tokio::fs::write(dir.path().join(format!("{type_name}.json")), entry.to_string()).await.expect("write catalog entry");
    crate::registry::catalog::DeviceCatalog::load_dir(dir.path()).await.expect("load catalog")
}
