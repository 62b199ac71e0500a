// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn entry(version: &str, features: &[&str]) -> DeviceTypeEntry {
    DeviceTypeEntry {
        type_name: "stroke-controller".into(),
        name: "Stroke Controller".into(),
        description: None,
        version: version.into(),
        features: features.iter().map(|s| s.to_string()).collect(),
        pricing: None,
        requirements: None,
    }
}

#[test]
fn rejects_non_semver_version() {
    let e = entry("1.0", &["vibrate"]);
    assert!(e.validate().is_err());
}

#[test]
fn accepts_valid_entry() {
    let e = entry("1.2.3", &["vibrate", "pattern"]);
    assert!(e.validate().is_ok());
}

#[test]
fn accepts_novel_feature_token() {
    // Feature tokens are free-form (design note 3); a device-type config introducing a
    // capability no existing type declares yet must still validate.
    let e = entry("1.0.0", &["thermal"]);
    assert!(e.validate().is_ok());
}

#[tokio::test]
async fn load_dir_reads_json_files() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(
        dir.path().join("stroke-controller.json"),
        serde_json::to_string(&entry("1.0.0", &["vibrate"])).unwrap(),
    )
    .await
    .unwrap();

    let catalog = DeviceCatalog::load_dir(dir.path()).await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert!(catalog.get("stroke-controller").is_some());
}

#[tokio::test]
async fn load_dir_fails_startup_on_malformed_entry() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("bad.json"), "{ not json").await.unwrap();
    assert!(DeviceCatalog::load_dir(dir.path()).await.is_err());
}
