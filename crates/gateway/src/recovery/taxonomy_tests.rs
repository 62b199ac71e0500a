// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn dedup_key_groups_by_kind_and_message() {
    let a = FaultError::transient(FaultKind::Connection, "write failed");
    let b = FaultError::new(FaultKind::Connection, Severity::Warning, Category::Transient, "write failed");
    assert_eq!(a.dedup_key(), b.dedup_key());
}

#[test]
fn fatal_helper_sets_critical_severity() {
    let err = FaultError::fatal(FaultKind::Configuration, "missing secret");
    assert_eq!(err.severity, Severity::Critical);
    assert_eq!(err.category, Category::Fatal);
}

#[test]
fn severity_ordering() {
    assert!(Severity::Debug < Severity::Info);
    assert!(Severity::Error < Severity::Critical);
}
