// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn exponential_backoff_caps_at_max_delay() {
    let policy = RecoveryPolicy {
        max_attempts: 10,
        backoff: BackoffStrategy::Exponential,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
        jitter: false,
    };
    assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
    assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(1));
}

#[test]
fn fixed_backoff_is_constant() {
    let policy = RecoveryPolicy {
        max_attempts: 3,
        backoff: BackoffStrategy::Fixed,
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_secs(5),
        jitter: false,
    };
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(50));
    assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(50));
}

#[test]
fn fatal_category_skips_recovery() {
    let table = RecoveryTable::new(Duration::from_secs(60));
    let err = FaultError::fatal(FaultKind::Configuration, "bad config");
    assert!(!table.should_recover(&err));
}

#[test]
fn dedup_suppresses_repeat_within_window() {
    let table = RecoveryTable::new(Duration::from_secs(60));
    let err = FaultError::transient(FaultKind::Connection, "write failed");
    assert!(table.should_log(&err));
    assert!(!table.should_log(&err));
}
