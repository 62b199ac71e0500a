use std::time::Duration;

use super::*;

#[test]
fn ring_evicts_oldest_past_capacity() {
    let log = ThreatLog::new(2);
    for i in 0..3 {
        log.record_event(SecurityEvent { source: format!("s{i}"), action: "auth".into(), allowed: true, reason: None, timestamp_ms: i });
    }
    let recent = log.recent_events(10);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].source, "s2");
    assert_eq!(recent[1].source, "s1");
}

#[test]
fn critical_threats_survive_sweep_non_critical_expire() {
    let log = ThreatLog::new(8);
    log.raise(ThreatKind::BruteForce, "1.2.3.4", "5 failed logins", Duration::from_millis(0));
    log.raise(ThreatKind::SuspiciousPattern, "5.6.7.8", "odd cadence", Duration::from_millis(0));
    std::thread::sleep(Duration::from_millis(5));
    log.sweep();
    let threats = log.threats();
    assert_eq!(threats.len(), 1);
    assert_eq!(threats[0].kind, ThreatKind::BruteForce);
}
