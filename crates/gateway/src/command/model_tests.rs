use super::*;

fn command(priority: Priority, age_ms: u64, now_ms: u64) -> Command {
    Command {
        device_id: "d1".into(),
        kind: CommandKind::Vibrate,
        intensity: 50,
        pattern_ref: None,
        pattern_params: None,
        deadline_ms: None,
        priority,
        session_seq: 1,
        session_id: "s1".into(),
        attempt: 0,
        enqueued_at_ms: now_ms.saturating_sub(age_ms),
    }
}

#[test]
fn priority_orders_low_to_critical() {
    assert!(Priority::Critical > Priority::High);
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
}

#[test]
fn stale_past_max_age() {
    let cmd = command(Priority::Normal, 5_000, 10_000);
    assert!(cmd.is_stale(10_000, 1_000));
    assert!(!cmd.is_stale(10_000, 10_000));
}

#[test]
fn dedup_key_ignores_intensity() {
    let mut a = command(Priority::Normal, 0, 0);
    let mut b = command(Priority::Normal, 0, 0);
    a.intensity = 10;
    b.intensity = 90;
    assert_eq!(a.dedup_key(), b.dedup_key());
}
