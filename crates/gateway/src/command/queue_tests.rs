use super::*;
use crate::command::model::CommandKind;

fn command(priority: Priority, seq: u64) -> Command {
    Command {
        device_id: "d1".into(),
        kind: CommandKind::Vibrate,
        intensity: 50,
        pattern_ref: None,
        pattern_params: None,
        deadline_ms: None,
        priority,
        session_seq: seq,
        session_id: "s1".into(),
        attempt: 0,
        enqueued_at_ms: 0,
    }
}

#[test]
fn pops_critical_before_lower_priority() {
    let mut q = DeviceQueue::new();
    q.push(command(Priority::Low, 1));
    q.push(command(Priority::Critical, 2));
    q.push(command(Priority::Normal, 3));

    let (next, dropped) = q.pop_next(0, 10_000);
    assert!(dropped.is_empty());
    assert_eq!(next.expect("command").session_seq, 2);
}

#[test]
fn fifo_within_a_band() {
    let mut q = DeviceQueue::new();
    q.push(command(Priority::Normal, 1));
    q.push(command(Priority::Normal, 2));

    let (first, _) = q.pop_next(0, 10_000);
    assert_eq!(first.expect("command").session_seq, 1);
    let (second, _) = q.pop_next(0, 10_000);
    assert_eq!(second.expect("command").session_seq, 2);
}

#[test]
fn stale_commands_are_dropped_on_pop() {
    let mut q = DeviceQueue::new();
    let mut stale = command(Priority::Normal, 1);
    stale.enqueued_at_ms = 0;
    q.push(stale);
    let mut fresh = command(Priority::Normal, 2);
    fresh.enqueued_at_ms = 9_500;
    q.push(fresh);

    let (next, dropped) = q.pop_next(10_000, 1_000);
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].session_seq, 1);
    assert_eq!(next.expect("command").session_seq, 2);
}

#[test]
fn push_front_reinserts_ahead_of_band() {
    let mut q = DeviceQueue::new();
    q.push(command(Priority::Normal, 1));
    q.push_front(command(Priority::Normal, 2));

    let (next, _) = q.pop_next(0, 10_000);
    assert_eq!(next.expect("command").session_seq, 2);
}

#[test]
fn drain_all_empties_every_band() {
    let mut q = DeviceQueue::new();
    q.push(command(Priority::Low, 1));
    q.push(command(Priority::Critical, 2));
    assert_eq!(q.drain_all().len(), 2);
    assert!(q.is_empty());
}
