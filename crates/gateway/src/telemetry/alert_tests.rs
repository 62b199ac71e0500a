use std::collections::HashMap;
use std::time::Duration;

use super::*;

fn fields(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn gt_predicate_evaluates_field() {
    let pred = Predicate::Gt { field: "latency_ms".into(), threshold: 100.0 };
    assert!(pred.eval(&fields(&[("latency_ms", 150.0)])));
    assert!(!pred.eval(&fields(&[("latency_ms", 50.0)])));
    assert!(!pred.eval(&fields(&[])));
}

#[test]
fn and_or_compose() {
    let pred = Predicate::And(vec![
        Predicate::Gt { field: "a".into(), threshold: 1.0 },
        Predicate::Lt { field: "b".into(), threshold: 10.0 },
    ]);
    assert!(pred.eval(&fields(&[("a", 2.0), ("b", 5.0)])));
    assert!(!pred.eval(&fields(&[("a", 0.0), ("b", 5.0)])));

    let pred_or = Predicate::Or(vec![
        Predicate::Eq { field: "a".into(), threshold: 1.0 },
        Predicate::Eq { field: "a".into(), threshold: 2.0 },
    ]);
    assert!(pred_or.eval(&fields(&[("a", 2.0)])));
    assert!(!pred_or.eval(&fields(&[("a", 3.0)])));
}

#[test]
fn cooldown_suppresses_repeat_alerts() {
    let evaluator = AlertEvaluator::new(vec![AlertRule {
        name: "high_error_rate".into(),
        predicate: Predicate::Gt { field: "errors".into(), threshold: 5.0 },
        severity: Severity::Warning,
        message: "error rate high".into(),
        cooldown: Duration::from_secs(60),
    }]);

    let hot = fields(&[("errors", 10.0)]);
    let first = evaluator.evaluate(&hot, 1_000);
    assert_eq!(first.len(), 1);

    let second = evaluator.evaluate(&hot, 1_500);
    assert!(second.is_empty(), "repeat within cooldown must be suppressed");
}

#[test]
fn non_triggering_rule_is_silent() {
    let evaluator = AlertEvaluator::new(vec![AlertRule {
        name: "never".into(),
        predicate: Predicate::Gt { field: "x".into(), threshold: 1000.0 },
        severity: Severity::Critical,
        message: "unreachable".into(),
        cooldown: Duration::from_secs(1),
    }]);
    assert!(evaluator.evaluate(&fields(&[("x", 1.0)]), 0).is_empty());
}
