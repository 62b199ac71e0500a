// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert rules and the typed predicate mini-language they evaluate (design note 4.8).
//!
//! The source's alert expressions are evaluated via runtime string compilation; this
//! replaces that with a small `serde`-deserializable AST over named numeric fields, so
//! alert rules can still ship as JSON config without an embedded interpreter (the
//! REDESIGN FLAGS requirement: "do not evaluate arbitrary strings").

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::recovery::taxonomy::Severity;

/// A comparison or boolean combination over named fields in a telemetry point's `values`
/// map (or an aggregated window's rolling counters).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Gt { field: String, threshold: f64 },
    Lt { field: String, threshold: f64 },
    Gte { field: String, threshold: f64 },
    Lte { field: String, threshold: f64 },
    Eq { field: String, threshold: f64 },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Evaluate against a field map. A missing field makes any leaf comparison `false`
    /// rather than erroring, so one malformed rule cannot wedge the evaluator.
    pub fn eval(&self, fields: &HashMap<String, f64>) -> bool {
        match self {
            Predicate::Gt { field, threshold } => fields.get(field).is_some_and(|v| *v > *threshold),
            Predicate::Lt { field, threshold } => fields.get(field).is_some_and(|v| *v < *threshold),
            Predicate::Gte { field, threshold } => fields.get(field).is_some_and(|v| *v >= *threshold),
            Predicate::Lte { field, threshold } => fields.get(field).is_some_and(|v| *v <= *threshold),
            Predicate::Eq { field, threshold } => fields.get(field).is_some_and(|v| (*v - *threshold).abs() < f64::EPSILON),
            Predicate::And(preds) => preds.iter().all(|p| p.eval(fields)),
            Predicate::Or(preds) => preds.iter().any(|p| p.eval(fields)),
        }
    }
}

/// A registered alert rule for one telemetry series (design note 4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub predicate: Predicate,
    pub severity: Severity,
    pub message: String,
    #[serde(with = "duration_ms")]
    pub cooldown: Duration,
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// A fired alert, persisted and emitted as an event (design note 4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredAlert {
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    pub timestamp_ms: u64,
}

/// Evaluates rules both inline (per point) and over aggregated windows, suppressing
/// repeats of the same rule within its cooldown (design note 4.8).
pub struct AlertEvaluator {
    rules: Vec<AlertRule>,
    last_triggered: parking_lot::Mutex<HashMap<String, Instant>>,
}

impl AlertEvaluator {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules, last_triggered: parking_lot::Mutex::new(HashMap::new()) }
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Evaluate every rule against `fields`, returning any that trip and are not within
    /// their cooldown. `now_ms` is used for the returned [`TriggeredAlert::timestamp_ms`];
    /// cooldown bookkeeping uses a monotonic `Instant` independent of it.
    pub fn evaluate(&self, fields: &HashMap<String, f64>, now_ms: u64) -> Vec<TriggeredAlert> {
        let now = Instant::now();
        let mut fired = Vec::new();
        let mut last_triggered = self.last_triggered.lock();

        for rule in &self.rules {
            if !rule.predicate.eval(fields) {
                continue;
            }
            if let Some(last) = last_triggered.get(&rule.name) {
                if now.duration_since(*last) < rule.cooldown {
                    continue;
                }
            }
            last_triggered.insert(rule.name.clone(), now);
            fired.push(TriggeredAlert {
                rule_name: rule.name.clone(),
                severity: rule.severity,
                message: rule.message.clone(),
                timestamp_ms: now_ms,
            });
        }

        fired
    }
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
