// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern data model (design note 3, "Pattern"): closed-form generators, explicit
//! segment sequences, and parametric multi-dimensional functions, unified behind one
//! `intensity_at`/`duration_ms`/`dimensions` surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pattern::generator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub duration_ms: u64,
    pub intensity: u8,
}

/// A parametric shape producing position (and implied velocity) alongside intensity.
/// Free-form parametric functions are resolved to this small closed set of shapes rather
/// than an embedded interpreter, consistent with the no-`eval` approach used elsewhere
/// (alerts, see telemetry).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ParametricShape {
    /// Circular motion at unit radius; position is `(cos, sin)`, intensity tracks speed.
    Orbit { period_ms: u64 },
    /// Linear sweep of position from `from` to `to` over `duration_ms`, then holds.
    Sweep { from: f64, to: f64, duration_ms: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pattern {
    Constant { intensity: u8 },
    Wave { min: u8, max: u8, period_ms: u64 },
    Ramp { start: u8, end: u8, duration_ms: u64 },
    Pulse { high: u8, low: u8, on_ms: u64, off_ms: u64 },
    Escalation { start: u8, step: u8, step_ms: u64, max: u8 },
    Segments { segments: Vec<Segment> },
    Parametric { shape: ParametricShape, base_intensity: u8, duration_ms: Option<u64> },
}

impl Pattern {
    /// Total duration, or `None` for patterns that run until explicitly stopped.
    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            Pattern::Constant { .. } | Pattern::Wave { .. } | Pattern::Pulse { .. } | Pattern::Escalation { .. } => None,
            Pattern::Ramp { duration_ms, .. } => Some(*duration_ms),
            Pattern::Segments { segments } => Some(segments.iter().map(|s| s.duration_ms).sum()),
            Pattern::Parametric { duration_ms, .. } => *duration_ms,
        }
    }

    /// Sample intensity at `elapsed_ms`. Always within [`Pattern::envelope`] (design note 3
    /// invariant: every sample returns intensity within the pattern's declared envelope).
    pub fn intensity_at(&self, elapsed_ms: u64) -> u8 {
        match self {
            Pattern::Constant { intensity } => generator::constant(*intensity),
            Pattern::Wave { min, max, period_ms } => generator::wave(*min, *max, *period_ms, elapsed_ms),
            Pattern::Ramp { start, end, duration_ms } => generator::ramp(*start, *end, *duration_ms, elapsed_ms),
            Pattern::Pulse { high, low, on_ms, off_ms } => generator::pulse(*high, *low, *on_ms, *off_ms, elapsed_ms),
            Pattern::Escalation { start, step, step_ms, max } => {
                generator::escalation(*start, *step, *step_ms, *max, elapsed_ms)
            }
            Pattern::Segments { segments } => segment_intensity_at(segments, elapsed_ms),
            Pattern::Parametric { shape, base_intensity, .. } => parametric_intensity_at(shape, *base_intensity, elapsed_ms),
        }
    }

    /// Generator label at `t`, used for client-facing display; stable for every pattern
    /// kind except segments, whose label depends on the active segment index.
    pub fn type_at(&self, elapsed_ms: u64) -> Option<String> {
        match self {
            Pattern::Constant { .. } => Some("constant".to_owned()),
            Pattern::Wave { .. } => Some("wave".to_owned()),
            Pattern::Ramp { .. } => Some("ramp".to_owned()),
            Pattern::Pulse { .. } => Some("pulse".to_owned()),
            Pattern::Escalation { .. } => Some("escalation".to_owned()),
            Pattern::Segments { segments } => segment_index_at(segments, elapsed_ms).map(|i| format!("segment:{i}")),
            Pattern::Parametric { .. } => Some("parametric".to_owned()),
        }
    }

    /// Position/velocity metadata for parametric patterns; `None` for every other kind.
    pub fn metadata_at(&self, elapsed_ms: u64) -> Option<Value> {
        match self {
            Pattern::Parametric { shape, .. } => {
                let (position, velocity) = parametric_position_at(shape, elapsed_ms);
                Some(serde_json::json!({ "position": position, "velocity": velocity }))
            }
            _ => None,
        }
    }

    /// `1` for every pattern except parametric shapes, which additionally carry position.
    pub fn dimensions(&self) -> u8 {
        match self {
            Pattern::Parametric { .. } => 2,
            _ => 1,
        }
    }

    /// Declared `[min, max]` intensity envelope (design note 3 invariant).
    pub fn envelope(&self) -> (u8, u8) {
        match self {
            Pattern::Constant { intensity } => (*intensity, *intensity),
            Pattern::Wave { min, max, .. } => (*min, *max),
            Pattern::Ramp { start, end, .. } => (*start.min(end), *start.max(end)),
            Pattern::Pulse { high, low, .. } => (*low.min(high), *low.max(high)),
            Pattern::Escalation { start, max, .. } => (*start, *max),
            Pattern::Segments { segments } => {
                let min = segments.iter().map(|s| s.intensity).min().unwrap_or(0);
                let max = segments.iter().map(|s| s.intensity).max().unwrap_or(0);
                (min, max)
            }
            Pattern::Parametric { base_intensity, .. } => (0, *base_intensity),
        }
    }
}

fn segment_index_at(segments: &[Segment], elapsed_ms: u64) -> Option<usize> {
    let mut acc = 0u64;
    for (i, seg) in segments.iter().enumerate() {
        acc += seg.duration_ms;
        if elapsed_ms < acc {
            return Some(i);
        }
    }
    segments.len().checked_sub(1)
}

fn segment_intensity_at(segments: &[Segment], elapsed_ms: u64) -> u8 {
    match segment_index_at(segments, elapsed_ms) {
        Some(i) => segments[i].intensity,
        None => 0,
    }
}

/// Position in `[-1.0, 1.0]` per axis and its instantaneous velocity (finite-difference
/// over a 1ms step — patterns have no closed-form derivative in this shape set).
fn parametric_position_at(shape: &ParametricShape, elapsed_ms: u64) -> (f64, f64) {
    let pos = |t: u64| -> f64 {
        match shape {
            ParametricShape::Orbit { period_ms } => {
                if *period_ms == 0 {
                    return 0.0;
                }
                let phase = (t % period_ms) as f64 / *period_ms as f64;
                (phase * std::f64::consts::TAU).cos()
            }
            ParametricShape::Sweep { from, to, duration_ms } => {
                if *duration_ms == 0 || t >= *duration_ms {
                    return *to;
                }
                let frac = t as f64 / *duration_ms as f64;
                from + (to - from) * frac
            }
        }
    };
    let p0 = pos(elapsed_ms);
    let p1 = pos(elapsed_ms + 1);
    (p0, (p1 - p0) * 1000.0)
}

fn parametric_intensity_at(shape: &ParametricShape, base_intensity: u8, elapsed_ms: u64) -> u8 {
    let (_, velocity) = parametric_position_at(shape, elapsed_ms);
    let speed_fraction = (velocity.abs() / 10.0).clamp(0.0, 1.0);
    (base_intensity as f64 * speed_fraction).round().clamp(0.0, base_intensity as f64) as u8
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
