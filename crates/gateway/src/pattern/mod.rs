// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern engine: the data model for closed-form generators, segment sequences, and
//! parametric shapes, the external-input modifiers that adjust them in flight, and the
//! tick-driven engine that samples and safety-checks them on a schedule (design note 4.6).

pub mod engine;
pub mod generator;
pub mod modifier;
pub mod model;

pub use engine::{PatternEngine, PatternEngineConfig, PatternEvent, SafetyConfig};
pub use model::{ParametricShape, Pattern, Segment};
pub use modifier::{BiometricBaseline, BiometricSample, MediaSample, Modifiers, SpatialSample};
