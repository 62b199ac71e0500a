// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External-input modifiers: media-position drift, biometric, and spatial streams that
//! adjust pattern timing and intensity (design note 4.6, "External modifiers").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaSample {
    pub timestamp_ms: u64,
    pub media_position_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BiometricSample {
    pub heart_rate: f64,
    pub arousal: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BiometricBaseline {
    pub baseline_heart_rate: f64,
    pub baseline_arousal: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpatialSample {
    pub proximity: f64,
    pub velocity: f64,
}

/// Per-device modifier state, updated by whichever external streams are attached. All
/// three are optional and independent (design note 4.6).
#[derive(Debug, Clone, Default)]
pub struct Modifiers {
    pub media: Option<MediaSample>,
    pub biometric: Option<(BiometricSample, BiometricBaseline)>,
    pub spatial: Option<SpatialSample>,
}

impl Modifiers {
    /// Timing-warp factor derived from media drift, clamped to `[0.5, 1.5]`. `pattern_pos_ms`
    /// is the pattern engine's own elapsed time, compared against the most recent media
    /// position sample to compute drift.
    pub fn timing_warp(&self, pattern_pos_ms: u64) -> f64 {
        let Some(media) = &self.media else { return 1.0 };
        let drift_ms = media.media_position_ms as i64 - pattern_pos_ms as i64;
        if drift_ms.unsigned_abs() <= 100 {
            return 1.0;
        }
        (1.0 + drift_ms as f64 / 1000.0).clamp(0.5, 1.5)
    }

    /// Multiplicative intensity modifier from biometric and spatial samples, clamped to
    /// `[0, max_intensity_fraction]` (design note 4.6).
    pub fn intensity_modifier(&self, max_intensity_fraction: f64) -> f64 {
        let mut modifier = 1.0;

        if let Some((sample, baseline)) = &self.biometric {
            if baseline.baseline_arousal > 0.0 {
                modifier *= sample.arousal / baseline.baseline_arousal;
            }
            if baseline.baseline_heart_rate > 0.0 {
                modifier *= (sample.heart_rate / baseline.baseline_heart_rate).min(1.5);
            }
        }

        if let Some(spatial) = &self.spatial {
            modifier *= spatial.proximity.clamp(0.1, 1.5);
            modifier *= spatial.velocity.abs().clamp(0.1, 1.5);
        }

        modifier.clamp(0.0, max_intensity_fraction)
    }
}

#[cfg(test)]
#[path = "modifier_tests.rs"]
mod tests;
