//! Finalized capture metrics
//!
//! One `FinalizedMetrics` record is produced per stage attempt by the audio
//! feature extractor and consumed verbatim by the scorer. Every unit-range
//! field is clamped before the record leaves the extractor, so downstream
//! consumers never re-validate.

use serde::{Deserialize, Serialize};

/// Default cadence when no usable onset data exists (BPM)
pub const DEFAULT_CADENCE_BPM: f64 = 72.0;
/// Cadence floor after all fallback paths (BPM)
pub const CADENCE_MIN_BPM: f64 = 20.0;
/// Cadence ceiling after all fallback paths (BPM)
pub const CADENCE_MAX_BPM: f64 = 220.0;
/// Neutral cadence consistency for captures with too few onsets
pub const NEUTRAL_CADENCE_CONSISTENCY: f64 = 0.7;
/// Default pitch stability when fewer than two pitch samples exist
pub const DEFAULT_PITCH_STABILITY: f64 = 0.5;

/// Clamp a value into [0, 1]
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Round to three decimals (metric resolution used throughout scoring)
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Finalized acoustic metrics for one stage attempt.
///
/// Per-phase voice ratios are `None` when that phase was never tagged during
/// capture, which is distinct from a tagged-but-silent phase (0.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedMetrics {
    /// Capture duration in seconds
    pub duration_seconds: f64,
    /// Fraction of frames with voice activity, all phases
    pub voice_ratio_total: f64,
    /// Voiced fraction during leader-tagged frames
    pub voice_ratio_leader: Option<f64>,
    /// Voiced fraction during follower-tagged frames
    pub voice_ratio_follower: Option<f64>,
    /// Pitch stability in [0, 1]
    pub pitch_stability: f64,
    /// Estimated chant cadence in BPM
    pub cadence_bpm: f64,
    /// Inter-onset consistency in [0, 1]
    pub cadence_consistency: f64,
    /// Mean voiced energy normalized by the calibration ceiling, [0, 1]
    pub avg_energy: f64,
}

impl FinalizedMetrics {
    /// Clamp every field to its contractual range.
    ///
    /// Duration is floored at 0.1s so downstream ratios never divide by zero;
    /// cadence is pinned to the plausible chant band.
    pub fn clamped(mut self) -> Self {
        self.duration_seconds = self.duration_seconds.max(0.1);
        self.voice_ratio_total = clamp01(self.voice_ratio_total);
        self.voice_ratio_leader = self.voice_ratio_leader.map(clamp01);
        self.voice_ratio_follower = self.voice_ratio_follower.map(clamp01);
        self.pitch_stability = clamp01(self.pitch_stability);
        self.cadence_bpm = self.cadence_bpm.clamp(CADENCE_MIN_BPM, CADENCE_MAX_BPM);
        self.cadence_consistency = clamp01(self.cadence_consistency);
        self.avg_energy = clamp01(self.avg_energy);
        self
    }

    /// Merge several capture windows into one stage-attempt record.
    ///
    /// Fields are duration-weighted means; durations sum. Per-phase ratios
    /// are merged only over the windows where they are present and stay
    /// absent when absent everywhere. Returns `None` for an empty slice.
    pub fn merge_weighted(windows: &[FinalizedMetrics]) -> Option<FinalizedMetrics> {
        if windows.is_empty() {
            return None;
        }

        let mut duration_total = 0.0;
        let mut cadence = WeightedMean::default();
        let mut pitch = WeightedMean::default();
        let mut consistency = WeightedMean::default();
        let mut energy = WeightedMean::default();
        let mut voice_total = WeightedMean::default();
        let mut leader = WeightedMean::default();
        let mut follower = WeightedMean::default();

        for window in windows {
            let weight = window.duration_seconds.max(0.1);
            duration_total += weight;

            cadence.push(window.cadence_bpm, weight);
            pitch.push(clamp01(window.pitch_stability), weight);
            consistency.push(clamp01(window.cadence_consistency), weight);
            energy.push(clamp01(window.avg_energy), weight);
            voice_total.push(clamp01(window.voice_ratio_total), weight);

            if let Some(ratio) = window.voice_ratio_leader {
                leader.push(clamp01(ratio), weight);
            }
            if let Some(ratio) = window.voice_ratio_follower {
                follower.push(clamp01(ratio), weight);
            }
        }

        Some(FinalizedMetrics {
            duration_seconds: round3(duration_total),
            voice_ratio_total: round3(voice_total.mean(0.0)),
            voice_ratio_leader: leader.mean_opt().map(round3),
            voice_ratio_follower: follower.mean_opt().map(round3),
            pitch_stability: round3(pitch.mean(DEFAULT_PITCH_STABILITY)),
            cadence_bpm: (cadence.mean(DEFAULT_CADENCE_BPM) * 100.0).round() / 100.0,
            cadence_consistency: round3(consistency.mean(0.5)),
            avg_energy: round3(energy.mean(0.5)),
        })
    }
}

#[derive(Default)]
struct WeightedMean {
    weighted_sum: f64,
    weight_total: f64,
}

impl WeightedMean {
    fn push(&mut self, value: f64, weight: f64) {
        self.weighted_sum += value * weight;
        self.weight_total += weight;
    }

    fn mean(&self, default: f64) -> f64 {
        if self.weight_total <= 0.0 {
            default
        } else {
            self.weighted_sum / self.weight_total
        }
    }

    fn mean_opt(&self) -> Option<f64> {
        if self.weight_total <= 0.0 {
            None
        } else {
            Some(self.weighted_sum / self.weight_total)
        }
    }
}
