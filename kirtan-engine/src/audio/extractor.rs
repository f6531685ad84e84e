//! Per-frame feature accumulation
//!
//! `FeatureAccumulator` consumes fixed-size mono frames and maintains the
//! running aggregates (voice activity, onsets, subsampled pitch, per-phase
//! stats) that become a `FinalizedMetrics` record at `finalize()`. Frames
//! are ephemeral; nothing per-frame is retained beyond the aggregates.

use crate::audio::pitch::estimate_pitch;
use kirtan_common::config::CaptureConfig;
use kirtan_common::metrics::{
    clamp01, round3, FinalizedMetrics, CADENCE_MAX_BPM, CADENCE_MIN_BPM, DEFAULT_CADENCE_BPM,
    DEFAULT_PITCH_STABILITY, NEUTRAL_CADENCE_CONSISTENCY,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Phase tag sampled once per frame from the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChantPhase {
    /// Accompaniment or lead voice is calling
    Leader,
    /// Practitioner is responding
    Follower,
    /// Practitioner chants alone
    Independent,
}

#[derive(Debug, Default, Clone, Copy)]
struct PhaseStats {
    frames: u64,
    voiced: u64,
}

impl PhaseStats {
    fn ratio(&self) -> Option<f64> {
        if self.frames == 0 {
            None
        } else {
            Some(self.voiced as f64 / self.frames as f64)
        }
    }
}

/// Running extraction state for one capture.
///
/// Owned exclusively by one capture instance; there are no concurrent
/// writers by construction.
pub struct FeatureAccumulator {
    config: CaptureConfig,
    samples_seen: u64,
    frames_total: u64,
    frames_voiced: u64,
    voiced_rms_sum: f64,
    prev_voiced: bool,
    /// Onset timestamps, seconds from capture start
    onsets: Vec<f64>,
    /// Accepted pitch estimates (Hz)
    pitches: Vec<f64>,
    leader: PhaseStats,
    follower: PhaseStats,
}

impl FeatureAccumulator {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            samples_seen: 0,
            frames_total: 0,
            frames_voiced: 0,
            voiced_rms_sum: 0.0,
            prev_voiced: false,
            onsets: Vec::new(),
            pitches: Vec::new(),
            leader: PhaseStats::default(),
            follower: PhaseStats::default(),
        }
    }

    /// Consume one frame of mono samples tagged with the current phase.
    ///
    /// Voiced iff RMS is strictly above the threshold; the equal case is
    /// deliberately unvoiced so the tie-break is deterministic.
    pub fn push_frame(&mut self, samples: &[f32], phase: ChantPhase) {
        if samples.is_empty() {
            return;
        }

        let frame_start_seconds = self.samples_seen as f64 / self.config.sample_rate as f64;
        self.samples_seen += samples.len() as u64;
        self.frames_total += 1;

        let rms = Self::rms(samples);
        let voiced = rms > self.config.vad_rms_threshold as f64;

        match phase {
            ChantPhase::Leader => {
                self.leader.frames += 1;
                if voiced {
                    self.leader.voiced += 1;
                }
            }
            ChantPhase::Follower => {
                self.follower.frames += 1;
                if voiced {
                    self.follower.voiced += 1;
                }
            }
            ChantPhase::Independent => {}
        }

        if voiced {
            // Rising edge records an onset
            if !self.prev_voiced {
                self.onsets.push(frame_start_seconds);
            }

            self.voiced_rms_sum += rms;
            self.frames_voiced += 1;

            // Pitch is the expensive part of the frame budget; shed load by
            // estimating on every Nth voiced frame only.
            let stride = self.config.pitch_frame_stride.max(1) as u64;
            if (self.frames_voiced - 1) % stride == 0 {
                if let Some(hz) = estimate_pitch(
                    samples,
                    self.config.sample_rate,
                    self.config.pitch_min_hz,
                    self.config.pitch_max_hz,
                    self.config.pitch_corr_floor,
                ) {
                    self.pitches.push(hz);
                }
            }
        }

        self.prev_voiced = voiced;
    }

    /// Seconds of audio consumed so far
    pub fn elapsed_seconds(&self) -> f64 {
        self.samples_seen as f64 / self.config.sample_rate as f64
    }

    /// Produce the finalized metrics record.
    ///
    /// All unit-range outputs are clamped here; the record is safe to feed
    /// directly into scoring.
    pub fn finalize(self) -> FinalizedMetrics {
        let duration_seconds = self.samples_seen as f64 / self.config.sample_rate as f64;

        let voice_ratio_total = if self.frames_total == 0 {
            0.0
        } else {
            self.frames_voiced as f64 / self.frames_total as f64
        };

        let cadence_bpm = self.cadence_bpm(duration_seconds);
        let cadence_consistency = self.cadence_consistency();
        let pitch_stability = Self::stability(&self.pitches);

        let avg_energy = if self.frames_voiced == 0 {
            0.0
        } else {
            (self.voiced_rms_sum / self.frames_voiced as f64) / self.config.reference_ceiling
        };

        debug!(
            duration_seconds,
            onsets = self.onsets.len(),
            pitch_samples = self.pitches.len(),
            voiced_frames = self.frames_voiced,
            "Finalizing capture metrics"
        );

        FinalizedMetrics {
            duration_seconds: round3(duration_seconds),
            voice_ratio_total: round3(voice_ratio_total),
            voice_ratio_leader: self.leader.ratio().map(round3),
            voice_ratio_follower: self.follower.ratio().map(round3),
            pitch_stability: round3(pitch_stability),
            cadence_bpm: (cadence_bpm * 100.0).round() / 100.0,
            cadence_consistency: round3(cadence_consistency),
            avg_energy: round3(avg_energy),
        }
        .clamped()
    }

    fn cadence_bpm(&self, duration_seconds: f64) -> f64 {
        let bpm = if self.onsets.len() >= 3 {
            let mean_interval = mean(&intervals(&self.onsets));
            if mean_interval > 0.0 {
                60.0 / mean_interval
            } else {
                DEFAULT_CADENCE_BPM
            }
        } else if duration_seconds > 0.0 {
            (self.onsets.len() as f64 / duration_seconds) * 60.0
        } else {
            DEFAULT_CADENCE_BPM
        };
        bpm.clamp(CADENCE_MIN_BPM, CADENCE_MAX_BPM)
    }

    fn cadence_consistency(&self) -> f64 {
        // Too few onsets carry no rhythm information; a neutral default
        // avoids punishing short or quiet attempts as maximally erratic.
        if self.onsets.len() <= 2 {
            return NEUTRAL_CADENCE_CONSISTENCY;
        }
        let intervals = intervals(&self.onsets);
        let m = mean(&intervals);
        if m <= 0.0 {
            return NEUTRAL_CADENCE_CONSISTENCY;
        }
        let cv = population_std(&intervals, m) / m;
        clamp01(1.0 - 1.8 * cv)
    }

    fn stability(pitches: &[f64]) -> f64 {
        if pitches.len() <= 1 {
            return DEFAULT_PITCH_STABILITY;
        }
        let m = mean(pitches);
        if m <= 0.0 {
            return DEFAULT_PITCH_STABILITY;
        }
        let cv = population_std(pitches, m) / m;
        clamp01(1.0 - 1.5 * cv)
    }

    fn rms(samples: &[f32]) -> f64 {
        let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_squares / samples.len() as f64).sqrt()
    }
}

fn intervals(onsets: &[f64]) -> Vec<f64> {
    onsets.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
