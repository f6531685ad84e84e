//! Context fusion
//!
//! Merges explicit listener input, consent-gated biometric readings, and
//! best-effort environment readings into one normalized snapshot per
//! decision request. Biometric fields only appear when consent was granted
//! and always carry their confidence tag.

use kirtan_common::events::{EventPayload, SessionEvent};
use serde::{Deserialize, Serialize};

/// Confidence tag on a biometric reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricConfidence {
    High,
    Low,
}

/// Explicit listener input, always honored
#[derive(Debug, Clone, Default)]
pub struct ExplicitInput {
    pub mood: Option<String>,
    pub intention: Option<String>,
}

/// Raw biometric readings as delivered by a wearable adapter
#[derive(Debug, Clone)]
pub struct BiometricInput {
    pub heart_rate_bpm: Option<u16>,
    pub hrv_ms: Option<f64>,
    pub confidence: BiometricConfidence,
}

/// Best-effort environment readings
#[derive(Debug, Clone, Default)]
pub struct EnvironmentInput {
    pub noise_level_db: Option<f64>,
    pub ambient_light_lux: Option<f64>,
}

/// Normalized context snapshot consumed by the adaptation policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub mood: Option<String>,
    pub intention: Option<String>,
    pub heart_rate_bpm: Option<u16>,
    pub heart_rate_confidence: Option<BiometricConfidence>,
    pub hrv_ms: Option<f64>,
    pub hrv_confidence: Option<BiometricConfidence>,
    pub noise_level_db: Option<f64>,
    pub ambient_light_lux: Option<f64>,
}

/// Fuses the three input families under the session's consent settings
#[derive(Debug, Clone)]
pub struct ContextFusion {
    biometric_consent: bool,
}

impl ContextFusion {
    pub fn new(biometric_consent: bool) -> Self {
        Self { biometric_consent }
    }

    /// Produce one snapshot. Explicit fields are always present; biometric
    /// fields are dropped without consent; environment fields pass through
    /// as available.
    pub fn fuse(
        &self,
        explicit: ExplicitInput,
        biometric: Option<BiometricInput>,
        environment: Option<EnvironmentInput>,
    ) -> ContextSnapshot {
        let mut snapshot = ContextSnapshot {
            mood: explicit
                .mood
                .map(|m| m.trim().to_ascii_lowercase())
                .filter(|m| !m.is_empty()),
            intention: explicit.intention,
            ..ContextSnapshot::default()
        };

        if self.biometric_consent {
            if let Some(bio) = biometric {
                snapshot.heart_rate_bpm = bio.heart_rate_bpm;
                snapshot.heart_rate_confidence =
                    bio.heart_rate_bpm.map(|_| bio.confidence);
                snapshot.hrv_ms = bio.hrv_ms;
                snapshot.hrv_confidence = bio.hrv_ms.map(|_| bio.confidence);
            }
        }

        if let Some(env) = environment {
            snapshot.noise_level_db = env.noise_level_db;
            snapshot.ambient_light_lux = env.ambient_light_lux;
        }

        snapshot
    }
}

/// Digest of the session's recent telemetry, latest value per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentSignals {
    pub cadence_bpm: Option<f64>,
    pub cadence_consistency: Option<f64>,
    pub flow_score: Option<f64>,
    pub pronunciation_score: Option<f64>,
}

impl RecentSignals {
    /// Scan a session's ordered events from newest to oldest, taking the
    /// most recent value for each field from voice windows and stage
    /// evaluations.
    pub fn from_events(events: &[SessionEvent]) -> Self {
        let mut signals = RecentSignals::default();
        for event in events.iter().rev() {
            match &event.payload {
                EventPayload::VoiceWindow {
                    cadence_bpm,
                    cadence_consistency,
                    flow_score,
                    pronunciation_score,
                    ..
                } => {
                    fill(&mut signals.cadence_bpm, *cadence_bpm);
                    fill(&mut signals.cadence_consistency, *cadence_consistency);
                    fill(&mut signals.flow_score, *flow_score);
                    fill(&mut signals.pronunciation_score, *pronunciation_score);
                }
                EventPayload::StageEval { metrics, .. } => {
                    fill(&mut signals.cadence_bpm, Some(metrics.cadence_bpm));
                    fill(
                        &mut signals.cadence_consistency,
                        Some(metrics.cadence_consistency),
                    );
                }
                _ => {}
            }
            if signals.cadence_bpm.is_some()
                && signals.cadence_consistency.is_some()
                && signals.flow_score.is_some()
                && signals.pronunciation_score.is_some()
            {
                break;
            }
        }
        signals
    }
}

fn fill(slot: &mut Option<f64>, value: Option<f64>) {
    if slot.is_none() {
        if let Some(v) = value {
            *slot = Some(v);
        }
    }
}
