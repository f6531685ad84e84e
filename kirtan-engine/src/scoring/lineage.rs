//! Lineage golden profiles
//!
//! Static reference data: per-lineage thresholds, per-stage composite
//! weights, and per-stage duration targets. Versioned by profile id; never
//! created at runtime.

use crate::error::{Error, Result};
use kirtan_common::metrics::clamp01;
use kirtan_common::score::Lineage;
use kirtan_common::stage::PracticeStage;
use once_cell::sync::Lazy;

/// The only golden profile version currently published
pub const DEFAULT_GOLDEN_PROFILE: &str = "maha_mantra_v1";

/// Reference chant tempo all lineages anchor to (BPM)
pub const GOLDEN_TEMPO_BPM: f64 = 72.0;

/// Sub-dimension weights used to blend the composite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BhavWeights {
    pub discipline: f64,
    pub resonance: f64,
    pub coherence: f64,
}

/// Pass thresholds for the three sub-dimensions and the composite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub discipline: f64,
    pub resonance: f64,
    pub coherence: f64,
    pub composite: f64,
}

impl Thresholds {
    fn offset(&self, delta: f64) -> Thresholds {
        Thresholds {
            discipline: clamp01(self.discipline + delta),
            resonance: clamp01(self.resonance + delta),
            coherence: clamp01(self.coherence + delta),
            composite: clamp01(self.composite + delta),
        }
    }
}

/// Per-stage duration target and threshold adjustment
#[derive(Debug, Clone, Copy)]
pub struct StageTarget {
    pub duration_seconds: f64,
    /// Added to every base threshold for this stage (earlier stages are
    /// graded more leniently)
    pub threshold_offset: f64,
}

/// Duration target and leniency per stage, shared by all lineages
pub fn stage_target(stage: PracticeStage) -> StageTarget {
    match stage {
        PracticeStage::Listen => StageTarget {
            duration_seconds: 60.0,
            threshold_offset: -0.12,
        },
        PracticeStage::Guided => StageTarget {
            duration_seconds: 45.0,
            threshold_offset: -0.08,
        },
        PracticeStage::CallResponse => StageTarget {
            duration_seconds: 40.0,
            threshold_offset: -0.04,
        },
        PracticeStage::Recap => StageTarget {
            duration_seconds: 35.0,
            threshold_offset: -0.02,
        },
        PracticeStage::Independent => StageTarget {
            duration_seconds: 30.0,
            threshold_offset: 0.0,
        },
    }
}

/// Golden profile for one lineage: base thresholds plus per-stage composite
/// weights (discipline-heavy early, resonance/coherence-heavy late).
#[derive(Debug, Clone)]
pub struct GoldenProfile {
    pub id: &'static str,
    pub lineage: Lineage,
    pub base_thresholds: Thresholds,
    /// Indexed by `PracticeStage::index()`
    pub stage_weights: [BhavWeights; 5],
}

impl GoldenProfile {
    /// Composite weights for a stage
    pub fn weights(&self, stage: PracticeStage) -> BhavWeights {
        self.stage_weights[stage.index()]
    }

    /// Thresholds for a stage, base values shifted by the stage offset
    pub fn thresholds(&self, stage: PracticeStage) -> Thresholds {
        self.base_thresholds.offset(stage_target(stage).threshold_offset)
    }
}

const fn weights(discipline: f64, resonance: f64, coherence: f64) -> BhavWeights {
    BhavWeights {
        discipline,
        resonance,
        coherence,
    }
}

static PROFILES: Lazy<Vec<GoldenProfile>> = Lazy::new(|| {
    vec![
        GoldenProfile {
            id: DEFAULT_GOLDEN_PROFILE,
            lineage: Lineage::Vaishnavism,
            base_thresholds: Thresholds {
                discipline: 0.75,
                resonance: 0.72,
                coherence: 0.72,
                composite: 0.75,
            },
            stage_weights: [
                weights(0.50, 0.25, 0.25), // listen
                weights(0.44, 0.28, 0.28), // guided
                weights(0.34, 0.33, 0.33), // call_response
                weights(0.30, 0.35, 0.35), // recap
                weights(0.26, 0.37, 0.37), // independent
            ],
        },
        GoldenProfile {
            id: DEFAULT_GOLDEN_PROFILE,
            lineage: Lineage::Sadhguru,
            base_thresholds: Thresholds {
                discipline: 0.78,
                resonance: 0.70,
                coherence: 0.70,
                composite: 0.76,
            },
            stage_weights: [
                weights(0.56, 0.22, 0.22),
                weights(0.50, 0.25, 0.25),
                weights(0.40, 0.30, 0.30),
                weights(0.36, 0.32, 0.32),
                weights(0.32, 0.34, 0.34),
            ],
        },
        GoldenProfile {
            id: DEFAULT_GOLDEN_PROFILE,
            lineage: Lineage::ShreeVallabhacharya,
            base_thresholds: Thresholds {
                discipline: 0.73,
                resonance: 0.76,
                coherence: 0.72,
                composite: 0.76,
            },
            stage_weights: [
                weights(0.46, 0.32, 0.22),
                weights(0.40, 0.35, 0.25),
                weights(0.30, 0.40, 0.30),
                weights(0.26, 0.42, 0.32),
                weights(0.22, 0.44, 0.34),
            ],
        },
    ]
});

/// Immutable profile lookup injected into the scorer
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<GoldenProfile>,
}

impl ProfileRegistry {
    /// Registry holding the published profiles
    pub fn published() -> Self {
        Self {
            profiles: PROFILES.clone(),
        }
    }

    /// Registry over explicit profiles (tests, future versions)
    pub fn new(profiles: Vec<GoldenProfile>) -> Self {
        Self { profiles }
    }

    /// Look up a profile; the id is checked before the lineage so an unknown
    /// version is reported as such even for a valid lineage.
    pub fn get(&self, lineage: Lineage, profile_id: &str) -> Result<&GoldenProfile> {
        if !self.profiles.iter().any(|p| p.id == profile_id) {
            return Err(Error::UnknownProfile(profile_id.to_string()));
        }
        self.profiles
            .iter()
            .find(|p| p.lineage == lineage && p.id == profile_id)
            .ok_or_else(|| Error::UnknownProfile(profile_id.to_string()))
    }
}

/// Resolve a lineage name or alias, rejecting anything outside the closed set
pub fn resolve_lineage(name: &str) -> Result<Lineage> {
    Lineage::from_alias(name).ok_or_else(|| Error::UnknownLineage(name.to_string()))
}
