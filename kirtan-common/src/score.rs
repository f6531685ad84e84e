//! Lineage vocabulary and stage scoring results

use crate::stage::PracticeStage;
use serde::{Deserialize, Serialize};

/// Supported devotional lineages.
///
/// Closed set; free-form lineage strings are resolved through the alias
/// table and anything outside it is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lineage {
    Vaishnavism,
    Sadhguru,
    ShreeVallabhacharya,
}

impl Lineage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lineage::Vaishnavism => "vaishnavism",
            Lineage::Sadhguru => "sadhguru",
            Lineage::ShreeVallabhacharya => "shree_vallabhacharya",
        }
    }

    /// Resolve a lineage name or recognized alias (case-insensitive).
    ///
    /// "vashnavism" is a historically common misspelling and resolves to
    /// Vaishnavism.
    pub fn from_alias(name: &str) -> Option<Lineage> {
        match name.trim().to_ascii_lowercase().as_str() {
            "vaishnavism" | "vashnavism" | "vaishnava" => Some(Lineage::Vaishnavism),
            "sadhguru" | "isha" | "isha_foundation" => Some(Lineage::Sadhguru),
            "shree_vallabhacharya" | "vallabhacharya" | "pushtimarg" => {
                Some(Lineage::ShreeVallabhacharya)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Lineage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one stage evaluation.
///
/// Superseded, never mutated, by later attempts of the same stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: PracticeStage,
    pub lineage: Lineage,
    pub golden_profile: String,
    /// Duration adequacy + cadence steadiness, [0, 1]
    pub discipline: f64,
    /// Energy + pitch stability, [0, 1]
    pub resonance: f64,
    /// Voice-ratio alignment with the stage's expected turn balance, [0, 1]
    pub coherence: f64,
    /// Profile-weighted blend of the three sub-dimensions, [0, 1]
    pub composite: f64,
    pub passes_golden: bool,
    /// Ordered hints, most important first
    pub feedback: Vec<String>,
}
