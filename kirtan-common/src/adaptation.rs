//! Adaptation decision types
//!
//! The decision record is immutable once emitted and rides inside an
//! `adaptation_request` event. The rationale is structured so a consumer can
//! show exactly which inputs drove each output field.

use serde::{Deserialize, Serialize};

/// Musical key centers available to the accompaniment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyCenter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl KeyCenter {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyCenter::C => "C",
            KeyCenter::D => "D",
            KeyCenter::E => "E",
            KeyCenter::F => "F",
            KeyCenter::G => "G",
            KeyCenter::A => "A",
            KeyCenter::B => "B",
        }
    }
}

/// Where the decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// External enrichment term was applied
    Model,
    /// Deterministic rule table only
    Fallback,
}

/// One rationale line: which signal was observed and what it changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RationaleEntry {
    /// Input that fired the rule (e.g. "mood", "heart_rate")
    pub signal: String,
    /// What was observed (e.g. "anxious", "118 bpm")
    pub observation: String,
    /// What the rule did (e.g. "tempo -8, guidance raised")
    pub effect: String,
}

/// Drone bed intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroneLevel {
    Low,
    Medium,
    High,
}

/// Percussion pattern selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Percussion {
    TablaSoft,
    TablaGroove,
}

/// Coaching action the companion surfaces alongside the music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachAction {
    RepeatLine,
    ContinueFlow,
    ShowPronunciationHint,
    HideHint,
}

/// Accompaniment arrangement derived from the final tempo and guidance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrangementPlan {
    pub drone_level: DroneLevel,
    pub percussion: Percussion,
    /// Whether the accompaniment should lead call-and-response turns
    pub call_response: bool,
    pub coach_actions: Vec<CoachAction>,
}

/// One adaptation decision, immutable once emitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationDecision {
    /// Target accompaniment tempo, clamped to 48-128 BPM
    pub tempo_bpm: u16,
    pub key_center: KeyCenter,
    /// Guidance intensity in [0, 1]; higher means more coaching interruptions
    pub guidance_intensity: f64,
    pub source: DecisionSource,
    /// Ordered explanation of which inputs drove which outputs
    pub rationale: Vec<RationaleEntry>,
    pub arrangement: ArrangementPlan,
}

impl AdaptationDecision {
    /// Flatten the rationale into a single human-readable reason line
    pub fn reason(&self) -> String {
        if self.rationale.is_empty() {
            return "default devotional adaptation".to_string();
        }
        self.rationale
            .iter()
            .map(|entry| format!("{} {}: {}", entry.signal, entry.observation, entry.effect))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
