//! Devotional performance scoring
//!
//! `BhavScorer` turns a finalized metrics record into a three-dimension
//! stage result judged against a lineage golden profile. Profiles and
//! weighting tables are immutable configuration injected at construction,
//! never ambient globals.

mod bhav;
mod lineage;

pub use bhav::BhavScorer;
pub use lineage::{
    resolve_lineage, stage_target, BhavWeights, GoldenProfile, ProfileRegistry, StageTarget,
    Thresholds, DEFAULT_GOLDEN_PROFILE, GOLDEN_TEMPO_BPM,
};
