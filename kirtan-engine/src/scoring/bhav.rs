//! Composite devotional scoring
//!
//! Deterministic: identical metrics + profile always yield an identical
//! StageResult. Inputs are clamped before use, so evaluation never fails on
//! numeric range; the only failures are unknown lineage/profile.

use crate::error::Result;
use crate::scoring::lineage::{
    resolve_lineage, stage_target, BhavWeights, ProfileRegistry, Thresholds, GOLDEN_TEMPO_BPM,
};
use kirtan_common::metrics::{clamp01, round3, FinalizedMetrics};
use kirtan_common::score::StageResult;
use kirtan_common::stage::PracticeStage;
use tracing::debug;

/// Evaluates stage attempts against golden profiles.
///
/// Profiles are injected immutable configuration.
pub struct BhavScorer {
    registry: ProfileRegistry,
}

struct SubScores {
    discipline: f64,
    resonance: f64,
    coherence: f64,
}

impl BhavScorer {
    pub fn new(registry: ProfileRegistry) -> Self {
        Self { registry }
    }

    /// Scorer over the published golden profiles
    pub fn with_published_profiles() -> Self {
        Self::new(ProfileRegistry::published())
    }

    /// Evaluate one stage attempt.
    ///
    /// `lineage_name` accepts recognized aliases; `golden_profile_id` must
    /// name a published profile version.
    pub fn evaluate(
        &self,
        stage: PracticeStage,
        lineage_name: &str,
        golden_profile_id: &str,
        metrics: &FinalizedMetrics,
    ) -> Result<StageResult> {
        let lineage = resolve_lineage(lineage_name)?;
        let profile = self.registry.get(lineage, golden_profile_id)?;

        let metrics = metrics.clone().clamped();
        let scores = stage_scores(stage, &metrics);
        let weights: BhavWeights = profile.weights(stage);

        let composite = clamp01(
            weights.discipline * scores.discipline
                + weights.resonance * scores.resonance
                + weights.coherence * scores.coherence,
        );

        let thresholds = profile.thresholds(stage);
        // Composite alone cannot pass; every sub-dimension must clear its
        // floor so one strong metric cannot game the blend.
        let passes_golden = scores.discipline >= thresholds.discipline
            && scores.resonance >= thresholds.resonance
            && scores.coherence >= thresholds.coherence
            && composite >= thresholds.composite;

        let feedback = feedback(stage, &scores, &metrics, &thresholds);

        debug!(
            stage = %stage,
            lineage = %lineage,
            composite,
            passes_golden,
            "Stage evaluated"
        );

        Ok(StageResult {
            stage,
            lineage,
            golden_profile: golden_profile_id.to_string(),
            discipline: round3(scores.discipline),
            resonance: round3(scores.resonance),
            coherence: round3(scores.coherence),
            composite: round3(composite),
            passes_golden,
            feedback,
        })
    }
}

/// Accuracy of the chant tempo against the golden anchor, ±24 BPM tolerance
fn cadence_accuracy(bpm: f64) -> f64 {
    clamp01(1.0 - ((bpm - GOLDEN_TEMPO_BPM).abs() / 24.0))
}

/// Balanced devotional intensity is centered near 0.48
fn energy_centered(avg_energy: f64) -> f64 {
    clamp01(1.0 - ((avg_energy - 0.48).abs() / 0.48))
}

fn follower_ratio(metrics: &FinalizedMetrics) -> f64 {
    metrics
        .voice_ratio_follower
        .unwrap_or(metrics.voice_ratio_total)
}

fn leader_ratio(metrics: &FinalizedMetrics) -> f64 {
    match metrics.voice_ratio_leader {
        Some(ratio) => ratio,
        None => clamp01(metrics.voice_ratio_total - follower_ratio(metrics)),
    }
}

/// Sub-dimension blends per stage.
///
/// Listen shares the guided form (duration dominates); recap shares the
/// independent form. Each dimension draws on a disjoint metric emphasis:
/// discipline on duration/steadiness, resonance on energy/pitch, coherence
/// on flow alignment.
fn stage_scores(stage: PracticeStage, metrics: &FinalizedMetrics) -> SubScores {
    let duration_ratio =
        clamp01(metrics.duration_seconds / stage_target(stage).duration_seconds);
    let cadence_acc = cadence_accuracy(metrics.cadence_bpm);
    let energy = energy_centered(metrics.avg_energy);
    let voice_total = metrics.voice_ratio_total;
    let pitch = metrics.pitch_stability;
    let consistency = metrics.cadence_consistency;

    match stage {
        PracticeStage::Listen | PracticeStage::Guided => SubScores {
            discipline: clamp01(
                0.40 * duration_ratio + 0.30 * voice_total + 0.30 * consistency,
            ),
            resonance: clamp01(0.45 * pitch + 0.35 * energy + 0.20 * cadence_acc),
            coherence: clamp01(0.60 * pitch + 0.40 * consistency),
        },
        PracticeStage::CallResponse => {
            let follower = follower_ratio(metrics);
            let leader = leader_ratio(metrics);
            // The practitioner should carry ~60% of the voiced time and
            // leave space while the leader calls.
            let follower_balance = clamp01(1.0 - ((follower - 0.6).abs() / 0.6));
            let leader_space = clamp01(1.0 - (leader / 0.5));

            SubScores {
                discipline: clamp01(
                    0.35 * duration_ratio + 0.35 * follower_balance + 0.30 * leader_space,
                ),
                resonance: clamp01(0.40 * pitch + 0.35 * cadence_acc + 0.25 * energy),
                coherence: clamp01(0.45 * pitch + 0.35 * consistency + 0.20 * follower),
            }
        }
        PracticeStage::Recap | PracticeStage::Independent => SubScores {
            discipline: clamp01(
                0.45 * duration_ratio + 0.35 * voice_total + 0.20 * consistency,
            ),
            resonance: clamp01(0.45 * pitch + 0.35 * energy + 0.20 * voice_total),
            coherence: clamp01(0.40 * pitch + 0.35 * consistency + 0.25 * cadence_acc),
        },
    }
}

/// Ordered hints: sub-dimension shortfalls first (fixed priority), then
/// metric-specific tips, capped at four.
fn feedback(
    stage: PracticeStage,
    scores: &SubScores,
    metrics: &FinalizedMetrics,
    thresholds: &Thresholds,
) -> Vec<String> {
    let mut tips: Vec<String> = Vec::new();

    if scores.discipline < thresholds.discipline {
        tips.push(
            "Keep steadier practice windows and stay consistent through the full stage duration."
                .to_string(),
        );
    }
    if scores.resonance < thresholds.resonance {
        tips.push(
            "Match breath and vocal intensity to the accompaniment for stronger resonance."
                .to_string(),
        );
    }
    if scores.coherence < thresholds.coherence {
        tips.push(
            "Focus on cleaner syllable transitions and steadier note-to-note flow.".to_string(),
        );
    }

    if metrics.cadence_consistency < 0.65 {
        tips.push("Use a calmer tempo anchor; avoid rushing at phrase boundaries.".to_string());
    }
    if metrics.pitch_stability < 0.65 {
        tips.push(
            "Hold each phrase slightly longer before transitioning to improve pitch stability."
                .to_string(),
        );
    }

    if stage == PracticeStage::CallResponse {
        if follower_ratio(metrics) < 0.45 {
            tips.push("Increase voice presence during your response turns.".to_string());
        }
        if leader_ratio(metrics) > 0.35 {
            tips.push("Leave more space for the call before your response.".to_string());
        }
    }

    if tips.is_empty() {
        tips.push(
            "Strong stage performance. Keep the same breath control and cadence consistency."
                .to_string(),
        );
    }
    tips.truncate(4);
    tips
}
