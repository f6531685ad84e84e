//! Deterministic adaptation rule table
//!
//! Pure function from (snapshot, recent signals, optional enrichment term)
//! to a decision. Rules fire in a fixed order; each applied rule appends
//! one rationale entry, so the decision explains which inputs drove which
//! output fields. With no enrichment term the result is the fallback path
//! and must still be a valid, never-empty decision.

use crate::adaptation::context::{BiometricConfidence, ContextSnapshot, RecentSignals};
use crate::adaptation::enrichment::EnrichmentTerm;
use kirtan_common::adaptation::{
    AdaptationDecision, ArrangementPlan, CoachAction, DecisionSource, DroneLevel, KeyCenter,
    Percussion, RationaleEntry,
};
use kirtan_common::metrics::clamp01;

const TEMPO_FLOOR: i32 = 48;
const TEMPO_CEILING: i32 = 128;
const BASE_TEMPO: i32 = 72;
const GUIDANCE_HIGH: f64 = 0.85;
const GUIDANCE_LOW: f64 = 0.25;

/// Stateless rule-table policy
pub struct AdaptationPolicy;

struct Draft {
    tempo: i32,
    key: KeyCenter,
    guidance: f64,
    rationale: Vec<RationaleEntry>,
}

impl Draft {
    fn note(&mut self, signal: &str, observation: String, effect: String) {
        self.rationale.push(RationaleEntry {
            signal: signal.to_string(),
            observation,
            effect,
        });
    }
}

impl AdaptationPolicy {
    /// Compute a decision. Deterministic for identical inputs.
    pub fn decide(
        snapshot: &ContextSnapshot,
        recent: &RecentSignals,
        enrichment: Option<&EnrichmentTerm>,
    ) -> AdaptationDecision {
        let mut draft = Draft {
            tempo: BASE_TEMPO,
            key: KeyCenter::C,
            guidance: 0.5,
            rationale: Vec::new(),
        };

        Self::apply_cadence(&mut draft, recent);
        Self::apply_mood(&mut draft, snapshot);
        Self::apply_heart_rate(&mut draft, snapshot);
        Self::apply_environment(&mut draft, snapshot);
        Self::apply_history(&mut draft, recent);
        Self::apply_stress_compound(&mut draft, snapshot, recent);

        let source = match enrichment {
            Some(term) => {
                Self::apply_enrichment(&mut draft, term);
                DecisionSource::Model
            }
            None => DecisionSource::Fallback,
        };

        let tempo = draft.tempo.clamp(TEMPO_FLOOR, TEMPO_CEILING) as u16;
        let guidance = clamp01(draft.guidance);

        AdaptationDecision {
            tempo_bpm: tempo,
            key_center: draft.key,
            guidance_intensity: guidance,
            source,
            rationale: draft.rationale,
            arrangement: Self::arrangement(tempo, guidance),
        }
    }

    fn apply_cadence(draft: &mut Draft, recent: &RecentSignals) {
        if let Some(cadence) = recent.cadence_bpm {
            draft.tempo = (cadence.round() as i32).clamp(TEMPO_FLOOR, TEMPO_CEILING);
            draft.note(
                "cadence",
                format!("{cadence:.0} bpm"),
                format!("tempo follows cadence at {}", draft.tempo),
            );
        }
    }

    fn apply_mood(draft: &mut Draft, snapshot: &ContextSnapshot) {
        let Some(mood) = snapshot.mood.as_deref() else {
            return;
        };
        if matches!(mood, "anxious" | "stressed" | "overwhelmed") {
            draft.tempo = (draft.tempo - 8).max(52);
            draft.guidance = draft.guidance.max(GUIDANCE_HIGH);
            draft.key = KeyCenter::D;
            draft.note(
                "mood",
                mood.to_string(),
                "calming shift: tempo -8, guidance raised, key D".to_string(),
            );
        } else if matches!(mood, "joyful" | "energized") {
            draft.tempo = (draft.tempo + 8).min(108);
            draft.guidance = draft.guidance.min(GUIDANCE_LOW);
            draft.key = KeyCenter::G;
            draft.note(
                "mood",
                mood.to_string(),
                "uplift shift: tempo +8, guidance lowered, key G".to_string(),
            );
        } else {
            draft.note("mood", mood.to_string(), "neutral profile, no change".to_string());
        }
    }

    fn apply_heart_rate(draft: &mut Draft, snapshot: &ContextSnapshot) {
        let Some(hr) = snapshot.heart_rate_bpm else {
            return;
        };
        let high_confidence = snapshot.heart_rate_confidence == Some(BiometricConfidence::High);

        if hr > 110 {
            // Low-confidence readings nudge tempo at half strength and
            // never drive guidance changes on their own.
            if high_confidence {
                draft.tempo = (draft.tempo - 6).max(56);
                draft.guidance = draft.guidance.max(GUIDANCE_HIGH);
                draft.note(
                    "heart_rate",
                    format!("{hr} bpm"),
                    "elevated: tempo -6, guidance raised".to_string(),
                );
            } else {
                draft.tempo = (draft.tempo - 3).max(56);
                draft.note(
                    "heart_rate",
                    format!("{hr} bpm (low confidence)"),
                    "elevated: tempo -3".to_string(),
                );
            }
        } else if hr < 60 {
            let shift = if high_confidence { 4 } else { 2 };
            draft.tempo = (draft.tempo + shift).min(96);
            draft.note(
                "heart_rate",
                format!("{hr} bpm"),
                format!("resting: tempo +{shift}"),
            );
        }
    }

    fn apply_environment(draft: &mut Draft, snapshot: &ContextSnapshot) {
        if let Some(noise) = snapshot.noise_level_db {
            if noise > 65.0 {
                draft.guidance = draft.guidance.max(GUIDANCE_HIGH);
                draft.note(
                    "noise_level",
                    format!("{noise:.0} dB"),
                    "high ambient noise: guidance raised".to_string(),
                );
            }
        }
    }

    fn apply_history(draft: &mut Draft, recent: &RecentSignals) {
        if let Some(pronunciation) = recent.pronunciation_score {
            if pronunciation < 0.65 {
                draft.guidance = draft.guidance.max(GUIDANCE_HIGH);
                draft.note(
                    "pronunciation",
                    format!("{pronunciation:.2}"),
                    "below threshold: guidance raised".to_string(),
                );
            }
        }
        if let Some(flow) = recent.flow_score {
            if flow > 0.8 && draft.guidance < GUIDANCE_HIGH {
                draft.guidance = draft.guidance.min(GUIDANCE_LOW);
                draft.note(
                    "flow",
                    format!("{flow:.2}"),
                    "strong flow: guidance lowered".to_string(),
                );
            }
        }
    }

    /// Elevated stress proxy combined with an unsteady cadence eases tempo
    /// further and pushes guidance to its ceiling band.
    fn apply_stress_compound(
        draft: &mut Draft,
        snapshot: &ContextSnapshot,
        recent: &RecentSignals,
    ) {
        let stressed_mood = matches!(
            snapshot.mood.as_deref(),
            Some("anxious") | Some("stressed") | Some("overwhelmed")
        );
        let elevated_hr = snapshot.heart_rate_bpm.map_or(false, |hr| hr > 110)
            && snapshot.heart_rate_confidence == Some(BiometricConfidence::High);
        let unsteady = recent.cadence_consistency.map_or(false, |c| c < 0.6);

        if (stressed_mood || elevated_hr) && unsteady {
            draft.tempo = (draft.tempo - 4).max(TEMPO_FLOOR);
            draft.guidance = draft.guidance.max(0.9);
            draft.note(
                "stress+cadence",
                "stress proxy with unsteady cadence".to_string(),
                "tempo -4, guidance to 0.9".to_string(),
            );
        }
    }

    fn apply_enrichment(draft: &mut Draft, term: &EnrichmentTerm) {
        draft.tempo += term.tempo_shift_bpm;
        if let Some(key) = term.key_suggestion {
            draft.key = key;
        }
        if let Some(bias) = term.guidance_bias {
            draft.guidance = clamp01(draft.guidance + bias);
        }
        draft.note(
            "enrichment",
            format!("confidence {:.2}", term.confidence),
            format!("tempo shift {:+}", term.tempo_shift_bpm),
        );
    }

    fn arrangement(tempo_bpm: u16, guidance: f64) -> ArrangementPlan {
        let high_guidance = guidance >= GUIDANCE_HIGH;
        ArrangementPlan {
            drone_level: DroneLevel::Medium,
            percussion: if tempo_bpm < 80 {
                Percussion::TablaSoft
            } else {
                Percussion::TablaGroove
            },
            call_response: high_guidance,
            coach_actions: if high_guidance {
                vec![CoachAction::RepeatLine, CoachAction::ShowPronunciationHint]
            } else {
                vec![CoachAction::ContinueFlow, CoachAction::HideHint]
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(mood: Option<&str>) -> ContextSnapshot {
        ContextSnapshot {
            mood: mood.map(str::to_string),
            ..ContextSnapshot::default()
        }
    }

    #[test]
    fn test_default_decision_is_well_formed() {
        let decision =
            AdaptationPolicy::decide(&ContextSnapshot::default(), &RecentSignals::default(), None);
        assert_eq!(decision.tempo_bpm, 72);
        assert_eq!(decision.key_center, KeyCenter::C);
        assert_eq!(decision.guidance_intensity, 0.5);
        assert_eq!(decision.source, DecisionSource::Fallback);
        assert!(!decision.arrangement.coach_actions.is_empty());
    }

    #[test]
    fn test_cadence_drives_tempo() {
        let recent = RecentSignals {
            cadence_bpm: Some(64.4),
            ..RecentSignals::default()
        };
        let decision = AdaptationPolicy::decide(&ContextSnapshot::default(), &recent, None);
        assert_eq!(decision.tempo_bpm, 64);
        assert_eq!(decision.rationale[0].signal, "cadence");
    }

    #[test]
    fn test_anxious_mood_calms_arrangement() {
        let decision =
            AdaptationPolicy::decide(&snapshot(Some("anxious")), &RecentSignals::default(), None);
        assert_eq!(decision.tempo_bpm, 64);
        assert_eq!(decision.key_center, KeyCenter::D);
        assert_eq!(decision.guidance_intensity, GUIDANCE_HIGH);
        assert_eq!(decision.arrangement.percussion, Percussion::TablaSoft);
        assert!(decision.arrangement.call_response);
    }

    #[test]
    fn test_joyful_mood_uplifts() {
        let decision =
            AdaptationPolicy::decide(&snapshot(Some("joyful")), &RecentSignals::default(), None);
        assert_eq!(decision.tempo_bpm, 80);
        assert_eq!(decision.key_center, KeyCenter::G);
        assert_eq!(decision.guidance_intensity, GUIDANCE_LOW);
        assert_eq!(decision.arrangement.percussion, Percussion::TablaGroove);
    }

    #[test]
    fn test_low_confidence_heart_rate_is_attenuated() {
        let high = ContextSnapshot {
            heart_rate_bpm: Some(120),
            heart_rate_confidence: Some(BiometricConfidence::High),
            ..ContextSnapshot::default()
        };
        let low = ContextSnapshot {
            heart_rate_bpm: Some(120),
            heart_rate_confidence: Some(BiometricConfidence::Low),
            ..ContextSnapshot::default()
        };

        let d_high = AdaptationPolicy::decide(&high, &RecentSignals::default(), None);
        let d_low = AdaptationPolicy::decide(&low, &RecentSignals::default(), None);

        assert_eq!(d_high.tempo_bpm, 66);
        assert_eq!(d_high.guidance_intensity, GUIDANCE_HIGH);
        assert_eq!(d_low.tempo_bpm, 69);
        assert_eq!(d_low.guidance_intensity, 0.5);
    }

    #[test]
    fn test_stress_with_unsteady_cadence_compounds() {
        let ctx = snapshot(Some("stressed"));
        let recent = RecentSignals {
            cadence_consistency: Some(0.4),
            ..RecentSignals::default()
        };
        let decision = AdaptationPolicy::decide(&ctx, &recent, None);
        // mood: 72-8=64, compound: -4 → 60
        assert_eq!(decision.tempo_bpm, 60);
        assert_eq!(decision.guidance_intensity, 0.9);
    }

    #[test]
    fn test_noise_raises_guidance() {
        let ctx = ContextSnapshot {
            noise_level_db: Some(72.0),
            ..ContextSnapshot::default()
        };
        let decision = AdaptationPolicy::decide(&ctx, &RecentSignals::default(), None);
        assert_eq!(decision.guidance_intensity, GUIDANCE_HIGH);
    }

    #[test]
    fn test_strong_flow_lowers_guidance_unless_already_high() {
        let recent = RecentSignals {
            flow_score: Some(0.9),
            ..RecentSignals::default()
        };
        let calm = AdaptationPolicy::decide(&ContextSnapshot::default(), &recent, None);
        assert_eq!(calm.guidance_intensity, GUIDANCE_LOW);

        // High guidance from noise wins over the flow reduction
        let noisy = ContextSnapshot {
            noise_level_db: Some(80.0),
            ..ContextSnapshot::default()
        };
        let decision = AdaptationPolicy::decide(&noisy, &recent, None);
        assert_eq!(decision.guidance_intensity, GUIDANCE_HIGH);
    }

    #[test]
    fn test_enrichment_term_shifts_and_tags_model() {
        let term = EnrichmentTerm {
            tempo_shift_bpm: 10,
            key_suggestion: Some(KeyCenter::E),
            guidance_bias: Some(-0.1),
            confidence: 0.8,
        };
        let decision = AdaptationPolicy::decide(
            &ContextSnapshot::default(),
            &RecentSignals::default(),
            Some(&term),
        );
        assert_eq!(decision.source, DecisionSource::Model);
        assert_eq!(decision.tempo_bpm, 82);
        assert_eq!(decision.key_center, KeyCenter::E);
        assert!((decision.guidance_intensity - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_always_within_bounds() {
        let term = EnrichmentTerm {
            tempo_shift_bpm: 500,
            key_suggestion: None,
            guidance_bias: None,
            confidence: 1.0,
        };
        let decision = AdaptationPolicy::decide(
            &ContextSnapshot::default(),
            &RecentSignals::default(),
            Some(&term),
        );
        assert_eq!(decision.tempo_bpm, 128);
    }

    #[test]
    fn test_determinism() {
        let ctx = snapshot(Some("anxious"));
        let recent = RecentSignals {
            cadence_bpm: Some(66.0),
            cadence_consistency: Some(0.5),
            flow_score: Some(0.7),
            pronunciation_score: Some(0.6),
        };
        let a = AdaptationPolicy::decide(&ctx, &recent, None);
        let b = AdaptationPolicy::decide(&ctx, &recent, None);
        assert_eq!(a, b);
    }
}
