//! Stage progression state machine
//!
//! Governs the ordered practice flow (listen → guided → call_response →
//! recap → independent). A stage may be entered only when its predecessor
//! is done; completed stages may be re-entered for replay practice, which
//! overwrites that stage's result without disturbing later completions.

use crate::error::{Error, Result};
use kirtan_common::events::{EventPayload, SessionEvent};
use kirtan_common::score::StageResult;
use kirtan_common::stage::PracticeStage;
use std::collections::BTreeMap;
use tracing::debug;

/// Progression state for one session.
///
/// Initial state: nothing entered. Terminal state: independent done, after
/// which the session is eligible for finalize.
#[derive(Debug, Clone, Default)]
pub struct StageFlow {
    done: [bool; 5],
    results: BTreeMap<PracticeStage, StageResult>,
}

impl StageFlow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild progression state from a session's ordered events.
    ///
    /// Events were gated when appended, so replay trusts the log and does
    /// not re-check prerequisites.
    pub fn replay(events: &[SessionEvent]) -> Self {
        let mut flow = StageFlow::new();
        for event in events {
            if let EventPayload::StageEval { stage, result, .. } = &event.payload {
                flow.done[stage.index()] = true;
                flow.results.insert(*stage, result.clone());
            }
        }
        flow
    }

    /// Check whether `stage` may be entered now.
    ///
    /// Skip-ahead fails with `StageLocked` naming the unmet prerequisite;
    /// session state is unchanged on failure.
    pub fn try_enter(&self, stage: PracticeStage) -> Result<()> {
        if let Some(prerequisite) = stage.prerequisite() {
            if !self.is_done(prerequisite) {
                return Err(Error::StageLocked {
                    stage,
                    missing: prerequisite,
                });
            }
        }
        Ok(())
    }

    /// Mark a stage done without a scored result (listen acknowledgement).
    pub fn acknowledge(&mut self, stage: PracticeStage) -> Result<()> {
        self.try_enter(stage)?;
        self.done[stage.index()] = true;
        debug!(stage = %stage, "Stage acknowledged");
        Ok(())
    }

    /// Record an evaluation for a stage, gating on the progression order.
    ///
    /// A repeat of a completed stage replaces its result; later completions
    /// already recorded are unaffected.
    pub fn record_result(&mut self, result: StageResult) -> Result<()> {
        let stage = result.stage;
        self.try_enter(stage)?;
        self.done[stage.index()] = true;
        debug!(stage = %stage, composite = result.composite, "Stage result recorded");
        self.results.insert(stage, result);
        Ok(())
    }

    pub fn is_done(&self, stage: PracticeStage) -> bool {
        self.done[stage.index()]
    }

    /// Latest recorded result for a stage, if it was ever evaluated
    pub fn latest_result(&self, stage: PracticeStage) -> Option<&StageResult> {
        self.results.get(&stage)
    }

    /// Next stage that still needs completing; `None` when the flow is done
    pub fn next_stage(&self) -> Option<PracticeStage> {
        PracticeStage::ALL.iter().copied().find(|s| !self.is_done(*s))
    }

    /// Terminal check: the independent stage is done
    pub fn is_complete(&self) -> bool {
        self.is_done(PracticeStage::Independent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kirtan_common::score::Lineage;

    fn result(stage: PracticeStage, composite: f64) -> StageResult {
        StageResult {
            stage,
            lineage: Lineage::Vaishnavism,
            golden_profile: "maha_mantra_v1".to_string(),
            discipline: composite,
            resonance: composite,
            coherence: composite,
            composite,
            passes_golden: composite >= 0.75,
            feedback: vec![],
        }
    }

    #[test]
    fn test_initial_state_allows_only_listen() {
        let flow = StageFlow::new();
        assert!(flow.try_enter(PracticeStage::Listen).is_ok());
        assert!(matches!(
            flow.try_enter(PracticeStage::Guided),
            Err(Error::StageLocked {
                stage: PracticeStage::Guided,
                missing: PracticeStage::Listen,
            })
        ));
    }

    #[test]
    fn test_skip_ahead_names_prerequisite() {
        let mut flow = StageFlow::new();
        flow.acknowledge(PracticeStage::Listen).unwrap();
        let err = flow.try_enter(PracticeStage::Independent).unwrap_err();
        match err {
            Error::StageLocked { stage, missing } => {
                assert_eq!(stage, PracticeStage::Independent);
                assert_eq!(missing, PracticeStage::Recap);
            }
            other => panic!("expected StageLocked, got {other:?}"),
        }
    }

    #[test]
    fn test_full_progression_reaches_terminal() {
        let mut flow = StageFlow::new();
        flow.acknowledge(PracticeStage::Listen).unwrap();
        for stage in [
            PracticeStage::Guided,
            PracticeStage::CallResponse,
            PracticeStage::Recap,
            PracticeStage::Independent,
        ] {
            flow.record_result(result(stage, 0.8)).unwrap();
        }
        assert!(flow.is_complete());
        assert_eq!(flow.next_stage(), None);
    }

    #[test]
    fn test_failed_evaluation_still_marks_done() {
        let mut flow = StageFlow::new();
        flow.acknowledge(PracticeStage::Listen).unwrap();
        flow.record_result(result(PracticeStage::Guided, 0.3)).unwrap();
        assert!(flow.is_done(PracticeStage::Guided));
        assert!(flow.try_enter(PracticeStage::CallResponse).is_ok());
    }

    #[test]
    fn test_replay_overwrites_without_clearing_later_stages() {
        let mut flow = StageFlow::new();
        flow.acknowledge(PracticeStage::Listen).unwrap();
        flow.record_result(result(PracticeStage::Guided, 0.5)).unwrap();
        flow.record_result(result(PracticeStage::CallResponse, 0.8))
            .unwrap();

        // Replay guided with a better attempt
        flow.record_result(result(PracticeStage::Guided, 0.9)).unwrap();
        assert_eq!(
            flow.latest_result(PracticeStage::Guided).unwrap().composite,
            0.9
        );
        assert!(flow.is_done(PracticeStage::CallResponse));
    }

    #[test]
    fn test_next_stage_walks_in_order() {
        let mut flow = StageFlow::new();
        assert_eq!(flow.next_stage(), Some(PracticeStage::Listen));
        flow.acknowledge(PracticeStage::Listen).unwrap();
        assert_eq!(flow.next_stage(), Some(PracticeStage::Guided));
    }

    #[test]
    fn test_replay_rebuilds_progression_from_events() {
        use kirtan_common::metrics::FinalizedMetrics;
        use kirtan_common::time;
        use uuid::Uuid;

        let session = Uuid::new_v4();
        let metrics = FinalizedMetrics {
            duration_seconds: 60.0,
            voice_ratio_total: 0.5,
            voice_ratio_leader: None,
            voice_ratio_follower: None,
            pitch_stability: 0.8,
            cadence_bpm: 72.0,
            cadence_consistency: 0.8,
            avg_energy: 0.5,
        };
        let events: Vec<SessionEvent> = [PracticeStage::Listen, PracticeStage::Guided]
            .iter()
            .enumerate()
            .map(|(i, &stage)| SessionEvent {
                session_id: session,
                idempotency_key: format!("stage-{i}"),
                seq: i as u64 + 1,
                timestamp: time::now(),
                payload: EventPayload::StageEval {
                    stage,
                    metrics: metrics.clone(),
                    result: result(stage, 0.8),
                },
            })
            .collect();

        let flow = StageFlow::replay(&events);
        assert!(flow.is_done(PracticeStage::Guided));
        assert!(flow.try_enter(PracticeStage::CallResponse).is_ok());
        assert_eq!(flow.next_stage(), Some(PracticeStage::CallResponse));
    }
}
