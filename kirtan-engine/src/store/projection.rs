//! Recomputable read views
//!
//! `SessionSummary` and `ProgressProjection` are pure left-folds over a
//! session's ordered events. The live-maintained view and a replay from the
//! empty state must always agree; replay equivalence is a contract, not an
//! optimization.

use crate::error::Result;
use crate::store::log::EventLog;
use chrono::{DateTime, Utc};
use kirtan_common::adaptation::ArrangementPlan;
use kirtan_common::events::{EventPayload, SessionEvent};
use kirtan_common::score::StageResult;
use kirtan_common::stage::PracticeStage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Session lifecycle as seen by the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionLifecycle {
    Active,
    Ended,
}

/// Completion and latest result for one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStatus {
    pub done: bool,
    pub result: Option<StageResult>,
}

/// Read-optimized view of one session, derived entirely from its events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub intention: Option<String>,
    pub mantra_key: Option<String>,
    pub mood: Option<String>,
    pub target_duration_minutes: u32,
    pub lifecycle: SessionLifecycle,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub events_count: u64,
    pub adaptations_count: u64,
    pub practice_seconds: f64,
    pub completed_goal: Option<bool>,
    pub user_value_rating: Option<f64>,
    pub stage_status: BTreeMap<PracticeStage, StageStatus>,
    pub last_arrangement: Option<ArrangementPlan>,
    flow_sum: f64,
    flow_samples: u64,
    pronunciation_sum: f64,
    pronunciation_samples: u64,
    helpful_sum: f64,
    helpful_samples: u64,
}

impl SessionSummary {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            owner_id: None,
            intention: None,
            mantra_key: None,
            mood: None,
            target_duration_minutes: 10,
            lifecycle: SessionLifecycle::Active,
            started_at: None,
            ended_at: None,
            events_count: 0,
            adaptations_count: 0,
            practice_seconds: 0.0,
            completed_goal: None,
            user_value_rating: None,
            stage_status: BTreeMap::new(),
            last_arrangement: None,
            flow_sum: 0.0,
            flow_samples: 0,
            pronunciation_sum: 0.0,
            pronunciation_samples: 0,
            helpful_sum: 0.0,
            helpful_samples: 0,
        }
    }

    /// Fold one event into the view
    pub fn apply(&mut self, event: &SessionEvent) {
        self.events_count += 1;
        if self.started_at.is_none() {
            self.started_at = Some(event.timestamp);
        }

        match &event.payload {
            EventPayload::SessionStart {
                owner_id,
                intention,
                mantra_key,
                mood,
                target_duration_minutes,
            } => {
                self.owner_id = Some(*owner_id);
                self.intention = Some(intention.clone());
                self.mantra_key = mantra_key.clone();
                self.mood = mood.clone();
                self.target_duration_minutes = (*target_duration_minutes).max(1);
            }
            EventPayload::VoiceWindow {
                practice_seconds,
                flow_score,
                pronunciation_score,
                ..
            } => {
                self.practice_seconds += practice_seconds.max(0.0);
                if let Some(flow) = flow_score {
                    self.flow_sum += flow;
                    self.flow_samples += 1;
                }
                if let Some(pronunciation) = pronunciation_score {
                    self.pronunciation_sum += pronunciation;
                    self.pronunciation_samples += 1;
                }
            }
            EventPayload::StageEval { stage, result, .. } => {
                self.stage_status.insert(
                    *stage,
                    StageStatus {
                        done: true,
                        result: Some(result.clone()),
                    },
                );
            }
            EventPayload::AdaptationRequest { .. } => {
                self.adaptations_count += 1;
            }
            EventPayload::QueueState { arrangement, .. } => {
                self.last_arrangement = Some(arrangement.clone());
            }
            EventPayload::SessionEnd {
                completed_goal,
                user_value_rating,
            } => {
                self.lifecycle = SessionLifecycle::Ended;
                self.ended_at = Some(event.timestamp);
                self.user_value_rating = *user_value_rating;

                // Wall-clock fallback when no voice windows reported time
                if self.practice_seconds <= 0.0 {
                    if let Some(started) = self.started_at {
                        let elapsed = (event.timestamp - started).num_milliseconds() as f64 / 1000.0;
                        self.practice_seconds = elapsed.max(0.0);
                    }
                }

                let target_minutes = self.target_duration_minutes.max(1) as f64;
                self.completed_goal = Some(completed_goal.unwrap_or(
                    self.practice_minutes() >= 0.8 * target_minutes,
                ));
            }
            EventPayload::PartnerSignal {
                adaptation_helpful, ..
            } => {
                if let Some(helpful) = adaptation_helpful {
                    self.helpful_sum += if *helpful { 1.0 } else { 0.0 };
                    self.helpful_samples += 1;
                }
            }
        }
    }

    /// Rebuild the view from scratch over an ordered event list
    pub fn replay(session_id: Uuid, events: &[SessionEvent]) -> Self {
        let mut summary = SessionSummary::new(session_id);
        for event in events {
            summary.apply(event);
        }
        summary
    }

    pub fn practice_minutes(&self) -> f64 {
        self.practice_seconds / 60.0
    }

    pub fn avg_flow_score(&self) -> f64 {
        mean_or_zero(self.flow_sum, self.flow_samples)
    }

    pub fn avg_pronunciation_score(&self) -> f64 {
        mean_or_zero(self.pronunciation_sum, self.pronunciation_samples)
    }

    pub fn adaptation_helpful_rate(&self) -> f64 {
        mean_or_zero(self.helpful_sum, self.helpful_samples)
    }

    pub fn stage_done(&self, stage: PracticeStage) -> bool {
        self.stage_status.get(&stage).map_or(false, |s| s.done)
    }

    /// Next stage still to complete; `None` once independent is done
    pub fn current_stage(&self) -> Option<PracticeStage> {
        PracticeStage::ALL
            .iter()
            .copied()
            .find(|stage| !self.stage_done(*stage))
    }
}

fn mean_or_zero(sum: f64, samples: u64) -> f64 {
    if samples == 0 {
        0.0
    } else {
        sum / samples as f64
    }
}

/// Per-owner practice aggregates, updated when a session ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressProjection {
    pub owner_id: Uuid,
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub total_practice_minutes: f64,
    pub avg_flow_score: f64,
    pub avg_pronunciation_score: f64,
}

impl ProgressProjection {
    pub fn new(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            total_sessions: 0,
            completed_sessions: 0,
            total_practice_minutes: 0.0,
            avg_flow_score: 0.0,
            avg_pronunciation_score: 0.0,
        }
    }

    /// Fold one ended session into the running aggregates
    pub fn absorb(&mut self, summary: &SessionSummary) {
        let total_before = self.total_sessions;

        self.total_sessions += 1;
        if summary.completed_goal == Some(true) {
            self.completed_sessions += 1;
        }
        self.total_practice_minutes += summary.practice_minutes();

        if total_before == 0 {
            self.avg_flow_score = summary.avg_flow_score();
            self.avg_pronunciation_score = summary.avg_pronunciation_score();
        } else {
            let n = total_before as f64;
            self.avg_flow_score =
                (self.avg_flow_score * n + summary.avg_flow_score()) / (n + 1.0);
            self.avg_pronunciation_score =
                (self.avg_pronunciation_score * n + summary.avg_pronunciation_score()) / (n + 1.0);
        }
    }
}

/// Maintains live read views and recomputes them by replay on demand
#[derive(Default)]
pub struct ProjectionEngine {
    summaries: RwLock<HashMap<Uuid, SessionSummary>>,
    progress: RwLock<HashMap<Uuid, ProgressProjection>>,
}

impl ProjectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one appended event into the live views.
    ///
    /// When a session ends, its summary is absorbed into the owner's
    /// progress projection exactly once.
    pub fn apply(&self, event: &SessionEvent) {
        let mut summaries = match self.summaries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let summary = summaries
            .entry(event.session_id)
            .or_insert_with(|| SessionSummary::new(event.session_id));
        summary.apply(event);

        if matches!(event.payload, EventPayload::SessionEnd { .. }) {
            if let Some(owner_id) = summary.owner_id {
                let summary = summary.clone();
                drop(summaries);
                let mut progress = match self.progress.write() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                progress
                    .entry(owner_id)
                    .or_insert_with(|| ProgressProjection::new(owner_id))
                    .absorb(&summary);
            }
        }
    }

    pub fn summary(&self, session_id: Uuid) -> Option<SessionSummary> {
        self.summaries
            .read()
            .ok()
            .and_then(|map| map.get(&session_id).cloned())
    }

    pub fn progress(&self, owner_id: Uuid) -> Option<ProgressProjection> {
        self.progress
            .read()
            .ok()
            .and_then(|map| map.get(&owner_id).cloned())
    }

    /// Discard and rebuild one session's summary from the durable log.
    ///
    /// The result must equal the live-maintained view for the same events.
    pub fn recompute_session(&self, log: &dyn EventLog, session_id: Uuid) -> Result<SessionSummary> {
        let events = log.read_session(session_id)?;
        let summary = SessionSummary::replay(session_id, &events);
        debug!(%session_id, events = events.len(), "Session summary recomputed");
        if let Ok(mut summaries) = self.summaries.write() {
            summaries.insert(session_id, summary.clone());
        }
        Ok(summary)
    }
}
