//! Session event model and EventBus
//!
//! The append-only session event log is the single source of truth for a
//! practice run. Every fact is a `SessionEvent` carrying a typed payload;
//! read views are folds over the ordered per-session event list.
//!
//! The `EventBus` broadcasts appended events to live subscribers (projection
//! maintenance, the out-of-process UI layer). The bus is a delivery
//! convenience only; replaying the log must always reproduce any live view.

use crate::adaptation::{AdaptationDecision, ArrangementPlan};
use crate::metrics::FinalizedMetrics;
use crate::score::StageResult;
use crate::stage::PracticeStage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Typed payload, one variant per event type.
///
/// Serialized with an adjacent `type` tag so the wire form matches the
/// event-type vocabulary (`session_start`, `voice_window`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Session descriptor; expected as the first event of a session
    SessionStart {
        owner_id: Uuid,
        intention: String,
        mantra_key: Option<String>,
        mood: Option<String>,
        target_duration_minutes: u32,
    },

    /// Periodic voice telemetry window from the client
    VoiceWindow {
        practice_seconds: f64,
        cadence_bpm: Option<f64>,
        cadence_consistency: Option<f64>,
        flow_score: Option<f64>,
        pronunciation_score: Option<f64>,
    },

    /// One stage attempt: finalized capture metrics plus the scored result
    StageEval {
        stage: PracticeStage,
        metrics: FinalizedMetrics,
        result: StageResult,
    },

    /// Adaptation decision emitted for this session
    AdaptationRequest { decision: AdaptationDecision },

    /// Accompaniment queue snapshot after an arrangement change
    QueueState {
        tempo_bpm: u16,
        arrangement: ArrangementPlan,
        pending_calls: u32,
    },

    /// Session end request; the summary itself is a projection
    SessionEnd {
        completed_goal: Option<bool>,
        user_value_rating: Option<f64>,
    },

    /// Signal relayed from a partner integration
    PartnerSignal {
        signal_type: String,
        adaptation_helpful: Option<bool>,
        detail: serde_json::Value,
    },
}

impl EventPayload {
    /// Event type name as stored in the log
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::SessionStart { .. } => "session_start",
            EventPayload::VoiceWindow { .. } => "voice_window",
            EventPayload::StageEval { .. } => "stage_eval",
            EventPayload::AdaptationRequest { .. } => "adaptation_request",
            EventPayload::QueueState { .. } => "queue_state",
            EventPayload::SessionEnd { .. } => "session_end",
            EventPayload::PartnerSignal { .. } => "partner_signal",
        }
    }
}

/// One immutable stored event.
///
/// `(session_id, idempotency_key)` is unique; `seq` is assigned at append
/// time and strictly increasing per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: Uuid,
    /// Client-supplied idempotency key
    pub idempotency_key: String,
    /// Server-assigned, strictly increasing per session, never reused
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}

/// Broadcast bus for appended events
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    ///
    /// Slow subscribers that fall more than `capacity` events behind drop
    /// the oldest events; the log, not the bus, is authoritative.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Emit without caring whether anyone is listening
    pub fn emit_lossy(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
