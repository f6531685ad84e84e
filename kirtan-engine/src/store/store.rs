//! Idempotent session event store
//!
//! Appends for one session serialize behind that session's mutex; different
//! sessions proceed fully in parallel. The idempotency lookup runs before
//! the lifecycle check so a retried `session_end` (or any retried event on
//! an ended session) still returns its original result instead of failing.

use crate::error::{Error, Result};
use crate::store::log::EventLog;
use kirtan_common::events::{EventBus, EventPayload, SessionEvent};
use kirtan_common::time;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};
use uuid::Uuid;

/// Result of an append: the stored event plus whether this call was a
/// replay of an earlier submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    pub event: SessionEvent,
    pub idempotency_hit: bool,
}

#[derive(Default)]
struct SessionState {
    next_seq: u64,
    by_key: HashMap<String, usize>,
    events: Vec<SessionEvent>,
    ended: bool,
}

impl SessionState {
    fn hydrate(events: Vec<SessionEvent>) -> Self {
        let mut state = SessionState {
            next_seq: events.last().map(|e| e.seq + 1).unwrap_or(1),
            ..SessionState::default()
        };
        for (idx, event) in events.iter().enumerate() {
            state.by_key.insert(event.idempotency_key.clone(), idx);
            if matches!(event.payload, EventPayload::SessionEnd { .. }) {
                state.ended = true;
            }
        }
        state.events = events;
        state
    }
}

/// Append-only store over a durable event log.
///
/// Sessions are created implicitly on first append; a `session_start`
/// payload carries the descriptor the projections pick up.
pub struct SessionEventStore<L: EventLog> {
    log: Arc<L>,
    bus: Arc<EventBus>,
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<SessionState>>>>,
}

impl<L: EventLog> SessionEventStore<L> {
    pub fn new(log: Arc<L>, bus: Arc<EventBus>) -> Self {
        Self {
            log,
            bus,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Append an event, or replay the stored result for a known key.
    ///
    /// Sequence numbers are assigned here, strictly increasing per session,
    /// never reused. A duplicate `(session, key)` is an at-most-once no-op.
    pub fn append(
        &self,
        session_id: Uuid,
        idempotency_key: &str,
        payload: EventPayload,
    ) -> Result<AppendOutcome> {
        if idempotency_key.is_empty() {
            return Err(
                kirtan_common::Error::InvalidInput("Empty idempotency key".to_string()).into(),
            );
        }

        let state_arc = self.session_state(session_id)?;
        let mut state = state_arc
            .lock()
            .map_err(|_| kirtan_common::Error::Internal("Session lock poisoned".into()))?;

        // Idempotency first: retries must succeed even after session end
        if let Some(&idx) = state.by_key.get(idempotency_key) {
            trace!(%session_id, idempotency_key, "Idempotent replay");
            return Ok(AppendOutcome {
                event: state.events[idx].clone(),
                idempotency_hit: true,
            });
        }

        if state.ended {
            return Err(Error::SessionClosed(session_id));
        }

        let event = SessionEvent {
            session_id,
            idempotency_key: idempotency_key.to_string(),
            seq: state.next_seq,
            timestamp: time::now(),
            payload,
        };

        self.log.append(&event)?;

        state.next_seq += 1;
        let event_index = state.events.len();
        state
            .by_key
            .insert(idempotency_key.to_string(), event_index);
        if matches!(event.payload, EventPayload::SessionEnd { .. }) {
            state.ended = true;
        }
        state.events.push(event.clone());

        debug!(
            %session_id,
            seq = event.seq,
            event_type = event.event_type(),
            "Event appended"
        );

        self.bus.emit_lossy(event.clone());

        Ok(AppendOutcome {
            event,
            idempotency_hit: false,
        })
    }

    /// Consistent snapshot of one session's ordered events
    pub fn events(&self, session_id: Uuid) -> Result<Vec<SessionEvent>> {
        let state_arc = self.session_state(session_id)?;
        let state = state_arc
            .lock()
            .map_err(|_| kirtan_common::Error::Internal("Session lock poisoned".into()))?;
        Ok(state.events.clone())
    }

    /// Whether the session has recorded its `session_end`
    pub fn is_ended(&self, session_id: Uuid) -> Result<bool> {
        let state_arc = self.session_state(session_id)?;
        let state = state_arc
            .lock()
            .map_err(|_| kirtan_common::Error::Internal("Session lock poisoned".into()))?;
        Ok(state.ended)
    }

    /// Per-session state handle, hydrated from the durable log on first
    /// touch so a restarted process resumes with correct seq/key state.
    fn session_state(&self, session_id: Uuid) -> Result<Arc<Mutex<SessionState>>> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| kirtan_common::Error::Internal("Store lock poisoned".into()))?;
        if let Some(state) = sessions.get(&session_id) {
            return Ok(Arc::clone(state));
        }
        let existing = self.log.read_session(session_id)?;
        let state = Arc::new(Mutex::new(SessionState::hydrate(existing)));
        sessions.insert(session_id, Arc::clone(&state));
        Ok(state)
    }
}
