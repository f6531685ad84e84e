//! Durable event log port
//!
//! The persistence engine itself is an external collaborator; the engine
//! only requires ordered append and ordered read-back per session. The
//! in-memory implementation is the reference used by tests and by the
//! projection replay path.

use crate::error::Result;
use kirtan_common::events::SessionEvent;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Ordered append log keyed by session
pub trait EventLog: Send + Sync {
    /// Append one event. The store has already assigned `seq`; the log must
    /// preserve append order per session.
    fn append(&self, event: &SessionEvent) -> Result<()>;

    /// All events for a session in append order
    fn read_session(&self, session_id: Uuid) -> Result<Vec<SessionEvent>>;

    /// All sessions with at least one event
    fn session_ids(&self) -> Result<Vec<Uuid>>;
}

/// In-memory reference log
#[derive(Default)]
pub struct MemoryEventLog {
    sessions: RwLock<HashMap<Uuid, Vec<SessionEvent>>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for MemoryEventLog {
    fn append(&self, event: &SessionEvent) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| kirtan_common::Error::Internal("Event log lock poisoned".into()))?;
        sessions
            .entry(event.session_id)
            .or_default()
            .push(event.clone());
        Ok(())
    }

    fn read_session(&self, session_id: Uuid) -> Result<Vec<SessionEvent>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| kirtan_common::Error::Internal("Event log lock poisoned".into()))?;
        Ok(sessions.get(&session_id).cloned().unwrap_or_default())
    }

    fn session_ids(&self) -> Result<Vec<Uuid>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| kirtan_common::Error::Internal("Event log lock poisoned".into()))?;
        Ok(sessions.keys().copied().collect())
    }
}
