//! Append-only session event store and derived read views
//!
//! The store serializes appends per session, assigns strictly increasing
//! sequence numbers, and makes re-submission with a known idempotency key a
//! no-op that returns the original result. Projections are left-folds over
//! the ordered event list and can be discarded and rebuilt at any time.

mod log;
mod projection;
#[allow(clippy::module_inception)]
mod store;

pub use log::{EventLog, MemoryEventLog};
pub use projection::{ProgressProjection, ProjectionEngine, SessionLifecycle, SessionSummary, StageStatus};
pub use store::{AppendOutcome, SessionEventStore};
