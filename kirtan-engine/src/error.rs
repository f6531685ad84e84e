//! Error types for the kirtan engine
//!
//! Structural failures only: numeric inputs are clamped before use, so
//! scoring and adaptation never fail for out-of-range values. A duplicate
//! event append is an outcome, not an error.

use kirtan_common::PracticeStage;
use thiserror::Error;
use uuid::Uuid;

/// Engine result type
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error type
#[derive(Error, Debug)]
pub enum Error {
    /// Audio input device could not be acquired; caller retries or aborts
    /// the stage. No partial metrics are ever returned.
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Lineage name matched no known lineage or alias
    #[error("Unknown lineage: {0}")]
    UnknownLineage(String),

    /// Golden profile id is not a known version
    #[error("Unknown golden profile: {0}")]
    UnknownProfile(String),

    /// Progression violation; session state is unchanged
    #[error("Stage {stage} is locked: complete {missing} first")]
    StageLocked {
        stage: PracticeStage,
        missing: PracticeStage,
    },

    /// Session has ended; only idempotent replays are answered
    #[error("Session {0} has ended")]
    SessionClosed(Uuid),

    /// External enrichment failed or timed out. Internal only: the
    /// adaptation path always recovers through the deterministic fallback.
    #[error("Enrichment unavailable: {0}")]
    EnrichmentUnavailable(String),

    /// Shared workspace error
    #[error(transparent)]
    Common(#[from] kirtan_common::Error),
}
