//! # Kirtan Engine
//!
//! Real-time signal-to-decision pipeline for chant practice:
//!
//! ```text
//! microphone → audio::CaptureSession → FinalizedMetrics
//!                                           ↓
//!                                   scoring::BhavScorer → StageResult
//!                                           ↓
//!                                   stage::StageFlow (gates progression)
//!                                           ↓
//!                              store::SessionEventStore (append-only log)
//!                                           ↓
//!                              store::ProjectionEngine (read views)
//!
//! listener / biometric / environment input → adaptation::ContextFusion
//!                                           ↓
//!                              adaptation::AdaptationEngine → decision
//! ```
//!
//! Every derived view is recomputable by replaying a session's ordered
//! events; scoring and adaptation are deterministic for identical input.

pub mod adaptation;
pub mod audio;
pub mod error;
pub mod scoring;
pub mod stage;
pub mod store;

pub use error::{Error, Result};
