//! Practice stage vocabulary
//!
//! The practice flow is a fixed ordered sequence; the progression state
//! machine in the engine crate gates transitions between these stages.

use serde::{Deserialize, Serialize};

/// Ordered practice stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeStage {
    Listen,
    Guided,
    CallResponse,
    Recap,
    Independent,
}

impl PracticeStage {
    /// All stages in progression order
    pub const ALL: [PracticeStage; 5] = [
        PracticeStage::Listen,
        PracticeStage::Guided,
        PracticeStage::CallResponse,
        PracticeStage::Recap,
        PracticeStage::Independent,
    ];

    /// Zero-based position in the progression
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    /// Stage that must be completed before this one may be entered
    pub fn prerequisite(&self) -> Option<PracticeStage> {
        let idx = self.index();
        if idx == 0 {
            None
        } else {
            Some(Self::ALL[idx - 1])
        }
    }

    /// Stage that follows this one, if any
    pub fn next(&self) -> Option<PracticeStage> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeStage::Listen => "listen",
            PracticeStage::Guided => "guided",
            PracticeStage::CallResponse => "call_response",
            PracticeStage::Recap => "recap",
            PracticeStage::Independent => "independent",
        }
    }
}

impl std::fmt::Display for PracticeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
