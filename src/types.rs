// =============================================================================
// Shared types used across the divergence scanner
// =============================================================================

use serde::{Deserialize, Serialize};

/// Whether a scan is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Running,
}

impl Default for ScanPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
        }
    }
}
