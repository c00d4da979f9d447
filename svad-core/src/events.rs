//! Events broadcast by the detector.
//!
//! Every type derives `Serialize`/`Deserialize` with camelCase fields so the
//! CLI can print them as JSON lines.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Match events
// ---------------------------------------------------------------------------

/// Emitted once when the live stream matches a reference pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    /// Name of the matching reference pattern.
    pub pattern: Option<String>,
    /// In-band chunks counted for that pattern.
    pub hits: usize,
    /// Zero-based index of the live block that completed the match.
    pub block_index: u64,
}

// ---------------------------------------------------------------------------
// Status events
// ---------------------------------------------------------------------------

/// Emitted when the detector changes state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub status: DetectorStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorStatus {
    /// Patterns loaded, no run in progress.
    Idle,
    /// Filling the streaming window and evaluating.
    Listening,
    /// A run ended with a match.
    Matched,
    /// A run ended without a match (cancelled, exhausted, timed out).
    Stopped,
    /// A run ended with an error.
    Error,
}
