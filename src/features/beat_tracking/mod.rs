//! Beat tracking modules
//!
//! Anchor the beat grid in time:
//! - Downbeat phase search over candidate offsets within one beat

pub mod downbeat;

use serde::{Deserialize, Serialize};

/// Downbeat phase estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DownbeatEstimate {
    /// Time of beat 0, in seconds
    pub phase: f64,

    /// Alignment score of the winning candidate
    pub score: f64,

    /// True when there were no onsets and the phase defaulted to the intro offset
    pub is_fallback: bool,
}
