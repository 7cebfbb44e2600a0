//! Period estimation modules
//!
//! Convert the merged onset stream into a beat period:
//! - Autocorrelation of a fine-resolution impulse train
//! - Octave correction into a canonical tempo window

pub mod autocorrelation;

use serde::{Deserialize, Serialize};

/// Beat period estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatPeriodEstimate {
    /// Seconds per beat
    pub period: f64,

    /// Tempo in beats per minute (`60 / period`)
    pub bpm: f64,

    /// Winning autocorrelation value relative to lag 0 (0.0-1.0)
    pub confidence: f32,

    /// True when too few onsets forced the fallback period
    pub is_fallback: bool,
}
