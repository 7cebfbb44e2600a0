//! Analysis metadata structures

use serde::{Deserialize, Serialize};

/// Degenerate-input conditions the analysis recovered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisFlag {
    /// Too few onsets for tempo estimation; the fallback beat period was used
    TempoFallback,
    /// No onsets after the intro; the downbeat phase defaulted to the intro offset
    PhaseFallback,
    /// Fewer onsets than the tempo estimator needs
    SparseOnsets,
}

/// Analysis metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Audio duration in seconds
    pub duration_seconds: f64,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Processing time in milliseconds
    pub processing_time_ms: f32,

    /// Algorithm version
    pub algorithm_version: String,

    /// STFT frames analysed
    pub frame_count: usize,

    /// Analysis flags
    pub flags: Vec<AnalysisFlag>,
}

impl Default for AnalysisMetadata {
    fn default() -> Self {
        Self {
            duration_seconds: 0.0,
            sample_rate: 0,
            processing_time_ms: 0.0,
            algorithm_version: env!("CARGO_PKG_VERSION").to_string(),
            frame_count: 0,
            flags: vec![],
        }
    }
}

impl AnalysisMetadata {
    /// True if `flag` was raised
    pub fn has_flag(&self, flag: AnalysisFlag) -> bool {
        self.flags.contains(&flag)
    }
}
