//! Analysis result types

use super::metadata::AnalysisMetadata;
use crate::features::beat_tracking::DownbeatEstimate;
use crate::features::onset::BandOnsets;
use crate::features::period::BeatPeriodEstimate;
use crate::structure::envelope::EnergyEnvelope;
use serde::{Deserialize, Serialize};

/// Everything the offline analysis derives from one track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackAnalysis {
    /// Track duration in seconds
    pub duration: f64,

    /// Intro offset the downbeat phase was searched from
    pub intro: f64,

    /// Per-band and merged onsets
    pub onsets: BandOnsets,

    /// Beat period
    pub beat: BeatPeriodEstimate,

    /// Downbeat phase
    pub downbeat: DownbeatEstimate,

    /// Smoothed RMS energy envelope
    pub envelope: EnergyEnvelope,

    /// Analysis metadata
    pub metadata: AnalysisMetadata,
}

impl TrackAnalysis {
    /// Seconds per beat
    pub fn beat_period(&self) -> f64 {
        self.beat.period
    }

    /// Time of beat 0
    pub fn downbeat_phase(&self) -> f64 {
        self.downbeat.phase
    }

    /// Time of the last merged onset, if any
    pub fn last_onset(&self) -> Option<f64> {
        self.onsets.all.last().map(|o| o.time)
    }
}
