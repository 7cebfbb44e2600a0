//! Track structure
//!
//! Partitions the playable timeline into sections and rates every bar's
//! intensity:
//! - Smoothed RMS energy envelope and its percentiles
//! - Density-based section segmentation with bar snapping
//! - Per-bar intensity tiers (0-4)

pub mod bars;
pub mod envelope;
pub mod segmenter;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a section in the track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionRole {
    /// First section
    Intro,
    /// Interior section in the first half
    MainA,
    /// Interior section in the second half
    MainB,
    /// Densest interior section
    Peak,
    /// Last section
    Outro,
}

impl fmt::Display for SectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionRole::Intro => "intro",
            SectionRole::MainA => "mainA",
            SectionRole::MainB => "mainB",
            SectionRole::Peak => "peak",
            SectionRole::Outro => "outro",
        };
        f.write_str(name)
    }
}

/// Coarse energy rating of a section relative to the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyTier {
    /// Below the lower tercile
    Low,
    /// Between the terciles
    Mid,
    /// Above the upper tercile
    High,
}

/// A contiguous part of the playable timeline, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Start time in seconds (inclusive)
    pub start: f64,
    /// End time in seconds (exclusive)
    pub end: f64,
    /// Role label
    pub role: SectionRole,
    /// Energy rating
    pub energy: EnergyTier,
    /// Mean onset density in onsets per second
    pub density: f32,
}

impl Section {
    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// True if `time` lies in `[start, end)`
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

/// Section containing `time`, if any
pub fn section_at(sections: &[Section], time: f64) -> Option<&Section> {
    let idx = sections.partition_point(|s| s.end <= time);
    sections.get(idx).filter(|s| s.contains(time))
}
