//! Onset detection modules
//!
//! Band-split onset detection:
//! - Per-band positive spectral flux (low / mid / high)
//! - Adaptive local thresholding and peak picking
//! - Merging the band streams into one combined stream

pub mod band_flux;
pub mod merge;
pub mod threshold;

use serde::{Deserialize, Serialize};

/// Frequency band an onset was detected in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    /// Kick / bass region
    Low,
    /// Body of most pitched instruments
    Mid,
    /// Hats, cymbals, transients
    High,
}

impl Band {
    /// All bands, lowest first
    pub const ALL: [Band; 3] = [Band::Low, Band::Mid, Band::High];

    /// Index into per-band arrays (0 = low)
    pub fn index(self) -> usize {
        match self {
            Band::Low => 0,
            Band::Mid => 1,
            Band::High => 2,
        }
    }

    /// Lane the band maps to in banded lane assignment
    pub fn lane(self) -> usize {
        self.index()
    }
}

/// Detected onset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Onset {
    /// Onset time in seconds
    pub time: f64,

    /// Strength normalized to [0, 1]
    pub strength: f32,

    /// Band the onset came from (`None` once merged across bands)
    pub band: Option<Band>,
}

/// Onsets split by band, plus the merged stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BandOnsets {
    /// Low band onsets, sorted by time
    pub low: Vec<Onset>,
    /// Mid band onsets, sorted by time
    pub mid: Vec<Onset>,
    /// High band onsets, sorted by time
    pub high: Vec<Onset>,
    /// Merged onset stream, sorted by time
    pub all: Vec<Onset>,
    /// Flux frames the onsets were picked from
    #[serde(default)]
    pub frames: usize,
}

impl BandOnsets {
    /// Onsets of one band
    pub fn band(&self, band: Band) -> &[Onset] {
        match band {
            Band::Low => &self.low,
            Band::Mid => &self.mid,
            Band::High => &self.high,
        }
    }

    /// Strongest onset of `band` within `window` seconds of `time` (0 if none)
    pub fn strength_near(&self, band: Band, time: f64, window: f64) -> f32 {
        let onsets = self.band(band);
        // Sorted by time: start at the first onset inside the window
        let start = onsets.partition_point(|o| o.time < time - window);
        onsets[start..]
            .iter()
            .take_while(|o| o.time <= time + window)
            .map(|o| o.strength)
            .fold(0.0f32, f32::max)
    }

    /// Per-band strengths near `time`, indexed by [`Band::index`]
    pub fn strengths_near(&self, time: f64, window: f64) -> [f32; 3] {
        [
            self.strength_near(Band::Low, time, window),
            self.strength_near(Band::Mid, time, window),
            self.strength_near(Band::High, time, window),
        ]
    }

    /// Merged onset times
    pub fn times(&self) -> Vec<f64> {
        self.all.iter().map(|o| o.time).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn onset(time: f64, strength: f32, band: Band) -> Onset {
        Onset {
            time,
            strength,
            band: Some(band),
        }
    }

    #[test]
    fn test_strength_near_picks_max_in_window() {
        let bands = BandOnsets {
            low: vec![
                onset(1.0, 0.2, Band::Low),
                onset(1.1, 0.9, Band::Low),
                onset(2.0, 1.0, Band::Low),
            ],
            ..Default::default()
        };
        assert!((bands.strength_near(Band::Low, 1.05, 0.1) - 0.9).abs() < 1e-6);
        assert_eq!(bands.strength_near(Band::Low, 1.5, 0.2), 0.0);
        assert_eq!(bands.strength_near(Band::High, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_band_lanes() {
        assert_eq!(Band::Low.lane(), 0);
        assert_eq!(Band::Mid.lane(), 1);
        assert_eq!(Band::High.lane(), 2);
    }
}
