//! Difficulty profiles
//!
//! A difficulty name selects a fixed bundle of generation and judging
//! parameters: intro length, fall-travel duration, judgment tier widths,
//! and the placement rates the chart builder draws against.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Judgment tier widths in milliseconds (absolute offset from the note time)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgeWindows {
    /// Perfect window (ms)
    pub perfect: f64,
    /// Great window (ms)
    pub great: f64,
    /// Good window (ms), the widest accepted offset
    pub good: f64,
}

impl Default for JudgeWindows {
    fn default() -> Self {
        Difficulty::Normal.profile().judge
    }
}

/// Named difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Relaxed timing, no flicks or chords
    Easy,
    /// Standard
    #[default]
    Normal,
    /// Tight timing, dense patterns allowed
    Hard,
}

impl Difficulty {
    /// All recognized difficulties, easiest first
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

    /// Lowercase name as used in chart documents
    pub fn name(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }

    /// Parse a name leniently, falling back to `Normal` for unknown names
    pub fn from_name_or_default(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    /// The fixed parameter bundle for this difficulty
    pub fn profile(&self) -> DifficultyProfile {
        match self {
            Difficulty::Easy => DifficultyProfile {
                difficulty: *self,
                intro_s: 4.8,
                travel_ms: 2100.0,
                judge: JudgeWindows {
                    perfect: 95.0,
                    great: 165.0,
                    good: 240.0,
                },
                max_tier: 2,
                half_beat_grid_only: true,
                stream_offgrid_skip: 0.0,
                dense_skip: 0.0,
                extra_dense_skip: 0.0,
                flick_chance_onbeat: 0.0,
                flick_chance_offbeat: 0.0,
                flick_window_s: 0.5,
                chords: false,
                triple_chord_chance: 0.0,
                hold_extension_chance: 0.3,
                extra_hold_chance: 0.3,
                extra_flick_chance: 0.15,
                min_lane_gap_beats: 0.0,
            },
            Difficulty::Normal => DifficultyProfile {
                difficulty: *self,
                intro_s: 3.6,
                travel_ms: 1820.0,
                judge: JudgeWindows {
                    perfect: 72.0,
                    great: 122.0,
                    good: 185.0,
                },
                max_tier: 3,
                half_beat_grid_only: false,
                stream_offgrid_skip: 0.15,
                dense_skip: 0.55,
                extra_dense_skip: 0.0,
                flick_chance_onbeat: 0.01,
                flick_chance_offbeat: 0.06,
                flick_window_s: 0.5,
                chords: true,
                triple_chord_chance: 0.35,
                hold_extension_chance: 0.3,
                extra_hold_chance: 0.3,
                extra_flick_chance: 0.15,
                min_lane_gap_beats: 1.05,
            },
            Difficulty::Hard => DifficultyProfile {
                difficulty: *self,
                intro_s: 2.2,
                travel_ms: 1550.0,
                judge: JudgeWindows {
                    perfect: 55.0,
                    great: 95.0,
                    good: 145.0,
                },
                max_tier: 4,
                half_beat_grid_only: false,
                stream_offgrid_skip: 0.0,
                dense_skip: 0.35,
                extra_dense_skip: 0.55,
                flick_chance_onbeat: 0.05,
                flick_chance_offbeat: 0.15,
                flick_window_s: 0.4,
                chords: true,
                triple_chord_chance: 0.35,
                hold_extension_chance: 0.3,
                extra_hold_chance: 0.3,
                extra_flick_chance: 0.15,
                min_lane_gap_beats: 0.0,
            },
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            other => Err(EngineError::InvalidInput(format!(
                "Unknown difficulty: {}",
                other
            ))),
        }
    }
}

/// Generation and judging parameters selected by a [`Difficulty`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyProfile {
    /// Difficulty this bundle belongs to
    pub difficulty: Difficulty,

    /// Lead-in before the first playable note, in seconds
    pub intro_s: f64,

    /// Time a note takes to fall from spawn to the hit line, in milliseconds
    pub travel_ms: f64,

    /// Judgment tier widths
    pub judge: JudgeWindows,

    /// Highest bar intensity tier this difficulty may reach (0-4)
    pub max_tier: u8,

    /// Only keep motif slots aligned to the half-beat grid
    pub half_beat_grid_only: bool,

    /// Chance to drop off-grid slots of stream motifs
    pub stream_offgrid_skip: f32,

    /// Chance to drop off-downbeat slots of dense motifs
    pub dense_skip: f32,

    /// Chance to drop off-downbeat slots of extra-dense motifs
    pub extra_dense_skip: f32,

    /// Tap → flick conversion chance on whole beats
    pub flick_chance_onbeat: f32,

    /// Tap → flick conversion chance off the beat
    pub flick_chance_offbeat: f32,

    /// Time allowed between the two taps of a flick, in seconds
    pub flick_window_s: f64,

    /// Whether taps may be duplicated into chords at high intensity
    pub chords: bool,

    /// Chance a two-lane chord grows to all three lanes at tier 4
    pub triple_chord_chance: f32,

    /// Chance a hold is stretched by 1-4 beats at tier 2 and above
    pub hold_extension_chance: f32,

    /// Per-lane chance of an accompanying hold next to a placed hold
    pub extra_hold_chance: f32,

    /// Per-lane chance of an accompanying flick next to a placed flick
    pub extra_flick_chance: f32,

    /// Minimum same-lane spacing in beats (0 disables)
    pub min_lane_gap_beats: f64,
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Difficulty::Normal.profile()
    }
}
