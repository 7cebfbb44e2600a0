//! Note model
//!
//! A note is a tap, a hold with an end time, or a flick that needs two taps.
//! The gameplay flags (`judged`, `missed`, hold `started`, flick sub-state)
//! are transient: they are reset whenever a chart is loaded or a run starts.

use crate::judge::judgment::Judgment;
use serde::{Deserialize, Serialize};

/// Number of lanes
pub const LANE_COUNT: usize = 3;

fn default_taps_needed() -> u8 {
    2
}

fn default_flick_window() -> f64 {
    0.5
}

/// Type-specific part of a note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NoteKind {
    /// Single press
    Tap,

    /// Press at `time`, release at `end_time`
    #[serde(rename_all = "camelCase")]
    Hold {
        /// Release target in seconds
        end_time: f64,
        /// Head judged, tail pending
        #[serde(default)]
        started: bool,
    },

    /// Two presses within `flick_window`
    #[serde(rename_all = "camelCase")]
    Flick {
        /// Presses required (always 2)
        #[serde(default = "default_taps_needed")]
        taps_needed: u8,
        /// Presses registered so far
        #[serde(default)]
        taps_done: u8,
        /// Time of the first press
        #[serde(default)]
        first_tap_at: Option<f64>,
        /// Provisional judgment of the first press
        #[serde(skip)]
        first_judgment: Option<Judgment>,
        /// Maximum time between the two presses, in seconds
        #[serde(default = "default_flick_window")]
        flick_window: f64,
    },
}

/// One chart note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique id, ascending in time order
    #[serde(default)]
    pub id: u32,
    /// Lane, `0..LANE_COUNT`
    pub lane: usize,
    /// Hit target in seconds
    pub time: f64,
    /// Type and type-specific state
    #[serde(flatten)]
    pub kind: NoteKind,
    /// Terminal flag
    #[serde(default)]
    pub judged: bool,
    /// Set together with `judged` when the note was missed
    #[serde(default)]
    pub missed: bool,
}

impl Note {
    /// New tap note
    pub fn tap(id: u32, lane: usize, time: f64) -> Self {
        Self::with_kind(id, lane, time, NoteKind::Tap)
    }

    /// New hold note ending at `end_time`
    pub fn hold(id: u32, lane: usize, time: f64, end_time: f64) -> Self {
        Self::with_kind(
            id,
            lane,
            time,
            NoteKind::Hold {
                end_time,
                started: false,
            },
        )
    }

    /// New flick note with the given two-tap window
    pub fn flick(id: u32, lane: usize, time: f64, flick_window: f64) -> Self {
        Self::with_kind(
            id,
            lane,
            time,
            NoteKind::Flick {
                taps_needed: 2,
                taps_done: 0,
                first_tap_at: None,
                first_judgment: None,
                flick_window,
            },
        )
    }

    fn with_kind(id: u32, lane: usize, time: f64, kind: NoteKind) -> Self {
        Self {
            id,
            lane,
            time,
            kind,
            judged: false,
            missed: false,
        }
    }

    /// Release time for holds, `time` otherwise
    pub fn end_time(&self) -> f64 {
        match self.kind {
            NoteKind::Hold { end_time, .. } => end_time,
            _ => self.time,
        }
    }

    /// True for hold notes
    pub fn is_hold(&self) -> bool {
        matches!(self.kind, NoteKind::Hold { .. })
    }

    /// True for flick notes
    pub fn is_flick(&self) -> bool {
        matches!(self.kind, NoteKind::Flick { .. })
    }

    /// True for a hold whose head has been judged
    pub fn is_started(&self) -> bool {
        matches!(self.kind, NoteKind::Hold { started: true, .. })
    }

    /// True for a flick waiting for its second press
    pub fn awaits_second_tap(&self) -> bool {
        matches!(
            self.kind,
            NoteKind::Flick {
                first_tap_at: Some(_),
                ..
            }
        )
    }

    /// Lowercase type name (`tap`, `hold`, `flick`)
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            NoteKind::Tap => "tap",
            NoteKind::Hold { .. } => "hold",
            NoteKind::Flick { .. } => "flick",
        }
    }

    /// Clear all gameplay state
    pub fn reset(&mut self) {
        self.judged = false;
        self.missed = false;
        match &mut self.kind {
            NoteKind::Tap => {}
            NoteKind::Hold { started, .. } => *started = false,
            NoteKind::Flick {
                taps_needed,
                taps_done,
                first_tap_at,
                first_judgment,
                ..
            } => {
                *taps_needed = 2;
                *taps_done = 0;
                *first_tap_at = None;
                *first_judgment = None;
            }
        }
    }
}
