//! Lane occupancy ledger
//!
//! Keeps same-lane notes far enough apart that their sprites never overlap
//! while falling. The gap is the time a note needs to travel its own
//! diameter; flicks need a little more, and a difficulty may impose a
//! minimum spacing in beats on top.

use super::note::{Note, LANE_COUNT};

/// Per-lane next-free cursor plus the hold intervals committed so far
#[derive(Debug, Clone)]
pub struct LaneLedger {
    next_free: [f64; LANE_COUNT],
    holds: [Vec<(f64, f64)>; LANE_COUNT],
    clearance: f64,
    flick_factor: f64,
    min_gap: f64,
}

/// Seconds a note needs to fall its own diameter
///
/// `note_diameter / max(1, travel_distance / travel_seconds)`
pub fn visual_clearance(note_diameter_px: f64, travel_distance_px: f64, travel_ms: f64) -> f64 {
    let travel_s = travel_ms / 1000.0;
    let speed = if travel_s > 0.0 {
        travel_distance_px / travel_s
    } else {
        travel_distance_px
    };
    note_diameter_px / speed.max(1.0)
}

impl LaneLedger {
    /// Empty ledger
    ///
    /// # Arguments
    ///
    /// * `clearance` - Base visual-clearance gap in seconds
    /// * `flick_factor` - Multiplier on the gap for flicks
    /// * `min_gap` - Lower bound on any gap in seconds (0 disables)
    pub fn new(clearance: f64, flick_factor: f64, min_gap: f64) -> Self {
        Self {
            next_free: [f64::NEG_INFINITY; LANE_COUNT],
            holds: Default::default(),
            clearance,
            flick_factor,
            min_gap,
        }
    }

    /// Gap the given note keeps from its lane neighbours
    pub fn gap_for(&self, note: &Note) -> f64 {
        let base = if note.is_flick() {
            self.clearance * self.flick_factor
        } else {
            self.clearance
        };
        base.max(self.min_gap)
    }

    /// True if a note at `time` with `gap` fits in `lane`
    pub fn is_free(&self, lane: usize, time: f64, gap: f64) -> bool {
        if lane >= LANE_COUNT || time < self.next_free[lane] {
            return false;
        }
        !self.holds[lane]
            .iter()
            .any(|&(start, end)| time > start - gap && time < end + gap)
    }

    /// Commit `note` if its lane is free; returns whether it was committed
    pub fn try_commit(&mut self, note: &Note) -> bool {
        let gap = self.gap_for(note);
        if !self.is_free(note.lane, note.time, gap) {
            return false;
        }

        let lane = note.lane;
        if note.is_hold() {
            let end = note.end_time();
            self.holds[lane].push((note.time, end));
            self.next_free[lane] = end + gap;
        } else {
            self.next_free[lane] = self.next_free[lane].max(note.time + gap);
        }
        true
    }
}
