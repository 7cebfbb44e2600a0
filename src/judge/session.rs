//! Per-run session state
//!
//! Created fresh for every run and owned by the judgment engine.

use super::judgment::Judgment;
use super::scoring::ComboTier;
use crate::chart::note::LANE_COUNT;
use serde::{Deserialize, Serialize};

/// Hit and miss tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentCounts {
    /// Perfect hits
    pub perfect: u32,
    /// Great hits
    pub great: u32,
    /// Good hits
    pub good: u32,
    /// Misses tied to a note part
    pub miss: u32,
    /// Presses that matched no note
    pub empty: u32,
}

impl JudgmentCounts {
    fn record(&mut self, judgment: Judgment) {
        match judgment {
            Judgment::Perfect => self.perfect += 1,
            Judgment::Great => self.great += 1,
            Judgment::Good => self.good += 1,
        }
    }

    /// All successful hits
    pub fn hits(&self) -> u32 {
        self.perfect + self.great + self.good
    }
}

/// Score, combo and input state of one run
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Signed score
    pub score: i64,
    /// Current streak
    pub combo: u32,
    /// Longest streak this run
    pub max_combo: u32,
    /// Perfect-run value of every part resolved so far
    pub denominator: f64,
    /// Lanes currently held down
    pub pressed: [bool; LANE_COUNT],
    /// Index of the hold being sustained in each lane
    pub active_holds: [Option<usize>; LANE_COUNT],
    /// Tallies
    pub counts: JudgmentCounts,
}

impl SessionState {
    /// Fresh state
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hit; returns the points awarded
    ///
    /// `award` maps the combo reached by this hit to points.
    pub fn register_hit(
        &mut self,
        judgment: Judgment,
        perfect_value: f64,
        award: impl FnOnce(u32) -> i64,
    ) -> i64 {
        self.combo += 1;
        let gain = award(self.combo);
        self.score += gain;
        self.denominator += perfect_value;
        self.max_combo = self.max_combo.max(self.combo);
        self.counts.record(judgment);
        gain
    }

    /// Register a miss worth `perfect_value` of lost potential
    pub fn register_miss(&mut self, penalty: i64, perfect_value: f64) {
        self.combo = 0;
        self.score -= penalty;
        self.denominator += perfect_value;
        self.counts.miss += 1;
    }

    /// Register a press that matched no note; the denominator is unchanged
    pub fn register_empty_press(&mut self, penalty: i64) {
        self.combo = 0;
        self.score -= penalty;
        self.counts.empty += 1;
    }

    /// Accuracy in percent of the potential resolved so far, floored at 0
    pub fn live_rate(&self) -> f64 {
        if self.denominator <= 0.0 {
            return 0.0;
        }
        (self.score as f64 / self.denominator * 100.0).max(0.0)
    }

    /// Display band of the current combo
    pub fn combo_tier(&self) -> ComboTier {
        ComboTier::from_combo(self.combo)
    }

    /// Forget pressed lanes and sustained holds
    pub fn release_all(&mut self) {
        self.pressed = [false; LANE_COUNT];
        self.active_holds = [None; LANE_COUNT];
    }
}
