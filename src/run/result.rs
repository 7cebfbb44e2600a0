//! Run results and ranks

use crate::judge::session::{JudgmentCounts, SessionState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final grade of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    /// Rate ≥ 95%
    S,
    /// Rate ≥ 88%
    A,
    /// Rate ≥ 75%
    B,
    /// Rate ≥ 60%
    C,
    /// Anything lower
    D,
    /// The final score is below zero
    Negative,
}

impl Rank {
    /// Grade a final score and rate
    pub fn grade(score: i64, rate: f64) -> Self {
        if score < 0 {
            Rank::Negative
        } else if rate >= 95.0 {
            Rank::S
        } else if rate >= 88.0 {
            Rank::A
        } else if rate >= 75.0 {
            Rank::B
        } else if rate >= 60.0 {
            Rank::C
        } else {
            Rank::D
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rank::S => "S",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
            Rank::D => "D",
            Rank::Negative => "Negative",
        };
        f.write_str(name)
    }
}

/// Summary of a finished or stopped run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Final score
    pub score: i64,
    /// Longest combo
    pub max_combo: u32,
    /// `max(0, score / denominator * 100)`, 0 when nothing was resolved
    pub rate: f64,
    /// Grade
    pub rank: Rank,
    /// Tallies
    pub counts: JudgmentCounts,
    /// Perfect-run value of the parts resolved during the run
    pub denominator: f64,
    /// Perfect-run value of the whole chart
    pub perfect_total: f64,
    /// False when the run was stopped before the chart ended
    pub completed: bool,
}

impl RunResult {
    /// Result for the given session state
    pub fn from_session(session: &SessionState, perfect_total: f64, completed: bool) -> Self {
        let rate = session.live_rate();
        Self {
            score: session.score,
            max_combo: session.max_combo,
            rate,
            rank: Rank::grade(session.score, rate),
            counts: session.counts,
            denominator: session.denominator,
            perfect_total,
            completed,
        }
    }
}
