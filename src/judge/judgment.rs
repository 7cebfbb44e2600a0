//! Judgment tiers
//!
//! An input offset is classified by its absolute value against the
//! difficulty's perfect/great/good widths. Anything wider is a miss, which
//! is represented by `None` rather than a tier.

use crate::difficulty::JudgeWindows;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accuracy tier of a successful hit
///
/// Ordered from most to least precise, so the worse of two tiers is the
/// larger one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    /// Within the perfect window
    Perfect,
    /// Within the great window
    Great,
    /// Within the good window
    Good,
}

impl Judgment {
    /// Classify an offset in milliseconds; `None` means miss
    pub fn classify(offset_ms: f64, windows: &JudgeWindows) -> Option<Judgment> {
        let abs = offset_ms.abs();
        if abs <= windows.perfect {
            Some(Judgment::Perfect)
        } else if abs <= windows.great {
            Some(Judgment::Great)
        } else if abs <= windows.good {
            Some(Judgment::Good)
        } else {
            None
        }
    }

    /// Classify the second press of a flick
    ///
    /// Every width is widened by the perfect width, and `offset_ms` is
    /// measured from the ideal second-press time (`note.time + 2 * perfect`).
    pub fn classify_second_tap(offset_ms: f64, windows: &JudgeWindows) -> Option<Judgment> {
        let widened = JudgeWindows {
            perfect: windows.perfect * 2.0,
            great: windows.great + windows.perfect,
            good: windows.good + windows.perfect,
        };
        Self::classify(offset_ms, &widened)
    }

    /// Score weight (perfect 1.0, great 0.7, good 0.35)
    pub fn weight(self) -> f64 {
        match self {
            Judgment::Perfect => 1.0,
            Judgment::Great => 0.7,
            Judgment::Good => 0.35,
        }
    }

    /// The less precise of two tiers
    pub fn worse(self, other: Judgment) -> Judgment {
        self.max(other)
    }

    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Judgment::Perfect => "perfect",
            Judgment::Great => "great",
            Judgment::Good => "good",
        }
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
