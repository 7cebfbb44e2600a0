//! Score model
//!
//! Points for a hit are `base(note, part) * tier weight * combo multiplier`,
//! rounded. The achievable-score denominator is the sum of what a run with
//! every part judged perfect would earn, part by part in time order.

use super::judgment::Judgment;
use crate::chart::note::{Note, NoteKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Base value of a tap or hold head
pub const UNIT_VALUE: f64 = 1000.0;

/// Base value of a flick
pub const FLICK_VALUE: f64 = 2000.0;

/// Judgeable part of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotePart {
    /// A tap or a flick
    Single,
    /// Press of a hold
    HoldHead,
    /// Release of a hold
    HoldTail,
}

impl fmt::Display for NotePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotePart::Single => "single",
            NotePart::HoldHead => "head",
            NotePart::HoldTail => "tail",
        };
        f.write_str(name)
    }
}

/// Parts a note is judged in
pub fn parts_of(note: &Note) -> &'static [NotePart] {
    match note.kind {
        NoteKind::Hold { .. } => &[NotePart::HoldHead, NotePart::HoldTail],
        _ => &[NotePart::Single],
    }
}

/// Unweighted value of one part of `note`
///
/// A hold tail earns one unit plus one unit per beat of hold length.
pub fn base_value(note: &Note, part: NotePart, beat_period: f64) -> f64 {
    match (&note.kind, part) {
        (NoteKind::Flick { .. }, _) => FLICK_VALUE,
        (NoteKind::Hold { end_time, .. }, NotePart::HoldTail) => {
            let beats = ((end_time - note.time) / beat_period.max(0.01)).max(0.0);
            UNIT_VALUE + UNIT_VALUE * beats
        }
        _ => UNIT_VALUE,
    }
}

/// Combo bonus multiplier for the combo reached by a hit
pub fn combo_multiplier(combo: u32) -> f64 {
    match combo {
        0..=10 => 1.0,
        11..=49 => 1.01,
        50..=99 => 1.02,
        100..=199 => 1.05,
        _ => 1.1,
    }
}

/// Points awarded for a hit
pub fn award(base: f64, judgment: Judgment, combo: u32) -> i64 {
    (base * judgment.weight() * combo_multiplier(combo)).round() as i64
}

/// Display band of the current combo
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComboTier {
    /// Below 11
    Base,
    /// 11 and up
    Surge,
    /// 50 and up
    Deep,
    /// 100 and up
    Abyss,
    /// 200 and up
    Rift,
}

impl ComboTier {
    /// Band for `combo`
    pub fn from_combo(combo: u32) -> Self {
        match combo {
            0..=10 => ComboTier::Base,
            11..=49 => ComboTier::Surge,
            50..=99 => ComboTier::Deep,
            100..=199 => ComboTier::Abyss,
            _ => ComboTier::Rift,
        }
    }
}

/// Perfect-run value of every note part
#[derive(Debug, Clone, Default)]
pub struct PerfectScoreTable {
    values: HashMap<(u32, NotePart), f64>,
    total: f64,
}

impl PerfectScoreTable {
    /// Simulate a perfect run over `notes`
    ///
    /// Parts are ordered by their own time (a hold tail by its end time),
    /// ties broken by note id and then head before tail; the combo runs
    /// from 1 across that order.
    pub fn build(notes: &[Note], beat_period: f64) -> Self {
        let mut events: Vec<(f64, u32, NotePart, f64)> = Vec::with_capacity(notes.len() * 2);
        for note in notes {
            for &part in parts_of(note) {
                let time = match part {
                    NotePart::HoldTail => note.end_time(),
                    _ => note.time,
                };
                events.push((time, note.id, part, base_value(note, part, beat_period)));
            }
        }
        events.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut values = HashMap::with_capacity(events.len());
        let mut total = 0.0;
        for (i, &(_, id, part, base)) in events.iter().enumerate() {
            let combo = (i + 1) as u32;
            let value = award(base, Judgment::Perfect, combo) as f64;
            values.insert((id, part), value);
            total += value;
        }

        Self { values, total }
    }

    /// Perfect-run value of one part (0 for unknown parts)
    pub fn value(&self, id: u32, part: NotePart) -> f64 {
        self.values.get(&(id, part)).copied().unwrap_or(0.0)
    }

    /// Sum over all parts
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Number of judgeable parts
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the chart has no notes
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
