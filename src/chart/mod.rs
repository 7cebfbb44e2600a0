//! Chart construction
//!
//! Walks the bar grid of the playable range and places tap, hold and flick
//! notes per lane:
//! - Motif library and tier pools ([`patterns`])
//! - Lane occupancy / visual-clearance ledger ([`occupancy`])
//! - Injectable randomness ([`random`])
//! - The placement loop itself ([`builder`])

pub mod builder;
pub mod note;
pub mod occupancy;
pub mod patterns;
pub mod random;

use crate::difficulty::{Difficulty, DifficultyProfile, JudgeWindows};
use crate::judge::scoring::PerfectScoreTable;
use crate::structure::Section;
use note::{Note, NoteKind};
use serde::{Deserialize, Serialize};

/// Descriptive chart metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartMeta {
    /// Track title
    pub title: String,
    /// Difficulty the chart was generated for
    pub difficulty: Difficulty,
    /// Tempo in beats per minute
    pub bpm: f64,
}

/// A playable chart: time-ordered notes plus the timing context they need
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    /// Metadata
    pub meta: ChartMeta,
    /// Fall-travel duration in milliseconds
    pub travel_ms: f64,
    /// Judgment tier widths
    pub judge_windows: JudgeWindows,
    /// Last playable time in seconds
    pub chart_end: f64,
    /// Seconds per beat
    pub beat_period: f64,
    /// First playable time in seconds
    #[serde(default)]
    pub intro: f64,
    /// Time of beat 0
    #[serde(default)]
    pub downbeat_phase: f64,
    /// Sections the chart was generated from (empty for loaded charts)
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Notes ordered by time, ids ascending
    pub notes: Vec<Note>,
}

/// Per-type counts and totals for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartSummary {
    /// Tap notes
    pub taps: usize,
    /// Hold notes
    pub holds: usize,
    /// Flick notes
    pub flicks: usize,
    /// All notes
    pub total: usize,
    /// Tempo in beats per minute
    pub bpm: f64,
    /// Playable length in seconds
    pub playable_seconds: f64,
    /// Score of a full perfect run
    pub perfect_score: f64,
}

impl Chart {
    /// Chart with the timing context of `profile`
    ///
    /// Notes are sorted by time and ids reassigned in that order.
    pub fn new(
        title: impl Into<String>,
        profile: &DifficultyProfile,
        beat_period: f64,
        chart_end: f64,
        notes: Vec<Note>,
    ) -> Self {
        let bpm = if beat_period > 0.0 { 60.0 / beat_period } else { 0.0 };
        let mut chart = Self {
            meta: ChartMeta {
                title: title.into(),
                difficulty: profile.difficulty,
                bpm,
            },
            travel_ms: profile.travel_ms,
            judge_windows: profile.judge,
            chart_end,
            beat_period,
            intro: profile.intro_s,
            downbeat_phase: profile.intro_s,
            sections: Vec::new(),
            notes,
        };
        chart.normalize_notes();
        chart
    }

    /// Sort notes by time (then lane) and number them from 0
    pub fn normalize_notes(&mut self) {
        self.notes
            .sort_by(|a, b| a.time.total_cmp(&b.time).then(a.lane.cmp(&b.lane)));
        for (i, note) in self.notes.iter_mut().enumerate() {
            note.id = i as u32;
        }
    }

    /// A run can only start on a chart with notes
    pub fn is_playable(&self) -> bool {
        !self.notes.is_empty()
    }

    /// Clear every note's gameplay flags
    pub fn reset_progress(&mut self) {
        self.notes.iter_mut().for_each(Note::reset);
    }

    /// Notes in `lane`, in time order
    pub fn lane_notes(&self, lane: usize) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(move |n| n.lane == lane)
    }

    /// Counts per type, tempo and perfect-run score
    pub fn summary(&self) -> ChartSummary {
        let mut summary = ChartSummary {
            taps: 0,
            holds: 0,
            flicks: 0,
            total: self.notes.len(),
            bpm: self.meta.bpm,
            playable_seconds: (self.chart_end - self.intro).max(0.0),
            perfect_score: PerfectScoreTable::build(&self.notes, self.beat_period).total(),
        };
        for note in &self.notes {
            match note.kind {
                NoteKind::Tap => summary.taps += 1,
                NoteKind::Hold { .. } => summary.holds += 1,
                NoteKind::Flick { .. } => summary.flicks += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sorts_and_numbers() {
        let profile = Difficulty::Normal.profile();
        let chart = Chart::new(
            "t",
            &profile,
            0.5,
            20.0,
            vec![
                Note::tap(7, 2, 5.0),
                Note::hold(3, 0, 4.0, 5.0),
                Note::flick(9, 1, 4.0, 0.5),
            ],
        );
        let ids: Vec<u32> = chart.notes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(chart.notes[0].lane, 0);
        assert_eq!(chart.notes[1].lane, 1);
        assert_eq!(chart.meta.bpm, 120.0);
        assert_eq!(chart.travel_ms, 1820.0);
    }

    #[test]
    fn test_summary_counts() {
        let profile = Difficulty::Easy.profile();
        let chart = Chart::new(
            "t",
            &profile,
            0.5,
            20.0,
            vec![
                Note::tap(0, 0, 5.0),
                Note::tap(0, 1, 6.0),
                Note::hold(0, 2, 5.0, 6.0),
                Note::flick(0, 0, 7.0, 0.5),
            ],
        );
        let s = chart.summary();
        assert_eq!((s.taps, s.holds, s.flicks, s.total), (2, 1, 1, 4));
        // 1000 + 1000 + head 1000 + tail 3000 + flick 2000
        assert_eq!(s.perfect_score, 8000.0);
        assert!((s.playable_seconds - (20.0 - 4.8)).abs() < 1e-9);
    }

    #[test]
    fn test_empty_chart_not_playable() {
        let chart = Chart::new("t", &DifficultyProfile::default(), 0.5, 20.0, Vec::new());
        assert!(!chart.is_playable());
        assert_eq!(chart.summary().perfect_score, 0.0);
    }
}
