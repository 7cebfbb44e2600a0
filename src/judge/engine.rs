//! Real-time judgment engine
//!
//! Event driven: presses, releases and clock ticks each resolve atomically
//! against the note list and the session state. All times are positions on
//! the playback clock in seconds.
//!
//! Note states:
//! - pending → judged (terminal)
//! - holds: head judged sets `started`, the release (or a timeout) judges the tail
//! - flicks: the first press records a provisional tier, the second resolves
//!   the note with the worse of the two tiers

use super::judgment::Judgment;
use super::scoring::{award, base_value, NotePart, PerfectScoreTable};
use super::session::SessionState;
use crate::chart::note::{Note, NoteKind, LANE_COUNT};
use crate::chart::Chart;
use crate::config::TimingConfig;
use crate::difficulty::JudgeWindows;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// How an input or timeout resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// A note part was hit
    Hit(Judgment),
    /// First press of a flick registered; the note is still pending
    FlickPrimed(Judgment),
    /// A note part was missed
    Miss,
    /// A press matched no note
    EmptyPress,
}

/// One resolved input or timeout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeEvent {
    /// Lane the event happened in
    pub lane: usize,
    /// Note concerned, if any
    pub note_id: Option<u32>,
    /// Part concerned, if any
    pub part: Option<NotePart>,
    /// Resolution
    pub outcome: Outcome,
    /// Signed input offset in milliseconds, for input-driven events
    pub offset_ms: Option<f64>,
    /// Score change
    pub gain: i64,
    /// Combo after the event
    pub combo: u32,
}

/// Result of one clock tick
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Timeouts resolved by this tick
    pub events: Vec<JudgeEvent>,
    /// The run is over
    pub finished: bool,
}

/// Judges one run of one chart
#[derive(Debug, Clone)]
pub struct JudgmentEngine {
    notes: Vec<Note>,
    windows: JudgeWindows,
    beat_period: f64,
    chart_end: f64,
    timing: TimingConfig,
    table: PerfectScoreTable,
    session: SessionState,
    finished: bool,
}

impl JudgmentEngine {
    /// Fresh engine over a reset copy of the chart's notes
    pub fn new(chart: &Chart, timing: TimingConfig) -> Self {
        let mut notes = chart.notes.clone();
        notes.iter_mut().for_each(Note::reset);
        notes.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.id.cmp(&b.id)));
        let table = PerfectScoreTable::build(&notes, chart.beat_period);

        Self {
            notes,
            windows: chart.judge_windows,
            beat_period: chart.beat_period,
            chart_end: chart.chart_end,
            timing,
            table,
            session: SessionState::new(),
            finished: false,
        }
    }

    /// Notes with their current gameplay flags
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Session counters
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Achievable score of the whole chart
    pub fn perfect_total(&self) -> f64 {
        self.table.total()
    }

    /// True once the run ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn check_lane(&self, lane: usize) -> Result<(), EngineError> {
        if self.finished {
            return Err(EngineError::InvalidState("Run already finished".to_string()));
        }
        if lane >= LANE_COUNT {
            return Err(EngineError::InvalidInput(format!(
                "Lane {} out of range (0..{})",
                lane, LANE_COUNT
            )));
        }
        Ok(())
    }

    /// Key down in `lane`
    ///
    /// A press on a lane that is already down (key repeat) is ignored and
    /// returns `None`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a lane out of range, `InvalidState` after the run ended
    pub fn on_press(&mut self, lane: usize, now: f64) -> Result<Option<JudgeEvent>, EngineError> {
        self.check_lane(lane)?;
        if self.session.pressed[lane] {
            return Ok(None);
        }
        self.session.pressed[lane] = true;
        self.on_tap(lane, now).map(Some)
    }

    /// Key up in `lane`
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a lane out of range, `InvalidState` after the run ended
    pub fn on_release(&mut self, lane: usize, now: f64) -> Result<Option<JudgeEvent>, EngineError> {
        self.check_lane(lane)?;
        self.session.pressed[lane] = false;

        let idx = match self.session.active_holds[lane].take() {
            Some(idx) if !self.notes[idx].judged => idx,
            _ => return Ok(None),
        };

        let offset_ms = (now - self.notes[idx].end_time()) * 1000.0;
        self.notes[idx].judged = true;
        let event = match Judgment::classify(offset_ms, &self.windows) {
            Some(j) => self.hit(idx, NotePart::HoldTail, j, offset_ms),
            None => {
                self.notes[idx].missed = true;
                self.miss(idx, &[NotePart::HoldTail], Some(offset_ms))
            }
        };
        Ok(Some(event))
    }

    /// Judge a press in `lane` at `now`
    ///
    /// Does not track key state; [`on_press`](Self::on_press) is the
    /// key-down entry point.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a lane out of range, `InvalidState` after the run ended
    pub fn on_tap(&mut self, lane: usize, now: f64) -> Result<JudgeEvent, EngineError> {
        self.check_lane(lane)?;

        if let Some(idx) = self.awaiting_flick(lane) {
            return Ok(self.resolve_flick(idx, now));
        }

        let idx = match self.pending_note(lane, now) {
            Some(idx) => idx,
            None => {
                self.session.register_empty_press(self.timing.miss_penalty);
                log::debug!("Empty press in lane {} at {:.3}s", lane, now);
                return Ok(JudgeEvent {
                    lane,
                    note_id: None,
                    part: None,
                    outcome: Outcome::EmptyPress,
                    offset_ms: None,
                    gain: -self.timing.miss_penalty,
                    combo: self.session.combo,
                });
            }
        };

        let offset_ms = (now - self.notes[idx].time) * 1000.0;
        let judgment = match Judgment::classify(offset_ms, &self.windows) {
            Some(j) => j,
            // In the pending radius but outside every window: the note stays pending
            None => return Ok(self.miss(idx, &[], Some(offset_ms))),
        };

        let event = match self.notes[idx].kind {
            NoteKind::Tap => {
                self.notes[idx].judged = true;
                self.hit(idx, NotePart::Single, judgment, offset_ms)
            }
            NoteKind::Hold { .. } => {
                if let NoteKind::Hold { started, .. } = &mut self.notes[idx].kind {
                    *started = true;
                }
                self.session.active_holds[lane] = Some(idx);
                self.hit(idx, NotePart::HoldHead, judgment, offset_ms)
            }
            NoteKind::Flick { .. } => self.prime_flick(idx, now, judgment, offset_ms),
        };
        Ok(event)
    }

    /// Advance the clock to `now`: resolve timeouts and detect the end of the run
    pub fn tick(&mut self, now: f64) -> TickOutcome {
        if self.finished {
            return TickOutcome {
                events: Vec::new(),
                finished: true,
            };
        }

        let late = self.timing.late_s;
        let flick_timeout = (4.0 * self.windows.perfect + self.windows.good) / 1000.0
            + self.timing.flick_timeout_slack_s;

        let mut events = Vec::new();
        for idx in 0..self.notes.len() {
            let note = &mut self.notes[idx];
            if note.time > now {
                break;
            }
            if note.judged {
                continue;
            }

            let parts: &[NotePart] = match note.kind {
                NoteKind::Tap if now > note.time + late => &[NotePart::Single],
                NoteKind::Flick { .. } if now > note.time + flick_timeout => &[NotePart::Single],
                NoteKind::Hold { started: false, .. } if now > note.time + late => {
                    &[NotePart::HoldHead, NotePart::HoldTail]
                }
                NoteKind::Hold {
                    started: true,
                    end_time,
                } if now > end_time + self.timing.hold_tail_late_s => {
                    if self.session.active_holds[note.lane] == Some(idx) {
                        self.session.active_holds[note.lane] = None;
                    }
                    &[NotePart::HoldTail]
                }
                _ => continue,
            };

            note.judged = true;
            note.missed = true;
            events.push(self.miss(idx, parts, None));
        }

        if now > self.chart_end + self.timing.trailing_grace_s {
            events.extend(self.finish());
        }

        TickOutcome {
            events,
            finished: self.finished,
        }
    }

    /// End the run: every started, unresolved hold is missed
    ///
    /// Idempotent; returns the tail misses it registered.
    pub fn finish(&mut self) -> Vec<JudgeEvent> {
        if self.finished {
            return Vec::new();
        }
        let mut events = Vec::new();
        for idx in 0..self.notes.len() {
            let note = &mut self.notes[idx];
            if note.judged || !note.is_started() {
                continue;
            }
            note.judged = true;
            note.missed = true;
            events.push(self.miss(idx, &[NotePart::HoldTail], None));
        }
        self.session.release_all();
        self.finished = true;
        events
    }

    fn awaiting_flick(&self, lane: usize) -> Option<usize> {
        self.notes
            .iter()
            .position(|n| n.lane == lane && !n.judged && n.awaits_second_tap())
    }

    fn pending_note(&self, lane: usize, now: f64) -> Option<usize> {
        let radius = self.timing.pending_radius_s;
        self.notes
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                n.lane == lane
                    && !n.judged
                    && !n.is_started()
                    && !n.awaits_second_tap()
                    && (now - n.time).abs() <= radius
            })
            .min_by(|(_, a), (_, b)| (now - a.time).abs().total_cmp(&(now - b.time).abs()))
            .map(|(i, _)| i)
    }

    fn prime_flick(&mut self, idx: usize, now: f64, judgment: Judgment, offset_ms: f64) -> JudgeEvent {
        let note = &mut self.notes[idx];
        if let NoteKind::Flick {
            taps_done,
            first_tap_at,
            first_judgment,
            ..
        } = &mut note.kind
        {
            *taps_done = 1;
            *first_tap_at = Some(now);
            *first_judgment = Some(judgment);
        }
        log::debug!("Flick {} primed {} ({:+.1}ms)", note.id, judgment, offset_ms);

        JudgeEvent {
            lane: note.lane,
            note_id: Some(note.id),
            part: Some(NotePart::Single),
            outcome: Outcome::FlickPrimed(judgment),
            offset_ms: Some(offset_ms),
            gain: 0,
            combo: self.session.combo,
        }
    }

    fn resolve_flick(&mut self, idx: usize, now: f64) -> JudgeEvent {
        let perfect_s = self.windows.perfect / 1000.0;
        let note = &mut self.notes[idx];
        let ideal = note.time + 2.0 * perfect_s;
        let offset_ms = (now - ideal) * 1000.0;

        let (first_at, first, window) = match &mut note.kind {
            NoteKind::Flick {
                taps_done,
                first_tap_at,
                first_judgment,
                flick_window,
                ..
            } => {
                *taps_done = 2;
                (*first_tap_at, *first_judgment, *flick_window)
            }
            _ => (None, None, 0.0),
        };
        note.judged = true;

        let expired = first_at.map_or(true, |t| now - t > window);
        let second = if expired {
            None
        } else {
            Judgment::classify_second_tap(offset_ms, &self.windows)
        };

        match second {
            Some(j2) => {
                let judgment = first.map_or(j2, |j1| j1.worse(j2));
                self.hit(idx, NotePart::Single, judgment, offset_ms)
            }
            None => {
                self.notes[idx].missed = true;
                self.miss(idx, &[NotePart::Single], Some(offset_ms))
            }
        }
    }

    fn hit(&mut self, idx: usize, part: NotePart, judgment: Judgment, offset_ms: f64) -> JudgeEvent {
        let note = &self.notes[idx];
        let base = base_value(note, part, self.beat_period);
        let perfect = self.table.value(note.id, part);
        let gain = self
            .session
            .register_hit(judgment, perfect, |combo| award(base, judgment, combo));

        log::debug!(
            "{} {} note {} lane {} ({:+.1}ms) +{} combo {}",
            judgment,
            part,
            note.id,
            note.lane,
            offset_ms,
            gain,
            self.session.combo
        );

        JudgeEvent {
            lane: note.lane,
            note_id: Some(note.id),
            part: Some(part),
            outcome: Outcome::Hit(judgment),
            offset_ms: Some(offset_ms),
            gain,
            combo: self.session.combo,
        }
    }

    fn miss(&mut self, idx: usize, parts: &[NotePart], offset_ms: Option<f64>) -> JudgeEvent {
        let note = &self.notes[idx];
        let lost: f64 = parts.iter().map(|&p| self.table.value(note.id, p)).sum();
        self.session.register_miss(self.timing.miss_penalty, lost);

        log::debug!("Miss note {} lane {} ({} parts)", note.id, note.lane, parts.len());

        JudgeEvent {
            lane: note.lane,
            note_id: Some(note.id),
            part: parts.first().copied(),
            outcome: Outcome::Miss,
            offset_ms,
            gain: -self.timing.miss_penalty,
            combo: self.session.combo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::Difficulty;

    fn engine(notes: Vec<Note>) -> JudgmentEngine {
        let profile = Difficulty::Normal.profile();
        let chart = Chart::new("test", &profile, 0.5, 20.0, notes);
        JudgmentEngine::new(&chart, TimingConfig::default())
    }

    #[test]
    fn test_hold_head_and_tail() {
        let mut e = engine(vec![Note::hold(0, 0, 3.6, 4.6)]);

        let head = e.on_press(0, 3.62).unwrap().unwrap();
        assert_eq!(head.outcome, Outcome::Hit(Judgment::Perfect));
        assert_eq!(head.part, Some(NotePart::HoldHead));
        assert_eq!(head.gain, 1000);
        assert!(e.notes()[0].is_started());
        assert!(!e.notes()[0].judged);

        let tail = e.on_release(0, 4.70).unwrap().unwrap();
        assert_eq!(tail.outcome, Outcome::Hit(Judgment::Great));
        assert_eq!(tail.part, Some(NotePart::HoldTail));
        // (1000 + 1000 * 2 beats) * 0.7
        assert_eq!(tail.gain, 2100);
        assert_eq!(e.session().combo, 2);
        assert!(e.notes()[0].judged);
        assert_eq!(e.session().denominator, e.perfect_total());
    }

    #[test]
    fn test_release_close_to_end_is_perfect() {
        let mut e = engine(vec![Note::hold(0, 0, 3.6, 4.6)]);
        e.on_tap(0, 3.62).unwrap();
        let tail = e.on_release(0, 4.65).unwrap().unwrap();
        assert_eq!(tail.outcome, Outcome::Hit(Judgment::Perfect));
    }

    #[test]
    fn test_early_release_misses_tail() {
        let mut e = engine(vec![Note::hold(0, 1, 3.6, 4.6)]);
        e.on_tap(1, 3.6).unwrap();
        let tail = e.on_release(1, 4.0).unwrap().unwrap();
        assert_eq!(tail.outcome, Outcome::Miss);
        assert_eq!(e.session().combo, 0);
        assert!(e.notes()[0].missed);
        assert_eq!(e.on_release(1, 4.6).unwrap(), None);
    }

    #[test]
    fn test_empty_press_keeps_denominator() {
        let mut e = engine(vec![Note::tap(0, 0, 5.0)]);
        let ev = e.on_tap(0, 2.0).unwrap();
        assert_eq!(ev.outcome, Outcome::EmptyPress);
        assert_eq!(ev.gain, -400);
        assert_eq!(e.session().denominator, 0.0);
        assert_eq!(e.session().score, -400);
    }

    #[test]
    fn test_out_of_window_leaves_note_pending() {
        let mut e = engine(vec![Note::tap(0, 2, 5.0)]);
        let ev = e.on_tap(2, 5.2).unwrap();
        assert_eq!(ev.outcome, Outcome::Miss);
        assert!(!e.notes()[0].judged);
        assert_eq!(e.session().denominator, 0.0);

        let ev = e.on_tap(2, 5.01).unwrap();
        assert_eq!(ev.outcome, Outcome::Hit(Judgment::Perfect));
        assert_eq!(e.session().combo, 1);
    }

    #[test]
    fn test_double_tap_does_not_double_count() {
        let mut e = engine(vec![Note::tap(0, 0, 5.0)]);
        e.on_tap(0, 5.0).unwrap();
        let score = e.session().score;
        let ev = e.on_tap(0, 5.0).unwrap();
        assert_eq!(ev.outcome, Outcome::EmptyPress);
        assert_eq!(e.session().counts.hits(), 1);
        assert_eq!(e.session().combo, 0);
        assert_eq!(e.session().score, score - 400);
        assert_eq!(e.session().denominator, 1000.0);
    }

    #[test]
    fn test_key_repeat_ignored() {
        let mut e = engine(vec![Note::tap(0, 0, 5.0)]);
        assert!(e.on_press(0, 5.0).unwrap().is_some());
        assert!(e.on_press(0, 5.01).unwrap().is_none());
        assert_eq!(e.session().counts.empty, 0);
        e.on_release(0, 5.1).unwrap();
        assert!(e.on_press(0, 5.2).unwrap().is_some());
    }

    #[test]
    fn test_nearest_note_wins() {
        let mut e = engine(vec![Note::tap(0, 0, 5.0), Note::tap(0, 0, 5.3)]);
        let ev = e.on_tap(0, 5.2).unwrap();
        assert_eq!(ev.note_id, Some(1));
        assert_eq!(ev.outcome, Outcome::Hit(Judgment::Great));
    }

    #[test]
    fn test_flick_takes_worse_tier() {
        let mut e = engine(vec![Note::flick(0, 1, 5.0, 0.5)]);
        let first = e.on_tap(1, 5.1).unwrap();
        assert_eq!(first.outcome, Outcome::FlickPrimed(Judgment::Great));
        assert_eq!(e.session().combo, 0);
        assert!(!e.notes()[0].judged);

        // ideal second press at 5.0 + 0.144
        let second = e.on_tap(1, 5.15).unwrap();
        assert_eq!(second.outcome, Outcome::Hit(Judgment::Great));
        assert_eq!(second.gain, 1400);
        assert!(e.notes()[0].judged);
        assert_eq!(e.session().combo, 1);
    }

    #[test]
    fn test_flick_second_tap_too_late() {
        let mut e = engine(vec![Note::flick(0, 1, 5.0, 0.5)]);
        e.on_tap(1, 5.0).unwrap();
        let second = e.on_tap(1, 5.6).unwrap();
        assert_eq!(second.outcome, Outcome::Miss);
        assert!(e.notes()[0].missed);
        assert_eq!(e.session().denominator, 2000.0);
    }

    #[test]
    fn test_tick_misses_late_notes() {
        let mut e = engine(vec![
            Note::tap(0, 0, 5.0),
            Note::hold(0, 1, 5.0, 6.0),
            Note::flick(0, 2, 5.0, 0.5),
        ]);
        e.on_tap(0, 5.0).unwrap();
        assert!(e.tick(5.2).events.is_empty());

        let out = e.tick(5.3);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].lane, 1);
        assert_eq!(e.session().combo, 0);

        // flick timeout: (4 * 72 + 185) ms + 50 ms
        assert!(e.tick(5.5).events.is_empty());
        let out = e.tick(5.53);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].lane, 2);
        assert_eq!(e.session().denominator, e.perfect_total());
    }

    #[test]
    fn test_tick_times_out_started_hold() {
        let mut e = engine(vec![Note::hold(0, 0, 5.0, 6.0)]);
        e.on_press(0, 5.0).unwrap();
        assert!(e.tick(6.2).events.is_empty());
        let out = e.tick(6.25);
        assert_eq!(out.events[0].part, Some(NotePart::HoldTail));
        assert_eq!(e.session().active_holds[0], None);
    }

    #[test]
    fn test_run_finishes_after_grace() {
        let mut e = engine(vec![Note::tap(0, 0, 19.0)]);
        e.on_tap(0, 19.0).unwrap();
        assert!(!e.tick(20.9).finished);
        assert!(e.tick(21.05).finished);
        assert!(e.is_finished());
        assert!(matches!(e.on_tap(0, 21.1), Err(EngineError::InvalidState(_))));
    }

    #[test]
    fn test_finish_flushes_started_holds() {
        let mut e = engine(vec![Note::hold(0, 0, 5.0, 8.0), Note::tap(0, 1, 9.0)]);
        e.on_press(0, 5.0).unwrap();
        let flushed = e.finish();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].part, Some(NotePart::HoldTail));
        assert!(e.notes()[0].judged && e.notes()[0].missed);
        assert!(!e.notes()[1].judged);
        assert_eq!(e.session().pressed, [false; LANE_COUNT]);
        assert!(e.finish().is_empty());
    }

    #[test]
    fn test_combo_reset_law() {
        let notes: Vec<Note> = (0..5).map(|i| Note::tap(0, 0, 5.0 + i as f64)).collect();
        let mut e = engine(notes);
        for i in 0..4 {
            e.on_tap(0, 5.0 + i as f64).unwrap();
            assert_eq!(e.session().combo, i + 1);
        }
        e.tick(9.5);
        assert_eq!(e.session().combo, 0);
        assert_eq!(e.session().max_combo, 4);
    }

    #[test]
    fn test_bad_lane() {
        let mut e = engine(vec![Note::tap(0, 0, 5.0)]);
        assert!(matches!(e.on_tap(3, 5.0), Err(EngineError::InvalidInput(_))));
    }
}
