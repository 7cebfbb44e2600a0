//! Run lifecycle
//!
//! Owns the active chart, the playback clock and, while a run is active,
//! the judgment engine. Inputs and frame ticks are applied one at a time
//! against the clock position, so a press never interleaves with a tick.
//!
//! Replacing the chart while a run is active first force-stops the run:
//! in-flight holds are flushed as missed and key state is cleared before
//! the old chart is dropped.

use super::clock::PlaybackClock;
use super::result::RunResult;
use crate::chart::random::RandomSource;
use crate::chart::Chart;
use crate::config::{EngineConfig, TimingConfig};
use crate::difficulty::Difficulty;
use crate::error::EngineError;
use crate::io::chart_file;
use crate::judge::engine::{JudgeEvent, JudgmentEngine};
use std::path::Path;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No chart, or an empty one
    Idle,
    /// A playable chart is loaded
    Ready,
    /// A run is in progress
    Playing,
    /// A run is in progress but the clock is frozen
    Paused,
    /// The last run reached the end of the chart
    Finished,
}

/// Drives runs of one chart against a playback clock
pub struct RunConductor<C: PlaybackClock> {
    clock: C,
    timing: TimingConfig,
    chart: Option<Chart>,
    engine: Option<JudgmentEngine>,
    state: RunState,
    last_result: Option<RunResult>,
}

impl<C: PlaybackClock> RunConductor<C> {
    /// Conductor with no chart
    pub fn new(clock: C, timing: TimingConfig) -> Self {
        Self {
            clock,
            timing,
            chart: None,
            engine: None,
            state: RunState::Idle,
            last_result: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The active chart
    pub fn chart(&self) -> Option<&Chart> {
        self.chart.as_ref()
    }

    /// Judgment engine of the current or last run
    pub fn engine(&self) -> Option<&JudgmentEngine> {
        self.engine.as_ref()
    }

    /// The playback clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Result of the last finished or stopped run
    pub fn last_result(&self) -> Option<&RunResult> {
        self.last_result.as_ref()
    }

    /// True when a start would succeed
    pub fn can_start(&self) -> bool {
        self.chart.as_ref().is_some_and(Chart::is_playable) && !self.is_running()
    }

    fn is_running(&self) -> bool {
        matches!(self.state, RunState::Playing | RunState::Paused)
    }

    /// Replace the active chart, stopping any run first
    pub fn load_chart(&mut self, mut chart: Chart) {
        if self.is_running() {
            self.force_stop();
        }
        chart.reset_progress();
        self.state = if chart.is_playable() {
            RunState::Ready
        } else {
            RunState::Idle
        };
        log::debug!("Loaded chart '{}' with {} notes", chart.meta.title, chart.notes.len());
        self.engine = None;
        self.chart = Some(chart);
    }

    /// Load a chart document from disk
    ///
    /// On failure the active chart and any run in progress are untouched.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `ChartFormat` if the document is malformed
    pub fn load_chart_file(&mut self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let chart = chart_file::read_chart(path)?;
        self.load_chart(chart);
        Ok(())
    }

    /// Regenerate the chart from a track
    ///
    /// Any active run is force-stopped before analysis starts. If generation
    /// fails the previous chart stays loaded.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the audio is empty or the analysis fails
    pub fn reanalyze<R: RandomSource>(
        &mut self,
        title: &str,
        samples: &[f32],
        sample_rate: u32,
        difficulty: Difficulty,
        config: &EngineConfig,
        rng: &mut R,
    ) -> Result<(), EngineError> {
        if self.is_running() {
            self.force_stop();
        }
        let chart = crate::generate_chart(title, samples, sample_rate, difficulty, config, rng)?;
        self.load_chart(chart);
        Ok(())
    }

    /// Start a run at playback position 0, `lead_in` seconds from now
    ///
    /// # Errors
    ///
    /// `InvalidState` without a chart, with an empty chart, or while a run is active
    pub fn start(&mut self, lead_in: f64) -> Result<(), EngineError> {
        if self.is_running() {
            return Err(EngineError::InvalidState("A run is already active".to_string()));
        }
        let chart = self
            .chart
            .as_mut()
            .ok_or_else(|| EngineError::InvalidState("No chart loaded".to_string()))?;
        if !chart.is_playable() {
            return Err(EngineError::InvalidState("Chart has no notes".to_string()));
        }

        chart.reset_progress();
        self.engine = Some(JudgmentEngine::new(chart, self.timing.clone()));
        self.last_result = None;
        self.clock.schedule(lead_in);
        self.state = RunState::Playing;
        log::info!(
            "Run started: '{}' ({}), {} notes",
            chart.meta.title,
            chart.meta.difficulty,
            chart.notes.len()
        );
        Ok(())
    }

    fn active_engine(&mut self) -> Option<&mut JudgmentEngine> {
        if self.state == RunState::Playing {
            self.engine.as_mut()
        } else {
            None
        }
    }

    /// Key down in `lane`; ignored unless playing
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a lane out of range
    pub fn press(&mut self, lane: usize) -> Result<Option<JudgeEvent>, EngineError> {
        let now = self.clock.position();
        match self.active_engine() {
            Some(engine) => engine.on_press(lane, now),
            None => Ok(None),
        }
    }

    /// Key up in `lane`
    ///
    /// Applied while playing or paused, so a key let go during a pause does
    /// not stay held. A hold tail released while paused is judged at the
    /// frozen clock position.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a lane out of range
    pub fn release(&mut self, lane: usize) -> Result<Option<JudgeEvent>, EngineError> {
        if !self.is_running() {
            return Ok(None);
        }
        let now = self.clock.position();
        match self.engine.as_mut() {
            Some(engine) => engine.on_release(lane, now),
            None => Ok(None),
        }
    }

    /// Per-frame step: resolve timeouts and finish the run at the end of the chart
    pub fn tick(&mut self) -> Vec<JudgeEvent> {
        let now = self.clock.position();
        let outcome = match self.active_engine() {
            Some(engine) => engine.tick(now),
            None => return Vec::new(),
        };
        if outcome.finished {
            self.complete(true);
        }
        outcome.events
    }

    /// Freeze the run
    pub fn pause(&mut self) {
        if self.state == RunState::Playing {
            self.clock.pause();
            self.state = RunState::Paused;
            log::debug!("Run paused at {:.3}s", self.clock.position());
        }
    }

    /// Continue a paused run
    pub fn resume(&mut self) {
        if self.state == RunState::Paused {
            self.clock.resume();
            self.state = RunState::Playing;
            log::debug!("Run resumed at {:.3}s", self.clock.position());
        }
    }

    /// Pause when playing, resume when paused
    pub fn toggle_pause(&mut self) {
        match self.state {
            RunState::Playing => self.pause(),
            RunState::Paused => self.resume(),
            _ => {}
        }
    }

    /// Abort the active run, flushing in-flight holds as missed
    ///
    /// Returns the partial result, or `None` if no run was active.
    pub fn force_stop(&mut self) -> Option<RunResult> {
        if !self.is_running() {
            return None;
        }
        self.complete(false);
        self.last_result.clone()
    }

    fn complete(&mut self, reached_end: bool) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let flushed = engine.finish();
        let result = RunResult::from_session(engine.session(), engine.perfect_total(), reached_end);
        self.clock.stop();

        if reached_end {
            log::info!(
                "Run finished: score {}, rate {:.1}%, rank {}, max combo {}",
                result.score,
                result.rate,
                result.rank,
                result.max_combo
            );
        } else {
            log::info!(
                "Run stopped: score {}, {} holds flushed",
                result.score,
                flushed.len()
            );
        }

        self.state = if reached_end {
            RunState::Finished
        } else {
            RunState::Ready
        };
        self.last_result = Some(result);
    }
}
