//! Playback clock
//!
//! The run clock is the playback position, not wall-clock time:
//! `position = now - scheduled_start`, frozen while paused. The time source
//! behind it is injectable so runs can be driven with synthetic timestamps.

use std::cell::Cell;
use std::time::Instant;

/// Monotonic time source in seconds from an arbitrary epoch
pub trait TimeSource {
    /// Current time in seconds
    fn now(&self) -> f64;
}

/// Time source backed by `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    start: Instant,
}

impl SystemTimeSource {
    /// Source whose epoch is now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Manually advanced time source for deterministic runs
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    current: Cell<f64>,
}

impl ManualTimeSource {
    /// Source starting at 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to `seconds`
    pub fn set(&self, seconds: f64) {
        self.current.set(seconds);
    }

    /// Move forward by `seconds`
    pub fn advance(&self, seconds: f64) {
        self.current.set(self.current.get() + seconds);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> f64 {
        self.current.get()
    }
}

/// Playback boundary: schedule, pause, resume, position
pub trait PlaybackClock {
    /// Start playback `delay` seconds from now; position 0 is reached then
    fn schedule(&mut self, delay: f64);

    /// Stop playback; position returns to 0
    fn stop(&mut self);

    /// Freeze the position
    fn pause(&mut self);

    /// Continue from the frozen position
    fn resume(&mut self);

    /// Seconds since the scheduled start (negative during a lead-in, 0 when stopped)
    fn position(&self) -> f64;

    /// True between `schedule` and `stop`
    fn is_scheduled(&self) -> bool;

    /// True while paused
    fn is_paused(&self) -> bool;
}

/// [`PlaybackClock`] over any [`TimeSource`]
#[derive(Debug, Default)]
pub struct ScheduledClock<T: TimeSource> {
    source: T,
    start_at: Option<f64>,
    paused_at: Option<f64>,
}

impl<T: TimeSource> ScheduledClock<T> {
    /// Stopped clock over `source`
    pub fn new(source: T) -> Self {
        Self {
            source,
            start_at: None,
            paused_at: None,
        }
    }

    /// The underlying time source
    pub fn source(&self) -> &T {
        &self.source
    }
}

impl<T: TimeSource> PlaybackClock for ScheduledClock<T> {
    fn schedule(&mut self, delay: f64) {
        self.start_at = Some(self.source.now() + delay);
        self.paused_at = None;
    }

    fn stop(&mut self) {
        self.start_at = None;
        self.paused_at = None;
    }

    fn pause(&mut self) {
        if self.start_at.is_some() && self.paused_at.is_none() {
            self.paused_at = Some(self.source.now());
        }
    }

    fn resume(&mut self) {
        if let (Some(start), Some(paused)) = (self.start_at, self.paused_at.take()) {
            self.start_at = Some(start + (self.source.now() - paused));
        }
    }

    fn position(&self) -> f64 {
        match (self.start_at, self.paused_at) {
            (Some(start), Some(paused)) => paused - start,
            (Some(start), None) => self.source.now() - start,
            (None, _) => 0.0,
        }
    }

    fn is_scheduled(&self) -> bool {
        self.start_at.is_some()
    }

    fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }
}
