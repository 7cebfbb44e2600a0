//! Chart builder
//!
//! For every bar of the playable range:
//! 1. Cap the bar's tier by the difficulty and pick a motif from the tier's
//!    pool (never the previous bar's), occasionally mutated
//! 2. Thin the motif's slots for the difficulty
//! 3. For each remaining slot, read the per-band onset strength around the
//!    slot time; weak slots are skipped unless they are on the downbeat or
//!    the chart has been silent for a few beats
//! 4. Pick the lane (dominant band or motif lane), break long same-lane
//!    streaks, and maybe convert taps to flicks
//! 5. Commit through the lane occupancy ledger; holds and flicks may spread
//!    to the other lanes and taps may become chords at high tiers
//!
//! The enclosing section sets the grid: intro, outro and low-energy
//! sections keep only half-beat slots, while peak and high-energy sections
//! thin less.
//!
//! Candidates rejected by the ledger are dropped, never retried elsewhere.

use super::note::{Note, LANE_COUNT};
use super::occupancy::{visual_clearance, LaneLedger};
use super::patterns::{mutate, select_motif, Density, SlotKind};
use super::random::RandomSource;
use super::Chart;
use crate::analysis::result::TrackAnalysis;
use crate::config::{ChartConfig, LaneMode};
use crate::difficulty::DifficultyProfile;
use crate::error::EngineError;
use crate::features::onset::BandOnsets;
use crate::structure::bars::Bar;
use crate::structure::segmenter::Timeline;
use crate::structure::{section_at, EnergyTier, Section, SectionRole};

/// Playable range and beat grid for `analysis` at the given intro offset
///
/// The range ends at `min(duration - trailing margin, last onset + tail beats)`
/// and is at least `min_playable_s` long.
pub fn playable_timeline(analysis: &TrackAnalysis, intro: f64, config: &ChartConfig) -> Timeline {
    let beat = analysis.beat_period();
    let last_onset = analysis
        .last_onset()
        .unwrap_or(analysis.duration - config.no_onset_tail_s);
    let end = (analysis.duration - config.trailing_margin_s).min(last_onset + beat * config.tail_beats);
    let safe_end = end.max(intro + config.min_playable_s);

    Timeline {
        intro,
        safe_end,
        beat_period: beat,
        downbeat_phase: analysis.downbeat_phase(),
    }
}

/// Dominant band as a lane: low → 0, mid → 1, high → 2
fn banded_lane(strengths: [f32; 3]) -> usize {
    let [low, mid, high] = strengths;
    if low > mid && low > high {
        0
    } else if mid > high {
        1
    } else {
        2
    }
}

/// Placement grid of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subdivision {
    /// Half-beat slots only
    Coarse,
    Regular,
    /// Thinning halved
    Fine,
}

fn subdivision(section: Option<&Section>) -> Subdivision {
    match section {
        Some(s) if matches!(s.role, SectionRole::Intro | SectionRole::Outro) => Subdivision::Coarse,
        Some(s) if s.energy == EnergyTier::Low => Subdivision::Coarse,
        Some(s) if s.role == SectionRole::Peak || s.energy == EnergyTier::High => Subdivision::Fine,
        _ => Subdivision::Regular,
    }
}

/// Mutable placement state carried across bars
struct Placer<'a, R: RandomSource> {
    profile: &'a DifficultyProfile,
    config: &'a ChartConfig,
    timeline: &'a Timeline,
    sections: &'a [Section],
    rng: &'a mut R,
    ledger: LaneLedger,
    notes: Vec<Note>,
    last_note_time: f64,
    last_flick: [f64; LANE_COUNT],
    last_lane: Option<usize>,
    streak: u32,
}

impl<'a, R: RandomSource> Placer<'a, R> {
    fn commit(&mut self, note: Note) -> bool {
        if self.ledger.try_commit(&note) {
            self.notes.push(note);
            true
        } else {
            false
        }
    }

    fn note_end_limit(&self) -> f64 {
        self.timeline.safe_end - self.config.end_guard_s
    }

    fn hold_end_limit(&self) -> f64 {
        self.timeline.safe_end - self.config.hold_end_guard_s
    }

    fn other_lanes(&mut self, lane: usize) -> Vec<usize> {
        let mut lanes: Vec<usize> = (0..LANE_COUNT).filter(|&l| l != lane).collect();
        self.rng.shuffle(&mut lanes);
        lanes
    }

    fn extras_allowed(tier: u8) -> usize {
        match tier {
            0..=2 => 0,
            3 => 1,
            _ => 2,
        }
    }

    fn place_hold(&mut self, t: f64, lane: usize, hold_beats: f64, tier: u8) -> bool {
        let beat = self.timeline.beat_period;
        let min_len = beat * self.config.min_hold_beats;

        let mut beats = hold_beats;
        if tier >= 2 && self.rng.chance(self.profile.hold_extension_chance) {
            beats += self.rng.uniform(1.0, 4.0);
        }
        let end = (t + beats * beat).min(self.hold_end_limit());
        if end - t < min_len {
            return false;
        }

        let placed = self.commit(Note::hold(0, lane, t, end));
        let allowed = Self::extras_allowed(tier);
        if !placed || allowed == 0 {
            return placed;
        }

        let mut extra = 0;
        for other in self.other_lanes(lane) {
            if extra >= allowed {
                break;
            }
            if !self.rng.chance(self.profile.extra_hold_chance) {
                continue;
            }
            let offset_beats = if self.rng.chance(0.5) {
                0.0
            } else {
                self.rng.uniform(0.0, 2.0)
            };
            let start = t + beat * offset_beats;
            let extra_end = (start + beat * self.rng.uniform(1.0, 4.5)).min(self.hold_end_limit());
            if extra_end - start >= min_len && self.commit(Note::hold(0, other, start, extra_end)) {
                extra += 1;
            }
        }
        placed
    }

    fn place_flick(&mut self, t: f64, lane: usize, tier: u8) -> bool {
        let beat = self.timeline.beat_period;
        let cooldown = beat * self.config.flick_cooldown_beats;
        let window = self.profile.flick_window_s;

        let placed = self.commit(Note::flick(0, lane, t, window));
        if placed {
            self.last_flick[lane] = t;
        }
        let allowed = Self::extras_allowed(tier);
        if !placed || allowed == 0 {
            return placed;
        }

        let mut extra = 0;
        for other in self.other_lanes(lane) {
            if extra >= allowed {
                break;
            }
            if !self.rng.chance(self.profile.extra_flick_chance) {
                continue;
            }
            let offset_beats = if self.rng.chance(0.8) {
                0.0
            } else {
                self.rng.next_unit()
            };
            let start = t + beat * offset_beats;
            if start - self.last_flick[other] > cooldown
                && start < self.note_end_limit()
                && self.commit(Note::flick(0, other, start, window))
            {
                self.last_flick[other] = start;
                extra += 1;
            }
        }
        placed
    }

    fn place_tap(&mut self, t: f64, lane: usize, chord: bool, tier: u8) -> bool {
        let placed = self.commit(Note::tap(0, lane, t));
        if chord {
            let step = if self.rng.next_unit() > 0.5 { 1 } else { 2 };
            let second = (lane + step) % LANE_COUNT;
            self.commit(Note::tap(0, second, t));
            self.last_lane = Some(second);
            if tier >= 4 && self.rng.chance(self.profile.triple_chord_chance) {
                // lane indices sum to 3
                let third = 3 - lane - second;
                self.commit(Note::tap(0, third, t));
                self.last_lane = Some(third);
            }
        }
        placed
    }

    fn break_streak(&mut self, lane: usize) -> usize {
        let mut lane = lane;
        if self.last_lane == Some(lane) {
            self.streak += 1;
            if self.streak >= self.config.streak_limit {
                lane = (lane + 1 + self.rng.index(LANE_COUNT - 1)) % LANE_COUNT;
                self.streak = 1;
            }
        } else {
            self.streak = 1;
        }
        self.last_lane = Some(lane);
        lane
    }

    fn fill_bar(&mut self, bar: &Bar, previous: &mut &'static str, bands: &BandOnsets) {
        let profile = self.profile;
        let beat = self.timeline.beat_period;
        let tier = bar.tier.min(profile.max_tier);
        let grid = subdivision(section_at(self.sections, bar.start));
        let thinning = if grid == Subdivision::Fine { 0.5 } else { 1.0 };

        let motif = select_motif(tier, *previous, self.rng);
        *previous = motif.name;
        let mut slots = motif.slots.to_vec();
        if self.rng.chance(self.config.mutation_chance) {
            mutate(&mut slots, self.rng);
        }

        for slot in slots {
            if (profile.half_beat_grid_only || grid == Subdivision::Coarse) && !slot.on_half_beat() {
                continue;
            }
            if motif.stream
                && !slot.on_half_beat()
                && profile.stream_offgrid_skip > 0.0
                && self.rng.chance(profile.stream_offgrid_skip * thinning)
            {
                continue;
            }
            if slot.is_thinnable() {
                let skip = match motif.density {
                    Density::Regular => 0.0,
                    Density::Dense => profile.dense_skip,
                    Density::ExtraDense => profile.extra_dense_skip,
                };
                if skip > 0.0 && self.rng.chance(skip * thinning) {
                    continue;
                }
            }

            let t = bar.start + slot.beat * beat;
            if t < self.timeline.intro || t >= self.note_end_limit() {
                continue;
            }

            let window = beat
                * match tier {
                    0 | 1 => 0.50,
                    2 => 0.42,
                    _ => 0.36,
                };
            let strengths = bands.strengths_near(t, window);
            let max_strength = strengths.iter().copied().fold(0.0f32, f32::max);
            let min_strength = match tier {
                1 => 0.05,
                2 => 0.02,
                _ => 0.01,
            };
            let starving = t - self.last_note_time > beat * self.config.starvation_beats;
            if max_strength < min_strength && !starving && slot.beat != 0.0 {
                continue;
            }

            let is_tap = slot.kind == SlotKind::Tap;
            let [low, _, high] = strengths;
            let chord = profile.chords && is_tap && tier >= 3 && low > 0.15 && high > 0.15;

            let banded = match self.config.lane_mode {
                LaneMode::Banded => !chord,
                LaneMode::Motif => false,
                LaneMode::Hybrid => {
                    !chord && (tier <= 2 || !motif.stream) && !(!is_tap && tier >= 3)
                }
            };
            let mut lane = if banded {
                banded_lane(strengths)
            } else {
                slot.lane.min(LANE_COUNT - 1)
            };

            if is_tap {
                lane = self.break_streak(lane);
            }

            let mut flick = false;
            if is_tap && (profile.flick_chance_offbeat > 0.0 || profile.flick_chance_onbeat > 0.0) {
                let chance = if slot.beat.fract() != 0.0 {
                    profile.flick_chance_offbeat
                } else {
                    profile.flick_chance_onbeat
                };
                let cooled = t - self.last_flick[lane] > beat * self.config.flick_cooldown_beats;
                flick = self.rng.chance(chance) && cooled;
            }

            let placed = match slot.kind {
                SlotKind::Hold(beats) => self.place_hold(t, lane, beats, tier),
                SlotKind::Tap if flick => self.place_flick(t, lane, tier),
                SlotKind::Tap => self.place_tap(t, lane, chord, tier),
            };
            if placed {
                self.last_note_time = t;
            }
        }
    }
}

/// Build a chart from the analysis, sections and bar tiers
///
/// # Arguments
///
/// * `title` - Chart title
/// * `analysis` - Track analysis (onset bands, beat, phase)
/// * `timeline` - Playable range from [`playable_timeline`]
/// * `sections` - Sections covering the playable range
/// * `bars` - Bar intensity tiers
/// * `profile` - Difficulty profile
/// * `config` - Chart configuration
/// * `rng` - Random source for every placement decision
///
/// # Errors
///
/// Returns `EngineError::InvalidInput` for a non-positive beat period
#[allow(clippy::too_many_arguments)]
pub fn build_chart<R: RandomSource>(
    title: &str,
    analysis: &TrackAnalysis,
    timeline: &Timeline,
    sections: Vec<Section>,
    bars: &[Bar],
    profile: &DifficultyProfile,
    config: &ChartConfig,
    rng: &mut R,
) -> Result<Chart, EngineError> {
    let beat = timeline.beat_period;
    if !(beat > 0.0) || !beat.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "Beat period must be > 0, got {}",
            beat
        )));
    }

    let clearance = visual_clearance(
        config.note_diameter_px,
        config.travel_distance_px,
        profile.travel_ms,
    );
    let min_gap = beat * profile.min_lane_gap_beats;

    let mut placer = Placer {
        profile,
        config,
        timeline,
        sections: &sections,
        rng,
        ledger: LaneLedger::new(clearance, config.flick_gap_factor, min_gap),
        notes: Vec::new(),
        last_note_time: 0.0,
        last_flick: [f64::NEG_INFINITY; LANE_COUNT],
        last_lane: None,
        streak: 0,
    };

    let mut previous: &'static str = "rest";
    for bar in bars {
        placer.fill_bar(bar, &mut previous, &analysis.onsets);
    }

    let mut chart = Chart::new(title, profile, beat, timeline.safe_end, placer.notes);
    chart.intro = timeline.intro;
    chart.downbeat_phase = timeline.downbeat_phase;
    chart.sections = sections;

    let summary = chart.summary();
    log::debug!(
        "Chart: {} notes ({} taps, {} holds, {} flicks) over {} bars, clearance {:.3}s, end {:.2}s",
        summary.total,
        summary.taps,
        summary.holds,
        summary.flicks,
        bars.len(),
        clearance,
        chart.chart_end
    );

    Ok(chart)
}
