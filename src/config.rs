//! Configuration parameters for analysis, chart generation and judging
//!
//! The heuristics below are empirically tuned; the defaults reproduce the
//! behaviour the engine ships with and every one of them can be overridden.

use serde::{Deserialize, Serialize};

/// Signal analysis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    // STFT parameters
    /// Frame size for STFT (default: 2048)
    pub frame_size: usize,

    /// Hop size for STFT (default: 512)
    pub hop_size: usize,

    /// Band edges in Hz: low = [0]..[1], mid = [1]..[2], high = [2]..[3]
    /// (default: 40 / 200 / 2500 / 10000)
    pub band_edges_hz: [f32; 4],

    /// Weight of normalized frame RMS in the novelty curve (default: 0.0 = off)
    pub rms_weighting: f32,

    // Peak picking
    /// Half-width of the local mean/std window in seconds (default: 0.35)
    pub threshold_window_s: f64,

    /// Threshold multiplier k per band in `mean + k * std` (default: 1.1 / 1.3 / 1.5)
    pub threshold_sigma: [f32; 3],

    /// Minimum inter-onset gap per band in seconds (default: 0.10 / 0.07 / 0.05)
    pub min_onset_gap_s: [f64; 3],

    /// Percentile used to normalize onset strengths (default: 0.95)
    pub strength_percentile: f32,

    /// Onsets from different bands closer than this are merged (default: 0.025 s)
    pub merge_tolerance_s: f64,

    // Tempo
    /// Impulse-train bin width in seconds (default: 0.004)
    pub tempo_resolution_s: f64,

    /// Only the first N onsets feed the impulse train (default: 400)
    pub tempo_max_onsets: usize,

    /// Autocorrelation only looks at the first N seconds (default: 30.0)
    pub tempo_search_window_s: f64,

    /// Slowest tempo considered by the lag search (default: 60.0)
    pub min_search_bpm: f64,

    /// Fastest tempo considered by the lag search (default: 185.0)
    pub max_search_bpm: f64,

    /// Lower edge of the octave-correction window (default: 115.0)
    pub canonical_min_bpm: f64,

    /// Upper edge of the octave-correction window (default: 230.0)
    pub canonical_max_bpm: f64,

    /// Fewer onsets than this use the fallback period (default: 6)
    pub min_onsets_for_tempo: usize,

    /// Beat period used when tempo cannot be estimated (default: 0.5 s)
    pub fallback_beat_period_s: f64,

    // Downbeat phase
    /// Phase candidates tested across one beat (default: 32)
    pub phase_candidates: usize,

    /// Only onsets within this span after the intro vote (default: 60.0 s)
    pub phase_search_span_s: f64,

    /// Alignment tolerance as a fraction of the beat (default: 0.18)
    pub phase_tolerance_beats: f64,

    /// Vote weight for onsets on a bar start (default: 1.8)
    pub bar_start_weight: f64,

    /// Vote weight for onsets on the half-bar (default: 1.2)
    pub half_bar_weight: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            band_edges_hz: [40.0, 200.0, 2500.0, 10000.0],
            rms_weighting: 0.0,
            threshold_window_s: 0.35,
            threshold_sigma: [1.1, 1.3, 1.5],
            min_onset_gap_s: [0.10, 0.07, 0.05],
            strength_percentile: 0.95,
            merge_tolerance_s: 0.025,
            tempo_resolution_s: 0.004,
            tempo_max_onsets: 400,
            tempo_search_window_s: 30.0,
            min_search_bpm: 60.0,
            max_search_bpm: 185.0,
            canonical_min_bpm: 115.0,
            canonical_max_bpm: 230.0,
            min_onsets_for_tempo: 6,
            fallback_beat_period_s: 0.5,
            phase_candidates: 32,
            phase_search_span_s: 60.0,
            phase_tolerance_beats: 0.18,
            bar_start_weight: 1.8,
            half_bar_weight: 1.2,
        }
    }
}

/// Structure segmentation and bar-intensity parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureConfig {
    /// RMS envelope window in seconds (default: 2.0)
    pub envelope_window_s: f64,

    /// RMS envelope hop in seconds (default: 0.1)
    pub envelope_hop_s: f64,

    /// Moving-average radius over envelope frames (default: 3)
    pub envelope_smoothing: usize,

    /// Density sampling cadence in beats (default: 4.0), clamped to the range below
    pub density_cadence_beats: f64,

    /// Lower clamp for the cadence in seconds (default: 1.5)
    pub min_cadence_s: f64,

    /// Upper clamp for the cadence in seconds (default: 2.5)
    pub max_cadence_s: f64,

    /// Moving-average radius over density samples (default: 2)
    pub density_smoothing: usize,

    /// Minimum density jump, as a fraction of the density range, for a boundary (default: 0.15)
    pub boundary_jump_ratio: f32,

    /// Minimum section duration in seconds (default: 8.0)
    pub min_section_s: f64,

    /// Fewest sections targeted (default: 4)
    pub min_sections: usize,

    /// Most sections targeted (default: 7)
    pub max_sections: usize,

    /// Track seconds per targeted section (default: 35.0)
    pub seconds_per_section: f64,

    /// Chance a tier-0 bar is lifted to tier 1 (default: 0.8)
    pub tier_zero_lift_chance: f32,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            envelope_window_s: 2.0,
            envelope_hop_s: 0.1,
            envelope_smoothing: 3,
            density_cadence_beats: 4.0,
            min_cadence_s: 1.5,
            max_cadence_s: 2.5,
            density_smoothing: 2,
            boundary_jump_ratio: 0.15,
            min_section_s: 8.0,
            min_sections: 4,
            max_sections: 7,
            seconds_per_section: 35.0,
            tier_zero_lift_chance: 0.8,
        }
    }
}

/// How the chart builder assigns lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneMode {
    /// Dominant band picks the lane (low → 0, mid → 1, high → 2)
    Banded,
    /// Lanes come from the motif pattern
    Motif,
    /// Banded, except for streams, chords and high-tier holds which keep motif lanes
    Hybrid,
}

/// Chart construction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Playable range ends at least this long before the audio ends (default: 3.5 s)
    pub trailing_margin_s: f64,

    /// Playable range extends this many beats past the last onset (default: 6.0)
    pub tail_beats: f64,

    /// Playable range is at least this long after the intro (default: 12.0 s)
    pub min_playable_s: f64,

    /// Assumed last onset, relative to the track end, when no onset exists (default: 5.0 s)
    pub no_onset_tail_s: f64,

    /// Rendered note diameter in pixels (default: 44)
    pub note_diameter_px: f64,

    /// Distance from spawn to hit line in pixels (default: 365)
    pub travel_distance_px: f64,

    /// Flicks need this multiple of the clearance gap (default: 1.15)
    pub flick_gap_factor: f64,

    /// Consecutive same-lane taps before the lane is forced to change (default: 4)
    pub streak_limit: u32,

    /// Same-lane flicks keep this many beats apart (default: 1.5)
    pub flick_cooldown_beats: f64,

    /// Chance a selected motif is mutated before use (default: 0.2)
    pub mutation_chance: f32,

    /// Lane assignment strategy (default: Hybrid)
    pub lane_mode: LaneMode,

    /// A weak slot is still placed when nothing was placed for this many beats (default: 3.0)
    pub starvation_beats: f64,

    /// Shortest hold in beats (default: 0.5)
    pub min_hold_beats: f64,

    /// Taps stay this far before the chart end (default: 0.05 s)
    pub end_guard_s: f64,

    /// Hold tails stay this far before the chart end (default: 0.1 s)
    pub hold_end_guard_s: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            trailing_margin_s: 3.5,
            tail_beats: 6.0,
            min_playable_s: 12.0,
            no_onset_tail_s: 5.0,
            note_diameter_px: 44.0,
            travel_distance_px: 365.0,
            flick_gap_factor: 1.15,
            streak_limit: 4,
            flick_cooldown_beats: 1.5,
            mutation_chance: 0.2,
            lane_mode: LaneMode::Hybrid,
            starvation_beats: 3.0,
            min_hold_beats: 0.5,
            end_guard_s: 0.05,
            hold_end_guard_s: 0.1,
        }
    }
}

/// Real-time judging thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// A tap looks for pending notes within this radius (default: 0.26 s)
    pub pending_radius_s: f64,

    /// Taps and unstarted holds miss this long after their time (default: 0.28 s)
    pub late_s: f64,

    /// Started holds miss this long after their end (default: 0.22 s)
    pub hold_tail_late_s: f64,

    /// Extra slack added to the flick timeout (default: 0.05 s)
    pub flick_timeout_slack_s: f64,

    /// The run ends this long after the chart end (default: 1.0 s)
    pub trailing_grace_s: f64,

    /// Points subtracted by every miss (default: 400)
    pub miss_penalty: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pending_radius_s: 0.26,
            late_s: 0.28,
            hold_tail_late_s: 0.22,
            flick_timeout_slack_s: 0.05,
            trailing_grace_s: 1.0,
            miss_penalty: 400,
        }
    }
}

/// All engine parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Signal analysis
    pub analysis: AnalysisConfig,
    /// Sections and bar tiers
    pub structure: StructureConfig,
    /// Note placement
    pub chart: ChartConfig,
    /// Judging
    pub timing: TimingConfig,
}
