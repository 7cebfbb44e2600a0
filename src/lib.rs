//! # Abyssal Groove
//!
//! A three-lane rhythm-game engine: analyzes an audio track, generates a
//! playable note chart synchronized to it, and judges a player's inputs
//! against that chart in real time.
//!
//! ## Features
//!
//! - **Onset Detection**: Three-band spectral flux with adaptive thresholds
//! - **Tempo and Phase**: Beat period from onset-interval autocorrelation, downbeat phase from bar-start alignment
//! - **Structure**: Sections from onset density, per-bar intensity tiers from the RMS envelope
//! - **Chart Generation**: Motif-driven tap, hold and flick placement under lane-occupancy constraints
//! - **Judging**: Timing windows, combo multipliers, hold and flick handling, live accuracy
//!
//! ## Quick Start
//!
//! ```no_run
//! use abyssal_groove::{generate_chart, Difficulty, EngineConfig};
//!
//! // Mono audio samples, normalized to [-1.0, 1.0]
//! let samples: Vec<f32> = vec![];
//! let sample_rate = 44100;
//!
//! let mut rng = rand::thread_rng();
//! let chart = generate_chart("My Track", &samples, sample_rate, Difficulty::Normal, &EngineConfig::default(), &mut rng)?;
//!
//! println!("{} notes at {:.1} BPM", chart.notes.len(), chart.meta.bpm);
//! # Ok::<(), abyssal_groove::EngineError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Audio → Band Onsets → Beat Period → Downbeat Phase → Sections → Bar Tiers → Chart
//! Chart + Clock + Inputs → Judgment Engine → Run Result
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod chart;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod features;
pub mod io;
pub mod judge;
pub mod preprocessing;
pub mod run;
pub mod structure;

// Re-export main types
pub use analysis::metadata::{AnalysisFlag, AnalysisMetadata};
pub use analysis::result::TrackAnalysis;
pub use chart::note::{Note, NoteKind, LANE_COUNT};
pub use chart::random::{RandomSource, SequenceRandom};
pub use chart::{Chart, ChartMeta, ChartSummary};
pub use config::{AnalysisConfig, ChartConfig, EngineConfig, LaneMode, StructureConfig, TimingConfig};
pub use difficulty::{Difficulty, DifficultyProfile, JudgeWindows};
pub use error::EngineError;
pub use judge::engine::{JudgeEvent, JudgmentEngine, Outcome};
pub use judge::judgment::Judgment;
pub use run::clock::{ManualTimeSource, PlaybackClock, ScheduledClock, SystemTimeSource, TimeSource};
pub use run::conductor::{RunConductor, RunState};
pub use run::result::{Rank, RunResult};

use features::beat_tracking::downbeat::estimate_downbeat_phase;
use features::onset::band_flux::detect_band_onsets;
use features::period::autocorrelation::estimate_beat_period;
use io::decoder::DecodedAudio;
use structure::envelope::EnergyEnvelope;

/// Offline track analysis
///
/// Detects band onsets, estimates the beat period and the downbeat phase
/// (searched after `intro`), and computes the energy envelope.
///
/// # Arguments
///
/// * `samples` - Mono audio samples, normalized to [-1.0, 1.0]
/// * `sample_rate` - Sample rate in Hz
/// * `intro` - Seconds before the first playable beat
/// * `analysis` - Onset, tempo and phase parameters
/// * `structure` - Envelope parameters
///
/// # Errors
///
/// Returns `EngineError::InvalidInput` for empty samples or a zero sample rate.
/// Silent or sparse audio is not an error: the fallback beat period and
/// phase are used and flagged in the metadata.
pub fn analyze_track(
    samples: &[f32],
    sample_rate: u32,
    intro: f64,
    analysis: &AnalysisConfig,
    structure: &StructureConfig,
) -> Result<TrackAnalysis, EngineError> {
    use std::time::Instant;
    let start_time = Instant::now();

    log::debug!("Starting track analysis: {} samples at {} Hz", samples.len(), sample_rate);

    if samples.is_empty() {
        return Err(EngineError::InvalidInput("Empty audio samples".to_string()));
    }

    if sample_rate == 0 {
        return Err(EngineError::InvalidInput("Invalid sample rate".to_string()));
    }

    let duration = samples.len() as f64 / sample_rate as f64;

    let onsets = detect_band_onsets(samples, sample_rate, analysis)?;
    let onset_times = onsets.times();

    let beat = estimate_beat_period(&onset_times, analysis)?;
    let downbeat = estimate_downbeat_phase(&onset_times, beat.period, intro, analysis)?;
    let envelope = EnergyEnvelope::compute(samples, sample_rate, structure)?;

    let mut flags = Vec::new();
    if onset_times.len() < analysis.min_onsets_for_tempo {
        flags.push(AnalysisFlag::SparseOnsets);
    }
    if beat.is_fallback {
        flags.push(AnalysisFlag::TempoFallback);
    }
    if downbeat.is_fallback {
        flags.push(AnalysisFlag::PhaseFallback);
    }
    if !flags.is_empty() {
        log::warn!("Analysis recovered from degenerate input: {:?}", flags);
    }

    let frame_count = onsets.frames;
    let processing_time_ms = start_time.elapsed().as_secs_f32() * 1000.0;

    log::info!(
        "Analysis: {:.1}s, {} onsets, {:.1} BPM (confidence {:.2}), downbeat {:.3}s, {:.1}ms",
        duration,
        onset_times.len(),
        beat.bpm,
        beat.confidence,
        downbeat.phase,
        processing_time_ms
    );

    Ok(TrackAnalysis {
        duration,
        intro,
        onsets,
        beat,
        downbeat,
        envelope,
        metadata: AnalysisMetadata {
            duration_seconds: duration,
            sample_rate,
            processing_time_ms,
            frame_count,
            flags,
            ..AnalysisMetadata::default()
        },
    })
}

/// Generate a chart from mono samples
///
/// Runs [`analyze_track`], segments the playable range into sections,
/// assigns bar tiers, and places notes for `difficulty`. Every random
/// decision draws from `rng`, so a seeded or scripted source reproduces
/// the same chart.
///
/// # Errors
///
/// Returns `EngineError` if the audio is empty or the analysis fails
pub fn generate_chart<R: RandomSource>(
    title: &str,
    samples: &[f32],
    sample_rate: u32,
    difficulty: Difficulty,
    config: &EngineConfig,
    rng: &mut R,
) -> Result<Chart, EngineError> {
    let profile = difficulty.profile();
    let analysis = analyze_track(
        samples,
        sample_rate,
        profile.intro_s,
        &config.analysis,
        &config.structure,
    )?;
    chart_from_analysis(title, &analysis, &profile, config, rng)
}

/// Generate a chart from a decoded (possibly multichannel) track
///
/// # Errors
///
/// Returns `EngineError` if the audio has no channels or generation fails
pub fn generate_chart_from_audio<R: RandomSource>(
    title: &str,
    audio: &DecodedAudio,
    difficulty: Difficulty,
    config: &EngineConfig,
    rng: &mut R,
) -> Result<Chart, EngineError> {
    let mono = preprocessing::channel_mixer::mix_to_mono(&audio.channels)?;
    generate_chart(title, &mono, audio.sample_rate, difficulty, config, rng)
}

/// Build a chart for an existing analysis
///
/// # Errors
///
/// Returns `EngineError` if the analysis carries an invalid beat period
pub fn chart_from_analysis<R: RandomSource>(
    title: &str,
    analysis: &TrackAnalysis,
    profile: &DifficultyProfile,
    config: &EngineConfig,
    rng: &mut R,
) -> Result<Chart, EngineError> {
    let timeline = chart::builder::playable_timeline(analysis, profile.intro_s, &config.chart);

    let sections = structure::segmenter::segment_sections(
        &analysis.onsets.times(),
        &timeline,
        &config.structure,
    )?;
    let bars = structure::bars::build_bar_tiers(
        &analysis.envelope,
        &timeline,
        &sections,
        &config.structure,
        rng,
    );

    let chart = chart::builder::build_chart(
        title,
        analysis,
        &timeline,
        sections,
        &bars,
        profile,
        &config.chart,
        rng,
    )?;

    log::info!(
        "Generated '{}' ({}): {} notes over {:.1}s at {:.1} BPM",
        chart.meta.title,
        chart.meta.difficulty,
        chart.notes.len(),
        chart.chart_end - chart.intro,
        chart.meta.bpm
    );

    Ok(chart)
}
