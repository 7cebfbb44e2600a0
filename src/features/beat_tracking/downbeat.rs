//! Downbeat phase estimation
//!
//! Tests evenly spaced phase offsets across one beat period. Each candidate
//! is scored by how closely the onsets after the intro fall on its beat
//! grid; onsets on bar starts (every 4th beat) and half bars weigh more.

use super::DownbeatEstimate;
use crate::config::AnalysisConfig;
use crate::error::EngineError;

/// Estimate the downbeat phase
///
/// # Arguments
///
/// * `onsets` - Merged onset times in seconds, sorted
/// * `beat_period` - Seconds per beat
/// * `intro` - Intro offset; candidates lie in `[intro, intro + beat_period)`
/// * `config` - Analysis configuration (candidate count, tolerance, weights)
///
/// # Returns
///
/// The best candidate, or `intro` when there are no onsets
///
/// # Errors
///
/// Returns `EngineError::InvalidInput` for a non-positive beat period
pub fn estimate_downbeat_phase(
    onsets: &[f64],
    beat_period: f64,
    intro: f64,
    config: &AnalysisConfig,
) -> Result<DownbeatEstimate, EngineError> {
    if beat_period <= 0.0 || !beat_period.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "Beat period must be > 0, got {}",
            beat_period
        )));
    }

    if onsets.is_empty() {
        log::warn!("No onsets for downbeat phase, defaulting to intro {:.2}s", intro);
        return Ok(DownbeatEstimate {
            phase: intro,
            score: 0.0,
            is_fallback: true,
        });
    }

    let candidates = config.phase_candidates.max(1);
    let tolerance = beat_period * config.phase_tolerance_beats;
    let horizon = intro + config.phase_search_span_s;

    let mut best_phase = intro;
    let mut best_score = -1.0f64;

    for c in 0..candidates {
        let phase = intro + (c as f64 / candidates as f64) * beat_period;
        let mut score = 0.0;

        for &t in onsets {
            if t < intro {
                continue;
            }
            if t > horizon {
                break;
            }
            let nearest = ((t - phase) / beat_period).round();
            let delta = ((t - phase) - nearest * beat_period).abs();
            if delta < tolerance {
                let beat_index = nearest as i64;
                let weight = if beat_index.rem_euclid(4) == 0 {
                    config.bar_start_weight
                } else if beat_index.rem_euclid(2) == 0 {
                    config.half_bar_weight
                } else {
                    1.0
                };
                score += (1.0 - delta / tolerance) * weight;
            }
        }

        if score > best_score {
            best_score = score;
            best_phase = phase;
        }
    }

    log::debug!(
        "Downbeat phase: {:.3}s (score {:.2}, {} candidates)",
        best_phase,
        best_score,
        candidates
    );

    Ok(DownbeatEstimate {
        phase: best_phase,
        score: best_score,
        is_fallback: false,
    })
}
