//! Autocorrelation-based beat period estimation
//!
//! Finds periodicity in the onset stream using FFT-accelerated autocorrelation.
//!
//! # Algorithm
//!
//! 1. Build a binary impulse train from onset times at a fine resolution (4 ms bins)
//! 2. Compute autocorrelation using FFT acceleration: `ACF = IFFT(|FFT(signal)|²)`
//! 3. Take the strongest lag inside the searchable tempo range (earliest lag wins ties)
//! 4. Octave-correct: double or halve the tempo until it lies in the canonical window
//!
//! # Reference
//!
//! Ellis, D. P. W., & Pikrakis, A. (2006). Real-time Beat Induction.
//! *Proceedings of the International Conference on Music Information Retrieval*.
//!
//! # Example
//!
//! ```no_run
//! use abyssal_groove::config::AnalysisConfig;
//! use abyssal_groove::features::period::autocorrelation::estimate_beat_period;
//!
//! let onsets: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
//! let estimate = estimate_beat_period(&onsets, &AnalysisConfig::default())?;
//! println!("{:.1} BPM", estimate.bpm);
//! # Ok::<(), abyssal_groove::EngineError>(())
//! ```

use super::BeatPeriodEstimate;
use crate::config::AnalysisConfig;
use crate::error::EngineError;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Estimate the beat period from onset times (seconds, sorted)
///
/// Fewer than `min_onsets_for_tempo` onsets yield the configured fallback
/// period with `is_fallback = true`.
///
/// # Errors
///
/// Returns `EngineError::InvalidInput` for a non-positive resolution or an
/// empty / inverted tempo search range
pub fn estimate_beat_period(
    onsets: &[f64],
    config: &AnalysisConfig,
) -> Result<BeatPeriodEstimate, EngineError> {
    let res = config.tempo_resolution_s;
    if res <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "Tempo resolution must be > 0, got {}",
            res
        )));
    }

    if config.min_search_bpm <= 0.0 || config.min_search_bpm >= config.max_search_bpm {
        return Err(EngineError::InvalidInput(format!(
            "Invalid BPM range: [{:.1}, {:.1}]",
            config.min_search_bpm, config.max_search_bpm
        )));
    }

    if onsets.len() < config.min_onsets_for_tempo.max(2) {
        log::warn!(
            "Too few onsets for tempo estimation ({}), using fallback period {:.3}s",
            onsets.len(),
            config.fallback_beat_period_s
        );
        return Ok(BeatPeriodEstimate {
            period: config.fallback_beat_period_s,
            bpm: 60.0 / config.fallback_beat_period_s,
            confidence: 0.0,
            is_fallback: true,
        });
    }

    let used = &onsets[..onsets.len().min(config.tempo_max_onsets.max(2))];
    let end_time = used[used.len() - 1] + 1.0;
    let bins = (end_time / res).ceil().max(1.0) as usize;
    let search_len = bins.min((config.tempo_search_window_s / res).round() as usize);

    log::debug!(
        "Estimating beat period: {} onsets, {} bins of {:.1} ms, search window {} bins",
        used.len(),
        bins,
        res * 1000.0,
        search_len
    );

    // Step 1: impulse train (only the searchable prefix matters)
    let mut impulses = vec![0.0f32; search_len];
    for &t in used {
        if t < 0.0 {
            continue;
        }
        let idx = (t / res).round() as usize;
        if idx < search_len {
            impulses[idx] = 1.0;
        }
    }

    // Step 2: autocorrelation. The train is binary, so every lag value is
    // an integer coincidence count; rounding removes FFT noise.
    let acf: Vec<f32> = compute_autocorrelation_fft(&impulses)
        .into_iter()
        .map(f32::round)
        .collect();

    // Step 3: strongest lag in range, earliest wins
    let min_lag = ((60.0 / config.max_search_bpm) / res).round() as usize;
    let max_lag = ((60.0 / config.min_search_bpm) / res).round() as usize;

    let mut best_lag = (config.fallback_beat_period_s / res).round() as usize;
    let mut best_value = -1.0f32;
    for lag in min_lag..=max_lag {
        let value = acf.get(lag).copied().unwrap_or(0.0);
        if value > best_value {
            best_value = value;
            best_lag = lag;
        }
    }

    // Step 4: octave correction
    let mut period = best_lag as f64 * res;
    let mut bpm = 60.0 / period;
    while bpm < config.canonical_min_bpm {
        bpm *= 2.0;
        period /= 2.0;
    }
    while bpm > config.canonical_max_bpm {
        bpm /= 2.0;
        period *= 2.0;
    }

    let energy = acf.first().copied().unwrap_or(0.0);
    let confidence = if energy > 0.0 {
        (best_value.max(0.0) / energy).min(1.0)
    } else {
        0.0
    };

    log::debug!(
        "Beat period: lag {} → {:.4}s ({:.2} BPM), confidence {:.2}",
        best_lag,
        period,
        bpm,
        confidence
    );

    Ok(BeatPeriodEstimate {
        period,
        bpm,
        confidence,
        is_fallback: false,
    })
}

/// Compute linear autocorrelation using FFT acceleration
///
/// `ACF[lag] = Σ_i x[i] * x[i + lag]`, computed as `IFFT(|FFT(x)|²)` over a
/// zero-padded buffer so the result has no circular wrap-around.
pub fn compute_autocorrelation_fft(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    // FFT size: next power of 2 >= 2*n (for zero-padding)
    let fft_size = (2 * n).next_power_of_two();

    let mut buffer: Vec<Complex<f32>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    buffer.resize(fft_size, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut buffer);

    for x in &mut buffer {
        *x = *x * x.conj();
    }

    let ifft = planner.plan_fft_inverse(fft_size);
    ifft.process(&mut buffer);

    // Real part, normalized by FFT size
    let scale = 1.0 / (fft_size as f32);
    buffer[..n].iter().map(|x| (x.re * scale).max(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular_onsets(start: f64, spacing: f64, count: usize) -> Vec<f64> {
        (0..count).map(|i| start + i as f64 * spacing).collect()
    }

    #[test]
    fn test_half_second_spacing() {
        let onsets = regular_onsets(0.0, 0.5, 20);
        let est = estimate_beat_period(&onsets, &AnalysisConfig::default()).unwrap();
        assert!(!est.is_fallback);
        assert!(
            (est.period - 0.5).abs() <= 0.025,
            "expected ~0.5s, got {:.4}",
            est.period
        );
        assert!((est.bpm - 120.0).abs() < 6.0);
    }

    #[test]
    fn test_slow_tempo_is_octave_corrected() {
        // 1.0 s spacing = 60 BPM, doubled into the canonical window
        let onsets = regular_onsets(0.3, 1.0, 20);
        let est = estimate_beat_period(&onsets, &AnalysisConfig::default()).unwrap();
        assert!((est.period - 0.5).abs() < 0.01, "got {:.4}", est.period);
    }

    #[test]
    fn test_fast_tempo_stays_in_window() {
        // 0.4 s spacing = 150 BPM, already canonical
        let onsets = regular_onsets(0.0, 0.4, 40);
        let est = estimate_beat_period(&onsets, &AnalysisConfig::default()).unwrap();
        assert!((est.period - 0.4).abs() < 0.01, "got {:.4}", est.period);
        assert!(est.bpm >= 115.0 && est.bpm <= 230.0);
    }

    #[test]
    fn test_too_few_onsets_fall_back() {
        let onsets = regular_onsets(0.0, 0.5, 5);
        let est = estimate_beat_period(&onsets, &AnalysisConfig::default()).unwrap();
        assert!(est.is_fallback);
        assert_eq!(est.period, 0.5);

        let est = estimate_beat_period(&[], &AnalysisConfig::default()).unwrap();
        assert!(est.is_fallback);
    }

    #[test]
    fn test_invalid_range() {
        let config = AnalysisConfig {
            min_search_bpm: 200.0,
            max_search_bpm: 100.0,
            ..AnalysisConfig::default()
        };
        assert!(estimate_beat_period(&regular_onsets(0.0, 0.5, 20), &config).is_err());
    }

    #[test]
    fn test_autocorrelation_matches_direct_sum() {
        let signal = vec![1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0];
        let acf = compute_autocorrelation_fft(&signal);
        for lag in 0..signal.len() {
            let direct: f32 = (0..signal.len() - lag).map(|i| signal[i] * signal[i + lag]).sum();
            assert!((acf[lag] - direct).abs() < 1e-4, "lag {}", lag);
        }
    }
}
