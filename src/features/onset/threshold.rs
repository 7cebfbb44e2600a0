//! Adaptive thresholding and peak picking for onset detection
//!
//! A novelty frame becomes an onset when it is a local maximum, exceeds
//! `local_mean + k * local_std` over a sliding window, and lies at least a
//! minimum gap after the previously accepted onset.

use super::{Band, Onset};
use crate::error::EngineError;

/// Peak picking parameters for one band
#[derive(Debug, Clone, Copy)]
pub struct PeakPickParams {
    /// Seconds per novelty frame
    pub hop_seconds: f64,
    /// Half-width of the local statistics window, in seconds
    pub window_seconds: f64,
    /// Multiplier k in `mean + k * std`
    pub sigma_k: f32,
    /// Minimum gap between accepted onsets, in seconds
    pub min_gap_seconds: f64,
    /// Percentile the strengths are normalized against
    pub strength_percentile: f32,
}

/// Pick onsets from a novelty curve
///
/// Strength is the excess over the local threshold, divided by the
/// `strength_percentile` excess and capped at 1.0.
///
/// # Errors
///
/// Returns `EngineError::InvalidInput` for a non-positive hop
pub fn pick_peaks(
    novelty: &[f32],
    params: &PeakPickParams,
    band: Option<Band>,
) -> Result<Vec<Onset>, EngineError> {
    if params.hop_seconds <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "Hop duration must be > 0, got {}",
            params.hop_seconds
        )));
    }

    let n = novelty.len();
    if n < 3 {
        return Ok(Vec::new());
    }

    let win = (params.window_seconds / params.hop_seconds).round() as usize;
    let min_gap = (params.min_gap_seconds / params.hop_seconds).round() as usize;

    // Prefix sums for O(1) windowed mean / variance
    let mut sum = Vec::with_capacity(n + 1);
    let mut sum_sq = Vec::with_capacity(n + 1);
    sum.push(0.0f64);
    sum_sq.push(0.0f64);
    for &x in novelty {
        let x = x as f64;
        sum.push(sum[sum.len() - 1] + x);
        sum_sq.push(sum_sq[sum_sq.len() - 1] + x * x);
    }

    let mut raw: Vec<(f64, f32)> = Vec::new();
    let mut last_frame: Option<usize> = None;

    for i in 1..(n - 1) {
        let v = novelty[i];
        if v <= novelty[i - 1] || v < novelty[i + 1] {
            continue;
        }
        if let Some(last) = last_frame {
            if i - last < min_gap {
                continue;
            }
        }

        let l = i.saturating_sub(win);
        let r = (i + win).min(n - 1);
        let count = (r - l + 1) as f64;
        let mean = (sum[r + 1] - sum[l]) / count;
        let var = ((sum_sq[r + 1] - sum_sq[l]) / count - mean * mean).max(0.0);
        let threshold = (mean + var.sqrt() * params.sigma_k as f64) as f32;

        if v > threshold {
            raw.push((i as f64 * params.hop_seconds, v - threshold));
            last_frame = Some(i);
        }
    }

    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let strengths: Vec<f32> = raw.iter().map(|&(_, s)| s).collect();
    let mut reference = percentile_threshold(&strengths, params.strength_percentile)?;
    if reference <= 0.0 {
        reference = 0.001;
    }

    Ok(raw
        .into_iter()
        .map(|(time, s)| Onset {
            time,
            strength: (s / reference).min(1.0),
            band,
        })
        .collect())
}

/// Compute percentile-based threshold
///
/// # Arguments
///
/// * `values` - Values to threshold
/// * `percentile` - Percentile (0.0-1.0), e.g., 0.8 for 80th percentile
///
/// # Returns
///
/// `sorted[floor(len * percentile)]`, clamped to the last element
///
/// # Errors
///
/// Returns `EngineError` if values are empty or percentile is out of range
pub fn percentile_threshold(values: &[f32], percentile: f32) -> Result<f32, EngineError> {
    if values.is_empty() {
        return Err(EngineError::InvalidInput(
            "Empty values for threshold calculation".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&percentile) {
        return Err(EngineError::InvalidInput(format!(
            "Percentile must be in [0.0, 1.0], got {}",
            percentile
        )));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let threshold_idx = ((sorted.len() as f32) * percentile) as usize;
    let threshold_idx = threshold_idx.min(sorted.len() - 1);

    Ok(sorted[threshold_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PeakPickParams {
        PeakPickParams {
            hop_seconds: 0.01,
            window_seconds: 0.35,
            sigma_k: 1.3,
            min_gap_seconds: 0.07,
            strength_percentile: 0.95,
        }
    }

    /// Spikes every `period` frames on a flat floor
    fn spike_train(len: usize, period: usize, height: f32) -> Vec<f32> {
        (0..len)
            .map(|i| if i % period == period / 2 { height } else { 0.01 })
            .collect()
    }

    #[test]
    fn test_pick_peaks_spike_train() {
        let novelty = spike_train(500, 50, 1.0);
        let onsets = pick_peaks(&novelty, &params(), Some(Band::Mid)).unwrap();
        assert_eq!(onsets.len(), 10);
        for (k, o) in onsets.iter().enumerate() {
            let expected = (25 + 50 * k) as f64 * 0.01;
            assert!((o.time - expected).abs() < 1e-9);
            assert!(o.strength > 0.0 && o.strength <= 1.0);
            assert_eq!(o.band, Some(Band::Mid));
        }
    }

    #[test]
    fn test_pick_peaks_respects_min_gap() {
        // Two peaks 3 frames apart; the min gap is 7 frames
        let mut novelty = vec![0.0f32; 200];
        novelty[100] = 1.0;
        novelty[103] = 0.9;
        let onsets = pick_peaks(&novelty, &params(), None).unwrap();
        assert_eq!(onsets.len(), 1);
        assert!((onsets[0].time - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pick_peaks_flat_curve() {
        let novelty = vec![0.5f32; 300];
        assert!(pick_peaks(&novelty, &params(), None).unwrap().is_empty());
    }

    #[test]
    fn test_strongest_peak_normalizes_to_one() {
        let mut novelty = vec![0.0f32; 400];
        novelty[50] = 0.2;
        novelty[150] = 0.4;
        novelty[250] = 2.0;
        let onsets = pick_peaks(&novelty, &params(), None).unwrap();
        assert_eq!(onsets.len(), 3);
        let max = onsets.iter().map(|o| o.strength).fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(onsets[0].strength < onsets[1].strength);
    }

    #[test]
    fn test_percentile_threshold_basic() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let threshold = percentile_threshold(&values, 0.8).unwrap();
        assert!((threshold - 5.0).abs() < 0.1);

        let threshold_50 = percentile_threshold(&values, 0.5).unwrap();
        assert!((threshold_50 - 3.0).abs() < 0.1);
    }

    #[test]
    fn test_percentile_threshold_invalid() {
        assert!(percentile_threshold(&[], 0.8).is_err());
        let values = vec![1.0, 2.0, 3.0];
        assert!(percentile_threshold(&values, -0.1).is_err());
        assert!(percentile_threshold(&values, 1.1).is_err());
    }
}
