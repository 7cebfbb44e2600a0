//! Three-band spectral flux onset detection
//!
//! Detects onsets separately in a low, mid and high frequency band.
//!
//! Algorithm:
//! 1. Divide audio into overlapping Hann-windowed frames (frame_size, hop_size)
//! 2. FFT each frame and take `ln(1 + |X[k]|)` per bin
//! 3. Per band, sum the positive bin-wise increase over the previous frame:
//!    `flux[n] = Σ_k max(0, M[n][k] - M[n-1][k])`
//! 4. Peak-pick each band's flux curve with its own sensitivity and minimum gap
//!
//! Spectra are computed in parallel over blocks of frames; each block
//! recomputes the frame just before it so the flux stays exact.
//!
//! # Example
//!
//! ```no_run
//! use abyssal_groove::config::AnalysisConfig;
//! use abyssal_groove::features::onset::band_flux::detect_band_onsets;
//!
//! let samples = vec![0.0f32; 44100 * 30];
//! let bands = detect_band_onsets(&samples, 44100, &AnalysisConfig::default())?;
//! println!("{} merged onsets", bands.all.len());
//! # Ok::<(), abyssal_groove::EngineError>(())
//! ```

use super::merge::merge_band_onsets;
use super::threshold::{pick_peaks, PeakPickParams};
use super::{Band, BandOnsets};
use crate::config::AnalysisConfig;
use crate::error::EngineError;
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Frames processed sequentially by one parallel task
const FRAMES_PER_BLOCK: usize = 256;

/// Per-band novelty curves
#[derive(Debug, Clone)]
pub struct BandFlux {
    /// Novelty per band, indexed by [`Band::index`]
    pub bands: [Vec<f32>; 3],

    /// Seconds per frame
    pub hop_seconds: f64,
}

impl BandFlux {
    /// Number of frames
    pub fn len(&self) -> usize {
        self.bands[0].len()
    }

    /// True when the signal was shorter than one frame
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// FFT bin ranges of the three bands (inclusive)
#[derive(Debug, Clone, Copy)]
struct BinLayout {
    first: usize,
    low_end: usize,
    mid_end: usize,
    high_end: usize,
}

impl BinLayout {
    fn new(edges_hz: &[f32; 4], frame_size: usize, sample_rate: u32) -> Self {
        let bin_hz = sample_rate as f32 / frame_size as f32;
        let max_bin = frame_size / 2 - 1;
        let to_bin = |hz: f32| ((hz / bin_hz).round() as usize).min(max_bin);

        let first = to_bin(edges_hz[0]).max(1);
        let low_end = to_bin(edges_hz[1]).max(first);
        let mid_end = to_bin(edges_hz[2]).max(low_end);
        let high_end = to_bin(edges_hz[3]).max(mid_end);
        Self {
            first,
            low_end,
            mid_end,
            high_end,
        }
    }

    fn width(&self) -> usize {
        self.high_end - self.first + 1
    }

    /// Band of an offset into the magnitude vector
    fn band_of(&self, offset: usize) -> usize {
        let k = self.first + offset;
        if k <= self.low_end {
            0
        } else if k <= self.mid_end {
            1
        } else {
            2
        }
    }
}

fn hann_window(n: usize) -> Vec<f32> {
    let denom = (n.max(2) - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
        .collect()
}

/// Log-magnitudes of the band bins of one frame
fn frame_magnitudes(
    frame: &[f32],
    window: &[f32],
    fft: &Arc<dyn Fft<f32>>,
    layout: &BinLayout,
    scratch: &mut [Complex<f32>],
    out: &mut Vec<f32>,
) {
    for ((c, &s), &w) in scratch.iter_mut().zip(frame).zip(window) {
        *c = Complex::new(s * w, 0.0);
    }
    fft.process(scratch);

    out.clear();
    out.extend(
        scratch[layout.first..=layout.high_end]
            .iter()
            .map(|c| c.norm().ln_1p()),
    );
}

fn frame_rms(frame: &[f32]) -> f32 {
    let sum_sq: f32 = frame.iter().map(|&x| x * x).sum();
    (sum_sq / frame.len().max(1) as f32).sqrt()
}

/// Compute the three per-band novelty curves
///
/// # Errors
///
/// Returns `EngineError::InvalidInput` for a zero sample rate or a zero
/// frame/hop size
pub fn compute_band_flux(
    samples: &[f32],
    sample_rate: u32,
    config: &AnalysisConfig,
) -> Result<BandFlux, EngineError> {
    let n = config.frame_size;
    let hop = config.hop_size;

    if sample_rate == 0 {
        return Err(EngineError::InvalidInput(
            "Invalid sample rate: 0".to_string(),
        ));
    }
    if n < 4 {
        return Err(EngineError::InvalidInput(format!(
            "Frame size must be >= 4, got {}",
            n
        )));
    }
    if hop == 0 {
        return Err(EngineError::InvalidInput(
            "Hop size must be > 0".to_string(),
        ));
    }

    let hop_seconds = hop as f64 / sample_rate as f64;

    if samples.len() <= n {
        log::warn!(
            "Frame size ({}) not smaller than audio length ({}), no onset frames",
            n,
            samples.len()
        );
        return Ok(BandFlux {
            bands: [Vec::new(), Vec::new(), Vec::new()],
            hop_seconds,
        });
    }

    let frames = (samples.len() - n) / hop;
    let layout = BinLayout::new(&config.band_edges_hz, n, sample_rate);
    let width = layout.width();
    let window = hann_window(n);
    let fft: Arc<dyn Fft<f32>> = FftPlanner::new().plan_fft_forward(n);

    log::debug!(
        "Band flux: {} frames, frame={}, hop={}, bins low={}..={} mid=..={} high=..={}",
        frames,
        n,
        hop,
        layout.first,
        layout.low_end,
        layout.mid_end,
        layout.high_end
    );

    let block_starts: Vec<usize> = (0..frames).step_by(FRAMES_PER_BLOCK).collect();

    let blocks: Vec<([Vec<f32>; 3], Vec<f32>)> = block_starts
        .par_iter()
        .map_init(
            || {
                (
                    vec![Complex::new(0.0f32, 0.0); n],
                    Vec::with_capacity(width),
                    Vec::with_capacity(width),
                )
            },
            |(scratch, prev, cur), &start| {
                let end = (start + FRAMES_PER_BLOCK).min(frames);

                if start == 0 {
                    prev.clear();
                    prev.resize(width, 0.0);
                } else {
                    let base = (start - 1) * hop;
                    frame_magnitudes(&samples[base..base + n], &window, &fft, &layout, scratch, prev);
                }

                let mut flux = [
                    Vec::with_capacity(end - start),
                    Vec::with_capacity(end - start),
                    Vec::with_capacity(end - start),
                ];
                let mut rms = Vec::with_capacity(end - start);

                for f in start..end {
                    let frame = &samples[f * hop..f * hop + n];
                    frame_magnitudes(frame, &window, &fft, &layout, scratch, cur);

                    let mut sums = [0.0f32; 3];
                    for (offset, (&m, &p)) in cur.iter().zip(prev.iter()).enumerate() {
                        sums[layout.band_of(offset)] += (m - p).max(0.0);
                    }
                    for (band, s) in flux.iter_mut().zip(sums) {
                        band.push(s);
                    }
                    rms.push(frame_rms(frame));

                    std::mem::swap(prev, cur);
                }

                (flux, rms)
            },
        )
        .collect();

    let mut bands = [
        Vec::with_capacity(frames),
        Vec::with_capacity(frames),
        Vec::with_capacity(frames),
    ];
    let mut rms = Vec::with_capacity(frames);
    for (flux, block_rms) in blocks {
        for (out, part) in bands.iter_mut().zip(flux) {
            out.extend(part);
        }
        rms.extend(block_rms);
    }

    if config.rms_weighting > 0.0 {
        let max_rms = rms.iter().copied().fold(0.0f32, f32::max);
        if max_rms > 0.0 {
            for band in bands.iter_mut() {
                for (v, &r) in band.iter_mut().zip(&rms) {
                    *v += config.rms_weighting * r / max_rms;
                }
            }
        }
    }

    Ok(BandFlux { bands, hop_seconds })
}

/// Detect onsets per band and merge them into one stream
///
/// # Errors
///
/// Returns `EngineError` if parameters are invalid
pub fn detect_band_onsets(
    samples: &[f32],
    sample_rate: u32,
    config: &AnalysisConfig,
) -> Result<BandOnsets, EngineError> {
    let flux = compute_band_flux(samples, sample_rate, config)?;

    let mut per_band: [Vec<_>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for band in Band::ALL {
        let i = band.index();
        let params = PeakPickParams {
            hop_seconds: flux.hop_seconds,
            window_seconds: config.threshold_window_s,
            sigma_k: config.threshold_sigma[i],
            min_gap_seconds: config.min_onset_gap_s[i],
            strength_percentile: config.strength_percentile,
        };
        per_band[i] = pick_peaks(&flux.bands[i], &params, Some(band))?;
    }

    let [low, mid, high] = per_band;
    let all = merge_band_onsets(
        &[low.as_slice(), mid.as_slice(), high.as_slice()],
        config.merge_tolerance_s,
    );

    log::debug!(
        "Band onsets: low={}, mid={}, high={}, merged={}",
        low.len(),
        mid.len(),
        high.len(),
        all.len()
    );

    Ok(BandOnsets {
        low,
        mid,
        high,
        all,
        frames: flux.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decaying noise-like bursts (kick + hat mix) every `interval` seconds
    fn click_track(duration: f32, interval: f32, sample_rate: u32) -> Vec<f32> {
        let sr = sample_rate as f32;
        let len = (duration * sr) as usize;
        let mut samples = vec![0.0f32; len];
        let burst = (0.08 * sr) as usize;
        let step = (interval * sr) as usize;
        let mut pos = (0.25 * sr) as usize;
        while pos < len {
            for i in 0..burst.min(len - pos) {
                let t = i as f32 / sr;
                let env = (-t * 40.0).exp();
                let kick = (2.0 * std::f32::consts::PI * 80.0 * t).sin();
                let tone = (2.0 * std::f32::consts::PI * 1000.0 * t).sin();
                let hat = (2.0 * std::f32::consts::PI * 6000.0 * t).sin();
                samples[pos + i] = env * (0.5 * kick + 0.3 * tone + 0.2 * hat);
            }
            pos += step;
        }
        samples
    }

    #[test]
    fn test_band_flux_lengths() {
        let samples = click_track(3.0, 0.5, 44100);
        let flux = compute_band_flux(&samples, 44100, &AnalysisConfig::default()).unwrap();
        let expected = (samples.len() - 2048) / 512;
        assert_eq!(flux.len(), expected);
        assert!(flux.bands.iter().all(|b| b.len() == expected));
    }

    #[test]
    fn test_block_boundaries_do_not_change_flux() {
        // Long enough to span several parallel blocks
        let samples = click_track(8.0, 0.37, 44100);
        let config = AnalysisConfig::default();
        let flux = compute_band_flux(&samples, 44100, &config).unwrap();
        assert!(flux.len() > FRAMES_PER_BLOCK * 2);

        // Sequential reference over every frame
        let n = config.frame_size;
        let layout = BinLayout::new(&config.band_edges_hz, n, 44100);
        let window = hann_window(n);
        let fft: Arc<dyn Fft<f32>> = FftPlanner::new().plan_fft_forward(n);
        let mut scratch = vec![Complex::new(0.0f32, 0.0); n];
        let mut prev = vec![0.0f32; layout.width()];
        let mut cur = Vec::new();
        for f in 0..flux.len() {
            let frame = &samples[f * config.hop_size..f * config.hop_size + n];
            frame_magnitudes(frame, &window, &fft, &layout, &mut scratch, &mut cur);
            let mut sums = [0.0f32; 3];
            for (offset, (&m, &p)) in cur.iter().zip(prev.iter()).enumerate() {
                sums[layout.band_of(offset)] += (m - p).max(0.0);
            }
            for b in 0..3 {
                assert_eq!(flux.bands[b][f], sums[b], "band {} frame {}", b, f);
            }
            std::mem::swap(&mut prev, &mut cur);
        }
    }

    #[test]
    fn test_detects_periodic_clicks_in_all_bands() {
        let samples = click_track(10.0, 0.5, 44100);
        let bands = detect_band_onsets(&samples, 44100, &AnalysisConfig::default()).unwrap();
        assert!(bands.all.len() >= 14, "got {} merged onsets", bands.all.len());
        assert!(!bands.low.is_empty());
        assert!(!bands.mid.is_empty());
        assert!(!bands.high.is_empty());
        assert!(bands.all.windows(2).all(|w| w[1].time > w[0].time));
    }

    #[test]
    fn test_silence_has_no_onsets() {
        let samples = vec![0.0f32; 44100 * 3];
        let bands = detect_band_onsets(&samples, 44100, &AnalysisConfig::default()).unwrap();
        assert!(bands.all.is_empty());
    }

    #[test]
    fn test_too_short_audio() {
        let samples = vec![0.5f32; 1000];
        let bands = detect_band_onsets(&samples, 44100, &AnalysisConfig::default()).unwrap();
        assert!(bands.all.is_empty());
        assert_eq!(bands.frames, 0);
    }

    #[test]
    fn test_onsets_report_flux_frame_count() {
        let samples = click_track(4.0, 0.5, 44100);
        let config = AnalysisConfig::default();
        let flux = compute_band_flux(&samples, 44100, &config).unwrap();
        let bands = detect_band_onsets(&samples, 44100, &config).unwrap();
        assert_eq!(bands.frames, flux.len());
        assert_eq!(bands.frames, (samples.len() - 2048) / 512);
    }

    #[test]
    fn test_invalid_parameters() {
        let samples = vec![0.5f32; 44100];
        assert!(compute_band_flux(&samples, 0, &AnalysisConfig::default()).is_err());

        let config = AnalysisConfig {
            hop_size: 0,
            ..AnalysisConfig::default()
        };
        assert!(compute_band_flux(&samples, 44100, &config).is_err());
    }
}
