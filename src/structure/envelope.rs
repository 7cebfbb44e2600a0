//! Smoothed RMS energy envelope
//!
//! Long-window RMS sampled at a short hop, then moving-average smoothed.
//! Used to rate bars against the track's own loudness distribution.

use crate::config::StructureConfig;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// One envelope sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeFrame {
    /// Window start time in seconds
    pub time: f64,
    /// Smoothed RMS
    pub rms: f32,
}

/// Energy envelope of a whole track
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnergyEnvelope {
    /// Frames in time order
    pub frames: Vec<EnvelopeFrame>,
}

/// Loudness percentiles over the playable range, with enforced spreads
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyPercentiles {
    /// 20th percentile (pulled down to at most p50 - 15% of the range)
    pub p20: f32,
    /// Median
    pub p50: f32,
    /// 80th percentile (pushed up to at least p50 + 15% of the range)
    pub p80: f32,
    /// 90th percentile (pushed up to at least p80 + 10% of the range)
    pub p90: f32,
}

impl EnergyEnvelope {
    /// Compute the envelope of a mono signal
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for a zero sample rate or
    /// non-positive window / hop
    pub fn compute(
        samples: &[f32],
        sample_rate: u32,
        config: &StructureConfig,
    ) -> Result<Self, EngineError> {
        if sample_rate == 0 {
            return Err(EngineError::InvalidInput(
                "Invalid sample rate: 0".to_string(),
            ));
        }

        let window = (sample_rate as f64 * config.envelope_window_s).round() as usize;
        let hop = (sample_rate as f64 * config.envelope_hop_s).round() as usize;
        if window == 0 || hop == 0 {
            return Err(EngineError::InvalidInput(format!(
                "Envelope window ({}) and hop ({}) must be > 0 samples",
                window, hop
            )));
        }

        // Prefix sums of squares for O(1) window energy
        let mut energy = Vec::with_capacity(samples.len() + 1);
        energy.push(0.0f64);
        for &s in samples {
            let last = energy[energy.len() - 1];
            energy.push(last + (s as f64) * (s as f64));
        }

        let mut raw = Vec::new();
        let mut i = 0;
        while i + window <= samples.len() {
            let e = (energy[i + window] - energy[i]) / window as f64;
            raw.push(EnvelopeFrame {
                time: i as f64 / sample_rate as f64,
                rms: e.sqrt() as f32,
            });
            i += hop;
        }

        let radius = config.envelope_smoothing;
        let frames = (0..raw.len())
            .map(|i| {
                let l = i.saturating_sub(radius);
                let r = (i + radius).min(raw.len() - 1);
                let sum: f32 = raw[l..=r].iter().map(|f| f.rms).sum();
                EnvelopeFrame {
                    time: raw[i].time,
                    rms: sum / (r - l + 1) as f32,
                }
            })
            .collect::<Vec<_>>();

        log::debug!(
            "Energy envelope: {} frames (window {} / hop {} samples)",
            frames.len(),
            window,
            hop
        );

        Ok(Self { frames })
    }

    /// Mean smoothed RMS of frames starting in `[t0, t1)` (0 if none)
    pub fn mean_in(&self, t0: f64, t1: f64) -> f32 {
        let start = self.frames.partition_point(|f| f.time < t0);
        let (sum, count) = self.frames[start..]
            .iter()
            .take_while(|f| f.time < t1)
            .fold((0.0f32, 0usize), |(s, c), f| (s + f.rms, c + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    /// Percentiles of frames inside `[from, to]`
    pub fn percentiles(&self, from: f64, to: f64) -> EnergyPercentiles {
        let mut values: Vec<f32> = self
            .frames
            .iter()
            .filter(|f| f.time >= from && f.time <= to)
            .map(|f| f.rms)
            .collect();

        if values.is_empty() {
            return EnergyPercentiles {
                p20: 0.0,
                p50: 0.5,
                p80: 1.0,
                p90: 1.0,
            };
        }

        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let at = |p: f64| values[((values.len() - 1) as f64 * p).floor() as usize];

        let range = at(0.95) - at(0.05);
        let p50 = at(0.5);
        let p80 = at(0.8).max(p50 + range * 0.15);
        let p90 = at(0.9).max(p80 + range * 0.10);
        let p20 = at(0.2).min(p50 - range * 0.15);

        EnergyPercentiles { p20, p50, p80, p90 }
    }
}
