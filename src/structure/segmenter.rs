//! Density-based section segmentation
//!
//! Algorithm:
//! 1. Sample onset density (onsets per second) at a regular cadence of a few
//!    beats, clamped to a fixed range in seconds, and smooth it
//! 2. Boundary candidates are local valleys, crests and steepest slopes of
//!    the smoothed curve whose before/after contrast exceeds a fraction of
//!    the curve's range
//! 3. Snap candidates to the nearest bar start (4 beats from the downbeat phase)
//! 4. Greedily accept the strongest candidates while every section keeps the
//!    minimum duration, until the target count is reached; top up with evenly
//!    spaced bar-snapped boundaries if detection found too few
//! 5. Label sections by position and density rank, rate energy by terciles

use super::{EnergyTier, Section, SectionRole};
use crate::config::StructureConfig;
use crate::error::EngineError;
use crate::features::onset::threshold::percentile_threshold;

/// Timeline and beat grid the segmentation works on
#[derive(Debug, Clone, Copy)]
pub struct Timeline {
    /// First playable time
    pub intro: f64,
    /// Last playable time
    pub safe_end: f64,
    /// Seconds per beat
    pub beat_period: f64,
    /// Time of beat 0
    pub downbeat_phase: f64,
}

impl Timeline {
    fn bar_len(&self) -> f64 {
        self.beat_period * 4.0
    }

    /// Nearest bar start to `t`
    pub fn snap_to_bar(&self, t: f64) -> f64 {
        let bar = self.bar_len();
        self.downbeat_phase + ((t - self.downbeat_phase) / bar).round() * bar
    }
}

/// Partition `[intro, safe_end)` into labelled sections
///
/// # Arguments
///
/// * `onset_times` - Merged onset times in seconds, sorted
/// * `timeline` - Playable range and beat grid
/// * `config` - Structure configuration
///
/// # Errors
///
/// Returns `EngineError::InvalidInput` for an empty range or non-positive beat
pub fn segment_sections(
    onset_times: &[f64],
    timeline: &Timeline,
    config: &StructureConfig,
) -> Result<Vec<Section>, EngineError> {
    let span = timeline.safe_end - timeline.intro;
    if !(span > 0.0) {
        return Err(EngineError::InvalidInput(format!(
            "Empty playable range [{:.2}, {:.2}]",
            timeline.intro, timeline.safe_end
        )));
    }
    if !(timeline.beat_period > 0.0) {
        return Err(EngineError::InvalidInput(format!(
            "Beat period must be > 0, got {}",
            timeline.beat_period
        )));
    }

    let min_len = config.min_section_s.max(0.0);
    let by_length = (span / config.seconds_per_section.max(1.0)).round() as usize;
    let fit = if min_len > 0.0 {
        ((span / min_len).floor() as usize).max(1)
    } else {
        usize::MAX
    };
    let target = by_length
        .clamp(config.min_sections, config.max_sections.max(config.min_sections))
        .min(fit)
        .max(1);

    let cadence = (timeline.beat_period * config.density_cadence_beats)
        .clamp(config.min_cadence_s, config.max_cadence_s.max(config.min_cadence_s));
    let density = smoothed_density(onset_times, timeline, cadence, config.density_smoothing);

    let mut boundaries: Vec<f64> = Vec::new();
    if target > 1 {
        let candidates = boundary_candidates(&density, timeline, cadence, config);
        log::debug!(
            "Segmenter: {} density samples at {:.2}s cadence, {} candidates, target {} sections",
            density.len(),
            cadence,
            candidates.len(),
            target
        );

        for (t, _score) in &candidates {
            if boundaries.len() + 1 >= target {
                break;
            }
            if fits(*t, &boundaries, timeline, min_len) {
                boundaries.push(*t);
            }
        }

        if boundaries.len() + 1 < target {
            log::warn!(
                "Only {} section boundaries detected, filling up to {} sections evenly",
                boundaries.len(),
                target
            );
            fill_even(&mut boundaries, target, timeline, min_len);
        }
    }

    boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut edges = Vec::with_capacity(boundaries.len() + 2);
    edges.push(timeline.intro);
    edges.extend(boundaries);
    edges.push(timeline.safe_end);

    let mut sections: Vec<Section> = edges
        .windows(2)
        .map(|w| Section {
            start: w[0],
            end: w[1],
            role: SectionRole::MainA,
            energy: EnergyTier::Mid,
            density: onsets_per_second(onset_times, w[0], w[1]),
        })
        .collect();

    label_sections(&mut sections, timeline);
    rate_energy(&mut sections);

    for s in &sections {
        log::debug!(
            "Section {:>7.2}s - {:>7.2}s {:<6} {:?} ({:.2} onsets/s)",
            s.start,
            s.end,
            s.role.to_string(),
            s.energy,
            s.density
        );
    }

    Ok(sections)
}

fn onsets_per_second(onset_times: &[f64], t0: f64, t1: f64) -> f32 {
    if t1 <= t0 {
        return 0.0;
    }
    let lo = onset_times.partition_point(|&t| t < t0);
    let hi = onset_times.partition_point(|&t| t < t1);
    ((hi - lo) as f64 / (t1 - t0)) as f32
}

/// Density samples `(time, onsets/s)` across the playable range, smoothed
fn smoothed_density(
    onset_times: &[f64],
    timeline: &Timeline,
    cadence: f64,
    radius: usize,
) -> Vec<(f64, f32)> {
    let mut raw = Vec::new();
    let mut t = timeline.intro;
    while t < timeline.safe_end {
        raw.push((t, onsets_per_second(onset_times, t - cadence, t + cadence)));
        t += cadence;
    }

    (0..raw.len())
        .map(|i| {
            let l = i.saturating_sub(radius);
            let r = (i + radius).min(raw.len() - 1);
            let sum: f32 = raw[l..=r].iter().map(|&(_, d)| d).sum();
            (raw[i].0, sum / (r - l + 1) as f32)
        })
        .collect()
}

/// Bar-snapped candidates, strongest first
fn boundary_candidates(
    density: &[(f64, f32)],
    timeline: &Timeline,
    cadence: f64,
    config: &StructureConfig,
) -> Vec<(f64, f32)> {
    let n = density.len();
    if n < 3 {
        return Vec::new();
    }

    let values: Vec<f32> = density.iter().map(|&(_, d)| d).collect();
    let max = values.iter().copied().fold(f32::MIN, f32::max);
    let min = values.iter().copied().fold(f32::MAX, f32::min);
    let range = max - min;
    if range <= f32::EPSILON {
        return Vec::new();
    }
    let threshold = range * config.boundary_jump_ratio;

    // Contrast between the mean density just before and just after each point
    let k = config.density_smoothing + 1;
    let contrast: Vec<f32> = (0..n)
        .map(|i| {
            if i == 0 || i + 1 >= n {
                return 0.0;
            }
            let before = &values[i.saturating_sub(k)..i];
            let after = &values[i..(i + k).min(n)];
            let mean = |s: &[f32]| s.iter().sum::<f32>() / s.len() as f32;
            (mean(after) - mean(before)).abs()
        })
        .collect();

    let mut candidates: Vec<(f64, f32)> = Vec::new();
    for i in 1..n - 1 {
        let v = values[i];
        let valley = v <= values[i - 1] && v <= values[i + 1];
        let crest = v >= values[i - 1] && v >= values[i + 1];
        let steepest = contrast[i] >= contrast[i - 1] && contrast[i] >= contrast[i + 1];
        if !(valley || crest || steepest) || contrast[i] < threshold {
            continue;
        }

        let snapped = timeline.snap_to_bar(density[i].0);
        // Snapping must not move a boundary further than one cadence step
        if (snapped - density[i].0).abs() > cadence.max(timeline.bar_len()) {
            continue;
        }
        match candidates.iter_mut().find(|(t, _)| (*t - snapped).abs() < 1e-6) {
            Some(existing) => existing.1 = existing.1.max(contrast[i]),
            None => candidates.push((snapped, contrast[i])),
        }
    }

    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    candidates
}

/// True if a boundary at `t` keeps every section at least `min_len` long
fn fits(t: f64, boundaries: &[f64], timeline: &Timeline, min_len: f64) -> bool {
    t - timeline.intro >= min_len
        && timeline.safe_end - t >= min_len
        && boundaries.iter().all(|&b| (b - t).abs() >= min_len)
}

fn fill_even(boundaries: &mut Vec<f64>, target: usize, timeline: &Timeline, min_len: f64) {
    let span = timeline.safe_end - timeline.intro;
    for j in 1..target {
        if boundaries.len() + 1 >= target {
            break;
        }
        let even = timeline.intro + span * j as f64 / target as f64;
        let snapped = timeline.snap_to_bar(even);
        if fits(snapped, boundaries, timeline, min_len) {
            boundaries.push(snapped);
        } else if fits(even, boundaries, timeline, min_len) {
            boundaries.push(even);
        }
    }
}

fn label_sections(sections: &mut [Section], timeline: &Timeline) {
    let n = sections.len();
    if n == 1 {
        sections[0].role = SectionRole::MainA;
        return;
    }

    let midpoint = timeline.intro + (timeline.safe_end - timeline.intro) * 0.5;
    for s in sections.iter_mut() {
        let center = (s.start + s.end) * 0.5;
        s.role = if center < midpoint {
            SectionRole::MainA
        } else {
            SectionRole::MainB
        };
    }

    if n > 2 {
        let mut peak = 1;
        for i in 1..n - 1 {
            if sections[i].density > sections[peak].density {
                peak = i;
            }
        }
        sections[peak].role = SectionRole::Peak;
    }

    sections[0].role = SectionRole::Intro;
    sections[n - 1].role = SectionRole::Outro;
}

fn rate_energy(sections: &mut [Section]) {
    let densities: Vec<f32> = sections.iter().map(|s| s.density).collect();
    let (lower, upper) = match (
        percentile_threshold(&densities, 1.0 / 3.0),
        percentile_threshold(&densities, 2.0 / 3.0),
    ) {
        (Ok(lo), Ok(hi)) => (lo, hi),
        _ => return,
    };

    for s in sections.iter_mut() {
        s.energy = if s.density < lower {
            EnergyTier::Low
        } else if s.density > upper {
            EnergyTier::High
        } else {
            EnergyTier::Mid
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(intro: f64, safe_end: f64) -> Timeline {
        Timeline {
            intro,
            safe_end,
            beat_period: 0.5,
            downbeat_phase: intro,
        }
    }

    /// Onsets every `spacing` seconds inside `[from, to)`
    fn onsets(from: f64, to: f64, spacing: f64) -> Vec<f64> {
        let mut out = Vec::new();
        let mut t = from;
        while t < to {
            out.push(t);
            t += spacing;
        }
        out
    }

    fn assert_partition(sections: &[Section], tl: &Timeline) {
        assert_eq!(sections.first().unwrap().start, tl.intro);
        assert_eq!(sections.last().unwrap().end, tl.safe_end);
        for w in sections.windows(2) {
            assert_eq!(w[0].end, w[1].start);
            assert!(w[0].start < w[0].end);
        }
    }

    #[test]
    fn test_sections_partition_range() {
        let tl = timeline(3.6, 180.0);
        let times = onsets(3.6, 180.0, 0.5);
        let sections = segment_sections(&times, &tl, &StructureConfig::default()).unwrap();
        assert!(sections.len() >= 4 && sections.len() <= 7, "got {}", sections.len());
        assert_partition(&sections, &tl);
        assert_eq!(sections[0].role, SectionRole::Intro);
        assert_eq!(sections.last().unwrap().role, SectionRole::Outro);
    }

    #[test]
    fn test_density_jump_becomes_boundary() {
        let tl = timeline(0.0, 160.0);
        // Sparse, dense, sparse, very dense
        let mut times = onsets(0.0, 40.0, 2.0);
        times.extend(onsets(40.0, 80.0, 0.25));
        times.extend(onsets(80.0, 120.0, 2.0));
        times.extend(onsets(120.0, 160.0, 0.2));
        let sections = segment_sections(&times, &tl, &StructureConfig::default()).unwrap();
        assert_partition(&sections, &tl);

        let near = |t: f64| sections.iter().any(|s| (s.start - t).abs() <= 4.0);
        assert!(near(40.0), "no boundary near 40s: {:?}", sections);
        assert!(near(80.0), "no boundary near 80s: {:?}", sections);
        assert!(near(120.0), "no boundary near 120s: {:?}", sections);

        let peak = sections.iter().find(|s| s.role == SectionRole::Peak).unwrap();
        assert!(peak.start >= 35.0 && peak.end <= 125.0);
    }

    #[test]
    fn test_boundaries_snap_to_bars_and_respect_min_length() {
        let tl = timeline(2.2, 200.0);
        let mut times = onsets(2.2, 90.0, 1.0);
        times.extend(onsets(90.0, 200.0, 0.25));
        let config = StructureConfig::default();
        let sections = segment_sections(&times, &tl, &config).unwrap();
        for s in &sections {
            assert!(s.duration() >= config.min_section_s - 1e-9);
        }
        for s in sections.iter().skip(1) {
            let bars = (s.start - tl.downbeat_phase) / 2.0;
            assert!((bars - bars.round()).abs() < 1e-6, "{} is off the bar grid", s.start);
        }
    }

    #[test]
    fn test_short_track_single_section() {
        let tl = timeline(3.6, 15.6);
        let times = onsets(3.6, 15.6, 0.5);
        let sections = segment_sections(&times, &tl, &StructureConfig::default()).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].role, SectionRole::MainA);
        assert_partition(&sections, &tl);
    }

    #[test]
    fn test_no_onsets_still_partitions() {
        let tl = timeline(3.6, 150.0);
        let sections = segment_sections(&[], &tl, &StructureConfig::default()).unwrap();
        assert!(sections.len() >= 4);
        assert_partition(&sections, &tl);
        assert!(sections.iter().all(|s| s.energy == EnergyTier::Mid));
    }

    #[test]
    fn test_invalid_range() {
        let tl = timeline(10.0, 5.0);
        assert!(segment_sections(&[], &tl, &StructureConfig::default()).is_err());
    }
}
