//! Merging of per-band onset streams

use super::Onset;

/// Merge band onset streams into one time-sorted stream
///
/// Walking the union in time order, an onset is kept only if it lies more
/// than `tolerance` seconds after the last kept one. Kept onsets carry their
/// original strength and have their band tag cleared.
pub fn merge_band_onsets(streams: &[&[Onset]], tolerance: f64) -> Vec<Onset> {
    let mut union: Vec<Onset> = streams.iter().flat_map(|s| s.iter().copied()).collect();
    // Stable: ties keep stream order (low before mid before high)
    union.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));

    let mut merged: Vec<Onset> = Vec::with_capacity(union.len());
    for onset in union {
        let keep = match merged.last() {
            Some(last) => onset.time - last.time > tolerance,
            None => true,
        };
        if keep {
            merged.push(Onset { band: None, ..onset });
        }
    }
    merged
}
