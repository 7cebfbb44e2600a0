//! Per-bar intensity tiers
//!
//! Every bar of the playable range gets a tier from 0 (sparse) to 4 (dense):
//! its mean envelope energy, scaled up later in the track, is compared to
//! the track's energy percentiles; then each bar is promoted against its
//! local neighbourhood, high tiers carry over into following bars, and the
//! enclosing section's role and energy cap or floor the result.

use super::envelope::{EnergyEnvelope, EnergyPercentiles};
use super::segmenter::Timeline;
use super::{section_at, EnergyTier, Section, SectionRole};
use crate::chart::random::RandomSource;
use crate::config::StructureConfig;
use serde::{Deserialize, Serialize};

/// Highest intensity tier
pub const MAX_TIER: u8 = 4;

/// Bars on each side included in the local energy average
const LOCAL_RADIUS: usize = 4;

/// One bar of the playable range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar start in seconds
    pub start: f64,
    /// Bar end in seconds (clipped to the playable end)
    pub end: f64,
    /// Mean envelope energy over the bar
    pub energy: f32,
    /// Intensity tier, 0-4
    pub tier: u8,
}

fn raw_tier(value: f32, pct: &EnergyPercentiles) -> u8 {
    if value > pct.p90 {
        4
    } else if value > pct.p80 {
        3
    } else if value > pct.p50 {
        2
    } else if value > pct.p20 {
        1
    } else {
        0
    }
}

/// Cap or floor a tier by the enclosing section's role and energy
fn section_bias(tier: u8, section: &Section) -> u8 {
    let tier = match section.role {
        SectionRole::Intro | SectionRole::Outro => tier.min(2),
        SectionRole::Peak => tier.max(2),
        SectionRole::MainA | SectionRole::MainB => tier,
    };
    match section.energy {
        EnergyTier::Low => tier.min(2),
        EnergyTier::Mid => tier,
        EnergyTier::High => tier.max(2),
    }
}

/// Rate every bar in the playable range
///
/// Bars start on the first bar line at or after `timeline.intro`.
pub fn build_bar_tiers<R: RandomSource>(
    envelope: &EnergyEnvelope,
    timeline: &Timeline,
    sections: &[Section],
    config: &StructureConfig,
    rng: &mut R,
) -> Vec<Bar> {
    let bar_len = timeline.beat_period * 4.0;
    if !(bar_len > 0.0) || timeline.safe_end <= timeline.intro {
        return Vec::new();
    }

    let pct = envelope.percentiles(timeline.intro, timeline.safe_end);
    let span = timeline.safe_end - timeline.intro;
    let midpoint = timeline.intro + span * 0.5;
    let three_quarters = timeline.intro + span * 0.75;

    // Raw tiers
    let mut bars = Vec::new();
    let phase = timeline.downbeat_phase;
    let mut t = phase + ((timeline.intro - phase) / bar_len).ceil() * bar_len;
    while t < timeline.safe_end {
        let end = (t + bar_len).min(timeline.safe_end);
        let energy = envelope.mean_in(t, end);
        let position_factor = if t >= three_quarters {
            1.20
        } else if t >= midpoint {
            1.10
        } else {
            1.00
        };
        bars.push(Bar {
            start: t,
            end,
            energy,
            tier: raw_tier(energy * position_factor, &pct),
        });
        t += bar_len;
    }

    // Local promotion and carry-over
    let n = bars.len();
    for i in 0..n {
        let l = i.saturating_sub(LOCAL_RADIUS);
        let r = (i + LOCAL_RADIUS).min(n - 1);
        let local_avg = bars[l..=r].iter().map(|b| b.energy).sum::<f32>() / (r - l + 1) as f32;
        let energy = bars[i].energy;

        let mut tier = bars[i].tier;
        if energy > local_avg * 1.25 {
            tier = tier.max(2);
        }
        if energy > local_avg * 1.7 {
            tier = tier.max(3);
        }
        if energy > local_avg * 2.0 {
            tier = tier.max(4);
        }
        if i > n / 2 && energy > local_avg * 0.95 && energy > pct.p50 {
            tier = tier.max(2);
        }

        if i > 0 {
            let prev = bars[i - 1].tier;
            if prev >= 4 && tier < prev {
                if energy > local_avg * 0.9 {
                    tier = prev;
                } else if energy > local_avg * 0.65 {
                    tier = prev - 1;
                }
            } else if prev >= 3 && tier < prev {
                if energy > local_avg * 0.85 {
                    tier = prev;
                } else if energy > local_avg * 0.6 {
                    tier = prev - 1;
                }
            }
        }

        if tier == 0 && rng.chance(config.tier_zero_lift_chance) {
            tier = 1;
        }
        bars[i].tier = tier;
    }

    // Section bias
    for bar in bars.iter_mut() {
        if let Some(section) = section_at(sections, bar.start) {
            bar.tier = section_bias(bar.tier, section);
        }
    }

    if log::log_enabled!(log::Level::Debug) {
        let mut histogram = [0usize; MAX_TIER as usize + 1];
        for b in &bars {
            histogram[b.tier as usize] += 1;
        }
        log::debug!(
            "Bar tiers: {} bars, histogram {:?}, p20/p50/p80/p90 = {:.4}/{:.4}/{:.4}/{:.4}",
            bars.len(),
            histogram,
            pct.p20,
            pct.p50,
            pct.p80,
            pct.p90
        );
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::random::SequenceRandom;
    use crate::structure::envelope::EnvelopeFrame;

    /// Envelope sampled every 0.1 s from a level function
    fn envelope(duration: f64, level: impl Fn(f64) -> f32) -> EnergyEnvelope {
        let frames = (0..(duration * 10.0) as usize)
            .map(|i| {
                let time = i as f64 * 0.1;
                EnvelopeFrame {
                    time,
                    rms: level(time),
                }
            })
            .collect();
        EnergyEnvelope { frames }
    }

    fn timeline(intro: f64, safe_end: f64) -> Timeline {
        Timeline {
            intro,
            safe_end,
            beat_period: 0.5,
            downbeat_phase: intro + 0.1,
        }
    }

    fn section(start: f64, end: f64, role: SectionRole) -> Section {
        Section {
            start,
            end,
            role,
            energy: EnergyTier::Mid,
            density: 1.0,
        }
    }

    #[test]
    fn test_bars_cover_range_on_grid() {
        let env = envelope(60.0, |_| 0.3);
        let tl = timeline(3.6, 50.0);
        let mut rng = SequenceRandom::constant(0.5);
        let bars = build_bar_tiers(&env, &tl, &[], &StructureConfig::default(), &mut rng);
        assert!(!bars.is_empty());
        assert!((bars[0].start - 3.7).abs() < 1e-9);
        for w in bars.windows(2) {
            assert!((w[1].start - w[0].start - 2.0).abs() < 1e-9);
        }
        assert!(bars.last().unwrap().end <= 50.0);
        assert!(bars.iter().all(|b| b.tier <= MAX_TIER));
    }

    #[test]
    fn test_loud_part_rates_higher() {
        let env = envelope(120.0, |t| if (60.0..80.0).contains(&t) { 0.9 } else { 0.2 });
        let tl = timeline(2.0, 110.0);
        let mut rng = SequenceRandom::constant(0.99);
        let bars = build_bar_tiers(&env, &tl, &[], &StructureConfig::default(), &mut rng);
        let quiet = bars.iter().find(|b| b.start > 10.0 && b.end < 40.0).unwrap();
        let loud = bars.iter().find(|b| b.start > 64.0 && b.end < 76.0).unwrap();
        assert!(loud.tier > quiet.tier, "loud {} vs quiet {}", loud.tier, quiet.tier);
        assert!(loud.tier >= 3);
    }

    #[test]
    fn test_tier_zero_lift_uses_rng() {
        let env = envelope(120.0, |t| {
            if t < 30.0 {
                0.0
            } else if t < 60.0 {
                0.5
            } else {
                0.9
            }
        });
        let tl = timeline(2.0, 110.0);

        let mut never = SequenceRandom::constant(0.99);
        let bars = build_bar_tiers(&env, &tl, &[], &StructureConfig::default(), &mut never);
        assert!(bars.iter().any(|b| b.tier == 0));

        let mut always = SequenceRandom::constant(0.0);
        let bars = build_bar_tiers(&env, &tl, &[], &StructureConfig::default(), &mut always);
        assert!(bars.iter().all(|b| b.tier >= 1));
    }

    #[test]
    fn test_section_roles_bias_tiers() {
        let env = envelope(120.0, |t| (t / 120.0) as f32);
        let tl = timeline(2.0, 110.0);
        let sections = [
            section(2.0, 40.0, SectionRole::Intro),
            section(40.0, 70.0, SectionRole::Peak),
            section(70.0, 110.0, SectionRole::Outro),
        ];
        let mut rng = SequenceRandom::constant(0.99);
        let bars = build_bar_tiers(&env, &tl, &sections, &StructureConfig::default(), &mut rng);
        for b in &bars {
            match section_at(&sections, b.start).map(|s| s.role) {
                Some(SectionRole::Intro) | Some(SectionRole::Outro) => assert!(b.tier <= 2),
                Some(SectionRole::Peak) => assert!(b.tier >= 2),
                _ => {}
            }
        }
    }

    #[test]
    fn test_section_energy_biases_tiers() {
        let env = envelope(120.0, |t| (t / 120.0) as f32);
        let tl = timeline(2.0, 110.0);
        let rate = |energy| {
            let sections = [Section {
                energy,
                ..section(2.0, 110.0, SectionRole::MainA)
            }];
            let mut rng = SequenceRandom::constant(0.99);
            build_bar_tiers(&env, &tl, &sections, &StructureConfig::default(), &mut rng)
        };
        let low = rate(EnergyTier::Low);
        let high = rate(EnergyTier::High);
        assert_eq!(low.len(), high.len());
        assert!(low.iter().all(|b| b.tier <= 2));
        assert!(high.iter().all(|b| b.tier >= 2));
        assert!(low.iter().zip(&high).any(|(l, h)| l.tier < h.tier));
    }

    #[test]
    fn test_section_bias_combines_role_and_energy() {
        let with = |role, energy| Section {
            energy,
            ..section(0.0, 10.0, role)
        };
        assert_eq!(section_bias(4, &with(SectionRole::MainA, EnergyTier::Mid)), 4);
        assert_eq!(section_bias(4, &with(SectionRole::MainB, EnergyTier::Low)), 2);
        assert_eq!(section_bias(0, &with(SectionRole::MainA, EnergyTier::High)), 2);
        assert_eq!(section_bias(0, &with(SectionRole::Intro, EnergyTier::High)), 2);
        assert_eq!(section_bias(4, &with(SectionRole::Peak, EnergyTier::Low)), 2);
        assert_eq!(section_bias(1, &with(SectionRole::Outro, EnergyTier::Mid)), 1);
    }
}
