//! One-bar motif library
//!
//! Each motif is a list of slots (beat offset within the bar, lane, tap or
//! hold with a length in beats). Bars pick a motif from the pool of their
//! intensity tier, never the same motif twice in a row, and occasionally
//! mutate it before use.

use super::note::LANE_COUNT;
use super::random::RandomSource;
use crate::structure::bars::MAX_TIER;

/// What a slot places
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotKind {
    /// A tap (may become a flick or chord)
    Tap,
    /// A hold of the given length in beats
    Hold(f64),
}

/// One note position inside a motif
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    /// Beat offset from the bar start (0.0..4.0)
    pub beat: f64,
    /// Suggested lane
    pub lane: usize,
    /// Tap or hold
    pub kind: SlotKind,
}

impl Slot {
    /// True for slots that are not on beat 0 and are not holds
    ///
    /// Difficulty thinning only ever removes these.
    pub fn is_thinnable(&self) -> bool {
        self.beat != 0.0 && !matches!(self.kind, SlotKind::Hold(_))
    }

    /// True if the slot sits on the half-beat grid
    pub fn on_half_beat(&self) -> bool {
        (self.beat * 2.0).fract() == 0.0
    }
}

/// How busy a motif is, for difficulty thinning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Density {
    /// No thinning
    Regular,
    /// Thinned by `dense_skip`
    Dense,
    /// Thinned by `extra_dense_skip`
    ExtraDense,
}

/// A named one-bar pattern
#[derive(Debug, Clone, Copy)]
pub struct Motif {
    /// Name
    pub name: &'static str,
    /// Slots in beat order
    pub slots: &'static [Slot],
    /// Sub-beat stream (off-grid slots may be dropped, lanes kept at high tiers)
    pub stream: bool,
    /// Thinning class
    pub density: Density,
}

const fn tap(beat: f64, lane: usize) -> Slot {
    Slot {
        beat,
        lane,
        kind: SlotKind::Tap,
    }
}

const fn hold(beat: f64, lane: usize, beats: f64) -> Slot {
    Slot {
        beat,
        lane,
        kind: SlotKind::Hold(beats),
    }
}

macro_rules! motif {
    ($name:literal, [$($slot:expr),* $(,)?], $stream:expr, $density:expr $(,)?) => {
        Motif {
            name: $name,
            slots: &[$($slot),*],
            stream: $stream,
            density: $density,
        }
    };
}

use Density::{Dense, ExtraDense, Regular};

const REST: Motif = motif!("rest", [tap(0.0, 0)], false, Regular);
const LONE_HOLD: Motif = motif!("lone_hold", [hold(0.0, 1, 3.5)], false, Regular);
const DOWNBEAT: Motif = motif!("downbeat", [tap(0.0, 0), tap(2.0, 1)], false, Regular);
const HOLD_INTRO: Motif = motif!(
    "hold_intro",
    [hold(0.0, 0, 1.5), hold(2.0, 2, 1.5)],
    false,
    Regular,
);
const OFFBEAT_ONE: Motif = motif!(
    "offbeat_one",
    [tap(0.0, 0), tap(1.5, 1), tap(3.0, 2)],
    false,
    Regular,
);
const DOTTED: Motif = motif!(
    "dotted",
    [tap(0.0, 0), tap(1.5, 1), tap(2.5, 0)],
    false,
    Regular,
);
const FOUR_FLOOR: Motif = motif!(
    "four_floor",
    [tap(0.0, 0), tap(1.0, 1), tap(2.0, 0), tap(3.0, 1)],
    false,
    Regular,
);
const HOLD_WALK: Motif = motif!(
    "hold_walk",
    [hold(0.0, 0, 1.5), tap(1.5, 2), hold(2.0, 1, 1.5), tap(3.5, 2)],
    false,
    Regular,
);
const PING_PONG: Motif = motif!(
    "ping_pong",
    [tap(0.0, 0), tap(0.5, 1), tap(1.5, 2), tap(2.0, 0), tap(3.0, 2)],
    false,
    Regular,
);
const SYNC_GROOVE: Motif = motif!(
    "sync_groove",
    [
        tap(0.0, 0),
        tap(0.75, 1),
        tap(1.5, 2),
        tap(2.0, 0),
        tap(2.5, 1),
        hold(3.0, 2, 1.0),
    ],
    false,
    Regular,
);
const DOUBLE_STAIR: Motif = motif!(
    "double_stair",
    [
        tap(0.0, 0),
        tap(0.0, 2),
        tap(1.0, 1),
        tap(1.5, 1),
        tap(2.0, 0),
        tap(2.0, 2),
        tap(3.0, 1),
        tap(3.5, 2),
    ],
    false,
    Dense,
);
const HOLD_STREAM: Motif = motif!(
    "hold_stream",
    [
        hold(0.0, 1, 3.5),
        tap(0.0, 0),
        tap(0.5, 2),
        tap(1.5, 0),
        tap(2.0, 2),
        tap(3.0, 0),
    ],
    false,
    Dense,
);
const OUTER_TRILL: Motif = motif!(
    "outer_trill",
    [
        tap(0.0, 0),
        tap(0.5, 2),
        tap(1.0, 0),
        tap(1.5, 2),
        tap(2.0, 0),
        tap(2.5, 2),
        tap(3.0, 0),
        tap(3.5, 2),
    ],
    true,
    Dense,
);
const GALLOP: Motif = motif!(
    "gallop",
    [
        tap(0.0, 0),
        tap(0.25, 1),
        tap(1.0, 2),
        tap(1.25, 1),
        tap(2.0, 0),
        tap(2.25, 1),
        tap(3.0, 2),
        tap(3.25, 1),
    ],
    true,
    Dense,
);
const STREAM_16TH: Motif = motif!(
    "stream_16th",
    [
        tap(0.0, 0),
        tap(0.25, 1),
        tap(0.5, 2),
        tap(0.75, 1),
        tap(1.0, 0),
        tap(1.25, 1),
        tap(1.5, 2),
        tap(1.75, 1),
        tap(2.0, 0),
        tap(2.25, 1),
        tap(2.5, 2),
        tap(2.75, 1),
        tap(3.0, 0),
        tap(3.25, 1),
        tap(3.5, 2),
        tap(3.75, 1),
    ],
    true,
    ExtraDense,
);
const HEAVY_DROP: Motif = motif!(
    "heavy_drop",
    [
        hold(0.0, 0, 1.5),
        hold(0.0, 2, 1.5),
        tap(1.5, 1),
        tap(2.0, 0),
        tap(2.0, 1),
        tap(2.5, 2),
        tap(3.0, 1),
        tap(3.0, 2),
        tap(3.5, 0),
    ],
    false,
    ExtraDense,
);
const CHORD_EXPLODE: Motif = motif!(
    "chord_explode",
    [
        tap(0.0, 0),
        tap(0.0, 1),
        tap(0.5, 2),
        tap(1.0, 1),
        tap(1.0, 2),
        tap(1.5, 0),
        tap(2.0, 0),
        tap(2.0, 2),
        tap(2.5, 1),
        tap(3.0, 0),
        tap(3.0, 1),
        tap(3.5, 2),
    ],
    false,
    ExtraDense,
);

/// Every motif in the library
pub static MOTIFS: [Motif; 17] = [
    REST,
    LONE_HOLD,
    DOWNBEAT,
    HOLD_INTRO,
    OFFBEAT_ONE,
    DOTTED,
    FOUR_FLOOR,
    HOLD_WALK,
    PING_PONG,
    SYNC_GROOVE,
    DOUBLE_STAIR,
    HOLD_STREAM,
    OUTER_TRILL,
    GALLOP,
    STREAM_16TH,
    HEAVY_DROP,
    CHORD_EXPLODE,
];

const TIER_0: &[Motif] = &[REST, LONE_HOLD, DOWNBEAT];
const TIER_1: &[Motif] = &[DOWNBEAT, HOLD_INTRO, OFFBEAT_ONE, DOTTED];
const TIER_2: &[Motif] = &[FOUR_FLOOR, HOLD_WALK, PING_PONG, SYNC_GROOVE];
const TIER_3: &[Motif] = &[DOUBLE_STAIR, HOLD_STREAM, OUTER_TRILL, GALLOP];
const TIER_4: &[Motif] = &[
    STREAM_16TH,
    HEAVY_DROP,
    CHORD_EXPLODE,
    DOUBLE_STAIR,
    HOLD_STREAM,
];

/// Motifs available at `tier` (clamped to the highest tier)
pub fn tier_pool(tier: u8) -> &'static [Motif] {
    match tier.min(MAX_TIER) {
        0 => TIER_0,
        1 => TIER_1,
        2 => TIER_2,
        3 => TIER_3,
        _ => TIER_4,
    }
}

/// Look a motif up by name
pub fn motif_by_name(name: &str) -> Option<&'static Motif> {
    MOTIFS.iter().find(|m| m.name == name)
}

/// Pick a motif for a bar of `tier`, avoiding `previous`
pub fn select_motif<R: RandomSource>(tier: u8, previous: &str, rng: &mut R) -> &'static Motif {
    let pool = tier_pool(tier);
    let candidates: Vec<&'static Motif> = pool.iter().filter(|m| m.name != previous).collect();
    if candidates.is_empty() {
        return &pool[0];
    }
    candidates[rng.index(candidates.len())]
}

/// Ways a motif is varied before use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Lanes reversed (0 ↔ 2)
    Mirror,
    /// Every lane rotated by the same offset
    Shift,
    /// One thinnable slot removed
    Drop,
}

/// Apply a random mutation to `slots` and return which one was applied
pub fn mutate<R: RandomSource>(slots: &mut Vec<Slot>, rng: &mut R) -> Mutation {
    match rng.index(3) {
        0 => {
            for slot in slots.iter_mut() {
                slot.lane = LANE_COUNT - 1 - slot.lane.min(LANE_COUNT - 1);
            }
            Mutation::Mirror
        }
        1 => {
            let offset = 1 + rng.index(LANE_COUNT - 1);
            for slot in slots.iter_mut() {
                slot.lane = (slot.lane + offset) % LANE_COUNT;
            }
            Mutation::Shift
        }
        _ => {
            let thinnable: Vec<usize> = slots
                .iter()
                .enumerate()
                .filter(|(_, s)| s.is_thinnable())
                .map(|(i, _)| i)
                .collect();
            if !thinnable.is_empty() {
                let victim = thinnable[rng.index(thinnable.len())];
                slots.remove(victim);
            }
            Mutation::Drop
        }
    }
}
