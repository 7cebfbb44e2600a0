//! Injectable randomness for chart generation
//!
//! Every random draw the generator makes goes through [`RandomSource`]. Any
//! `rand::Rng` is a source; tests can also script exact draws with
//! [`SequenceRandom`].

/// Source of uniform draws in `[0, 1)`
pub trait RandomSource {
    /// Next uniform value in `[0, 1)`
    fn next_unit(&mut self) -> f64;

    /// True with probability `p`
    fn chance(&mut self, p: f32) -> bool {
        self.next_unit() < p as f64
    }

    /// Uniform index in `0..len` (0 for an empty range)
    fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((self.next_unit() * len as f64) as usize).min(len - 1)
    }

    /// Uniform value in `[lo, hi)`
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_unit() * (hi - lo)
    }

    /// Fisher-Yates shuffle
    fn shuffle<T>(&mut self, items: &mut [T])
    where
        Self: Sized,
    {
        for i in (1..items.len()).rev() {
            let j = self.index(i + 1);
            items.swap(i, j);
        }
    }
}

impl<R: rand::Rng> RandomSource for R {
    fn next_unit(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Scripted source that replays a fixed list of values in a loop
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Vec<f64>,
    cursor: usize,
}

impl SequenceRandom {
    /// Replay `values` (each clamped into `[0, 1)`) forever
    pub fn new(values: Vec<f64>) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0 - f64::EPSILON))
            .collect();
        Self { values, cursor: 0 }
    }

    /// Always return `value`
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws made so far
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for SequenceRandom {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sequence_replays() {
        let mut rng = SequenceRandom::new(vec![0.1, 0.9]);
        assert!(rng.chance(0.5));
        assert!(!rng.chance(0.5));
        assert!(rng.chance(0.5));
        assert_eq!(rng.draws(), 3);
    }

    #[test]
    fn test_index_in_range() {
        let mut rng = SequenceRandom::new(vec![0.0, 0.5, 1.0]);
        assert_eq!(rng.index(4), 0);
        assert_eq!(rng.index(4), 2);
        assert_eq!(rng.index(4), 3);
        assert_eq!(rng.index(0), 0);
    }

    #[test]
    fn test_seeded_rng_is_a_source() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..16 {
            let x = a.next_unit();
            assert!((0.0..1.0).contains(&x));
            assert_eq!(x, b.next_unit());
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut items = vec![0, 1, 2, 3, 4];
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
    }
}
