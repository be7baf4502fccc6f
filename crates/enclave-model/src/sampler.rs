//! Uniform-without-replacement draws from a pool.
//!
//! Partial Fisher-Yates over the pool vector: draw `i` swaps a uniformly
//! chosen element from the undrawn suffix into position `i`. Each draw is
//! O(1); drawing all `n` elements is O(n) and visits every permutation with
//! equal probability. Given the same pool order and RNG state the sequence
//! of draws is fully reproducible.

use rand::Rng;

/// A pool supporting uniform draws without replacement.
#[derive(Debug)]
pub struct PoolSampler<T> {
    pool: Vec<T>,
    taken: usize,
}

impl<T: Copy> PoolSampler<T> {
    /// Wrap a pool. The order of `pool` matters for reproducibility: pass
    /// it in a deterministic order (the migration engine uses ascending
    /// cell-id order).
    pub const fn new(pool: Vec<T>) -> Self {
        Self { pool, taken: 0 }
    }

    /// Number of elements not yet drawn.
    pub const fn remaining(&self) -> usize {
        self.pool.len().saturating_sub(self.taken)
    }

    /// Draw one element uniformly from the undrawn remainder, or `None`
    /// when the pool is exhausted.
    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> Option<T> {
        if self.taken >= self.pool.len() {
            return None;
        }
        let j = rng.random_range(self.taken..self.pool.len());
        self.pool.swap(self.taken, j);
        let drawn = self.pool.get(self.taken).copied();
        self.taken = self.taken.saturating_add(1);
        drawn
    }

    /// Consume the sampler, returning the undrawn elements.
    pub fn into_remaining(self) -> Vec<T> {
        self.pool.into_iter().skip(self.taken).collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn draws_every_element_exactly_once() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut sampler = PoolSampler::new(vec![1, 2, 3, 4, 5]);
        let mut drawn = Vec::new();
        while let Some(v) = sampler.draw(&mut rng) {
            drawn.push(v);
        }
        drawn.sort_unstable();
        assert_eq!(drawn, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn remaining_elements_are_the_undrawn_ones() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut sampler = PoolSampler::new(vec![10, 20, 30, 40]);
        let mut drawn = Vec::new();
        for _ in 0..2 {
            if let Some(v) = sampler.draw(&mut rng) {
                drawn.push(v);
            }
        }
        assert_eq!(sampler.remaining(), 2);
        let mut all: Vec<i32> = drawn.into_iter().chain(sampler.into_remaining()).collect();
        all.sort_unstable();
        assert_eq!(all, vec![10, 20, 30, 40]);
    }

    #[test]
    fn identical_seeds_draw_identical_sequences() {
        let draws = |seed: u64| {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut sampler = PoolSampler::new((0..100).collect::<Vec<i32>>());
            (0..50)
                .filter_map(|_| sampler.draw(&mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(draws(42), draws(42));
    }

    #[test]
    fn empty_pool_draws_nothing() {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut sampler: PoolSampler<i32> = PoolSampler::new(Vec::new());
        assert_eq!(sampler.draw(&mut rng), None);
        assert_eq!(sampler.remaining(), 0);
    }
}
