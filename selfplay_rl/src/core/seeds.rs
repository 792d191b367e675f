//! Deterministic per-job seed stream.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Exclusive upper bound of every job seed (`2^31 - 1`).
pub const SEED_UPPER_BOUND: u64 = (1 << 31) - 1;

/// Seeds drawn from one generator, reproducible given the master seed.
#[derive(Debug, Clone)]
pub struct SeedSequence {
    master: u64,
    rng: ChaCha8Rng,
}

impl SeedSequence {
    pub fn new(master: u64) -> Self {
        Self {
            master,
            rng: ChaCha8Rng::seed_from_u64(master),
        }
    }

    /// Use `master` when given, otherwise derive one from the wall clock.
    pub fn from_optional(master: Option<u64>) -> Self {
        Self::new(master.unwrap_or_else(clock_seed))
    }

    /// The seed this sequence was created from.
    pub fn master(&self) -> u64 {
        self.master
    }

    /// Next seed in `[0, 2^31 - 1)`.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen_range(0..SEED_UPPER_BOUND)
    }
}

/// Current time in milliseconds folded into `[0, 2^32 - 1)`.
fn clock_seed() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    (millis % u128::from(u32::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_master_same_sequence() {
        let mut a = SeedSequence::new(1234);
        let mut b = SeedSequence::new(1234);
        let first: Vec<u64> = (0..100).map(|_| a.next_seed()).collect();
        let second: Vec<u64> = (0..100).map(|_| b.next_seed()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_master_differs() {
        let mut a = SeedSequence::new(1);
        let mut b = SeedSequence::new(2);
        let first: Vec<u64> = (0..16).map(|_| a.next_seed()).collect();
        let second: Vec<u64> = (0..16).map(|_| b.next_seed()).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn test_seeds_in_range() {
        let mut seeds = SeedSequence::new(99);
        for _ in 0..1000 {
            assert!(seeds.next_seed() < SEED_UPPER_BOUND);
        }
    }

    #[test]
    fn test_clock_seed_fits_u32() {
        let seeds = SeedSequence::from_optional(None);
        assert!(seeds.master() < u64::from(u32::MAX));
        assert_eq!(SeedSequence::from_optional(Some(5)).master(), 5);
    }
}
