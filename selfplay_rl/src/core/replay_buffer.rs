//! Trainer-local bounded FIFO of experiences.
//!
//! Oldest entries are evicted first. Besides the plain capacity bound the
//! trainer prunes in bulk: once occupancy passes 95% of capacity, the oldest
//! 10% of capacity is removed in one go so the buffer always has headroom
//! for the next drain.
//!
//! ```text
//! push ──► [newest ... oldest] ──► evict / prune
//!                 │
//!                 └── sample(n): n distinct entries, uniformly at random
//! ```

use rand::Rng;
use std::collections::VecDeque;

/// Occupancy fraction above which [`ReplayBuffer::prune`] evicts.
pub const PRUNE_TRIGGER: f64 = 0.95;

/// One prune removes `capacity / PRUNE_DIVISOR` items, rounded up.
pub const PRUNE_DIVISOR: usize = 10;

/// Bounded replay storage.
#[derive(Debug, Clone)]
pub struct ReplayBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> ReplayBuffer<T> {
    /// Create a buffer holding at most `capacity` items.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay capacity must be > 0");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item, evicting the oldest if the buffer is full.
    ///
    /// Returns true if an item was evicted.
    pub fn push(&mut self, item: T) -> bool {
        let evicted = self.items.len() == self.capacity;
        if evicted {
            self.items.pop_front();
        }
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupancy as a fraction of capacity.
    pub fn utilization(&self) -> f64 {
        self.items.len() as f64 / self.capacity as f64
    }

    /// True once occupancy exceeds [`PRUNE_TRIGGER`] of capacity.
    pub fn needs_pruning(&self) -> bool {
        self.items.len() as f64 > self.capacity as f64 * PRUNE_TRIGGER
    }

    /// Number of items one prune removes: a tenth of capacity, at least one.
    pub fn prune_amount(&self) -> usize {
        (self.capacity + PRUNE_DIVISOR - 1) / PRUNE_DIVISOR
    }

    /// Evict the oldest tenth of capacity if pruning is due.
    ///
    /// Returns the number of evicted items.
    pub fn prune(&mut self) -> usize {
        if !self.needs_pruning() {
            return 0;
        }
        let amount = self.prune_amount().min(self.items.len());
        self.items.drain(..amount);
        amount
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> ReplayBuffer<T> {
    /// Sample `n` distinct items uniformly at random.
    ///
    /// Returns `None` if fewer than `n` items are stored or `n` is zero.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Option<Vec<T>> {
        if n == 0 || n > self.items.len() {
            return None;
        }
        let picked = rand::seq::index::sample(rng, self.items.len(), n);
        Some(picked.iter().map(|i| self.items[i].clone()).collect())
    }
}
