//! Single-slot mailbox carrying weight snapshots from the trainer.
//!
//! The trainer publishes, the orchestrator takes. A publish overwrites any
//! snapshot that has not been taken yet, so readers only ever see the newest
//! weights and stale snapshots never pile up.
//!
//! ```text
//! Memory invariant: slot.pending <= 1 snapshot at all times
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

/// Immutable copy of the policy and value weights at one training step.
///
/// Cloning is cheap: the weight buffers are shared and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSnapshot {
    version: u64,
    policy: Arc<[f32]>,
    value: Arc<[f32]>,
}

impl WeightSnapshot {
    pub fn new(version: u64, policy: Vec<f32>, value: Vec<f32>) -> Self {
        Self {
            version,
            policy: policy.into(),
            value: value.into(),
        }
    }

    /// Monotonically increasing version assigned by the trainer.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn policy(&self) -> &[f32] {
        &self.policy
    }

    pub fn value(&self) -> &[f32] {
        &self.value
    }
}

/// Capacity-1 overwrite-newest container.
pub struct WeightSlot<M> {
    pending: Mutex<Option<M>>,
}

impl<M> WeightSlot<M> {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    /// Publish a value, overwriting any pending one.
    ///
    /// Returns true if a pending value was overwritten.
    pub fn publish(&self, value: M) -> bool {
        self.pending.lock().replace(value).is_some()
    }

    /// Publish only when the slot is empty.
    ///
    /// `make` runs under the slot lock and is skipped entirely when a value is
    /// still pending. Returns true if a value was published.
    pub fn publish_if_empty(&self, make: impl FnOnce() -> M) -> bool {
        let mut guard = self.pending.lock();
        if guard.is_some() {
            return false;
        }
        *guard = Some(make());
        true
    }

    /// Take the pending value, leaving the slot empty.
    pub fn take(&self) -> Option<M> {
        self.pending.lock().take()
    }
}

impl<M> Default for WeightSlot<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Weight slot shared between the trainer and the orchestrator.
pub type SharedWeightSlot = Arc<WeightSlot<WeightSnapshot>>;

/// Create a new shared weight slot.
pub fn weight_slot() -> SharedWeightSlot {
    Arc::new(WeightSlot::new())
}
