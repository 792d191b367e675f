//! Messages for the trainer thread.

use crate::core::Experience;

/// Trainer queue item.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainerMsg {
    Experience(Experience),
    /// Save checkpoints and exit. Experiences already drained stay in the buffer.
    Stop,
}

/// Statistics reported by the trainer after each successful step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainerStats {
    /// Total training steps completed.
    pub train_steps: usize,

    /// Policy loss plus value loss of the latest step.
    pub loss: f32,

    pub policy_loss: f32,

    pub value_loss: f32,

    /// Replay buffer occupancy after the step.
    pub buffer_len: usize,

    /// Version of the newest published snapshot.
    pub weights_version: u64,
}

impl TrainerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with training step results.
    pub fn record_step(&mut self, policy_loss: f32, value_loss: f32) {
        self.train_steps += 1;
        self.policy_loss = policy_loss;
        self.value_loss = value_loss;
        self.loss = policy_loss + value_loss;
    }
}
