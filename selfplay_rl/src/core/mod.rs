//! Core types shared by every worker.

pub mod experience;
pub mod join;
pub mod replay_buffer;
pub mod seeds;
pub mod weight_slot;

pub use experience::{ActionId, EpisodeResult, Experience, PlayerId, Step, Trajectory};
pub use join::{join_with_timeout, JoinOutcome};
pub use replay_buffer::ReplayBuffer;
pub use seeds::SeedSequence;
pub use weight_slot::{weight_slot, SharedWeightSlot, WeightSlot, WeightSnapshot};
