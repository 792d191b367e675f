//! Trainer worker and its training guard.
//!
//! ```text
//! TrainerMsg ──► drain ──► ReplayBuffer ──► sample ──► TrainingAgent::train
//!                                                         │
//!                          WeightSlot ◄── publish_if_empty┘──► TrainerStats
//! ```

pub mod agent;
pub mod trainer;


pub use agent::{TrainError, TrainReport, TrainingAgent};
pub use trainer::{Trainer, TrainerChannels};
