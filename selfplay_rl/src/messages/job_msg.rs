//! Messages on the job queue (orchestrator to actors).

use crate::core::WeightSnapshot;

/// One episode to play.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Sequential episode id assigned at dispatch
    pub episode: u64,
    /// Newest weights known to the orchestrator at dispatch time
    pub weights: WeightSnapshot,
    /// Seed for every random choice made while playing this episode
    pub seed: u64,
}

/// Job queue item.
#[derive(Debug, Clone, PartialEq)]
pub enum JobMsg {
    Play(Job),
    /// Termination sentinel. Exactly one is sent per live actor at shutdown.
    Stop,
}

impl JobMsg {
    pub fn is_stop(&self) -> bool {
        matches!(self, JobMsg::Stop)
    }
}
