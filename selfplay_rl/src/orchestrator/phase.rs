//! Bootstrap/search phase of a run.

use crate::actors::ActorKind;
use std::fmt;
use tracing::info;

/// Which kind of actor new spawns get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Heuristic actors generate the first games
    Bootstrap,
    /// Search actors driven by the trained models
    Search,
}

impl Phase {
    pub fn actor_kind(&self) -> ActorKind {
        match self {
            Phase::Bootstrap => ActorKind::Heuristic,
            Phase::Search => ActorKind::Search,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Bootstrap => f.write_str("bootstrap"),
            Phase::Search => f.write_str("search"),
        }
    }
}

/// One-way bootstrap to search transition.
///
/// Only affects actors spawned after the switch; running actors keep their kind.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    phase: Phase,
    bootstrap_episodes: u64,
}

impl PhaseTracker {
    pub fn new(bootstrap_episodes: u64) -> Self {
        let phase = if bootstrap_episodes == 0 {
            Phase::Search
        } else {
            Phase::Bootstrap
        };
        Self {
            phase,
            bootstrap_episodes,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Advance given the processed game count. Returns true on the transition.
    pub fn update(&mut self, games_processed: u64) -> bool {
        if self.phase == Phase::Bootstrap && games_processed >= self.bootstrap_episodes {
            self.phase = Phase::Search;
            info!(
                games_processed,
                bootstrap_episodes = self.bootstrap_episodes,
                "bootstrap complete, new actors use search"
            );
            return true;
        }
        false
    }
}
