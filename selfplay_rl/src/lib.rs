//! # Self-play: distributed actor/trainer orchestration
//!
//! Generates training data for a game-playing agent by self-play and trains
//! its policy and value models concurrently.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Orchestrator thread                          │
//! │  phase tracking · pool supervision · job dispatch · credit assignment│
//! └───────┬──────────────────────▲──────────────────────┬───────────────┘
//!         │ JobMsg (3n)          │ EpisodeResult (n)    │ TrainerMsg (batch*50)
//!         ▼                      │                      ▼
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐
//! │   Actor 0    │  │   Actor 1    │  │  Actor n-1   │  │  Trainer thread  │
//! │ heuristic or │  │ heuristic or │  │ heuristic or │  │  replay buffer   │
//! │   search     │  │   search     │  │   search     │  │  policy + value  │
//! └──────────────┘  └──────────────┘  └──────────────┘  └────────┬─────────┘
//!                                                                 │
//!                              WeightSlot (single slot) ◄─────────┘
//! ```
//!
//! Workers are OS threads exchanging messages over bounded crossbeam
//! channels. Pushing into a full queue blocks the pusher, except for the
//! trainer queue where the orchestrator drops and warns. New weights travel
//! through a single-slot mailbox and are attached to every dispatched job.
//!
//! The game, models and search are external collaborators supplied through
//! [`SelfPlayComponents`]. [`toy`] ships small reference implementations.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use selfplay_rl::{Orchestrator, OrchestratorConfig};
//! use selfplay_rl::toy::RaceComponents;
//!
//! let config = OrchestratorConfig::default()
//!     .with_num_actors(4)
//!     .with_num_episodes(1000)
//!     .with_bootstrap_episodes(100);
//!
//! let mut orchestrator = Orchestrator::new(config, RaceComponents::new(3, 20, 0.05));
//! let summary = orchestrator.run()?;
//! println!("{} games in {:?}", summary.games_processed, summary.elapsed);
//! ```

pub mod core;
pub mod messages;
pub mod game;
pub mod model;
pub mod search;
pub mod algorithms;
pub mod actors;
pub mod trainer;
pub mod checkpoint;
pub mod metrics;
pub mod config;
pub mod orchestrator;
pub mod toy;

// Re-export commonly used types
pub use crate::core::experience::{ActionId, EpisodeResult, Experience, PlayerId, Step, Trajectory};
pub use crate::core::weight_slot::{weight_slot, SharedWeightSlot, WeightSlot, WeightSnapshot};
pub use crate::core::replay_buffer::ReplayBuffer;
pub use crate::core::seeds::SeedSequence;

// Message types exchanged between workers
pub use messages::{Job, JobMsg, TrainerMsg, TrainerStats};

// External collaborator traits
pub use game::{Game, GameError, GameState};
pub use model::{Model, ModelError};
pub use search::{ChildVisit, Evaluator, ModelEvaluator, Search, SearchRoot};

pub use algorithms::{assign_credit, compute_value_targets, CreditError, DISCOUNT};

pub use actors::{Actor, ActorConfig, ActorHandle, ActorKind, ActorPool};
pub use trainer::{TrainError, Trainer, TrainingAgent};

pub use metrics::{run_metrics, RunMetrics, RunSummary, SharedRunMetrics};

pub use config::{ConfigError, OrchestratorConfig, SearchConfig, TrainerConfig};

pub use orchestrator::{
    Orchestrator, OrchestratorError, Phase, ResultError, SelfPlayComponents, SpawnRecord,
};

// Model checkpointing
pub use checkpoint::{load_checkpoint, CheckpointError, CheckpointPaths, Checkpointer};
