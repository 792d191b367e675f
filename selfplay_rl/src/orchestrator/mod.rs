//! Run orchestration.
//!
//! - [`Orchestrator`]: spawns the trainer and actor pool, drives the session
//!   loop and shuts everything down
//! - [`SelfPlayComponents`]: factory for the game, models and search
//! - [`PhaseTracker`]: bootstrap to search switch for new actors
//! - [`result_experiences`]: result validation and credit assignment

pub mod components;
pub mod ingest;
pub mod orchestrator;
pub mod phase;

#[cfg(test)]
mod tests;

pub use components::{SelfPlayComponents, StateOf};
pub use ingest::{result_experiences, validate_result, ResultError};
pub use orchestrator::{Orchestrator, OrchestratorError, SpawnRecord};
pub use phase::{Phase, PhaseTracker};
