//! Factory for the external collaborators of a run.

use crate::config::SearchConfig;
use crate::game::{Game, GameError};
use crate::model::{Model, ModelError};
use crate::search::Search;

/// Game state type of a component set.
pub type StateOf<C> = <<C as SelfPlayComponents>::Game as Game>::State;

/// Everything the orchestrator needs to build workers.
///
/// Models and searches are constructed on the orchestrator thread and moved
/// into the worker that owns them, so construction errors surface in
/// [`Orchestrator::run`](super::Orchestrator::run) instead of a worker thread.
pub trait SelfPlayComponents: Send + Sync + 'static {
    type Game: Game;
    type Policy: Model;
    type Value: Model;
    type Search: Search<<Self::Game as Game>::State> + 'static;

    /// Load the game once; the result is shared read-only by every actor.
    fn load_game(&self) -> Result<Self::Game, GameError>;

    fn policy_model(&self, game: &Self::Game) -> Result<Self::Policy, ModelError>;

    fn value_model(&self, game: &Self::Game) -> Result<Self::Value, ModelError>;

    fn search(&self, game: &Self::Game, config: &SearchConfig) -> Self::Search;
}
