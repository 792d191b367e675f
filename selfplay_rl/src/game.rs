//! Game engine abstraction.
//!
//! The rules engine lives outside this crate. Workers only need a template
//! ([`Game`]) shared by every thread and the per-episode [`GameState`] it
//! produces.

use crate::core::{ActionId, PlayerId};
use rand::RngCore;
use std::collections::BTreeMap;
use thiserror::Error;

/// Failures reported by a game engine.
#[derive(Debug, Error)]
pub enum GameError {
    /// The game could not be loaded or configured
    #[error("failed to load game: {0}")]
    Load(String),
    /// The engine rejected an action
    #[error("action {action} is not legal for player {player}")]
    IllegalAction { action: ActionId, player: PlayerId },
    #[error("game engine error: {0}")]
    Engine(String),
}

/// Mutable state of one episode.
pub trait GameState: Clone + Send {
    /// True at a chance node, where the engine expects a chance outcome.
    fn is_chance_node(&self) -> bool;

    /// Legal actions for the player to move (or chance outcomes at a chance node).
    fn legal_actions(&self) -> Vec<ActionId>;

    fn current_player(&self) -> PlayerId;

    fn apply_action(&mut self, action: ActionId) -> Result<(), GameError>;

    fn is_terminal(&self) -> bool;

    /// Per-player reward produced by the most recent transition.
    fn rewards(&self) -> Vec<f32>;

    /// Per-player returns; final once the state is terminal.
    fn returns(&self) -> Vec<f32>;

    fn observation_tensor(&self) -> Vec<f32>;

    fn action_to_string(&self, player: PlayerId, action: ActionId) -> String;

    /// True while the game is in its opening setup sub-phase.
    fn in_setup_phase(&self) -> bool {
        false
    }

    /// Move a scripted player would choose, if any.
    fn select_heuristic_action(&self, rng: &mut dyn RngCore) -> Option<ActionId>;

    /// Unnormalized preference weight per action.
    fn heuristic_action_weights(&self) -> BTreeMap<ActionId, f32>;
}

/// Loaded game template shared by all workers.
pub trait Game: Send + Sync + 'static {
    type State: GameState + 'static;

    fn new_initial_state(&self) -> Self::State;

    /// Size of the full action space.
    fn num_distinct_actions(&self) -> usize;

    fn num_players(&self) -> usize;
}
