//! Turning actor results into trainer experiences.

use crate::algorithms::{assign_credit, CreditError, DISCOUNT};
use crate::core::{EpisodeResult, Experience};
use thiserror::Error;

/// A result that cannot be trained on.
#[derive(Debug, Error, PartialEq)]
pub enum ResultError {
    #[error("outcome has {actual} entries, expected {expected}")]
    OutcomeWidth { expected: usize, actual: usize },
    #[error("step {step} belongs to player {player}, game has {num_players} players")]
    PlayerOutOfRange {
        step: usize,
        player: usize,
        num_players: usize,
    },
    #[error("step {step} policy target has {actual} entries, expected {expected}")]
    PolicyWidth {
        step: usize,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Credit(#[from] CreditError),
}

/// Check the shape of `result` against the game.
pub fn validate_result(
    result: &EpisodeResult,
    num_players: usize,
    num_actions: usize,
) -> Result<(), ResultError> {
    if result.outcome.len() != num_players {
        return Err(ResultError::OutcomeWidth {
            expected: num_players,
            actual: result.outcome.len(),
        });
    }
    for (step, s) in result.trajectory.steps().iter().enumerate() {
        if s.player >= num_players {
            return Err(ResultError::PlayerOutOfRange {
                step,
                player: s.player,
                num_players,
            });
        }
        if s.policy_target.len() != num_actions {
            return Err(ResultError::PolicyWidth {
                step,
                expected: num_actions,
                actual: s.policy_target.len(),
            });
        }
    }
    Ok(())
}

/// Validate `result` and credit every step with the discounted outcome.
pub fn result_experiences(
    result: &EpisodeResult,
    num_players: usize,
    num_actions: usize,
) -> Result<Vec<Experience>, ResultError> {
    validate_result(result, num_players, num_actions)?;
    Ok(assign_credit(&result.trajectory, &result.outcome, DISCOUNT)?)
}
