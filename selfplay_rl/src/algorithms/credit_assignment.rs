//! Backward temporal credit assignment for multiplayer trajectories.
//!
//! ## Formula
//!
//! ```text
//! downstream = terminal_outcome
//! for i = T-1 .. 0:
//!     value[i]   = reward[i] + γ · downstream
//!     downstream = value[i]
//! ```
//!
//! Every quantity is a per-player vector. The terminal outcome seeds the last
//! step on top of that step's own reward, so the final ply counts the
//! outcome once through `γ · outcome` in addition to whatever reward the
//! engine already attached to it.

use crate::core::{Experience, Trajectory};
use thiserror::Error;

/// Discount factor used by the orchestrator.
pub const DISCOUNT: f32 = 0.99;

/// Trajectory data that cannot be credited.
#[derive(Debug, Error, PartialEq)]
pub enum CreditError {
    #[error("terminal outcome is empty")]
    EmptyOutcome,
    #[error("step {step} has {actual} rewards, expected {expected}")]
    RewardWidth {
        step: usize,
        expected: usize,
        actual: usize,
    },
}

/// Discounted per-player value targets, chronological order.
///
/// # Arguments
///
/// * `rewards` - per-step reward vectors [T][players]
/// * `outcome` - terminal per-player returns [players]
/// * `gamma` - discount factor
pub fn compute_value_targets(
    rewards: &[Vec<f32>],
    outcome: &[f32],
    gamma: f32,
) -> Result<Vec<Vec<f32>>, CreditError> {
    if outcome.is_empty() {
        return Err(CreditError::EmptyOutcome);
    }
    let players = outcome.len();

    let mut values = Vec::with_capacity(rewards.len());
    let mut downstream = outcome.to_vec();

    for t in (0..rewards.len()).rev() {
        let reward = &rewards[t];
        if reward.len() != players {
            return Err(CreditError::RewardWidth {
                step: t,
                expected: players,
                actual: reward.len(),
            });
        }
        let value: Vec<f32> = reward
            .iter()
            .zip(&downstream)
            .map(|(r, d)| r + gamma * d)
            .collect();
        downstream.clone_from(&value);
        values.push(value);
    }

    values.reverse();
    Ok(values)
}

/// Turn a trajectory into training experiences, one per step.
pub fn assign_credit(
    trajectory: &Trajectory,
    outcome: &[f32],
    gamma: f32,
) -> Result<Vec<Experience>, CreditError> {
    let rewards: Vec<Vec<f32>> = trajectory.steps().iter().map(|s| s.rewards.clone()).collect();
    let values = compute_value_targets(&rewards, outcome, gamma)?;

    Ok(trajectory
        .steps()
        .iter()
        .zip(values)
        .map(|(step, value_target)| Experience {
            observation: step.observation.clone(),
            policy_target: step.policy_target.clone(),
            value_target,
            player: step.player,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Step;
    use proptest::prelude::*;

    fn assert_vec_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_empty_trajectory() {
        let values = compute_value_targets(&[], &[1.0, -1.0], DISCOUNT).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_single_step_closed_form() {
        let values = compute_value_targets(&[vec![0.5, -0.5]], &[1.0, -1.0], DISCOUNT).unwrap();
        assert_vec_close(&values[0], &[0.5 + 0.99, -0.5 - 0.99]);
    }

    #[test]
    fn test_zero_rewards_discount_by_distance() {
        // value[i] = γ^(T-i) · outcome
        let rewards = vec![vec![0.0, 0.0]; 4];
        let outcome = [1.0, -1.0];
        let values = compute_value_targets(&rewards, &outcome, DISCOUNT).unwrap();
        for (i, value) in values.iter().enumerate() {
            let scale = DISCOUNT.powi((4 - i) as i32);
            assert_vec_close(value, &[scale, -scale]);
        }
    }

    #[test]
    fn test_three_player_scenario() {
        let rewards = vec![
            vec![0.0, 0.0, 0.0],
            vec![0.0, 0.1, 0.0],
            vec![0.0, 0.0, 0.0],
        ];
        let outcome = [1.0, -0.5, -0.5];
        let values = compute_value_targets(&rewards, &outcome, DISCOUNT).unwrap();

        assert_vec_close(&values[2], &[0.99, -0.495, -0.495]);
        assert_vec_close(&values[1], &[0.9801, 0.1 - 0.49005, -0.49005]);
        assert_vec_close(&values[0], &[0.970299, 0.99 * (0.1 - 0.49005), -0.4851495]);
    }

    #[test]
    fn test_three_player_terminal_reward_and_outcome_both_count() {
        // The final step earns its own reward plus the discounted outcome.
        let rewards = vec![
            vec![0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0],
            vec![1.0, -0.5, -0.5],
        ];
        let outcome = [1.0, -0.5, -0.5];
        let values = compute_value_targets(&rewards, &outcome, DISCOUNT).unwrap();

        assert_vec_close(&values[2], &[1.99, -0.995, -0.995]);
        assert_vec_close(&values[1], &[1.9701, -0.98505, -0.98505]);
        assert_vec_close(&values[0], &[1.950399, -0.9751995, -0.9751995]);
    }

    #[test]
    fn test_reward_width_mismatch() {
        let err = compute_value_targets(&[vec![0.0, 0.0], vec![0.0]], &[1.0, 0.0], DISCOUNT)
            .unwrap_err();
        assert_eq!(
            err,
            CreditError::RewardWidth {
                step: 1,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_empty_outcome_rejected() {
        assert_eq!(
            compute_value_targets(&[], &[], DISCOUNT).unwrap_err(),
            CreditError::EmptyOutcome
        );
    }

    #[test]
    fn test_assign_credit_keeps_step_fields() {
        let trajectory = Trajectory::from(vec![
            Step {
                observation: vec![1.0],
                player: 1,
                policy_target: vec![0.0, 1.0],
                rewards: vec![0.0, 0.0],
            },
            Step {
                observation: vec![2.0],
                player: 0,
                policy_target: vec![1.0, 0.0],
                rewards: vec![0.0, 0.0],
            },
        ]);

        let experiences = assign_credit(&trajectory, &[1.0, -1.0], DISCOUNT).unwrap();

        assert_eq!(experiences.len(), 2);
        assert_eq!(experiences[0].player, 1);
        assert_eq!(experiences[0].observation, vec![1.0]);
        assert_eq!(experiences[1].policy_target, vec![1.0, 0.0]);
        assert_vec_close(&experiences[1].value_target, &[0.99, -0.99]);
    }

    proptest! {
        #[test]
        fn prop_recurrence_holds(
            rewards in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 3), 0..30),
            outcome in prop::collection::vec(-1.0f32..1.0, 3),
        ) {
            let values = compute_value_targets(&rewards, &outcome, DISCOUNT).unwrap();
            prop_assert_eq!(values.len(), rewards.len());

            for i in 0..values.len() {
                let downstream = if i + 1 < values.len() { &values[i + 1] } else { &outcome };
                for p in 0..3 {
                    let expected = rewards[i][p] + DISCOUNT * downstream[p];
                    prop_assert!((values[i][p] - expected).abs() < 1e-4);
                }
            }
        }
    }
}
