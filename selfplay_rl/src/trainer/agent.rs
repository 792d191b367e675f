//! Policy/value pair with a numerical guard around training.

use crate::core::{Experience, WeightSnapshot};
use crate::model::{Model, ModelError};
use thiserror::Error;

/// Reasons a batch was not trained on.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("batch is empty")]
    EmptyBatch,
    #[error("batch contains NaN or Inf values")]
    NonFiniteInput,
    #[error("{head} loss is not finite ({loss})")]
    NonFiniteLoss { head: &'static str, loss: f32 },
    #[error("{head} model failed: {source}")]
    Model {
        head: &'static str,
        #[source]
        source: ModelError,
    },
}

impl TrainError {
    /// True for numerical corruption as opposed to a model malfunction.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            TrainError::NonFiniteInput
                | TrainError::NonFiniteLoss { .. }
                | TrainError::Model {
                    source: ModelError::NonFiniteGradient,
                    ..
                }
        )
    }
}

/// Losses of one training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainReport {
    pub policy_loss: f32,
    pub value_loss: f32,
}

impl TrainReport {
    pub fn total(&self) -> f32 {
        self.policy_loss + self.value_loss
    }
}

/// The trainer's policy and value models.
pub struct TrainingAgent<P, V> {
    policy: P,
    value: V,
    num_players: usize,
}

impl<P: Model, V: Model> TrainingAgent<P, V> {
    pub fn new(policy: P, value: V, num_players: usize) -> Self {
        Self {
            policy,
            value,
            num_players,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Mutable access to both models at once.
    pub fn models_mut(&mut self) -> (&mut P, &mut V) {
        (&mut self.policy, &mut self.value)
    }

    /// One optimizer step on each head.
    ///
    /// Inputs are checked before anything is trained. The policy head steps
    /// first; if the value head then fails, the policy update is kept.
    pub fn train(&mut self, batch: &[Experience]) -> Result<TrainReport, TrainError> {
        if batch.is_empty() {
            return Err(TrainError::EmptyBatch);
        }
        if !batch.iter().all(Experience::is_finite) {
            return Err(TrainError::NonFiniteInput);
        }

        let inputs: Vec<Vec<f32>> = batch.iter().map(|e| e.observation.clone()).collect();
        let policy_targets: Vec<Vec<f32>> = batch.iter().map(|e| e.policy_target.clone()).collect();
        let value_targets: Vec<Vec<f32>> = batch
            .iter()
            .map(|e| {
                let mut target = e.value_target.clone();
                target.resize(self.num_players, 0.0);
                target
            })
            .collect();

        let policy_loss = self
            .policy
            .train(&inputs, &policy_targets)
            .map_err(|source| TrainError::Model {
                head: "policy",
                source,
            })?;
        if !policy_loss.is_finite() {
            return Err(TrainError::NonFiniteLoss {
                head: "policy",
                loss: policy_loss,
            });
        }

        let value_loss = self
            .value
            .train(&inputs, &value_targets)
            .map_err(|source| TrainError::Model {
                head: "value",
                source,
            })?;
        if !value_loss.is_finite() {
            return Err(TrainError::NonFiniteLoss {
                head: "value",
                loss: value_loss,
            });
        }

        Ok(TrainReport {
            policy_loss,
            value_loss,
        })
    }

    /// Copy the current weights into an immutable snapshot.
    pub fn snapshot(&self, version: u64) -> WeightSnapshot {
        WeightSnapshot::new(version, self.policy.weights(), self.value.weights())
    }
}
