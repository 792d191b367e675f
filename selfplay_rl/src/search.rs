//! Tree-search abstraction and the model-backed evaluator.
//!
//! The search algorithm itself is external. Actors hand it an [`Evaluator`]
//! on every call and read back the root's visit counts.

use crate::algorithms::policy_target::mix_priors;
use crate::core::ActionId;
use crate::game::GameState;
use crate::model::{Model, ModelError};
use rand::RngCore;
use tracing::warn;

/// Visit statistics of one root child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildVisit {
    pub action: ActionId,
    pub visit_count: u32,
}

/// Root of a finished search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRoot {
    pub children: Vec<ChildVisit>,
}

impl SearchRoot {
    pub fn total_visits(&self) -> u64 {
        self.children.iter().map(|c| u64::from(c.visit_count)).sum()
    }
}

/// Leaf evaluation used by a search.
pub trait Evaluator<S: GameState> {
    /// Estimated value of `state` for every player.
    fn evaluate(&self, state: &S) -> Vec<f32>;

    /// Prior probability per legal action.
    fn prior(&self, state: &S) -> Vec<(ActionId, f32)>;
}

/// Fixed-budget tree search.
pub trait Search<S: GameState>: Send {
    fn search(&mut self, state: &S, evaluator: &dyn Evaluator<S>, rng: &mut dyn RngCore)
        -> SearchRoot;
}

/// Evaluator backed by a policy model, a value model and the engine heuristic.
///
/// Priors blend the policy model's output with the normalized heuristic
/// weights; terminal states evaluate to their actual returns.
pub struct ModelEvaluator<'a, P, V> {
    policy: &'a P,
    value: &'a V,
    num_actions: usize,
    num_players: usize,
    heuristic_weight: f32,
}

impl<'a, P: Model, V: Model> ModelEvaluator<'a, P, V> {
    pub fn new(
        policy: &'a P,
        value: &'a V,
        num_actions: usize,
        num_players: usize,
        heuristic_weight: f32,
    ) -> Self {
        Self {
            policy,
            value,
            num_actions,
            num_players,
            heuristic_weight,
        }
    }
}

/// First output row of a single-observation prediction.
fn first_row(prediction: Result<Vec<Vec<f32>>, ModelError>, head: &'static str) -> Option<Vec<f32>> {
    match prediction {
        Ok(mut rows) if !rows.is_empty() => Some(rows.swap_remove(0)),
        Ok(_) => {
            warn!(head, "model returned no rows");
            None
        }
        Err(e) => {
            warn!(head, error = %e, "model prediction failed");
            None
        }
    }
}

impl<'a, S, P, V> Evaluator<S> for ModelEvaluator<'a, P, V>
where
    S: GameState,
    P: Model,
    V: Model,
{
    fn evaluate(&self, state: &S) -> Vec<f32> {
        if state.is_terminal() {
            return state.returns();
        }
        let observation = vec![state.observation_tensor()];
        let mut values = first_row(self.value.predict(&observation), "value")
            .unwrap_or_default();
        values.resize(self.num_players, 0.0);
        values
    }

    fn prior(&self, state: &S) -> Vec<(ActionId, f32)> {
        if state.is_terminal() {
            return Vec::new();
        }
        let legal = state.legal_actions();
        if legal.is_empty() {
            return Vec::new();
        }

        let observation = vec![state.observation_tensor()];
        let network = first_row(self.policy.predict(&observation), "policy")
            .unwrap_or_default();
        mix_priors(
            &network,
            &state.heuristic_action_weights(),
            &legal,
            self.num_actions,
            self.heuristic_weight,
        )
    }
}
