//! Small reference implementations of the external collaborators.
//!
//! Used by the demo binary and the test suites:
//!
//! - [`RaceGame`]: multiplayer race to a target square with a chance opening
//!   and a setup phase
//! - [`BiasModel`]: input-independent model holding one bias per output
//! - [`FlatSearch`]: one-ply PUCT search over the root's children
//! - [`RaceComponents`]: wires the three together for the orchestrator

use crate::algorithms::add_dirichlet_noise;
use crate::config::SearchConfig;
use crate::core::{ActionId, PlayerId};
use crate::game::{Game, GameError, GameState};
use crate::model::{Model, ModelError};
use crate::orchestrator::SelfPlayComponents;
use crate::search::{ChildVisit, Evaluator, Search, SearchRoot};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Advance options: action `a` moves the player `a + 1` squares.
const NUM_ADVANCES: usize = 3;

/// Reward granted per square advanced.
const STEP_REWARD: f32 = 0.01;

// ============================================================================
// Game
// ============================================================================

/// Race game template.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceGame {
    num_players: usize,
    target: u32,
    max_moves: usize,
    trap: Option<u32>,
}

impl RaceGame {
    pub fn new(num_players: usize, target: u32) -> Result<Self, GameError> {
        if !(2..=8).contains(&num_players) {
            return Err(GameError::Load(format!(
                "race needs 2-8 players, got {num_players}"
            )));
        }
        if target == 0 {
            return Err(GameError::Load("race target must be > 0".into()));
        }
        Ok(Self {
            num_players,
            target,
            max_moves: 200,
            trap: None,
        })
    }

    /// Landing exactly on `square` leaves the game with no legal moves.
    pub fn with_trap(mut self, square: u32) -> Self {
        self.trap = Some(square);
        self
    }

    /// Declare a draw after this many main-phase moves.
    pub fn with_max_moves(mut self, max_moves: usize) -> Self {
        self.max_moves = max_moves;
        self
    }
}

impl Game for RaceGame {
    type State = RaceState;

    fn new_initial_state(&self) -> RaceState {
        RaceState {
            game: self.clone(),
            chance_pending: true,
            setup_done: 0,
            positions: vec![0; self.num_players],
            current: 0,
            moves: 0,
            winner: None,
            last_rewards: vec![0.0; self.num_players],
        }
    }

    fn num_distinct_actions(&self) -> usize {
        NUM_ADVANCES
    }

    fn num_players(&self) -> usize {
        self.num_players
    }
}

/// State of one race.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceState {
    game: RaceGame,
    chance_pending: bool,
    /// Players that already picked a starting square
    setup_done: usize,
    positions: Vec<u32>,
    current: PlayerId,
    moves: usize,
    winner: Option<PlayerId>,
    last_rewards: Vec<f32>,
}

impl RaceState {
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    fn trapped(&self) -> bool {
        self.game.trap.is_some_and(|t| self.positions.contains(&t))
    }

    fn out_of_moves(&self) -> bool {
        self.moves >= self.game.max_moves
    }
}

impl GameState for RaceState {
    fn is_chance_node(&self) -> bool {
        self.chance_pending
    }

    fn legal_actions(&self) -> Vec<ActionId> {
        if self.chance_pending {
            return vec![0];
        }
        if self.is_terminal() || self.trapped() {
            return Vec::new();
        }
        (0..NUM_ADVANCES).collect()
    }

    fn current_player(&self) -> PlayerId {
        self.current
    }

    fn apply_action(&mut self, action: ActionId) -> Result<(), GameError> {
        if !self.legal_actions().contains(&action) {
            return Err(GameError::IllegalAction {
                action,
                player: self.current,
            });
        }
        self.last_rewards = vec![0.0; self.game.num_players];

        if self.chance_pending {
            self.chance_pending = false;
            return Ok(());
        }

        let player = self.current;
        if self.in_setup_phase() {
            self.positions[player] = action as u32;
            self.setup_done += 1;
        } else {
            let advance = action as u32 + 1;
            self.positions[player] += advance;
            self.last_rewards[player] = STEP_REWARD * advance as f32;
            self.moves += 1;
            if self.positions[player] >= self.game.target {
                self.winner = Some(player);
            }
        }
        self.current = (player + 1) % self.game.num_players;
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        self.winner.is_some() || self.out_of_moves()
    }

    fn rewards(&self) -> Vec<f32> {
        self.last_rewards.clone()
    }

    fn returns(&self) -> Vec<f32> {
        let players = self.game.num_players;
        match self.winner {
            Some(winner) => {
                let loss = -1.0 / (players - 1) as f32;
                (0..players)
                    .map(|p| if p == winner { 1.0 } else { loss })
                    .collect()
            }
            None => vec![0.0; players],
        }
    }

    fn observation_tensor(&self) -> Vec<f32> {
        let target = self.game.target as f32;
        let mut observation: Vec<f32> = self.positions.iter().map(|&p| p as f32 / target).collect();
        observation.extend((0..self.game.num_players).map(|p| if p == self.current { 1.0 } else { 0.0 }));
        observation
    }

    fn action_to_string(&self, player: PlayerId, action: ActionId) -> String {
        if self.chance_pending {
            "shuffle".to_string()
        } else if self.in_setup_phase() {
            format!("p{player} starts on {action}")
        } else {
            format!("p{player} advances {}", action + 1)
        }
    }

    fn in_setup_phase(&self) -> bool {
        !self.chance_pending && self.setup_done < self.game.num_players
    }

    fn select_heuristic_action(&self, rng: &mut dyn RngCore) -> Option<ActionId> {
        let weights = self.heuristic_action_weights();
        let actions: Vec<ActionId> = weights.keys().copied().collect();
        let dist = WeightedIndex::new(weights.values()).ok()?;
        Some(actions[dist.sample(rng)])
    }

    /// Prefer long strides, but never overshoot when an exact finish exists.
    fn heuristic_action_weights(&self) -> BTreeMap<ActionId, f32> {
        let legal = self.legal_actions();
        let remaining = self
            .game
            .target
            .saturating_sub(self.positions[self.current]);
        legal
            .into_iter()
            .map(|a| {
                let advance = a as u32 + 1;
                let weight = if advance == remaining {
                    10.0
                } else {
                    advance as f32
                };
                (a, weight)
            })
            .collect()
    }
}

// ============================================================================
// Model
// ============================================================================

/// Model whose output ignores the input: one learned bias per output.
///
/// With `softmax` set the output is a distribution (policy head, trained with
/// cross-entropy); otherwise the raw bias (value head, trained with MSE).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasModel {
    bias: Vec<f32>,
    learning_rate: f32,
    softmax: bool,
}

impl BiasModel {
    pub fn new(outputs: usize, learning_rate: f32, softmax: bool) -> Self {
        Self {
            bias: vec![0.0; outputs],
            learning_rate,
            softmax,
        }
    }

    fn output(&self) -> Vec<f32> {
        if !self.softmax {
            return self.bias.clone();
        }
        let max = self.bias.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f32> = self.bias.iter().map(|b| (b - max).exp()).collect();
        let total: f32 = exp.iter().sum();
        exp.into_iter().map(|e| e / total).collect()
    }

    fn mean_target(&self, targets: &[Vec<f32>]) -> Result<Vec<f32>, ModelError> {
        let mut mean = vec![0.0f32; self.bias.len()];
        for target in targets {
            if target.len() != self.bias.len() {
                return Err(ModelError::WeightShape {
                    expected: self.bias.len(),
                    actual: target.len(),
                });
            }
            for (m, t) in mean.iter_mut().zip(target) {
                *m += t / targets.len() as f32;
            }
        }
        Ok(mean)
    }
}

impl Model for BiasModel {
    fn predict(&self, observations: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, ModelError> {
        let output = self.output();
        Ok(vec![output; observations.len()])
    }

    fn train(&mut self, _inputs: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<f32, ModelError> {
        if targets.is_empty() {
            return Ok(0.0);
        }
        let mean = self.mean_target(targets)?;
        let output = self.output();

        let (loss, gradient): (f32, Vec<f32>) = if self.softmax {
            let loss = -mean
                .iter()
                .zip(&output)
                .map(|(t, p)| t * p.max(1e-8).ln())
                .sum::<f32>();
            (loss, output.iter().zip(&mean).map(|(p, t)| p - t).collect())
        } else {
            let loss = targets
                .iter()
                .flat_map(|t| t.iter().zip(&output).map(|(t, o)| (o - t).powi(2)))
                .sum::<f32>()
                / (targets.len() * self.bias.len().max(1)) as f32;
            (loss, output.iter().zip(&mean).map(|(o, t)| 2.0 * (o - t)).collect())
        };

        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(ModelError::NonFiniteGradient);
        }
        for (b, g) in self.bias.iter_mut().zip(gradient) {
            *b -= self.learning_rate * g;
        }
        Ok(loss)
    }

    fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| ModelError::Format(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), ModelError> {
        let loaded: BiasModel = serde_json::from_slice(&fs::read(path)?)
            .map_err(|e| ModelError::Format(e.to_string()))?;
        self.set_weights(&loaded.bias)
    }

    fn weights(&self) -> Vec<f32> {
        self.bias.clone()
    }

    fn set_weights(&mut self, weights: &[f32]) -> Result<(), ModelError> {
        if weights.len() != self.bias.len() {
            return Err(ModelError::WeightShape {
                expected: self.bias.len(),
                actual: weights.len(),
            });
        }
        self.bias.copy_from_slice(weights);
        Ok(())
    }
}

// ============================================================================
// Search
// ============================================================================

/// One-ply PUCT: every simulation picks a root child and scores it with the
/// evaluator's value for the player to move.
#[derive(Debug, Clone)]
pub struct FlatSearch {
    simulations: usize,
    uct_c: f32,
    noise_alpha: f32,
    noise_epsilon: f32,
}

impl FlatSearch {
    pub fn new(simulations: usize, uct_c: f32) -> Self {
        Self {
            simulations,
            uct_c,
            noise_alpha: 0.0,
            noise_epsilon: 0.0,
        }
    }

    /// Search configured from `config`, including its root noise.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.max_simulations, config.uct_c)
            .with_root_noise(config.dirichlet_alpha, config.dirichlet_epsilon)
    }

    /// Mix Dirichlet(`alpha`) noise into the root priors with weight `epsilon`.
    pub fn with_root_noise(mut self, alpha: f32, epsilon: f32) -> Self {
        self.noise_alpha = alpha;
        self.noise_epsilon = epsilon;
        self
    }

    fn root_priors<S: GameState>(
        &self,
        state: &S,
        evaluator: &dyn Evaluator<S>,
        rng: &mut dyn RngCore,
    ) -> Vec<(ActionId, f32)> {
        let mut priors = evaluator.prior(state);
        add_dirichlet_noise(&mut priors, self.noise_alpha, self.noise_epsilon, rng);
        priors
    }
}

impl<S: GameState> Search<S> for FlatSearch {
    fn search(&mut self, state: &S, evaluator: &dyn Evaluator<S>, rng: &mut dyn RngCore) -> SearchRoot {
        let mut priors = self.root_priors(state, evaluator, rng);
        if priors.is_empty() {
            return SearchRoot::default();
        }
        // Random order breaks ties between equally scored children.
        priors.shuffle(rng);

        let player = state.current_player();
        let mut visits = vec![0u32; priors.len()];
        let mut value_sums = vec![0.0f32; priors.len()];
        let mut child_values: Vec<Option<f32>> = vec![None; priors.len()];

        for sim in 0..self.simulations {
            let exploration = self.uct_c * ((sim + 1) as f32).sqrt();
            let mut best = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (i, &(_, prior)) in priors.iter().enumerate() {
                let q = if visits[i] > 0 {
                    value_sums[i] / visits[i] as f32
                } else {
                    0.0
                };
                let score = q + exploration * prior / (1.0 + visits[i] as f32);
                if score > best_score {
                    best = i;
                    best_score = score;
                }
            }

            let value = *child_values[best].get_or_insert_with(|| {
                let mut child = state.clone();
                match child.apply_action(priors[best].0) {
                    Ok(()) => evaluator.evaluate(&child).get(player).copied().unwrap_or(0.0),
                    Err(_) => -1.0,
                }
            });
            visits[best] += 1;
            value_sums[best] += value;
        }

        SearchRoot {
            children: priors
                .iter()
                .zip(visits)
                .map(|(&(action, _), visit_count)| ChildVisit { action, visit_count })
                .collect(),
        }
    }
}

// ============================================================================
// Components
// ============================================================================

/// Race game with bias models and flat search.
#[derive(Debug, Clone)]
pub struct RaceComponents {
    pub num_players: usize,
    pub target: u32,
    pub learning_rate: f32,
}

impl RaceComponents {
    pub fn new(num_players: usize, target: u32, learning_rate: f32) -> Self {
        Self {
            num_players,
            target,
            learning_rate,
        }
    }
}

impl SelfPlayComponents for RaceComponents {
    type Game = RaceGame;
    type Policy = BiasModel;
    type Value = BiasModel;
    type Search = FlatSearch;

    fn load_game(&self) -> Result<RaceGame, GameError> {
        RaceGame::new(self.num_players, self.target)
    }

    fn policy_model(&self, game: &RaceGame) -> Result<BiasModel, ModelError> {
        Ok(BiasModel::new(game.num_distinct_actions(), self.learning_rate, true))
    }

    fn value_model(&self, game: &RaceGame) -> Result<BiasModel, ModelError> {
        Ok(BiasModel::new(game.num_players(), self.learning_rate, false))
    }

    fn search(&self, _game: &RaceGame, config: &SearchConfig) -> FlatSearch {
        FlatSearch::from_config(config)
    }
}
