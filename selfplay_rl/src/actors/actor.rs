//! Self-play actor worker.
//!
//! An actor pulls jobs from the shared job queue, plays one episode per job
//! and pushes the labeled trajectory to the result queue. It exits after
//! `games_per_actor` episodes or on the first stop sentinel, whichever comes
//! first; the orchestrator replaces it either way.
//!
//! Per episode:
//! 1. Seed all randomness from the job seed
//! 2. Start from a fresh state of the shared game template
//! 3. Resolve a leading chance node by its first outcome
//! 4. Resolve the setup phase with uniform random legal moves
//! 5. Play the main phase with the actor's driver, one [`Step`] per move

use crate::algorithms::policy_target::{heuristic_policy, sample_visit_action, visit_policy};
use crate::config::SearchConfig;
use crate::core::{ActionId, EpisodeResult, PlayerId, Step, Trajectory, WeightSnapshot};
use crate::game::{Game, GameError, GameState};
use crate::messages::{Job, JobMsg};
use crate::metrics::SharedRunMetrics;
use crate::model::{Model, ModelError};
use crate::orchestrator::components::{SelfPlayComponents, StateOf};
use crate::search::{ModelEvaluator, Search};
use crossbeam_channel::{Receiver, Sender};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// How an actor picks its moves. Fixed for the actor's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    /// Engine heuristic, used while bootstrapping
    Heuristic,
    /// Model-guided tree search
    Search,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::Heuristic => "heuristic",
            ActorKind::Search => "search",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actor configuration.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Unique, never reused
    pub actor_id: u64,
    /// Episodes to play before exiting
    pub games_per_actor: usize,
    /// Size of the full action space
    pub num_actions: usize,
    pub num_players: usize,
    pub search: SearchConfig,
}

impl ActorConfig {
    pub fn new(actor_id: u64, num_actions: usize, num_players: usize) -> Self {
        Self {
            actor_id,
            games_per_actor: 10,
            num_actions,
            num_players,
            search: SearchConfig::default(),
        }
    }

    /// Set the episode quota.
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    pub fn with_games_per_actor(mut self, n: usize) -> Self {
        assert!(n > 0, "games_per_actor must be > 0");
        self.games_per_actor = n;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }
}

/// Models and search owned by a search-driven actor.
pub struct SearchDriver<C: SelfPlayComponents> {
    policy: C::Policy,
    value: C::Value,
    search: C::Search,
    /// Version of the snapshot currently loaded into the models
    weights_version: Option<u64>,
}

impl<C: SelfPlayComponents> SearchDriver<C> {
    pub fn new(policy: C::Policy, value: C::Value, search: C::Search) -> Self {
        Self {
            policy,
            value,
            search,
            weights_version: None,
        }
    }

    pub fn weights_version(&self) -> Option<u64> {
        self.weights_version
    }

    /// Load `snapshot` unless it is already loaded. Returns true if weights changed.
    pub fn sync_weights(&mut self, snapshot: &WeightSnapshot) -> Result<bool, ModelError> {
        if self.weights_version == Some(snapshot.version()) {
            return Ok(false);
        }
        self.policy.set_weights(snapshot.policy())?;
        self.value.set_weights(snapshot.value())?;
        self.weights_version = Some(snapshot.version());
        Ok(true)
    }
}

/// Move selection strategy of an actor.
pub enum ActorDriver<C: SelfPlayComponents> {
    Heuristic,
    Search(SearchDriver<C>),
}

impl<C: SelfPlayComponents> ActorDriver<C> {
    pub fn kind(&self) -> ActorKind {
        match self {
            ActorDriver::Heuristic => ActorKind::Heuristic,
            ActorDriver::Search(_) => ActorKind::Search,
        }
    }
}

/// Queue ends an actor works on.
#[derive(Clone)]
pub struct ActorChannels {
    pub jobs: Receiver<JobMsg>,
    pub results: Sender<EpisodeResult>,
}

/// Handle to a spawned actor thread.
pub struct ActorHandle {
    pub id: u64,
    pub kind: ActorKind,
    pub thread: JoinHandle<()>,
}

impl ActorHandle {
    /// True once the thread exited, normally or by panic.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for actor thread to finish.
    pub fn join(self) -> std::thread::Result<()> {
        self.thread.join()
    }
}

/// Why an episode stopped before reaching a terminal state.
#[derive(Debug, Error)]
enum EpisodeAbort {
    #[error("no legal actions for player {player}")]
    NoLegalActions { player: PlayerId },
    #[error(transparent)]
    Engine(#[from] GameError),
}

/// Self-play actor.
pub struct Actor<C: SelfPlayComponents> {
    config: ActorConfig,
    game: Arc<C::Game>,
    driver: ActorDriver<C>,
    metrics: SharedRunMetrics,
}

impl<C: SelfPlayComponents> Actor<C> {
    pub fn new(
        config: ActorConfig,
        game: Arc<C::Game>,
        driver: ActorDriver<C>,
        metrics: SharedRunMetrics,
    ) -> Self {
        Self {
            config,
            game,
            driver,
            metrics,
        }
    }

    pub fn id(&self) -> u64 {
        self.config.actor_id
    }

    pub fn kind(&self) -> ActorKind {
        self.driver.kind()
    }

    /// Spawn the actor on its own named thread.
    pub fn spawn(self, channels: ActorChannels) -> io::Result<ActorHandle> {
        let id = self.id();
        let kind = self.kind();
        let thread = std::thread::Builder::new()
            .name(format!("actor-{id}-{kind}"))
            .spawn(move || self.run(channels))?;
        Ok(ActorHandle { id, kind, thread })
    }

    /// Worker loop: play jobs until the quota is met or a sentinel arrives.
    pub fn run(mut self, channels: ActorChannels) {
        let actor_id = self.id();
        info!(actor_id, kind = %self.kind(), quota = self.config.games_per_actor, "actor started");

        let mut played = 0;
        while played < self.config.games_per_actor {
            let job = match channels.jobs.recv() {
                Ok(JobMsg::Play(job)) => job,
                Ok(JobMsg::Stop) => {
                    info!(actor_id, played, "actor received stop signal");
                    return;
                }
                Err(_) => {
                    warn!(actor_id, played, "job queue disconnected, actor exiting");
                    return;
                }
            };

            let result = self.play_episode(&job);
            played += 1;
            if channels.results.send(result).is_err() {
                warn!(actor_id, played, "result queue disconnected, actor exiting");
                return;
            }
        }
        info!(actor_id, played, "actor reached its game quota");
    }

    /// Play one episode for `job`.
    ///
    /// Never fails: an episode that cannot continue is reported with the
    /// steps recorded so far and `aborted` set.
    pub fn play_episode(&mut self, job: &Job) -> EpisodeResult {
        let actor_id = self.id();
        let mut rng = ChaCha8Rng::seed_from_u64(job.seed);

        if let ActorDriver::Search(driver) = &mut self.driver {
            match driver.sync_weights(&job.weights) {
                Ok(true) => debug!(actor_id, version = job.weights.version(), "loaded weights"),
                Ok(false) => {}
                Err(e) => warn!(
                    actor_id,
                    version = job.weights.version(),
                    error = %e,
                    "failed to load weights, keeping previous"
                ),
            }
        }

        let mut state = self.game.new_initial_state();
        let mut trajectory = Trajectory::new();
        let aborted = match self.play_into(&mut state, &mut trajectory, &mut rng) {
            Ok(()) => false,
            Err(reason) => {
                warn!(
                    actor_id,
                    episode = job.episode,
                    moves = trajectory.len(),
                    %reason,
                    "episode aborted"
                );
                true
            }
        };

        let outcome = state.returns();
        info!(
            actor_id,
            episode = job.episode,
            moves = trajectory.len(),
            returns = ?outcome,
            reward_totals = ?trajectory.reward_totals(self.config.num_players),
            "episode finished"
        );
        self.metrics.record_episode(trajectory.len(), aborted);

        EpisodeResult {
            episode: job.episode,
            actor_id,
            trajectory,
            outcome,
            aborted,
        }
    }

    fn play_into(
        &mut self,
        state: &mut StateOf<C>,
        trajectory: &mut Trajectory,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), EpisodeAbort> {
        if state.is_chance_node() {
            let outcome = state
                .legal_actions()
                .first()
                .copied()
                .ok_or(EpisodeAbort::NoLegalActions {
                    player: state.current_player(),
                })?;
            state.apply_action(outcome)?;
        }

        while state.in_setup_phase() && !state.is_terminal() {
            let player = state.current_player();
            let action = state
                .legal_actions()
                .choose(rng)
                .copied()
                .ok_or(EpisodeAbort::NoLegalActions { player })?;
            trace!(action = %state.action_to_string(player, action), "setup move");
            state.apply_action(action)?;
        }

        let mut move_number = 0;
        while !state.is_terminal() {
            let player = state.current_player();
            let legal = state.legal_actions();
            if legal.is_empty() {
                return Err(EpisodeAbort::NoLegalActions { player });
            }

            let observation = state.observation_tensor();
            let (action, policy_target) = self
                .choose_move(state, &legal, move_number, rng)
                .ok_or(EpisodeAbort::NoLegalActions { player })?;
            trace!(move_number, action = %state.action_to_string(player, action), "move");

            state.apply_action(action)?;
            trajectory.push(Step {
                observation,
                player,
                policy_target,
                rewards: state.rewards(),
            });
            move_number += 1;
        }
        Ok(())
    }

    /// Pick a move and build its policy target.
    fn choose_move(
        &mut self,
        state: &StateOf<C>,
        legal: &[ActionId],
        move_number: usize,
        rng: &mut ChaCha8Rng,
    ) -> Option<(ActionId, Vec<f32>)> {
        let num_actions = self.config.num_actions;
        match &mut self.driver {
            ActorDriver::Heuristic => {
                let action = match state.select_heuristic_action(rng) {
                    Some(a) if legal.contains(&a) => a,
                    other => {
                        debug!(suggested = ?other, "heuristic gave no legal move, picking at random");
                        *legal.choose(rng)?
                    }
                };
                let target = heuristic_policy(&state.heuristic_action_weights(), legal, num_actions);
                Some((action, target))
            }
            ActorDriver::Search(driver) => {
                let evaluator = ModelEvaluator::new(
                    &driver.policy,
                    &driver.value,
                    num_actions,
                    self.config.num_players,
                    self.config.search.heuristic_weight,
                );
                let root = driver.search.search(state, &evaluator, rng);
                let temperature = self.config.search.temperature(move_number);
                let action = sample_visit_action(&root, legal, temperature, rng)?;
                Some((action, visit_policy(&root, legal, num_actions)))
            }
        }
    }
}

/// Actor config sized for the action space and player count of `game`.
pub fn actor_config_for<G: Game>(actor_id: u64, game: &G) -> ActorConfig {
    ActorConfig::new(actor_id, game.num_distinct_actions(), game.num_players())
}
