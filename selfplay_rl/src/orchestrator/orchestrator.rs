//! Session driver.
//!
//! The orchestrator runs on the caller's thread and owns every queue end the
//! workers do not. One loop iteration:
//!
//! 1. Advance the bootstrap/search phase
//! 2. Replace dead actors and top the pool up
//! 3. Dispatch jobs while the job queue is below `2 * num_actors`
//! 4. Pop at most one result, credit it and forward the experiences
//! 5. On the refresh interval, pick up new weights and trainer stats
//!
//! ```text
//!            JobMsg (3n)                      EpisodeResult (n)
//! Orchestrator ─────────► Actor 0..n-1 ─────────────────► Orchestrator
//!      │                                                       │
//!      │ TrainerMsg (batch*50)        WeightSlot (1)           │
//!      └──────────────────► Trainer ──────────────► ◄──────────┘
//! ```

use super::components::SelfPlayComponents;
use super::ingest::result_experiences;
use super::phase::PhaseTracker;
use crate::actors::{actor_config_for, Actor, ActorChannels, ActorDriver, ActorKind, ActorPool, SearchDriver};
use crate::checkpoint::CheckpointError;
use crate::config::{ConfigError, OrchestratorConfig};
use crate::core::{
    join_with_timeout, weight_slot, EpisodeResult, Experience, JoinOutcome, SeedSequence,
    SharedWeightSlot, WeightSnapshot,
};
use crate::game::{Game, GameError};
use crate::messages::{Job, JobMsg, TrainerMsg, TrainerStats};
use crate::metrics::{run_metrics, RunSummary, SharedRunMetrics};
use crate::model::ModelError;
use crate::trainer::{Trainer, TrainerChannels, TrainingAgent};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const STATS_QUEUE_CAPACITY: usize = 100;
const STARTUP_POLL: Duration = Duration::from_millis(10);

/// Failures that prevent a run from starting or continuing.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load game: {0}")]
    Game(#[from] GameError),
    #[error("failed to build model: {0}")]
    Model(#[from] ModelError),
    #[error("failed to warm start: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("failed to spawn {what} thread: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("trainer exited before publishing initial weights")]
    TrainerExited,
    #[error("trainer published no initial weights within {0:?}")]
    InitialWeightsTimeout(Duration),
}

/// An actor spawn, in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnRecord {
    pub actor_id: u64,
    pub kind: ActorKind,
    /// Results processed when the actor was spawned
    pub games_processed: u64,
}

/// Where the session loop stands after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Progress {
    Running,
    Completed,
    /// Every job is out and results stopped arriving
    Stalled,
}

/// Self-play run driver.
pub struct Orchestrator<C: SelfPlayComponents> {
    config: OrchestratorConfig,
    components: C,
    metrics: SharedRunMetrics,
    spawn_history: Vec<SpawnRecord>,
}

impl<C: SelfPlayComponents> Orchestrator<C> {
    pub fn new(config: OrchestratorConfig, components: C) -> Self {
        Self {
            config,
            components,
            metrics: run_metrics(),
            spawn_history: Vec::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SharedRunMetrics {
        &self.metrics
    }

    /// Actors spawned by the last run.
    pub fn spawn_history(&self) -> &[SpawnRecord] {
        &self.spawn_history
    }

    /// Run until `num_episodes` results are processed or the run stalls.
    ///
    /// Workers are always shut down before this returns, including when the
    /// loop fails. Failures before the first actor spawns are returned as is.
    pub fn run(&mut self) -> Result<RunSummary, OrchestratorError> {
        let start = Instant::now();
        let mut session = self.start()?;
        let outcome = session.drive();
        let history = session.shutdown();
        self.spawn_history = history;
        let completed = outcome?;

        let summary = self.metrics.summary(completed, start.elapsed());
        info!(
            completed,
            games_processed = summary.games_processed,
            episodes_aborted = summary.episodes_aborted,
            actors_spawned = summary.actors_spawned,
            actor_crashes = summary.actor_crashes,
            train_steps = summary.train_steps,
            experiences_dropped = summary.experiences_dropped,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "run finished"
        );
        Ok(summary)
    }

    /// Load the game, start the trainer and wait for its first snapshot.
    pub(super) fn start(&self) -> Result<Session<'_, C>, OrchestratorError> {
        let config = &self.config;
        config.validate()?;

        let game = Arc::new(self.components.load_game()?);
        let num_players = game.num_players();
        let num_actions = game.num_distinct_actions();
        let seeds = SeedSequence::from_optional(config.master_seed);
        info!(
            num_actors = config.num_actors,
            num_episodes = config.num_episodes,
            bootstrap_episodes = config.bootstrap_episodes,
            num_players,
            num_actions,
            master_seed = seeds.master(),
            "starting self-play run"
        );

        let agent = TrainingAgent::new(
            self.components.policy_model(&game)?,
            self.components.value_model(&game)?,
            num_players,
        );
        let mut trainer = Trainer::new(
            config.trainer.clone(),
            agent,
            &config.save_model_path,
            seeds.master(),
            Arc::clone(&self.metrics),
        );
        trainer.warm_start(config.load_model_path.as_deref())?;

        let (trainer_tx, trainer_rx) = bounded(config.replay_queue_capacity());
        let (stats_tx, stats_rx) = bounded(STATS_QUEUE_CAPACITY);
        let slot = weight_slot();
        let trainer_handle = trainer
            .spawn(TrainerChannels {
                experiences: trainer_rx,
                stats: stats_tx,
                weights: Arc::clone(&slot),
            })
            .map_err(|source| OrchestratorError::Spawn {
                what: "trainer",
                source,
            })?;

        let weights = match wait_for_initial_weights(&slot, &trainer_handle, config.initial_weights_timeout()) {
            Ok(weights) => weights,
            Err(e) => {
                let _ = trainer_tx.try_send(TrainerMsg::Stop);
                let _ = join_with_timeout(trainer_handle, config.trainer_join_timeout(), || {});
                return Err(e);
            }
        };
        info!(version = weights.version(), "received initial weights");

        let (job_tx, job_rx) = bounded(config.job_queue_capacity());
        let (result_tx, result_rx) = bounded(config.result_queue_capacity());
        let now = Instant::now();

        Ok(Session {
            config,
            components: &self.components,
            game,
            num_players,
            num_actions,
            metrics: Arc::clone(&self.metrics),
            pool: ActorPool::new(config.num_actors),
            phase: PhaseTracker::new(config.bootstrap_episodes),
            seeds,
            weights,
            slot,
            job_tx,
            job_rx,
            result_tx,
            result_rx,
            trainer_tx,
            stats_rx,
            trainer: Some(trainer_handle),
            trainer_exit_logged: false,
            dispatched: 0,
            games_processed: 0,
            last_refresh: now,
            last_result: now,
            history: Vec::new(),
        })
    }
}

fn wait_for_initial_weights(
    slot: &SharedWeightSlot,
    trainer: &JoinHandle<()>,
    timeout: Duration,
) -> Result<WeightSnapshot, OrchestratorError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(weights) = slot.take() {
            return Ok(weights);
        }
        if trainer.is_finished() {
            return Err(OrchestratorError::TrainerExited);
        }
        if Instant::now() >= deadline {
            return Err(OrchestratorError::InitialWeightsTimeout(timeout));
        }
        std::thread::sleep(STARTUP_POLL);
    }
}

/// State of a started run.
pub(super) struct Session<'a, C: SelfPlayComponents> {
    config: &'a OrchestratorConfig,
    components: &'a C,
    game: Arc<C::Game>,
    num_players: usize,
    num_actions: usize,
    metrics: SharedRunMetrics,
    pool: ActorPool,
    phase: PhaseTracker,
    seeds: SeedSequence,
    /// Newest weights, attached to every dispatched job
    weights: WeightSnapshot,
    slot: SharedWeightSlot,
    job_tx: Sender<JobMsg>,
    job_rx: Receiver<JobMsg>,
    result_tx: Sender<EpisodeResult>,
    result_rx: Receiver<EpisodeResult>,
    trainer_tx: Sender<TrainerMsg>,
    stats_rx: Receiver<TrainerStats>,
    trainer: Option<JoinHandle<()>>,
    trainer_exit_logged: bool,
    dispatched: u64,
    games_processed: u64,
    last_refresh: Instant,
    last_result: Instant,
    history: Vec<SpawnRecord>,
}

impl<'a, C: SelfPlayComponents> Session<'a, C> {
    /// Loop until done. Returns false if the run stalled.
    pub(super) fn drive(&mut self) -> Result<bool, OrchestratorError> {
        loop {
            match self.step()? {
                Progress::Running => {}
                Progress::Completed => return Ok(true),
                Progress::Stalled => return Ok(false),
            }
        }
    }

    /// One loop iteration.
    pub(super) fn step(&mut self) -> Result<Progress, OrchestratorError> {
        if self.games_processed >= self.config.num_episodes {
            return Ok(Progress::Completed);
        }

        self.phase.update(self.games_processed);
        self.maintain_pool()?;
        self.dispatch();
        self.ingest();
        if self.last_refresh.elapsed() >= self.config.weights_refresh() {
            self.refresh();
        }

        if self.games_processed >= self.config.num_episodes {
            return Ok(Progress::Completed);
        }
        if self.dispatched >= self.config.num_episodes
            && self.last_result.elapsed() >= self.config.stall_timeout()
        {
            error!(
                games_processed = self.games_processed,
                num_episodes = self.config.num_episodes,
                stall_secs = self.config.stall_timeout().as_secs(),
                "no results arriving, ending run early"
            );
            return Ok(Progress::Stalled);
        }
        Ok(Progress::Running)
    }

    #[cfg(test)]
    pub(super) fn pool(&self) -> &ActorPool {
        &self.pool
    }

    #[cfg(test)]
    pub(super) fn job_queue_len(&self) -> usize {
        self.job_tx.len()
    }

    #[cfg(test)]
    pub(super) fn result_queue_len(&self) -> usize {
        self.result_rx.len()
    }

    #[cfg(test)]
    pub(super) fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Reap dead actors and spawn replacements of the current phase's kind.
    fn maintain_pool(&mut self) -> Result<(), OrchestratorError> {
        for exit in self.pool.reap_finished() {
            self.metrics.record_actor_replaced(exit.panicked);
            if exit.panicked {
                warn!(actor_id = exit.id, kind = %exit.kind, "actor crashed, replacing");
            } else {
                debug!(actor_id = exit.id, kind = %exit.kind, "actor finished, replacing");
            }
        }

        let kind = self.phase.phase().actor_kind();
        while self.pool.deficit() > 0 {
            self.spawn_actor(kind)?;
        }
        Ok(())
    }

    fn spawn_actor(&mut self, kind: ActorKind) -> Result<(), OrchestratorError> {
        let game: &C::Game = &self.game;
        let actor_id = self.pool.allocate_id();
        let config = actor_config_for(actor_id, game)
            .with_games_per_actor(self.config.games_per_actor)
            .with_search(self.config.search.clone());

        let driver = match kind {
            ActorKind::Heuristic => ActorDriver::Heuristic,
            ActorKind::Search => ActorDriver::Search(SearchDriver::new(
                self.components.policy_model(game)?,
                self.components.value_model(game)?,
                self.components.search(game, &self.config.search),
            )),
        };

        let actor: Actor<C> = Actor::new(config, Arc::clone(&self.game), driver, Arc::clone(&self.metrics));
        let handle = actor
            .spawn(ActorChannels {
                jobs: self.job_rx.clone(),
                results: self.result_tx.clone(),
            })
            .map_err(|source| OrchestratorError::Spawn {
                what: "actor",
                source,
            })?;

        self.pool.insert(handle);
        self.metrics.record_actor_spawned();
        self.history.push(SpawnRecord {
            actor_id,
            kind,
            games_processed: self.games_processed,
        });
        debug!(actor_id, %kind, pool_size = self.pool.len(), "spawned actor");
        Ok(())
    }

    fn dispatch(&mut self) {
        while self.job_tx.len() < self.config.dispatch_target()
            && self.dispatched < self.config.num_episodes
        {
            let job = Job {
                episode: self.dispatched,
                weights: self.weights.clone(),
                seed: self.seeds.next_seed(),
            };
            if let Err(e) = self.job_tx.try_send(JobMsg::Play(job)) {
                warn!(error = %e, "failed to dispatch job");
                break;
            }
            self.dispatched += 1;
            self.metrics.record_job_dispatched();
        }
    }

    fn ingest(&mut self) {
        match self.result_rx.recv_timeout(self.config.result_timeout()) {
            Ok(result) => self.process_result(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }
    }

    fn process_result(&mut self, result: EpisodeResult) {
        self.games_processed += 1;
        self.last_result = Instant::now();
        self.metrics.record_game_processed();

        match result_experiences(&result, self.num_players, self.num_actions) {
            Ok(experiences) => self.forward(experiences, result.episode),
            Err(e) => {
                self.metrics.record_malformed_result();
                warn!(
                    episode = result.episode,
                    actor_id = result.actor_id,
                    error = %e,
                    "discarding malformed result"
                );
            }
        }

        let every = self.config.queue_log_every;
        if every > 0 && self.games_processed % every == 0 {
            debug!(
                games_processed = self.games_processed,
                job_queue = self.job_tx.len(),
                result_queue = self.result_rx.len(),
                replay_queue = self.trainer_tx.len(),
                heuristic_actors = self.pool.count_kind(ActorKind::Heuristic),
                search_actors = self.pool.count_kind(ActorKind::Search),
                "queue sizes"
            );
        }
    }

    /// Push experiences to the trainer; the rest of the trajectory is dropped
    /// once the queue is full.
    fn forward(&mut self, experiences: Vec<Experience>, episode: u64) {
        let total = experiences.len();
        let mut sent = 0;
        for experience in experiences {
            match self.trainer_tx.try_send(TrainerMsg::Experience(experience)) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(episode, dropped = total - sent, "replay queue full, dropping experiences");
                    break;
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!(episode, dropped = total - sent, "trainer queue disconnected");
                    break;
                }
            }
        }
        self.metrics.add_experiences_enqueued(sent);
        self.metrics.add_experiences_dropped(total - sent);
    }

    /// Pick up the newest weights and report trainer progress.
    fn refresh(&mut self) {
        self.last_refresh = Instant::now();

        if let Some(weights) = self.slot.take() {
            info!(version = weights.version(), "picked up new weights");
            self.weights = weights;
        }
        for stats in self.stats_rx.try_iter() {
            info!(
                train_steps = stats.train_steps,
                loss = stats.loss,
                policy_loss = stats.policy_loss,
                value_loss = stats.value_loss,
                buffer_len = stats.buffer_len,
                "trainer progress"
            );
        }

        let trainer_exited = self.trainer.as_ref().is_some_and(|h| h.is_finished());
        if trainer_exited && !self.trainer_exit_logged {
            error!("trainer thread exited, experiences are no longer trained on");
            self.trainer_exit_logged = true;
        }
    }

    /// Stop every worker and wait for them with bounded joins.
    ///
    /// Returns the spawn history of the session.
    pub(super) fn shutdown(mut self) -> Vec<SpawnRecord> {
        info!(
            games_processed = self.games_processed,
            dispatched = self.dispatched,
            live_actors = self.pool.len(),
            "shutting down workers"
        );

        let trainer_join_timeout = self.config.trainer_join_timeout();
        if let Err(e) = self.trainer_tx.send_timeout(TrainerMsg::Stop, trainer_join_timeout) {
            warn!(error = %e, "could not send stop to trainer");
        }

        let undelivered = self.job_rx.try_iter().count();
        if undelivered > 0 {
            debug!(undelivered, "discarded undelivered jobs");
        }
        for _ in 0..self.pool.len() {
            if self.job_tx.try_send(JobMsg::Stop).is_err() {
                warn!("job queue full while sending stop signals");
                break;
            }
        }

        if let Some(handle) = self.trainer.take() {
            match join_with_timeout(handle, trainer_join_timeout, || {}) {
                JoinOutcome::Finished(()) => info!("trainer joined"),
                JoinOutcome::Panicked => error!("trainer thread panicked"),
                JoinOutcome::TimedOut => warn!(
                    timeout_secs = trainer_join_timeout.as_secs(),
                    "trainer did not exit in time, abandoning"
                ),
            }
        }

        let results = &self.result_rx;
        let report = self.pool.join_all(self.config.actor_join_timeout(), || {
            for _ in results.try_iter() {}
        });
        if report.abandoned.is_empty() {
            info!(joined = report.joined, panicked = report.panicked, "actors joined");
        } else {
            warn!(
                joined = report.joined,
                panicked = report.panicked,
                abandoned = ?report.abandoned,
                "some actors did not exit in time, abandoning"
            );
        }

        self.history
    }
}
