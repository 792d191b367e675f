//! Orchestrator test suite.
//!
//! Full runs use the race game with small budgets. Pool supervision tests
//! drive a started session one iteration at a time so the effect of a single
//! loop iteration can be observed.

use super::orchestrator::{Progress, Session};
use super::*;
use crate::actors::ActorKind;
use crate::checkpoint::CheckpointPaths;
use crate::config::{OrchestratorConfig, SearchConfig, TrainerConfig};
use crate::game::{Game, GameError};
use crate::model::ModelError;
use crate::toy::{BiasModel, FlatSearch, RaceComponents, RaceGame, RaceState};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

// =============================================================================
// Test Helpers
// =============================================================================

fn test_config(dir: &Path, num_actors: usize, num_episodes: u64) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default()
        .with_num_actors(num_actors)
        .with_num_episodes(num_episodes)
        .with_games_per_actor(3)
        .with_master_seed(11)
        .with_save_model_path(dir.join("selfplay.json"))
        .with_weights_refresh(Duration::from_millis(20))
        .with_result_timeout(Duration::from_millis(20))
        .with_stall_timeout(Duration::from_secs(30))
        .with_search(SearchConfig::default().with_max_simulations(6))
        .with_trainer(
            TrainerConfig::default()
                .with_batch_size(8)
                .with_replay_capacity(200)
                .with_idle_sleep(Duration::from_millis(1)),
        );
    config.initial_weights_timeout_ms = 10_000;
    config.trainer_join_timeout_ms = 10_000;
    config.actor_join_timeout_ms = 10_000;
    config
}

fn race() -> RaceComponents {
    RaceComponents::new(2, 10, 0.05)
}

/// Race game whose engine panics on every new episode while `crash` is set.
struct CrashingGame {
    inner: RaceGame,
    crash: Arc<AtomicBool>,
}

impl Game for CrashingGame {
    type State = RaceState;

    fn new_initial_state(&self) -> RaceState {
        if self.crash.load(Ordering::SeqCst) {
            panic!("engine crashed");
        }
        self.inner.new_initial_state()
    }

    fn num_distinct_actions(&self) -> usize {
        self.inner.num_distinct_actions()
    }

    fn num_players(&self) -> usize {
        self.inner.num_players()
    }
}

struct CrashingComponents {
    crash: Arc<AtomicBool>,
}

impl SelfPlayComponents for CrashingComponents {
    type Game = CrashingGame;
    type Policy = BiasModel;
    type Value = BiasModel;
    type Search = FlatSearch;

    fn load_game(&self) -> Result<CrashingGame, GameError> {
        Ok(CrashingGame {
            inner: RaceGame::new(2, 10)?,
            crash: Arc::clone(&self.crash),
        })
    }

    fn policy_model(&self, game: &CrashingGame) -> Result<BiasModel, ModelError> {
        Ok(BiasModel::new(game.num_distinct_actions(), 0.05, true))
    }

    fn value_model(&self, game: &CrashingGame) -> Result<BiasModel, ModelError> {
        Ok(BiasModel::new(game.num_players(), 0.05, false))
    }

    fn search(&self, _game: &CrashingGame, config: &SearchConfig) -> FlatSearch {
        FlatSearch::new(config.max_simulations, config.uct_c)
    }
}

struct UnloadableComponents;

impl SelfPlayComponents for UnloadableComponents {
    type Game = RaceGame;
    type Policy = BiasModel;
    type Value = BiasModel;
    type Search = FlatSearch;

    fn load_game(&self) -> Result<RaceGame, GameError> {
        Err(GameError::Load("no such game".into()))
    }

    fn policy_model(&self, _game: &RaceGame) -> Result<BiasModel, ModelError> {
        Ok(BiasModel::new(3, 0.05, true))
    }

    fn value_model(&self, _game: &RaceGame) -> Result<BiasModel, ModelError> {
        Ok(BiasModel::new(2, 0.05, false))
    }

    fn search(&self, _game: &RaceGame, config: &SearchConfig) -> FlatSearch {
        FlatSearch::new(config.max_simulations, config.uct_c)
    }
}

fn wait_for_finished_actors<C: SelfPlayComponents>(session: &Session<'_, C>, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while session.pool().finished_count() < count && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(session.pool().finished_count(), count);
}

// =============================================================================
// Full Runs
// =============================================================================

#[test]
fn test_run_completes_and_checkpoints() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 3, 15);
    let save_path = config.save_model_path.clone();
    let mut orchestrator = Orchestrator::new(config, race());

    let summary = orchestrator.run().unwrap();

    assert!(summary.completed);
    assert_eq!(summary.games_processed, 15);
    assert_eq!(summary.jobs_dispatched, 15);
    assert!(summary.episodes_played >= 15);
    assert_eq!(summary.malformed_results, 0);
    assert!(summary.experiences_enqueued > 0);
    assert!(summary.snapshots_published >= 1);
    assert!(summary.checkpoints_saved >= 1);
    assert!(CheckpointPaths::from_base(&save_path).exist());
}

#[test]
fn test_warm_start_from_previous_run() {
    let dir = tempdir().unwrap();
    let first = test_config(dir.path(), 2, 6);
    let saved = first.save_model_path.clone();
    Orchestrator::new(first, race()).run().unwrap();

    let second = test_config(dir.path(), 2, 6)
        .with_load_model_path(&saved)
        .with_save_model_path(dir.path().join("second.json"));
    let summary = Orchestrator::new(second, race()).run().unwrap();

    assert!(summary.completed);
    assert!(CheckpointPaths::from_base(&dir.path().join("second.json")).exist());
}

#[test]
fn test_corrupt_checkpoint_fails_startup() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("corrupt.json");
    let paths = CheckpointPaths::from_base(&base);
    std::fs::write(&paths.policy, b"not json").unwrap();
    std::fs::write(&paths.value, b"not json").unwrap();

    let config = test_config(dir.path(), 2, 4).with_load_model_path(&base);
    let result = Orchestrator::new(config, race()).run();

    assert!(matches!(result, Err(OrchestratorError::Checkpoint(_))));
}

#[test]
fn test_game_load_failure_is_returned() {
    let dir = tempdir().unwrap();
    let mut orchestrator = Orchestrator::new(test_config(dir.path(), 2, 4), UnloadableComponents);

    let result = orchestrator.run();

    assert!(matches!(result, Err(OrchestratorError::Game(GameError::Load(_)))));
    assert!(orchestrator.spawn_history().is_empty());
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path(), 2, 4);
    config.result_timeout_ms = 0;

    let result = Orchestrator::new(config, race()).run();

    assert!(matches!(result, Err(OrchestratorError::Config(_))));
}

// =============================================================================
// Phases
// =============================================================================

#[test]
fn test_bootstrap_then_search_spawns() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 2, 12)
        .with_bootstrap_episodes(4)
        .with_games_per_actor(2);
    let mut orchestrator = Orchestrator::new(config, race());

    let summary = orchestrator.run().unwrap();
    assert!(summary.completed);

    let history = orchestrator.spawn_history();
    assert!(history.len() >= 6, "quota 2 needs at least 6 actors for 12 games");
    assert_eq!(history[0].kind, ActorKind::Heuristic);
    assert_eq!(history[1].kind, ActorKind::Heuristic);
    assert!(history.iter().any(|r| r.kind == ActorKind::Search));

    for record in history {
        assert_eq!(
            record.kind == ActorKind::Heuristic,
            record.games_processed < 4,
            "actor {} spawned after {} games as {}",
            record.actor_id,
            record.games_processed,
            record.kind
        );
    }
    // One-way: no heuristic spawn after the first search spawn.
    let first_search = history
        .iter()
        .position(|r| r.kind == ActorKind::Search)
        .unwrap();
    assert!(history[first_search..].iter().all(|r| r.kind == ActorKind::Search));
}

#[test]
fn test_no_bootstrap_spawns_only_search_actors() {
    let dir = tempdir().unwrap();
    let mut orchestrator = Orchestrator::new(test_config(dir.path(), 2, 4), race());

    orchestrator.run().unwrap();

    assert!(orchestrator
        .spawn_history()
        .iter()
        .all(|r| r.kind == ActorKind::Search));
}

// =============================================================================
// Pool Supervision
// =============================================================================

#[test]
fn test_crashed_actors_replaced_within_one_iteration() {
    let dir = tempdir().unwrap();
    let crash = Arc::new(AtomicBool::new(true));
    let components = CrashingComponents {
        crash: Arc::clone(&crash),
    };
    let orchestrator = Orchestrator::new(test_config(dir.path(), 2, 20), components);
    let mut session = orchestrator.start().unwrap();

    assert_eq!(session.step().unwrap(), Progress::Running);
    assert_eq!(session.pool().len(), 2);
    wait_for_finished_actors(&session, 2);

    crash.store(false, Ordering::SeqCst);
    session.step().unwrap();

    assert_eq!(session.pool().len(), 2);
    assert_eq!(session.pool().ids(), vec![2, 3]);
    assert_eq!(orchestrator.metrics().actor_crashes(), 2);
    assert_eq!(orchestrator.metrics().actors_replaced(), 2);
    assert_eq!(orchestrator.metrics().actors_spawned(), 4);

    session.shutdown();
}

#[test]
fn test_stall_guard_ends_run_early() {
    let dir = tempdir().unwrap();
    let components = CrashingComponents {
        crash: Arc::new(AtomicBool::new(true)),
    };
    let config = test_config(dir.path(), 2, 3).with_stall_timeout(Duration::from_millis(300));
    let mut orchestrator = Orchestrator::new(config, components);

    let summary = orchestrator.run().unwrap();

    assert!(!summary.completed);
    assert_eq!(summary.games_processed, 0);
    assert_eq!(summary.jobs_dispatched, 3);
    assert!(summary.actor_crashes >= 1);
}

// =============================================================================
// Queues
// =============================================================================

#[test]
fn test_queue_bounds_hold_during_run() {
    let dir = tempdir().unwrap();
    let num_actors = 3;
    let orchestrator = Orchestrator::new(test_config(dir.path(), num_actors, 30), race());
    let mut session = orchestrator.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(60);
    loop {
        let progress = session.step().unwrap();
        assert!(session.job_queue_len() <= 3 * num_actors);
        assert!(session.result_queue_len() <= num_actors);
        assert!(session.dispatched() <= 30);
        if progress != Progress::Running || Instant::now() > deadline {
            assert_eq!(progress, Progress::Completed);
            break;
        }
    }

    session.shutdown();
    assert_eq!(orchestrator.metrics().games_processed(), 30);
}
