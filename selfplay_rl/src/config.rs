//! Run configuration.
//!
//! Every tunable constant of a run lives here. Configs deserialize from JSON
//! with missing fields taking their defaults, so a file only has to name what
//! it overrides:
//!
//! ```json
//! { "num_actors": 8, "trainer": { "batch_size": 256 } }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Search-driven actor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Simulations per move
    pub max_simulations: usize,
    /// Exploration constant
    pub uct_c: f32,
    /// Dirichlet noise concentration at the root; 0 disables the noise
    pub dirichlet_alpha: f32,
    /// Weight of the root noise in the mixed prior
    pub dirichlet_epsilon: f32,
    /// Moves played at `early_temperature` before switching to `late_temperature`
    pub temperature_cutoff: usize,
    pub early_temperature: f32,
    pub late_temperature: f32,
    /// Share of the heuristic distribution in the mixed prior
    pub heuristic_weight: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_simulations: 50,
            uct_c: 2.0,
            dirichlet_alpha: 0.2,
            dirichlet_epsilon: 0.25,
            temperature_cutoff: 100,
            early_temperature: 1.0,
            late_temperature: 0.5,
            heuristic_weight: 0.25,
        }
    }
}

impl SearchConfig {
    /// Sampling temperature for the move with index `move_number` (0-based).
    pub fn temperature(&self, move_number: usize) -> f32 {
        if move_number < self.temperature_cutoff {
            self.early_temperature
        } else {
            self.late_temperature
        }
    }

    pub fn with_max_simulations(mut self, simulations: usize) -> Self {
        self.max_simulations = simulations;
        self
    }

    pub fn with_uct_c(mut self, uct_c: f32) -> Self {
        self.uct_c = uct_c;
        self
    }

    pub fn with_root_noise(mut self, alpha: f32, epsilon: f32) -> Self {
        self.dirichlet_alpha = alpha;
        self.dirichlet_epsilon = epsilon;
        self
    }

    pub fn with_heuristic_weight(mut self, weight: f32) -> Self {
        self.heuristic_weight = weight;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_simulations == 0 {
            return Err(ConfigError::Invalid("search.max_simulations must be > 0"));
        }
        if !(self.early_temperature > 0.0 && self.late_temperature > 0.0) {
            return Err(ConfigError::Invalid("search temperatures must be > 0"));
        }
        if !(self.dirichlet_alpha >= 0.0 && self.dirichlet_alpha.is_finite()) {
            return Err(ConfigError::Invalid("search.dirichlet_alpha must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.dirichlet_epsilon) {
            return Err(ConfigError::Invalid("search.dirichlet_epsilon must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.heuristic_weight) {
            return Err(ConfigError::Invalid("search.heuristic_weight must be in [0, 1]"));
        }
        Ok(())
    }
}

/// Trainer worker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub batch_size: usize,
    pub replay_capacity: usize,
    /// Handed to model constructors; the trainer itself never reads it
    pub learning_rate: f32,
    /// Experiences absorbed per cycle, as a multiple of `batch_size`
    pub drain_factor: usize,
    /// Wall-clock interval between checkpoints
    pub save_interval_ms: u64,
    /// Sleep when a cycle had nothing to do
    pub idle_sleep_ms: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 128,
            replay_capacity: 10_000,
            learning_rate: 2e-4,
            drain_factor: 4,
            save_interval_ms: 30 * 60 * 1000,
            idle_sleep_ms: 100,
        }
    }
}

impl TrainerConfig {
    /// Set the batch size.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is 0.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");
        self.batch_size = batch_size;
        self
    }

    /// Set the replay capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_replay_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "replay_capacity must be > 0");
        self.replay_capacity = capacity;
        self
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_idle_sleep(mut self, sleep: Duration) -> Self {
        self.idle_sleep_ms = sleep.as_millis() as u64;
        self
    }

    /// Upper bound on experiences absorbed per cycle.
    pub fn max_drain(&self) -> usize {
        self.batch_size * self.drain_factor
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("trainer.batch_size must be > 0"));
        }
        if self.replay_capacity < self.batch_size {
            return Err(ConfigError::Invalid(
                "trainer.replay_capacity must be >= trainer.batch_size",
            ));
        }
        if self.drain_factor == 0 {
            return Err(ConfigError::Invalid("trainer.drain_factor must be > 0"));
        }
        Ok(())
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Target actor pool size
    pub num_actors: usize,
    /// Results to process before shutdown
    pub num_episodes: u64,
    /// Results processed with heuristic actors before switching to search
    pub bootstrap_episodes: u64,
    /// Episodes each actor plays before exiting
    pub games_per_actor: usize,
    /// Master seed for job seeds; derived from the clock when absent
    pub master_seed: Option<u64>,
    /// Checkpoint base path to warm-start from
    pub load_model_path: Option<PathBuf>,
    /// Checkpoint base path written by the trainer
    pub save_model_path: PathBuf,
    pub weights_refresh_ms: u64,
    /// Bound on the per-iteration result pop
    pub result_timeout_ms: u64,
    /// Give up when every job is out and no result arrived for this long
    pub stall_timeout_ms: u64,
    pub initial_weights_timeout_ms: u64,
    pub trainer_join_timeout_ms: u64,
    pub actor_join_timeout_ms: u64,
    /// Log queue sizes every this many processed games (0 disables)
    pub queue_log_every: u64,
    pub search: SearchConfig,
    pub trainer: TrainerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            num_actors: 4,
            num_episodes: 1000,
            bootstrap_episodes: 0,
            games_per_actor: 10,
            master_seed: None,
            load_model_path: None,
            save_model_path: PathBuf::from("models/selfplay.json"),
            weights_refresh_ms: 15_000,
            result_timeout_ms: 1_000,
            stall_timeout_ms: 10 * 60 * 1000,
            initial_weights_timeout_ms: 5 * 60 * 1000,
            trainer_join_timeout_ms: 180_000,
            actor_join_timeout_ms: 60_000,
            queue_log_every: 10,
            search: SearchConfig::default(),
            trainer: TrainerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Set the actor pool size.
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    pub fn with_num_actors(mut self, n: usize) -> Self {
        assert!(n > 0, "num_actors must be > 0");
        self.num_actors = n;
        self
    }

    pub fn with_num_episodes(mut self, n: u64) -> Self {
        self.num_episodes = n;
        self
    }

    pub fn with_bootstrap_episodes(mut self, n: u64) -> Self {
        self.bootstrap_episodes = n;
        self
    }

    /// Set the per-actor episode quota.
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    pub fn with_games_per_actor(mut self, n: usize) -> Self {
        assert!(n > 0, "games_per_actor must be > 0");
        self.games_per_actor = n;
        self
    }

    pub fn with_master_seed(mut self, seed: u64) -> Self {
        self.master_seed = Some(seed);
        self
    }

    pub fn with_load_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.load_model_path = Some(path.into());
        self
    }

    pub fn with_save_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_model_path = path.into();
        self
    }

    pub fn with_weights_refresh(mut self, interval: Duration) -> Self {
        self.weights_refresh_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_result_timeout(mut self, timeout: Duration) -> Self {
        self.result_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_trainer(mut self, trainer: TrainerConfig) -> Self {
        self.trainer = trainer;
        self
    }

    /// Job queue capacity: three jobs per actor.
    pub fn job_queue_capacity(&self) -> usize {
        self.num_actors * 3
    }

    /// Dispatch stops once this many jobs are queued.
    pub fn dispatch_target(&self) -> usize {
        self.num_actors * 2
    }

    /// Result queue capacity: one result per actor.
    pub fn result_queue_capacity(&self) -> usize {
        self.num_actors
    }

    /// Trainer queue capacity: fifty batches.
    pub fn replay_queue_capacity(&self) -> usize {
        self.trainer.batch_size * 50
    }

    pub fn weights_refresh(&self) -> Duration {
        Duration::from_millis(self.weights_refresh_ms)
    }

    pub fn result_timeout(&self) -> Duration {
        Duration::from_millis(self.result_timeout_ms)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    pub fn initial_weights_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_weights_timeout_ms)
    }

    pub fn trainer_join_timeout(&self) -> Duration {
        Duration::from_millis(self.trainer_join_timeout_ms)
    }

    pub fn actor_join_timeout(&self) -> Duration {
        Duration::from_millis(self.actor_join_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_actors == 0 {
            return Err(ConfigError::Invalid("num_actors must be > 0"));
        }
        if self.games_per_actor == 0 {
            return Err(ConfigError::Invalid("games_per_actor must be > 0"));
        }
        if self.result_timeout_ms == 0 {
            return Err(ConfigError::Invalid("result_timeout_ms must be > 0"));
        }
        self.search.validate()?;
        self.trainer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.num_episodes, 1000);
        assert_eq!(config.games_per_actor, 10);
        assert_eq!(config.trainer.batch_size, 128);
        assert_eq!(config.trainer.replay_capacity, 10_000);
        assert_eq!(config.weights_refresh(), Duration::from_secs(15));
        assert_eq!(config.trainer.save_interval(), Duration::from_secs(1800));
        assert_eq!(config.search.max_simulations, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_queue_capacities() {
        let config = OrchestratorConfig::default()
            .with_num_actors(6)
            .with_trainer(TrainerConfig::default().with_batch_size(32));
        assert_eq!(config.job_queue_capacity(), 18);
        assert_eq!(config.dispatch_target(), 12);
        assert_eq!(config.result_queue_capacity(), 6);
        assert_eq!(config.replay_queue_capacity(), 1600);
    }

    #[test]
    fn test_temperature_schedule() {
        let search = SearchConfig::default();
        assert_eq!(search.temperature(0), 1.0);
        assert_eq!(search.temperature(99), 1.0);
        assert_eq!(search.temperature(100), 0.5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = OrchestratorConfig::from_json_str(
            r#"{ "num_actors": 8, "master_seed": 42, "trainer": { "batch_size": 64 } }"#,
        )
        .unwrap();
        assert_eq!(config.num_actors, 8);
        assert_eq!(config.master_seed, Some(42));
        assert_eq!(config.trainer.batch_size, 64);
        assert_eq!(config.trainer.replay_capacity, 10_000);
        assert_eq!(config.search, SearchConfig::default());
    }

    #[test]
    fn test_json_rejects_invalid_values() {
        let err = OrchestratorConfig::from_json_str(r#"{ "num_actors": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = OrchestratorConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_root_noise_settings_validated() {
        let config = OrchestratorConfig::default()
            .with_search(SearchConfig::default().with_root_noise(0.0, 0.0));
        assert!(config.validate().is_ok());

        let config = OrchestratorConfig::default()
            .with_search(SearchConfig::default().with_root_noise(-0.1, 0.25));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = OrchestratorConfig::default()
            .with_search(SearchConfig::default().with_root_noise(0.2, 1.5));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_replay_smaller_than_batch_rejected() {
        let mut config = OrchestratorConfig::default();
        config.trainer.replay_capacity = 10;
        config.trainer.batch_size = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "num_episodes": 12, "bootstrap_episodes": 4 }}"#).unwrap();

        let config = OrchestratorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.num_episodes, 12);
        assert_eq!(config.bootstrap_episodes, 4);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = OrchestratorConfig::from_json_file("/nonexistent/run.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.json"));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = OrchestratorConfig::default()
            .with_master_seed(7)
            .with_load_model_path("ckpt/model.json");
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(OrchestratorConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    #[should_panic(expected = "num_actors must be > 0")]
    fn test_zero_actors_panics() {
        let _ = OrchestratorConfig::default().with_num_actors(0);
    }
}
