//! Trainer worker.
//!
//! The trainer owns both models and the replay buffer. It runs on its own
//! thread in short cycles:
//!
//! 1. Drain up to `drain_factor * batch_size` experiences without blocking
//! 2. Train on a random batch when enough new data arrived
//! 3. Publish a snapshot if the orchestrator took the previous one
//! 4. Checkpoint on the wall-clock interval
//! 5. Prune the replay buffer
//!
//! A stop message or a disconnected queue saves a final checkpoint and ends
//! the thread.

use super::agent::{TrainReport, TrainingAgent};
use crate::checkpoint::{load_checkpoint, CheckpointError, Checkpointer};
use crate::config::TrainerConfig;
use crate::core::{Experience, ReplayBuffer, SharedWeightSlot};
use crate::messages::{TrainerMsg, TrainerStats};
use crate::metrics::SharedRunMetrics;
use crate::model::Model;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io;
use std::path::Path;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Queue ends and shared state the trainer works on.
pub struct TrainerChannels {
    pub experiences: Receiver<TrainerMsg>,
    pub stats: Sender<TrainerStats>,
    pub weights: SharedWeightSlot,
}

/// Result of one trainer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cycle {
    Continue { absorbed: usize, trained: bool },
    Stop,
}

/// Single long-lived training worker.
pub struct Trainer<P, V> {
    config: TrainerConfig,
    agent: TrainingAgent<P, V>,
    checkpointer: Checkpointer,
    buffer: ReplayBuffer<Experience>,
    rng: ChaCha8Rng,
    stats: TrainerStats,
    dropped_stats: usize,
    metrics: SharedRunMetrics,
}

impl<P: Model, V: Model> Trainer<P, V> {
    /// Create a trainer checkpointing to `save_path`.
    ///
    /// `seed` drives batch sampling.
    pub fn new(
        config: TrainerConfig,
        agent: TrainingAgent<P, V>,
        save_path: &Path,
        seed: u64,
        metrics: SharedRunMetrics,
    ) -> Self {
        Self {
            checkpointer: Checkpointer::new(save_path, config.save_interval()),
            buffer: ReplayBuffer::new(config.replay_capacity),
            rng: ChaCha8Rng::seed_from_u64(seed),
            agent,
            config,
            stats: TrainerStats::new(),
            dropped_stats: 0,
            metrics,
        }
    }

    /// Load both models from `path` if a checkpoint exists there.
    ///
    /// A missing checkpoint is logged and training starts from scratch.
    pub fn warm_start(&mut self, path: Option<&Path>) -> Result<bool, CheckpointError> {
        let Some(path) = path else {
            return Ok(false);
        };
        let (policy, value) = self.agent.models_mut();
        let loaded = load_checkpoint(path, policy, value)?;
        if loaded {
            info!(path = %path.display(), "loaded model checkpoint");
        } else {
            warn!(path = %path.display(), "no checkpoint found, starting from scratch");
        }
        Ok(loaded)
    }

    pub fn agent(&self) -> &TrainingAgent<P, V> {
        &self.agent
    }

    pub fn buffer(&self) -> &ReplayBuffer<Experience> {
        &self.buffer
    }

    pub fn stats(&self) -> &TrainerStats {
        &self.stats
    }

    pub fn checkpointer(&self) -> &Checkpointer {
        &self.checkpointer
    }

    /// Spawn the trainer on a named thread.
    pub fn spawn(self, channels: TrainerChannels) -> io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("trainer".to_string())
            .spawn(move || self.run(channels))
    }

    /// Worker loop. Publishes the starting weights, then cycles until stopped.
    pub fn run(mut self, channels: TrainerChannels) {
        info!(
            batch_size = self.config.batch_size,
            replay_capacity = self.config.replay_capacity,
            "trainer started"
        );
        channels.weights.publish(self.agent.snapshot(0));
        self.metrics.record_snapshot_published();

        loop {
            match self.cycle(&channels) {
                Cycle::Stop => break,
                Cycle::Continue { absorbed, trained } => {
                    if absorbed == 0 && !trained {
                        std::thread::sleep(self.config.idle_sleep());
                    }
                }
            }
        }

        self.save_checkpoint();
        info!(
            train_steps = self.stats.train_steps,
            buffer_len = self.buffer.len(),
            dropped_stats = self.dropped_stats,
            "trainer stopped"
        );
    }

    /// Run one cycle. Never blocks except inside model calls.
    pub(crate) fn cycle(&mut self, channels: &TrainerChannels) -> Cycle {
        let mut absorbed = 0;
        while absorbed < self.config.max_drain() {
            match channels.experiences.try_recv() {
                Ok(TrainerMsg::Experience(experience)) => {
                    self.buffer.push(experience);
                    absorbed += 1;
                }
                Ok(TrainerMsg::Stop) => {
                    info!(absorbed, "trainer received stop signal");
                    return Cycle::Stop;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!(absorbed, "experience queue disconnected, trainer exiting");
                    return Cycle::Stop;
                }
            }
        }

        let trained = self.should_train(absorbed) && self.train_step(channels);

        if self.checkpointer.should_save() {
            self.save_checkpoint();
        }

        let pruned = if self.buffer.needs_pruning() {
            self.buffer.prune()
        } else {
            0
        };
        if pruned > 0 {
            debug!(pruned, buffer_len = self.buffer.len(), "pruned replay buffer");
        }

        Cycle::Continue { absorbed, trained }
    }

    fn should_train(&self, absorbed: usize) -> bool {
        let batch = self.config.batch_size;
        let len = self.buffer.len();
        len >= batch && (absorbed > batch / 2 || len % (2 * batch) == 0)
    }

    /// Train on one random batch. Returns true if the step succeeded.
    fn train_step(&mut self, channels: &TrainerChannels) -> bool {
        let Some(batch) = self.buffer.sample(self.config.batch_size, &mut self.rng) else {
            return false;
        };

        match self.agent.train(&batch) {
            Ok(report) => {
                self.on_trained(report, channels);
                true
            }
            Err(e) => {
                self.metrics.record_skipped_batch();
                if e.is_numerical() {
                    warn!(error = %e, "skipping batch with non-finite values");
                } else {
                    error!(error = %e, "training step failed, skipping batch");
                }
                false
            }
        }
    }

    fn on_trained(&mut self, report: TrainReport, channels: &TrainerChannels) {
        self.stats.record_step(report.policy_loss, report.value_loss);
        self.stats.buffer_len = self.buffer.len();
        self.metrics.record_train_step();

        let version = self.stats.train_steps as u64;
        let agent = &self.agent;
        if channels.weights.publish_if_empty(|| agent.snapshot(version)) {
            self.stats.weights_version = version;
            self.metrics.record_snapshot_published();
        }

        if let Err(TrySendError::Full(_)) = channels.stats.try_send(self.stats.clone()) {
            self.dropped_stats += 1;
        }
        debug!(
            train_steps = self.stats.train_steps,
            replay_utilization = self.buffer.utilization(),
            policy_loss = report.policy_loss,
            value_loss = report.value_loss,
            "train step"
        );
    }

    fn save_checkpoint(&mut self) {
        let (policy, value) = (self.agent.policy(), self.agent.value());
        match self.checkpointer.save(policy, value) {
            Ok(()) => {
                self.metrics.record_checkpoint_saved();
                info!(
                    path = %self.checkpointer.paths().policy.display(),
                    train_steps = self.stats.train_steps,
                    "saved checkpoint"
                );
            }
            Err(e) => error!(error = %e, "failed to save checkpoint"),
        }
    }
}

