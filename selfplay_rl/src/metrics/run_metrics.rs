//! Shared run counters for coordination between actors, trainer and orchestrator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Thread-safe run counters.
#[derive(Debug, Default)]
pub struct RunMetrics {
    // Actors
    episodes_played: AtomicU64,
    steps_played: AtomicU64,
    episodes_aborted: AtomicU64,
    // Orchestrator
    games_processed: AtomicU64,
    jobs_dispatched: AtomicU64,
    actors_spawned: AtomicU64,
    actors_replaced: AtomicU64,
    actor_crashes: AtomicU64,
    experiences_enqueued: AtomicU64,
    experiences_dropped: AtomicU64,
    malformed_results: AtomicU64,
    // Trainer
    train_steps: AtomicU64,
    skipped_batches: AtomicU64,
    snapshots_published: AtomicU64,
    checkpoints_saved: AtomicU64,
}

fn add(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

fn get(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished episode of `steps` plies.
    pub fn record_episode(&self, steps: usize, aborted: bool) {
        add(&self.episodes_played, 1);
        add(&self.steps_played, steps as u64);
        if aborted {
            add(&self.episodes_aborted, 1);
        }
    }

    pub fn record_game_processed(&self) {
        add(&self.games_processed, 1);
    }

    pub fn record_job_dispatched(&self) {
        add(&self.jobs_dispatched, 1);
    }

    pub fn record_actor_spawned(&self) {
        add(&self.actors_spawned, 1);
    }

    /// Record a dead actor that is being replaced.
    pub fn record_actor_replaced(&self, crashed: bool) {
        add(&self.actors_replaced, 1);
        if crashed {
            add(&self.actor_crashes, 1);
        }
    }

    pub fn add_experiences_enqueued(&self, n: usize) {
        add(&self.experiences_enqueued, n as u64);
    }

    pub fn add_experiences_dropped(&self, n: usize) {
        add(&self.experiences_dropped, n as u64);
    }

    pub fn record_malformed_result(&self) {
        add(&self.malformed_results, 1);
    }

    pub fn record_train_step(&self) {
        add(&self.train_steps, 1);
    }

    pub fn record_skipped_batch(&self) {
        add(&self.skipped_batches, 1);
    }

    pub fn record_snapshot_published(&self) {
        add(&self.snapshots_published, 1);
    }

    pub fn record_checkpoint_saved(&self) {
        add(&self.checkpoints_saved, 1);
    }

    pub fn episodes_played(&self) -> u64 {
        get(&self.episodes_played)
    }

    pub fn games_processed(&self) -> u64 {
        get(&self.games_processed)
    }

    pub fn actors_spawned(&self) -> u64 {
        get(&self.actors_spawned)
    }

    pub fn actors_replaced(&self) -> u64 {
        get(&self.actors_replaced)
    }

    pub fn actor_crashes(&self) -> u64 {
        get(&self.actor_crashes)
    }

    pub fn train_steps(&self) -> u64 {
        get(&self.train_steps)
    }

    pub fn skipped_batches(&self) -> u64 {
        get(&self.skipped_batches)
    }

    pub fn snapshots_published(&self) -> u64 {
        get(&self.snapshots_published)
    }

    pub fn checkpoints_saved(&self) -> u64 {
        get(&self.checkpoints_saved)
    }

    /// Freeze the counters into a summary.
    pub fn summary(&self, completed: bool, elapsed: Duration) -> RunSummary {
        RunSummary {
            completed,
            elapsed,
            episodes_played: get(&self.episodes_played),
            steps_played: get(&self.steps_played),
            episodes_aborted: get(&self.episodes_aborted),
            games_processed: get(&self.games_processed),
            jobs_dispatched: get(&self.jobs_dispatched),
            actors_spawned: get(&self.actors_spawned),
            actors_replaced: get(&self.actors_replaced),
            actor_crashes: get(&self.actor_crashes),
            experiences_enqueued: get(&self.experiences_enqueued),
            experiences_dropped: get(&self.experiences_dropped),
            malformed_results: get(&self.malformed_results),
            train_steps: get(&self.train_steps),
            skipped_batches: get(&self.skipped_batches),
            snapshots_published: get(&self.snapshots_published),
            checkpoints_saved: get(&self.checkpoints_saved),
        }
    }
}

/// Shared run metrics.
pub type SharedRunMetrics = Arc<RunMetrics>;

/// Create new shared run metrics.
pub fn run_metrics() -> SharedRunMetrics {
    Arc::new(RunMetrics::new())
}

/// Final counters of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// False when the run ended early (stall guard)
    pub completed: bool,
    pub elapsed: Duration,
    pub episodes_played: u64,
    pub steps_played: u64,
    pub episodes_aborted: u64,
    pub games_processed: u64,
    pub jobs_dispatched: u64,
    pub actors_spawned: u64,
    pub actors_replaced: u64,
    pub actor_crashes: u64,
    pub experiences_enqueued: u64,
    pub experiences_dropped: u64,
    pub malformed_results: u64,
    pub train_steps: u64,
    pub skipped_batches: u64,
    pub snapshots_published: u64,
    pub checkpoints_saved: u64,
}

impl RunSummary {
    /// Processed games per second of wall time.
    pub fn games_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.games_processed as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_metrics_new() {
        let metrics = RunMetrics::new();
        assert_eq!(metrics.episodes_played(), 0);
        assert_eq!(metrics.games_processed(), 0);
        assert_eq!(metrics.train_steps(), 0);
    }

    #[test]
    fn test_record_episode() {
        let metrics = RunMetrics::new();
        metrics.record_episode(12, false);
        metrics.record_episode(3, true);

        let summary = metrics.summary(true, Duration::ZERO);
        assert_eq!(summary.episodes_played, 2);
        assert_eq!(summary.steps_played, 15);
        assert_eq!(summary.episodes_aborted, 1);
    }

    #[test]
    fn test_actor_replacement_counts_crashes() {
        let metrics = RunMetrics::new();
        metrics.record_actor_replaced(false);
        metrics.record_actor_replaced(true);
        assert_eq!(metrics.actors_replaced(), 2);
        assert_eq!(metrics.actor_crashes(), 1);
    }

    #[test]
    fn test_summary_games_per_second() {
        let metrics = RunMetrics::new();
        for _ in 0..10 {
            metrics.record_game_processed();
        }
        let summary = metrics.summary(true, Duration::from_secs(2));
        assert_eq!(summary.games_processed, 10);
        assert!((summary.games_per_second() - 5.0).abs() < 1e-9);
        assert_eq!(RunSummary::default().games_per_second(), 0.0);
    }

    #[test]
    fn test_shared_run_metrics() {
        let metrics = run_metrics();
        let metrics2 = Arc::clone(&metrics);

        std::thread::spawn(move || metrics2.record_train_step())
            .join()
            .unwrap();

        assert_eq!(metrics.train_steps(), 1);
    }
}
