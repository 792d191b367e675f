//! Supervised pool of actor threads.
//!
//! The pool only tracks handles. Building and spawning actors is the
//! orchestrator's job since it owns the components and the current phase.
//!
//! ```text
//! reap_finished() ──► dead records removed, ids reported
//!        │
//!        └── caller spawns replacements with allocate_id() + insert()
//! ```

use super::actor::{ActorHandle, ActorKind};
use crate::core::{join_with_timeout, JoinOutcome};
use std::time::Duration;

/// An actor thread that has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorExit {
    pub id: u64,
    pub kind: ActorKind,
    /// True if the thread unwound from a panic
    pub panicked: bool,
}

/// Outcome of joining the whole pool at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolJoinReport {
    pub joined: usize,
    pub panicked: usize,
    /// Ids of actors still running after their join timeout
    pub abandoned: Vec<u64>,
}

/// Live actor records.
pub struct ActorPool {
    handles: Vec<ActorHandle>,
    next_id: u64,
    target_size: usize,
}

impl ActorPool {
    /// Create an empty pool that should hold `target_size` actors.
    pub fn new(target_size: usize) -> Self {
        Self {
            handles: Vec::with_capacity(target_size),
            next_id: 0,
            target_size,
        }
    }

    /// Reserve the next actor id. Ids are never reused.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a spawned actor.
    pub fn insert(&mut self, handle: ActorHandle) {
        self.handles.push(handle);
    }

    /// Get number of actors.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if pool is empty.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Actors missing to reach the target size.
    pub fn deficit(&self) -> usize {
        self.target_size.saturating_sub(self.handles.len())
    }

    pub fn ids(&self) -> Vec<u64> {
        self.handles.iter().map(|h| h.id).collect()
    }

    /// Number of live records of `kind`.
    pub fn count_kind(&self, kind: ActorKind) -> usize {
        self.handles.iter().filter(|h| h.kind == kind).count()
    }

    /// Get number of finished actors.
    pub fn finished_count(&self) -> usize {
        self.handles.iter().filter(|h| h.is_finished()).count()
    }

    /// Remove and join every actor whose thread has exited.
    pub fn reap_finished(&mut self) -> Vec<ActorExit> {
        let (finished, running): (Vec<_>, Vec<_>) =
            self.handles.drain(..).partition(|h| h.is_finished());
        self.handles = running;

        finished
            .into_iter()
            .map(|handle| {
                let (id, kind) = (handle.id, handle.kind);
                let panicked = handle.join().is_err();
                ActorExit { id, kind, panicked }
            })
            .collect()
    }

    /// Join every actor, waiting up to `timeout` for each.
    ///
    /// `idle` runs while waiting so callers can drain queues the actors may
    /// be blocked on. Actors that miss their timeout are detached.
    pub fn join_all(&mut self, timeout: Duration, mut idle: impl FnMut()) -> PoolJoinReport {
        let mut report = PoolJoinReport::default();
        for handle in self.handles.drain(..) {
            let id = handle.id;
            match join_with_timeout(handle.thread, timeout, &mut idle) {
                JoinOutcome::Finished(()) => report.joined += 1,
                JoinOutcome::Panicked => report.panicked += 1,
                JoinOutcome::TimedOut => report.abandoned.push(id),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn spawn_handle(pool: &mut ActorPool, kind: ActorKind, body: impl FnOnce() + Send + 'static) {
        let id = pool.allocate_id();
        let thread = std::thread::spawn(body);
        pool.insert(ActorHandle { id, kind, thread });
    }

    fn wait_until_finished(pool: &ActorPool, count: usize) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while pool.finished_count() < count && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_actor_pool_new() {
        let pool = ActorPool::new(4);
        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.deficit(), 4);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut pool = ActorPool::new(2);
        spawn_handle(&mut pool, ActorKind::Heuristic, || {});
        spawn_handle(&mut pool, ActorKind::Heuristic, || {});
        wait_until_finished(&pool, 2);

        assert_eq!(pool.reap_finished().len(), 2);
        assert_eq!(pool.allocate_id(), 2);
        assert_eq!(pool.allocate_id(), 3);
    }

    #[test]
    fn test_reap_reports_panics_and_keeps_live_actors() {
        let release = Arc::new(AtomicBool::new(false));
        let mut pool = ActorPool::new(3);

        spawn_handle(&mut pool, ActorKind::Heuristic, || {});
        spawn_handle(&mut pool, ActorKind::Search, || panic!("actor crashed"));
        let flag = Arc::clone(&release);
        spawn_handle(&mut pool, ActorKind::Search, move || {
            while !flag.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(2));
            }
        });
        wait_until_finished(&pool, 2);

        let mut exits = pool.reap_finished();
        exits.sort_by_key(|e| e.id);

        assert_eq!(
            exits,
            vec![
                ActorExit { id: 0, kind: ActorKind::Heuristic, panicked: false },
                ActorExit { id: 1, kind: ActorKind::Search, panicked: true },
            ]
        );
        assert_eq!(pool.ids(), vec![2]);
        assert_eq!(pool.deficit(), 2);
        assert_eq!(pool.count_kind(ActorKind::Search), 1);

        release.store(true, Ordering::Relaxed);
        let report = pool.join_all(Duration::from_secs(5), || {});
        assert_eq!(report.joined, 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_join_all_abandons_stuck_actor() {
        let release = Arc::new(AtomicBool::new(false));
        let mut pool = ActorPool::new(1);
        let flag = Arc::clone(&release);
        spawn_handle(&mut pool, ActorKind::Search, move || {
            while !flag.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(2));
            }
        });

        let report = pool.join_all(Duration::from_millis(30), || {});

        assert_eq!(report.abandoned, vec![0]);
        assert!(pool.is_empty());
        release.store(true, Ordering::Relaxed);
    }
}
