//! Joining worker threads with a deadline.
//!
//! `std` threads cannot be killed. A worker that misses its deadline is
//! detached: its handle is dropped and the thread keeps running until the
//! process exits.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a bounded join ended.
#[derive(Debug, PartialEq, Eq)]
pub enum JoinOutcome<T> {
    /// Thread returned normally
    Finished(T),
    /// Thread unwound from a panic
    Panicked,
    /// Deadline passed; the thread was detached
    TimedOut,
}

impl<T> JoinOutcome<T> {
    pub fn is_finished(&self) -> bool {
        matches!(self, JoinOutcome::Finished(_))
    }
}

/// Wait up to `timeout` for `handle` to finish.
///
/// `idle` runs between liveness polls, e.g. to drain a queue the worker may be
/// blocked on.
pub fn join_with_timeout<T>(
    handle: JoinHandle<T>,
    timeout: Duration,
    mut idle: impl FnMut(),
) -> JoinOutcome<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if handle.is_finished() {
            return match handle.join() {
                Ok(value) => JoinOutcome::Finished(value),
                Err(_) => JoinOutcome::Panicked,
            };
        }
        if Instant::now() >= deadline {
            return JoinOutcome::TimedOut;
        }
        idle();
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_join_finished_thread() {
        let handle = std::thread::spawn(|| 42);
        let outcome = join_with_timeout(handle, Duration::from_secs(5), || {});
        assert_eq!(outcome, JoinOutcome::Finished(42));
    }

    #[test]
    fn test_join_panicked_thread() {
        let handle = std::thread::spawn(|| panic!("worker failure"));
        let outcome: JoinOutcome<()> = join_with_timeout(handle, Duration::from_secs(5), || {});
        assert_eq!(outcome, JoinOutcome::Panicked);
    }

    #[test]
    fn test_join_times_out_and_detaches() {
        let release = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&release);
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        let outcome = join_with_timeout(handle, Duration::from_millis(50), || {});
        assert_eq!(outcome, JoinOutcome::TimedOut);
        release.store(true, Ordering::Relaxed);
    }

    #[test]
    fn test_idle_runs_while_waiting() {
        let (tx, rx) = crossbeam_channel::bounded::<u32>(1);
        let handle = std::thread::spawn(move || {
            // Blocks until the idle callback drains the first item.
            tx.send(1).unwrap();
            tx.send(2).unwrap();
        });

        let mut drained = Vec::new();
        let outcome = join_with_timeout(handle, Duration::from_secs(5), || {
            while let Ok(v) = rx.try_recv() {
                drained.push(v);
            }
        });

        assert!(outcome.is_finished());
        while let Ok(v) = rx.try_recv() {
            drained.push(v);
        }
        assert_eq!(drained, vec![1, 2]);
    }
}
