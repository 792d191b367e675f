//! Run metrics.
//!
//! - [`RunMetrics`]: thread-safe counters updated by every worker
//! - [`RunSummary`]: frozen counters returned when a run ends

pub mod run_metrics;

pub use run_metrics::{run_metrics, RunMetrics, RunSummary, SharedRunMetrics};
