//! Message types exchanged between workers.
//!
//! ```text
//!                  +----------------+
//!        +-------->|  Orchestrator  |<--------+
//!        |         +----------------+         |
//!  EpisodeResult     |            |      TrainerStats
//!        |         JobMsg     TrainerMsg      |
//!        |           v            v           |
//!   +---------+              +---------+      |
//!   | Actor N |              | Trainer |------+
//!   +---------+              +---------+
//! ```

mod job_msg;
mod trainer_msg;


pub use job_msg::{Job, JobMsg};
pub use trainer_msg::{TrainerMsg, TrainerStats};
