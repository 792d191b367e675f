//! Model checkpointing.
//!
//! - [`Checkpointer`]: interval-driven saves of the policy and value models
//! - [`load_checkpoint`]: warm start from an existing checkpoint
//!
//! ```rust,ignore
//! let mut checkpointer = Checkpointer::new("models/agent.json", Duration::from_secs(1800));
//!
//! // In the trainer loop:
//! if checkpointer.should_save() {
//!     checkpointer.save(&policy, &value)?;
//! }
//! ```

pub mod checkpointer;

pub use checkpointer::{load_checkpoint, CheckpointError, CheckpointPaths, Checkpointer};
