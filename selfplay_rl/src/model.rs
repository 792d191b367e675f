//! Trainable model abstraction.
//!
//! A run uses two models: a policy head mapping observations to a
//! distribution over the full action space and a value head mapping
//! observations to one value per player. Their architecture and optimizer
//! live behind this trait.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Failures reported by a model implementation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("prediction failed: {0}")]
    Prediction(String),
    /// The optimizer produced NaN/Inf gradients or no gradients at all
    #[error("non-finite gradient")]
    NonFiniteGradient,
    #[error("expected {expected} weights, got {actual}")]
    WeightShape { expected: usize, actual: usize },
    #[error("malformed model file: {0}")]
    Format(String),
    #[error("model I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Policy or value network.
///
/// Models are `Send` so they can move into a worker thread, but never shared:
/// every actor owns its own copy and syncs it from weight snapshots.
pub trait Model: Send + 'static {
    /// Forward pass over a batch of observations, one output row per input.
    fn predict(&self, observations: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, ModelError>;

    /// One optimizer step. Returns the batch loss.
    fn train(&mut self, inputs: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<f32, ModelError>;

    fn save(&self, path: &Path) -> Result<(), ModelError>;

    fn load(&mut self, path: &Path) -> Result<(), ModelError>;

    /// Flattened copy of every parameter.
    fn weights(&self) -> Vec<f32>;

    fn set_weights(&mut self, weights: &[f32]) -> Result<(), ModelError>;
}
