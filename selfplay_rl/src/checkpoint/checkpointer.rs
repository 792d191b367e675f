//! Model checkpointing for the trainer.
//!
//! Both models are written next to each other, derived from one base path:
//!
//! ```text
//! models/agent.json  ->  models/agent_policy.json
//!                        models/agent_value.json
//! ```

use crate::model::{Model, ModelError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error type for checkpointing operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to persist {path}: {source}")]
    Model {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
}

/// File locations of one policy/value checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPaths {
    pub policy: PathBuf,
    pub value: PathBuf,
}

impl CheckpointPaths {
    /// Derive `<stem>_policy.<ext>` and `<stem>_value.<ext>` from `base`.
    pub fn from_base(base: &Path) -> Self {
        Self {
            policy: with_suffix(base, "policy"),
            value: with_suffix(base, "value"),
        }
    }

    /// True when both files exist.
    pub fn exist(&self) -> bool {
        self.policy.is_file() && self.value.is_file()
    }

    pub fn create_parent_dirs(&self) -> io::Result<()> {
        for path in [&self.policy, &self.value] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    base.with_file_name(name)
}

/// Interval-driven checkpoint writer.
#[derive(Debug)]
pub struct Checkpointer {
    paths: CheckpointPaths,
    save_interval: Duration,
    last_save: Instant,
    saves: usize,
}

impl Checkpointer {
    /// Create a checkpointer writing under `base`.
    ///
    /// The interval clock starts now.
    pub fn new(base: impl AsRef<Path>, save_interval: Duration) -> Self {
        Self {
            paths: CheckpointPaths::from_base(base.as_ref()),
            save_interval,
            last_save: Instant::now(),
            saves: 0,
        }
    }

    pub fn paths(&self) -> &CheckpointPaths {
        &self.paths
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves
    }

    /// Check if the save interval has elapsed since the last successful save.
    pub fn should_save(&self) -> bool {
        self.last_save.elapsed() >= self.save_interval
    }

    /// Persist both models.
    ///
    /// The interval clock only restarts on success, so a failed save is
    /// retried on the next check.
    pub fn save<P: Model, V: Model>(&mut self, policy: &P, value: &V) -> Result<(), CheckpointError> {
        self.paths.create_parent_dirs()?;
        policy
            .save(&self.paths.policy)
            .map_err(|source| CheckpointError::Model {
                path: self.paths.policy.clone(),
                source,
            })?;
        value
            .save(&self.paths.value)
            .map_err(|source| CheckpointError::Model {
                path: self.paths.value.clone(),
                source,
            })?;
        self.last_save = Instant::now();
        self.saves += 1;
        Ok(())
    }
}

/// Load both models from the checkpoint at `base`.
///
/// Returns `Ok(false)` without touching the models when either file is missing.
pub fn load_checkpoint<P: Model, V: Model>(
    base: &Path,
    policy: &mut P,
    value: &mut V,
) -> Result<bool, CheckpointError> {
    let paths = CheckpointPaths::from_base(base);
    if !paths.exist() {
        return Ok(false);
    }
    policy
        .load(&paths.policy)
        .map_err(|source| CheckpointError::Model {
            path: paths.policy.clone(),
            source,
        })?;
    value
        .load(&paths.value)
        .map_err(|source| CheckpointError::Model {
            path: paths.value.clone(),
            source,
        })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toy::BiasModel;
    use tempfile::tempdir;

    #[test]
    fn test_paths_from_base() {
        let paths = CheckpointPaths::from_base(Path::new("models/agent.weights.json"));
        assert_eq!(paths.policy, PathBuf::from("models/agent.weights_policy.json"));
        assert_eq!(paths.value, PathBuf::from("models/agent.weights_value.json"));

        let paths = CheckpointPaths::from_base(Path::new("ckpt"));
        assert_eq!(paths.policy, PathBuf::from("ckpt_policy"));
        assert_eq!(paths.value, PathBuf::from("ckpt_value"));
    }

    #[test]
    fn test_should_save_after_interval() {
        let checkpointer = Checkpointer::new("unused.json", Duration::ZERO);
        assert!(checkpointer.should_save());

        let checkpointer = Checkpointer::new("unused.json", Duration::from_secs(3600));
        assert!(!checkpointer.should_save());
    }

    #[test]
    fn test_save_creates_nested_dirs() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("nested/run/model.json");
        let mut checkpointer = Checkpointer::new(&base, Duration::from_secs(3600));

        checkpointer
            .save(&BiasModel::new(3, 0.1, true), &BiasModel::new(2, 0.1, false))
            .unwrap();

        assert!(checkpointer.paths().exist());
        assert_eq!(checkpointer.saves(), 1);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("model.json");

        let mut policy = BiasModel::new(3, 0.1, true);
        policy.set_weights(&[0.1, 0.2, 0.3]).unwrap();
        let mut value = BiasModel::new(2, 0.1, false);
        value.set_weights(&[1.0, -1.0]).unwrap();
        Checkpointer::new(&base, Duration::ZERO).save(&policy, &value).unwrap();

        let mut policy2 = BiasModel::new(3, 0.1, true);
        let mut value2 = BiasModel::new(2, 0.1, false);
        assert!(load_checkpoint(&base, &mut policy2, &mut value2).unwrap());
        assert_eq!(policy2.weights(), vec![0.1, 0.2, 0.3]);
        assert_eq!(value2.weights(), vec![1.0, -1.0]);
    }

    #[test]
    fn test_load_missing_checkpoint() {
        let dir = tempdir().unwrap();
        let mut policy = BiasModel::new(3, 0.1, true);
        let mut value = BiasModel::new(2, 0.1, false);

        let loaded = load_checkpoint(&dir.path().join("absent.json"), &mut policy, &mut value).unwrap();

        assert!(!loaded);
        assert_eq!(policy.weights(), vec![0.0; 3]);
    }

    #[test]
    fn test_failed_save_keeps_interval_due() {
        let dir = tempdir().unwrap();
        // A regular file where a directory is expected makes the save fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let mut checkpointer = Checkpointer::new(blocker.join("model.json"), Duration::ZERO);

        let result = checkpointer.save(&BiasModel::new(1, 0.1, true), &BiasModel::new(1, 0.1, false));

        assert!(result.is_err());
        assert_eq!(checkpointer.saves(), 0);
        assert!(checkpointer.should_save());
    }
}
