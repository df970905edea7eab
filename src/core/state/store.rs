//! Checkpoint file persistence
//!
//! Each family owns one small JSON checkpoint file that is rewritten
//! wholesale after every batch. Loading is forgiving: a missing or corrupt
//! file degrades to zero-valued defaults with a warning, because losing a
//! checkpoint only costs re-scanning already-migrated offsets - the
//! natural-key idempotency check makes the re-run safe.

use crate::core::state::checkpoint::Checkpoint;
use crate::domain::ids::Family;
use crate::domain::{AnvilError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File-backed checkpoint store for one family.
pub struct CheckpointStore {
    path: PathBuf,
    family: Family,
}

impl CheckpointStore {
    /// Create a store backed by `path`. The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>, family: Family) -> Self {
        Self {
            path: path.into(),
            family,
        }
    }

    /// Path of the underlying checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(&self) -> Checkpoint {
        if !self.path.exists() {
            tracing::info!(
                family = %self.family,
                path = %self.path.display(),
                "No checkpoint file, starting from offset 0"
            );
            return Checkpoint::default();
        }

        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<Checkpoint>(&contents) {
                Ok(checkpoint) => {
                    tracing::info!(
                        family = %self.family,
                        last_offset = checkpoint.last_offset,
                        success_count = checkpoint.success_count,
                        fail_count = checkpoint.fail_count,
                        "Loaded checkpoint"
                    );
                    checkpoint
                }
                Err(e) => {
                    tracing::warn!(
                        family = %self.family,
                        path = %self.path.display(),
                        error = %e,
                        "Corrupt checkpoint file, starting from defaults"
                    );
                    Checkpoint::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    family = %self.family,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read checkpoint file, starting from defaults"
                );
                Checkpoint::default()
            }
        }
    }

    /// Overwrite the persisted checkpoint.
    ///
    /// Called once per batch, after the join barrier; never per item.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AnvilError::Checkpoint(format!(
                        "Failed to create checkpoint directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| AnvilError::Checkpoint(format!("Failed to serialize checkpoint: {e}")))?;

        fs::write(&self.path, json).map_err(|e| {
            AnvilError::Checkpoint(format!(
                "Failed to write checkpoint file {}: {e}",
                self.path.display()
            ))
        })?;

        tracing::debug!(
            family = %self.family,
            last_offset = checkpoint.last_offset,
            "Saved checkpoint"
        );
        Ok(())
    }
}
