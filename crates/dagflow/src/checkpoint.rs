// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Crash-safe state checkpointing.
//!
//! A checkpoint is the JSON-serialized [`ProcessState`], keyed by run id.
//! [`MemoryCheckpointer`] keeps snapshots in-process for tests and ephemeral
//! runs; [`FileCheckpointer`] writes one file per run through a temp file
//! and an atomic rename, so readers never observe a partially written
//! snapshot. A file that was corrupted in place surfaces as a
//! serialization error at load time.

use crate::error::Result;
use crate::state::ProcessState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Storage backend for run state snapshots.
pub trait Checkpointer: Send + Sync {
    /// Persist a state snapshot, keyed by its run id.
    fn save(&self, state: &ProcessState) -> Result<()>;

    /// Load the snapshot for a run id, if present.
    fn load(&self, id: &str) -> Result<Option<ProcessState>>;

    /// Run ids with stored snapshots.
    fn list(&self) -> Result<Vec<String>>;

    /// Remove the snapshot for a run id. Missing ids are a no-op.
    fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory checkpointer for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    store: Mutex<HashMap<String, ProcessState>>,
}

impl MemoryCheckpointer {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn save(&self, state: &ProcessState) -> Result<()> {
        self.store.lock().insert(state.id.clone(), state.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<ProcessState>> {
        Ok(self.store.lock().get(id).cloned())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.store.lock().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.store.lock().remove(id);
        Ok(())
    }
}

/// File-backed checkpointer writing one JSON file per run.
#[derive(Debug, Clone)]
pub struct FileCheckpointer {
    directory: PathBuf,
}

const CHECKPOINT_EXTENSION: &str = "json";

impl FileCheckpointer {
    /// Checkpointer rooted at `directory`; created on first save if missing.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{id}.{CHECKPOINT_EXTENSION}"))
    }
}

impl Checkpointer for FileCheckpointer {
    fn save(&self, state: &ProcessState) -> Result<()> {
        std::fs::create_dir_all(&self.directory)?;
        let payload = state.to_json()?;
        let path = self.path_for(&state.id);
        // Write to a sibling temp file, then rename: readers never observe a
        // partially written checkpoint.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &path)?;
        debug!(id = %state.id, path = %path.display(), "checkpoint saved");
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<ProcessState>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        Ok(Some(ProcessState::from_json(&json)?))
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(CHECKPOINT_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
