//! Durable job store: one JSON document holding the ordered job collection.
//!
//! Every mutation rewrites the whole document and every reader reloads it
//! first, so the file is the single source of truth. Concurrent external
//! writers get last-writer-wins semantics; there is no record-level locking.

use crate::core::error::Result;
use crate::core::models::Job;
use std::fs;
use std::path::{Path, PathBuf};

pub struct JobStore {
    path: PathBuf,
}

impl JobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the full job collection. A missing or unparseable document
    /// reads as an empty collection rather than an error.
    pub fn load(&self) -> Result<Vec<Job>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(jobs) => Ok(jobs),
            Err(e) => {
                tracing::warn!(target: "scheduler_task",
                    "Job store {} is unreadable ({}); treating as empty", self.path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    /// Rewrites the whole document. This is the durability boundary: the
    /// write completes before the caller proceeds.
    pub fn save(&self, jobs: &[Job]) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(jobs)?;
        fs::write(&self.path, serialized)?;
        Ok(())
    }
}
