//! History Store: last-write-wins snapshots of generation runs.
//!
//! The orchestrator writes a full snapshot after every mutation. `SledHistoryStore` keeps
//! them on disk as JSON values in a dedicated sled tree; `MemoryHistoryStore` backs tests
//! and ephemeral runs.

use crate::error::StorageError;
use crate::run::GenerationRun;
use crate::types::RunId;
use parking_lot::RwLock;
use sled::{Db, Tree};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

const TREE_RUNS: &str = "history_runs";

pub trait HistoryStore: Send + Sync {
    fn snapshot(&self, run_id: &RunId, run: &GenerationRun) -> Result<(), StorageError>;

    fn get(&self, run_id: &RunId) -> Result<Option<GenerationRun>, StorageError>;

    /// All runs, newest first.
    fn list(&self) -> Result<Vec<GenerationRun>, StorageError>;

    fn delete(&self, run_id: &RunId) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    runs: RwLock<HashMap<RunId, GenerationRun>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn snapshot(&self, run_id: &RunId, run: &GenerationRun) -> Result<(), StorageError> {
        self.runs.write().insert(run_id.clone(), run.clone());
        Ok(())
    }

    fn get(&self, run_id: &RunId) -> Result<Option<GenerationRun>, StorageError> {
        Ok(self.runs.read().get(run_id).cloned())
    }

    fn list(&self) -> Result<Vec<GenerationRun>, StorageError> {
        let mut runs: Vec<GenerationRun> = self.runs.read().values().cloned().collect();
        sort_newest_first(&mut runs);
        Ok(runs)
    }

    fn delete(&self, run_id: &RunId) -> Result<(), StorageError> {
        self.runs.write().remove(run_id);
        Ok(())
    }
}

#[derive(Clone)]
pub struct SledHistoryStore {
    db: Db,
    runs: Tree,
}

impl SledHistoryStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let runs = db.open_tree(TREE_RUNS).map_err(to_storage_io)?;
        Ok(Self { db, runs })
    }

    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(path).map_err(to_storage_io)?;
        Self::new(db)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }
}

impl HistoryStore for SledHistoryStore {
    fn snapshot(&self, run_id: &RunId, run: &GenerationRun) -> Result<(), StorageError> {
        let value = serde_json::to_vec(run)?;
        self.runs
            .insert(run_id.as_str().as_bytes(), value)
            .map_err(to_storage_io)?;
        Ok(())
    }

    fn get(&self, run_id: &RunId) -> Result<Option<GenerationRun>, StorageError> {
        let Some(raw) = self
            .runs
            .get(run_id.as_str().as_bytes())
            .map_err(to_storage_io)?
        else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    fn list(&self) -> Result<Vec<GenerationRun>, StorageError> {
        let mut out = Vec::new();
        for result in self.runs.iter() {
            let (_, value) = result.map_err(to_storage_io)?;
            out.push(serde_json::from_slice(&value)?);
        }
        sort_newest_first(&mut out);
        Ok(out)
    }

    fn delete(&self, run_id: &RunId) -> Result<(), StorageError> {
        self.runs
            .remove(run_id.as_str().as_bytes())
            .map_err(to_storage_io)?;
        Ok(())
    }
}

fn sort_newest_first(runs: &mut [GenerationRun]) {
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}
