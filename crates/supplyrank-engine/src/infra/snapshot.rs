//! QTable snapshots
//!
//! Versioned JSON export of every learned entry, so values survive restarts.
//! A snapshot is tied to the state binning schema: restoring one written
//! under different thresholds is refused.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use supplyrank_common::STATE_SCHEMA_VERSION;
use tracing::{debug, info};

use super::qtable::{InMemoryQTable, QTableEntry, QTableStore, StoreError};

/// Serialized QTable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QTableSnapshot {
    pub schema_version: u32,
    pub exported_at: DateTime<Utc>,
    pub entries: Vec<QTableEntry>,
}

impl QTableSnapshot {
    /// Capture every entry of a store
    pub async fn capture(store: &dyn QTableStore) -> Result<Self, StoreError> {
        Ok(Self {
            schema_version: STATE_SCHEMA_VERSION,
            exported_at: Utc::now(),
            entries: store.entries().await?,
        })
    }

    /// Load the entries into an in-memory table
    pub fn restore_into(self, table: &InMemoryQTable) -> Result<usize, StoreError> {
        self.check_schema()?;
        let count = self.entries.len();
        table.restore(self.entries);
        Ok(count)
    }

    fn check_schema(&self) -> Result<(), StoreError> {
        if self.schema_version != STATE_SCHEMA_VERSION {
            return Err(StoreError::IncompatibleSchema {
                expected: STATE_SCHEMA_VERSION,
                found: self.schema_version,
            });
        }
        Ok(())
    }
}

/// Reads and writes snapshots at a fixed path
///
/// Writes go to a sibling temp file and are renamed into place; the mutex
/// keeps two saves from interleaving on the temp file.
#[derive(Debug)]
pub struct SnapshotFile {
    path: std::path::PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and validate the snapshot
    pub fn load(&self) -> Result<QTableSnapshot, StoreError> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        let snapshot: QTableSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        snapshot.check_schema()?;
        debug!(
            path = %self.path.display(),
            entries = snapshot.entries.len(),
            "Loaded QTable snapshot"
        );
        Ok(snapshot)
    }

    /// Write the snapshot
    pub fn save(&self, snapshot: &QTableSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock();
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", self.path.display(), e)))?;

        info!(
            path = %self.path.display(),
            entries = snapshot.entries.len(),
            "Saved QTable snapshot"
        );
        Ok(())
    }
}
