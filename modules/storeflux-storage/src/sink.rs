//! Snapshot durability.
//!
//! A commit builds the next snapshot, hands it to the sink, and only swaps it
//! into the shared store once the sink accepted it.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storeflux_common::{ScopeKey, StorageError};
use tracing::debug;

use crate::record::{RecordKey, StoredRecord};

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// The full committed state of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: BTreeMap<RecordKey, StoredRecord>,
}

impl Snapshot {
    pub fn get(&self, key: &RecordKey) -> Option<&StoredRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record of `entity` stored under `scope`, in natural key order.
    pub fn scoped<'a>(
        &'a self,
        entity: &'a str,
        scope: ScopeKey,
    ) -> impl Iterator<Item = &'a StoredRecord> + 'a {
        self.records
            .range(RecordKey::scope_start(entity, scope)..)
            .take_while(move |(key, _)| key.in_scope(entity, &scope))
            .map(|(_, record)| record)
    }

    /// Every record of `entity`, across all scopes.
    pub fn entity<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a StoredRecord> + 'a {
        self.records
            .values()
            .filter(move |record| record.entity == entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredRecord> {
        self.records.values()
    }

    pub(crate) fn insert(&mut self, record: StoredRecord) {
        self.records.insert(record.record_key(), record);
    }

    pub(crate) fn remove(&mut self, key: &RecordKey) -> Option<StoredRecord> {
        self.records.remove(key)
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u32,
    records: Vec<StoredRecord>,
}

/// Where committed snapshots go.
pub trait SnapshotSink: Send + Sync {
    /// Durably record `snapshot`. An error aborts the commit.
    fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
}

/// Keeps nothing beyond the in-process snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemorySink;

impl SnapshotSink for MemorySink {
    fn persist(&self, _snapshot: &Snapshot) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Writes the snapshot as JSON. The file is written beside the target and
/// renamed into place, so readers never observe a half-written snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a previously written snapshot. A missing file is an empty store.
    pub fn load(&self) -> Result<Snapshot, StorageError> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }

        let bytes = fs::read(&self.path)?;
        let file: SnapshotFile = serde_json::from_slice(&bytes)?;
        if file.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(StorageError::Commit(format!(
                "snapshot format version {} is not supported (expected {})",
                file.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        let mut snapshot = Snapshot::default();
        for record in file.records {
            snapshot.insert(record);
        }
        debug!(path = %self.path.display(), records = snapshot.len(), "Loaded snapshot");
        Ok(snapshot)
    }
}

impl SnapshotSink for JsonFileSink {
    fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let file = SnapshotFile {
            format_version: SNAPSHOT_FORMAT_VERSION,
            records: snapshot.iter().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(&bytes)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), records = snapshot.len(), "Persisted snapshot");
        Ok(())
    }
}
