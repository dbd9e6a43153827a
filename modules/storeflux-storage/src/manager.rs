//! StorageManager: the single persistent store instance of a process.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use storeflux_common::{NaturalKey, ScopeKey, StorageError};
use tracing::info;

use crate::record::{Entity, RecordKey, StoredRecord};
use crate::session::DerivedStorage;
use crate::sink::{JsonFileSink, MemorySink, Snapshot, SnapshotSink};

/// Owns the committed snapshot and the sink it is persisted to.
#[derive(Clone)]
pub struct StorageManager {
    shared: Arc<RwLock<Snapshot>>,
    sink: Arc<dyn SnapshotSink>,
}

impl StorageManager {
    /// An empty store that never touches disk.
    pub fn in_memory() -> Self {
        Self::with_sink(Snapshot::default(), Arc::new(MemorySink))
    }

    pub fn with_sink(initial: Snapshot, sink: Arc<dyn SnapshotSink>) -> Self {
        Self {
            shared: Arc::new(RwLock::new(initial)),
            sink,
        }
    }

    /// Open a store backed by a JSON snapshot file, loading it if present.
    pub fn open_json(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let sink = JsonFileSink::new(path.as_ref());
        let snapshot = sink.load()?;
        info!(
            path = %path.as_ref().display(),
            records = snapshot.len(),
            "Opened JSON-backed storage"
        );
        Ok(Self::with_sink(snapshot, Arc::new(sink)))
    }

    /// The read-oriented view. Sees committed state only.
    pub fn view_storage(&self) -> ViewStorage {
        ViewStorage {
            shared: self.shared.clone(),
        }
    }

    /// Open a new derived write session with its own background queue.
    pub fn new_derived_storage(&self) -> Result<DerivedStorage, StorageError> {
        DerivedStorage::spawn(self.shared.clone(), self.sink.clone())
    }

    /// Drop every record and persist the empty snapshot.
    pub fn reset(&self) -> Result<(), StorageError> {
        let mut guard = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        let empty = Snapshot::default();
        self.sink.persist(&empty)?;
        guard.clear();
        info!("Storage reset");
        Ok(())
    }
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("records", &self.view_storage().len())
            .finish()
    }
}

/// Read-only access to committed records.
#[derive(Clone)]
pub struct ViewStorage {
    shared: Arc<RwLock<Snapshot>>,
}

impl ViewStorage {
    pub fn load(&self, entity: &str, scope: ScopeKey, key: &NaturalKey) -> Option<StoredRecord> {
        let key = RecordKey::new(entity, scope, key.clone());
        self.read(|snapshot| snapshot.get(&key).cloned())
    }

    pub fn load_typed<E: Entity>(
        &self,
        scope: ScopeKey,
        key: &NaturalKey,
    ) -> Result<Option<E>, StorageError> {
        self.load(E::ENTITY, scope, key)
            .map(|record| record.decode())
            .transpose()
    }

    /// Committed records of `entity` in `scope`, in natural key order.
    pub fn records(&self, entity: &str, scope: ScopeKey) -> Vec<StoredRecord> {
        self.read(|snapshot| snapshot.scoped(entity, scope).cloned().collect())
    }

    pub fn records_typed<E: Entity>(&self, scope: ScopeKey) -> Result<Vec<E>, StorageError> {
        self.records(E::ENTITY, scope)
            .iter()
            .map(|record| record.decode::<E>())
            .collect()
    }

    pub fn keys_in_scope(&self, entity: &str, scope: ScopeKey) -> Vec<NaturalKey> {
        self.read(|snapshot| {
            snapshot
                .scoped(entity, scope)
                .map(|record| record.key.clone())
                .collect()
        })
    }

    /// Number of records of `entity` across every scope.
    pub fn count(&self, entity: &str) -> usize {
        self.read(|snapshot| snapshot.entity(entity).count())
    }

    pub fn count_in_scope(&self, entity: &str, scope: ScopeKey) -> usize {
        self.read(|snapshot| snapshot.scoped(entity, scope).count())
    }

    pub fn len(&self) -> usize {
        self.read(Snapshot::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A point-in-time copy of the whole store.
    pub fn snapshot(&self) -> Snapshot {
        self.read(Snapshot::clone)
    }

    fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        let guard = self.shared.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}
