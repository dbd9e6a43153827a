//! Derived write sessions.
//!
//! A [`WriteSession`] is a private overlay of pending changes on top of the
//! committed snapshot. It is owned by exactly one background thread; the
//! cloneable [`DerivedStorage`] handle only queues work onto that thread, so
//! no two mutation bodies ever run against the same session at once.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;

use chrono::Utc;
use storeflux_common::{NaturalKey, ScopeKey, StorageError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::record::{Entity, RecordKey, StoredRecord};
use crate::sink::{Snapshot, SnapshotSink};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
enum PendingChange {
    Upsert(StoredRecord),
    Delete,
}

/// Counts reported by a successful commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub upserted: usize,
    pub deleted: usize,
}

impl CommitSummary {
    pub fn is_empty(&self) -> bool {
        self.upserted == 0 && self.deleted == 0
    }
}

/// Mutation context over the shared snapshot. Changes stay private to the
/// session until [`WriteSession::commit`].
pub struct WriteSession {
    id: u64,
    shared: Arc<RwLock<Snapshot>>,
    pending: BTreeMap<RecordKey, PendingChange>,
}

impl WriteSession {
    pub(crate) fn new(id: u64, shared: Arc<RwLock<Snapshot>>) -> Self {
        Self {
            id,
            shared,
            pending: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Look up one record, seeing this session's own pending changes.
    pub fn load(&self, entity: &str, scope: ScopeKey, key: &NaturalKey) -> Option<StoredRecord> {
        let record_key = RecordKey::new(entity, scope, key.clone());
        match self.pending.get(&record_key) {
            Some(PendingChange::Upsert(record)) => Some(record.clone()),
            Some(PendingChange::Delete) => None,
            None => self.read_shared(|snapshot| snapshot.get(&record_key).cloned()),
        }
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

    /// Every record of `entity` visible in `scope`, in natural key order.
    pub fn records(&self, entity: &str, scope: ScopeKey) -> Vec<StoredRecord> {
        let mut merged: BTreeMap<NaturalKey, StoredRecord> = self.read_shared(|snapshot| {
            snapshot
                .scoped(entity, scope)
                .map(|record| (record.key.clone(), record.clone()))
                .collect()
        });

        let start = RecordKey::scope_start(entity, scope);
        for (key, change) in self
            .pending
            .range(start..)
            .take_while(|(key, _)| key.in_scope(entity, &scope))
        {
            match change {
                PendingChange::Upsert(record) => {
                    merged.insert(key.key.clone(), record.clone());
                }
                PendingChange::Delete => {
                    merged.remove(&key.key);
                }
            }
        }

        merged.into_values().collect()
    }

    pub fn keys_in_scope(&self, entity: &str, scope: ScopeKey) -> Vec<NaturalKey> {
        self.records(entity, scope)
            .into_iter()
            .map(|record| record.key)
            .collect()
    }

    /// Allocate a new record. Rejects an empty natural key and keys that are
    /// already visible in the session.
    pub fn insert_new(
        &mut self,
        entity: &str,
        scope: ScopeKey,
        key: NaturalKey,
        payload: serde_json::Value,
    ) -> Result<StoredRecord, StorageError> {
        if key.as_str().trim().is_empty() {
            return Err(rejected(entity, scope, key, "natural key is empty"));
        }
        if self.load(entity, scope, &key).is_some() {
            return Err(rejected(entity, scope, key, "record already exists"));
        }

        let record = StoredRecord {
            object_id: Uuid::new_v4(),
            entity: entity.to_string(),
            scope,
            key,
            payload,
            version: 1,
            updated_at: Utc::now(),
        };
        self.pending
            .insert(record.record_key(), PendingChange::Upsert(record.clone()));
        Ok(record)
    }

    /// Overwrite the payload of an existing record. Identity fields
    /// (`object_id`, entity, scope, key) are kept from the stored record.
    pub fn update(
        &mut self,
        entity: &str,
        scope: ScopeKey,
        key: &NaturalKey,
        payload: serde_json::Value,
    ) -> Result<StoredRecord, StorageError> {
        let Some(existing) = self.load(entity, scope, key) else {
            return Err(rejected(entity, scope, key.clone(), "record does not exist"));
        };

        let record = StoredRecord {
            payload,
            version: existing.version + 1,
            updated_at: Utc::now(),
            ..existing
        };
        self.pending
            .insert(record.record_key(), PendingChange::Upsert(record.clone()));
        Ok(record)
    }

    /// Delete one record. Returns whether it was visible.
    pub fn delete(&mut self, entity: &str, scope: ScopeKey, key: &NaturalKey) -> bool {
        if self.load(entity, scope, key).is_none() {
            return false;
        }
        self.pending.insert(
            RecordKey::new(entity, scope, key.clone()),
            PendingChange::Delete,
        );
        true
    }

    pub fn delete_scope(&mut self, entity: &str, scope: ScopeKey) -> usize {
        let keys = self.keys_in_scope(entity, scope);
        let count = keys.len();
        for key in keys {
            self.pending
                .insert(RecordKey::new(entity, scope, key), PendingChange::Delete);
        }
        count
    }

    /// Delete every record of `entity`, in every scope.
    pub fn delete_all(&mut self, entity: &str) -> usize {
        let mut keys: Vec<RecordKey> = self.read_shared(|snapshot| {
            snapshot
                .entity(entity)
                .map(|record| record.record_key())
                .collect()
        });
        keys.extend(
            self.pending
                .iter()
                .filter(|(key, change)| {
                    key.entity == entity && matches!(change, PendingChange::Upsert(_))
                })
                .map(|(key, _)| key.clone()),
        );
        keys.sort();
        keys.dedup();

        let mut count = 0;
        for key in keys {
            if self.load(&key.entity, key.scope, &key.key).is_some() {
                self.pending.insert(key, PendingChange::Delete);
                count += 1;
            }
        }
        count
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Discard every pending change.
    pub fn rollback(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }

    /// Apply pending changes to the shared snapshot.
    ///
    /// The next snapshot is built off to the side and handed to `sink`; it is
    /// swapped in only if the sink accepts it. On failure every pending change
    /// is discarded and the shared snapshot is left untouched.
    pub fn commit(&mut self, sink: &dyn SnapshotSink) -> Result<CommitSummary, StorageError> {
        if self.pending.is_empty() {
            return Ok(CommitSummary::default());
        }

        let pending = std::mem::take(&mut self.pending);
        let mut guard = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        let mut summary = CommitSummary::default();

        for (key, change) in pending {
            match change {
                PendingChange::Upsert(mut record) => {
                    // Another session may have committed the same natural key
                    // since this one read it; keep the stored identity and
                    // version on top of whatever is stored now.
                    if let Some(existing) = next.get(&key) {
                        record.object_id = existing.object_id;
                        record.version = existing.version + 1;
                    }
                    next.insert(record);
                    summary.upserted += 1;
                }
                PendingChange::Delete => {
                    if next.remove(&key).is_some() {
                        summary.deleted += 1;
                    }
                }
            }
        }

        if let Err(err) = sink.persist(&next) {
            warn!(session = self.id, error = %err, "Commit rejected by snapshot sink; pending changes discarded");
            return Err(err);
        }

        *guard = next;
        debug!(
            session = self.id,
            upserted = summary.upserted,
            deleted = summary.deleted,
            "Committed derived session"
        );
        Ok(summary)
    }

    fn read_shared<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        let guard = self.shared.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

fn rejected(entity: &str, scope: ScopeKey, key: NaturalKey, reason: &str) -> StorageError {
    StorageError::Rejected {
        entity: entity.to_string(),
        scope,
        key,
        reason: reason.to_string(),
    }
}

type Job = Box<dyn FnOnce(&mut WriteSession, &dyn SnapshotSink) + Send>;

/// Handle to a derived write session and its background queue.
///
/// Cloning the handle shares the same session and queue. The background
/// thread exits once every handle is dropped.
#[derive(Clone)]
pub struct DerivedStorage {
    id: u64,
    jobs: mpsc::UnboundedSender<Job>,
}

impl DerivedStorage {
    pub(crate) fn spawn(
        shared: Arc<RwLock<Snapshot>>,
        sink: Arc<dyn SnapshotSink>,
    ) -> Result<Self, StorageError> {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        thread::Builder::new()
            .name(format!("storeflux-session-{id}"))
            .spawn(move || {
                let mut session = WriteSession::new(id, shared);
                while let Some(job) = rx.blocking_recv() {
                    job(&mut session, sink.as_ref());
                }
                if session.has_changes() {
                    warn!(
                        session = id,
                        discarded = session.rollback(),
                        "Derived session closed with uncommitted changes"
                    );
                }
            })?;

        debug!(session = id, "Opened derived session");
        Ok(Self { id, jobs: tx })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Run `body` with exclusive access to the session, on the session's
    /// background thread. Changes stay pending until [`DerivedStorage::save`].
    pub async fn perform<R, F>(&self, body: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut WriteSession) -> Result<R, StorageError> + Send + 'static,
        R: Send + 'static,
    {
        self.enqueue(move |session, _sink| body(session)).await
    }

    /// Commit everything pending in the session.
    pub async fn save(&self) -> Result<CommitSummary, StorageError> {
        self.enqueue(|session, sink| session.commit(sink)).await
    }

    /// Run `body` and commit its changes as one queued job, so they are
    /// persisted or discarded together. A failing body rolls back.
    pub async fn perform_and_save<R, F>(&self, body: F) -> Result<(R, CommitSummary), StorageError>
    where
        F: FnOnce(&mut WriteSession) -> Result<R, StorageError> + Send + 'static,
        R: Send + 'static,
    {
        self.enqueue(move |session, sink| match body(session) {
            Ok(value) => session.commit(sink).map(|summary| (value, summary)),
            Err(err) => {
                session.rollback();
                Err(err)
            }
        })
        .await
    }

    async fn enqueue<R, F>(&self, job: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut WriteSession, &dyn SnapshotSink) -> Result<R, StorageError> + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.jobs
            .send(Box::new(
                move |session: &mut WriteSession, sink: &dyn SnapshotSink| {
                    let _ = tx.send(job(session, sink));
                },
            ))
            .map_err(|_| StorageError::SessionClosed)?;

        rx.await.map_err(|_| StorageError::SessionClosed)?
    }
}

impl std::fmt::Debug for DerivedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedStorage").field("id", &self.id).finish()
    }
}
