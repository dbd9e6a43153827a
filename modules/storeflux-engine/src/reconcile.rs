//! Reconciling a remote result set into a derived session.

use std::collections::HashSet;

use storeflux_common::{ScopeKey, StorageError};
use storeflux_storage::{Entity, WriteSession};
use tracing::debug;

/// How a remote result set relates to what is stored for its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// The remote set is the complete authoritative set for the scope:
    /// upsert every record, then delete stored records it does not mention.
    FullReplace,
    /// The remote set is a page or a single entity: upsert only.
    AdditiveUpsert,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Matched a stored record with an identical payload.
    pub unchanged: usize,
    pub deleted: usize,
}

impl ReconcileSummary {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.deleted > 0
    }
}

/// Make the records of `E` stored under `scope` reflect `remote`.
///
/// Matching is by natural key within `scope`; nothing outside `scope` is
/// read for deletion or written. Duplicate keys in `remote` resolve
/// last-write-wins. Applying the same set twice leaves the session as
/// applying it once.
pub fn reconcile<E: Entity>(
    session: &mut WriteSession,
    scope: ScopeKey,
    remote: &[E],
    policy: ReconcilePolicy,
) -> Result<ReconcileSummary, StorageError> {
    let mut summary = ReconcileSummary::default();
    let mut seen = HashSet::with_capacity(remote.len());

    for record in remote {
        let key = record.natural_key();
        let payload = serde_json::to_value(record)?;

        match session.load(E::ENTITY, scope, &key) {
            Some(stored) if stored.payload == payload => summary.unchanged += 1,
            Some(_) => {
                session.update(E::ENTITY, scope, &key, payload)?;
                summary.updated += 1;
            }
            None => {
                session.insert_new(E::ENTITY, scope, key.clone(), payload)?;
                summary.inserted += 1;
            }
        }

        seen.insert(key);
    }

    if policy == ReconcilePolicy::FullReplace {
        for key in session.keys_in_scope(E::ENTITY, scope) {
            if !seen.contains(&key) && session.delete(E::ENTITY, scope, &key) {
                summary.deleted += 1;
            }
        }
    }

    debug!(
        entity = E::ENTITY,
        scope = %scope,
        policy = ?policy,
        inserted = summary.inserted,
        updated = summary.updated,
        unchanged = summary.unchanged,
        deleted = summary.deleted,
        "Reconciled remote records"
    );

    Ok(summary)
}
