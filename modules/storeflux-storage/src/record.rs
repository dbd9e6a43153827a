//! Core record types. Domain-agnostic.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use storeflux_common::{NaturalKey, ScopeKey, StorageError};
use uuid::Uuid;

/// A typed value that can be persisted as a record.
///
/// `ENTITY` names the table; `natural_key` identifies the value within the
/// scope it is stored under.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const ENTITY: &'static str;

    fn natural_key(&self) -> NaturalKey;
}

/// Address of a record. Ordered so that all records of one entity and scope
/// are contiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub entity: String,
    pub scope: ScopeKey,
    pub key: NaturalKey,
}

impl RecordKey {
    pub fn new(entity: impl Into<String>, scope: ScopeKey, key: NaturalKey) -> Self {
        Self {
            entity: entity.into(),
            scope,
            key,
        }
    }

    /// The smallest key of an `(entity, scope)` range.
    pub(crate) fn scope_start(entity: &str, scope: ScopeKey) -> Self {
        Self::new(entity, scope, NaturalKey::new(""))
    }

    pub(crate) fn in_scope(&self, entity: &str, scope: &ScopeKey) -> bool {
        self.entity == entity && &self.scope == scope
    }
}

/// A persisted record, as returned by every read method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Allocated on insertion, stable across updates.
    pub object_id: Uuid,
    pub entity: String,
    pub scope: ScopeKey,
    pub key: NaturalKey,
    pub payload: serde_json::Value,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn record_key(&self) -> RecordKey {
        RecordKey::new(self.entity.clone(), self.scope, self.key.clone())
    }

    /// Decode the payload into its entity type.
    pub fn decode<E: Entity>(&self) -> Result<E, StorageError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
