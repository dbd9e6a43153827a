//! Identity types shared by storage, engine and stores.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote site (tenant) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub i64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SiteId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i32> for SiteId {
    fn from(value: i32) -> Self {
        Self(i64::from(value))
    }
}

/// The subset of persisted records a synchronization call governs.
///
/// Every reconciliation is bounded by one `ScopeKey`: records stored under a
/// different key are never read for deletion nor overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub site_id: SiteId,
    /// Optional parent entity (e.g. the order a shipment tracking belongs to).
    pub parent_id: Option<i64>,
}

impl ScopeKey {
    pub fn site(site_id: impl Into<SiteId>) -> Self {
        Self {
            site_id: site_id.into(),
            parent_id: None,
        }
    }

    pub fn with_parent(site_id: impl Into<SiteId>, parent_id: i64) -> Self {
        Self {
            site_id: site_id.into(),
            parent_id: Some(parent_id),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent_id {
            Some(parent) => write!(f, "site:{}/parent:{parent}", self.site_id),
            None => write!(f, "site:{}", self.site_id),
        }
    }
}

/// Stable identity of a record within its scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(String);

impl NaturalKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Joins the parts of a composite key with `:`.
    pub fn composite<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: fmt::Display,
    {
        let joined = parts
            .into_iter()
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
            .join(":");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for NaturalKey {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for NaturalKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NaturalKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}
