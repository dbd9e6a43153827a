//! Persistent record store with derived write sessions.
//!
//! Records are opaque JSON payloads addressed by `(entity, scope, natural key)`.
//! Zero knowledge of payment gateways, coupons, or any other domain concept:
//! consumers describe their types through [`Entity`].
//!
//! Readers use the [`ViewStorage`]. Writers obtain a [`DerivedStorage`], queue
//! synchronous mutation bodies onto its private background thread, and commit.
//! Only committed changes become visible to the view.

pub mod manager;
pub mod record;
pub mod session;
pub mod sink;

pub use manager::{StorageManager, ViewStorage};
pub use record::{Entity, RecordKey, StoredRecord};
pub use session::{CommitSummary, DerivedStorage, WriteSession};
pub use sink::{JsonFileSink, MemorySink, Snapshot, SnapshotSink};
