pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, MisconfigurationMode};
pub use error::{StorageError, StoreError, StoreResult};
pub use types::*;
