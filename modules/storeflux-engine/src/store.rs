//! Shared plumbing for stores: runtime, storage, and the store's cached
//! derived session.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use storeflux_common::{StorageError, StoreError, StoreResult};
use storeflux_storage::{DerivedStorage, StorageManager, WriteSession};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::completion::Completion;
use crate::policy::MisconfigurationPolicy;

/// Everything a store needs besides its remote collaborator.
///
/// Cloning shares the cached derived session, so every task a store spawns
/// writes through the same session queue.
#[derive(Clone)]
pub struct StoreContext {
    name: &'static str,
    storage: StorageManager,
    runtime: Handle,
    policy: MisconfigurationPolicy,
    derived: Arc<Mutex<Option<DerivedStorage>>>,
}

impl StoreContext {
    pub fn new(
        name: &'static str,
        storage: StorageManager,
        runtime: Handle,
        policy: MisconfigurationPolicy,
    ) -> Self {
        Self {
            name,
            storage,
            runtime,
            policy,
            derived: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn policy(&self) -> MisconfigurationPolicy {
        self.policy
    }

    /// The store's derived session, opened on first use and reused after.
    pub fn derived_storage(&self) -> Result<DerivedStorage, StorageError> {
        let mut cached = self.derived.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(derived) = cached.as_ref() {
            return Ok(derived.clone());
        }

        let derived = self.storage.new_derived_storage()?;
        debug!(store = self.name, session = derived.id(), "Opened store derived session");
        *cached = Some(derived.clone());
        Ok(derived)
    }

    /// Run remote and storage work off the dispatching thread.
    pub fn spawn<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(work);
    }

    /// Spawn `work` and resolve `on_completion` with its outcome.
    pub fn resolve_with<T, F>(&self, on_completion: Completion<T>, work: F)
    where
        T: Send + 'static,
        F: Future<Output = StoreResult<T>> + Send + 'static,
    {
        self.spawn(async move {
            on_completion.complete(work.await);
        });
    }

    /// Wrap a remote collaborator failure for delivery through a completion.
    pub fn remote_failed(&self, operation: &str, error: anyhow::Error) -> StoreError {
        warn!(store = self.name, operation, error = %error, "Remote call failed");
        StoreError::remote(error)
    }

    /// Run `body` in the store's derived session and commit it as one unit.
    ///
    /// Resolves after the commit is visible through the view storage. A
    /// failing body or commit leaves nothing of this call behind.
    pub async fn merge<R, F>(&self, operation: &str, body: F) -> StoreResult<R>
    where
        F: FnOnce(&mut WriteSession) -> Result<R, StorageError> + Send + 'static,
        R: Send + 'static,
    {
        let derived = self.derived_storage()?;
        match derived.perform_and_save(body).await {
            Ok((value, summary)) => {
                debug!(
                    store = self.name,
                    operation,
                    upserted = summary.upserted,
                    deleted = summary.deleted,
                    "Merged into storage"
                );
                Ok(value)
            }
            Err(err) => {
                warn!(store = self.name, operation, error = %err, "Storage merge failed");
                Err(err.into())
            }
        }
    }
}

impl std::fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreContext")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish()
    }
}
