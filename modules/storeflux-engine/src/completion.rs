//! Single-shot completions.
//!
//! A [`Completion`] is resolved exactly once: [`Completion::complete`]
//! consumes it, and dropping it unresolved resolves it with
//! [`StoreError::Cancelled`]. The callback always runs on the execution
//! context the completion was created with, never on the thread that happened
//! to finish the work.

use std::fmt;
use std::sync::Arc;

use storeflux_common::{StoreError, StoreResult};
use tokio::sync::oneshot;

use crate::context::ExecutionContext;

type Callback<T> = Box<dyn FnOnce(StoreResult<T>) + Send>;

struct Pending<T> {
    context: Arc<dyn ExecutionContext>,
    callback: Callback<T>,
}

pub struct Completion<T: Send + 'static> {
    pending: Option<Pending<T>>,
}

impl<T: Send + 'static> Completion<T> {
    /// Invoke `callback` on `context` once the action settles.
    pub fn new<C, F>(context: C, callback: F) -> Self
    where
        C: ExecutionContext,
        F: FnOnce(StoreResult<T>) + Send + 'static,
    {
        Self {
            pending: Some(Pending {
                context: Arc::new(context),
                callback: Box::new(callback),
            }),
        }
    }

    /// A completion paired with a receiver that can be awaited. The result
    /// is handed over on `context`.
    pub fn channel<C: ExecutionContext>(context: C) -> (Self, CompletionReceiver<T>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(context, move |result| {
            let _ = tx.send(result);
        });
        (completion, CompletionReceiver { rx })
    }

    /// Label of the context the callback will run on.
    pub fn context_label(&self) -> &str {
        self.pending
            .as_ref()
            .map(|pending| pending.context.label())
            .unwrap_or("resolved")
    }

    pub fn complete(mut self, result: StoreResult<T>) {
        if let Some(pending) = self.pending.take() {
            pending.resolve(result);
        }
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, error: StoreError) {
        self.complete(Err(error));
    }
}

impl<T: Send + 'static> Pending<T> {
    fn resolve(self, result: StoreResult<T>) {
        let callback = self.callback;
        self.context.execute(Box::new(move || callback(result)));
    }
}

impl<T: Send + 'static> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.resolve(Err(StoreError::Cancelled));
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("context", &self.context_label())
            .finish()
    }
}

/// Awaitable side of [`Completion::channel`].
#[derive(Debug)]
pub struct CompletionReceiver<T> {
    rx: oneshot::Receiver<StoreResult<T>>,
}

impl<T> CompletionReceiver<T> {
    /// Wait for the outcome. A context that shut down before running the
    /// callback reads as a cancellation.
    pub async fn recv(self) -> StoreResult<T> {
        self.rx.await.unwrap_or(Err(StoreError::Cancelled))
    }

    /// Blocking variant for threads outside the runtime.
    pub fn blocking_recv(self) -> StoreResult<T> {
        self.rx.blocking_recv().unwrap_or(Err(StoreError::Cancelled))
    }
}
