// Test helpers for observing completions.
//
// CompletionWatcher wraps a Completion whose callback records how often it ran
// and whether it ran on the foreground context. Awaiting the watcher fails the
// test if the completion never fires.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use storeflux_common::StoreResult;
use tokio::sync::oneshot;

use crate::completion::Completion;
use crate::context::ForegroundContext;

/// Default time a watcher waits before declaring the completion lost.
pub const WATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// What the caller observed when a completion fired.
#[derive(Debug)]
pub struct Observed<T> {
    pub result: StoreResult<T>,
    pub on_foreground: bool,
}

pub struct CompletionWatcher<T> {
    rx: oneshot::Receiver<Observed<T>>,
    calls: Arc<AtomicUsize>,
}

impl<T: Send + 'static> CompletionWatcher<T> {
    /// A completion delivered on `foreground`, and the watcher observing it.
    pub fn on(foreground: &Arc<ForegroundContext>) -> (Completion<T>, Self) {
        let (tx, rx) = oneshot::channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let context = foreground.clone();

        let completion = Completion::new(foreground.clone(), move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(Observed {
                result,
                on_foreground: context.is_current(),
            });
        });

        (completion, Self { rx, calls })
    }

    /// Wait for the completion. Panics if it does not fire within
    /// [`WATCH_TIMEOUT`] or fired more than once.
    pub async fn observe(self) -> Observed<T> {
        let observed = tokio::time::timeout(WATCH_TIMEOUT, self.rx)
            .await
            .expect("completion never fired")
            .expect("completion callback dropped without firing");
        assert_eq!(
            self.calls.load(Ordering::SeqCst),
            1,
            "completion fired more than once"
        );
        observed
    }

    /// Like [`CompletionWatcher::observe`], additionally asserting the result
    /// arrived on the foreground context.
    pub async fn observe_on_foreground(self) -> StoreResult<T> {
        let observed = self.observe().await;
        assert!(
            observed.on_foreground,
            "completion ran off the foreground context"
        );
        observed.result
    }
}
