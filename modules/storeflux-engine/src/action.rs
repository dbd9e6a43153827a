//! Core traits for action dispatch.

use std::fmt::Debug;
use std::hash::Hash;

use storeflux_common::StoreError;

/// Actions carry a kind tag and own exactly one completion.
///
/// `Kind` is the discriminant the dispatcher routes on: one tag per action
/// family, so no processor ever needs a runtime type test.
pub trait ActionLike: Send + 'static {
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;

    /// Resolve this action's completion with `error` without running it.
    ///
    /// Used when the action cannot be handled at all (unregistered kind,
    /// foreign family), so the caller still observes exactly one outcome.
    fn reject(self, error: StoreError);
}

/// Receives actions of the kinds it registered for.
///
/// `on_action` runs synchronously on the dispatching thread and must not
/// block: remote and storage work is spawned, and its outcome is delivered
/// through the action's completion.
pub trait ActionProcessor<A: ActionLike>: Send + Sync {
    fn on_action(&self, action: A);
}
