//! Action dispatch and derived-storage merge engine.
//!
//! Stores register with a [`Dispatcher`] for one action kind each. Dispatch
//! hands the action to the store synchronously; the store does its remote
//! work on the runtime, reconciles the result into its derived session
//! ([`reconcile`]), commits, and resolves the action's [`Completion`] on the
//! execution context the caller chose.

pub mod action;
pub mod completion;
pub mod context;
pub mod dispatcher;
pub mod policy;
pub mod reconcile;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use action::{ActionLike, ActionProcessor};
pub use completion::{Completion, CompletionReceiver};
pub use context::{ExecutionContext, ForegroundContext, InlineContext, RuntimeContext};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use policy::MisconfigurationPolicy;
pub use reconcile::{reconcile, ReconcilePolicy, ReconcileSummary};
pub use store::StoreContext;
