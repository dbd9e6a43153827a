//! The dispatch router.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, trace};

use crate::action::{ActionLike, ActionProcessor};
use crate::policy::MisconfigurationPolicy;

/// What `dispatch` did with an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum DispatchOutcome {
    /// Handed to a registered processor.
    Delivered,
    /// No live processor was registered; the action was rejected.
    Unhandled,
}

/// Process-wide action router.
///
/// Processors are held weakly: a dropped store stops receiving actions
/// without having to unregister. An action owns a single-shot completion, so
/// it has exactly one consumer: the first live registrant for its kind.
pub struct Dispatcher<A: ActionLike> {
    processors: RwLock<HashMap<A::Kind, Vec<Weak<dyn ActionProcessor<A>>>>>,
    policy: MisconfigurationPolicy,
}

impl<A: ActionLike> Dispatcher<A> {
    pub fn new(policy: MisconfigurationPolicy) -> Self {
        Self {
            processors: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> MisconfigurationPolicy {
        self.policy
    }

    /// Register `processor` for `kind`. Registering the same processor for
    /// the same kind again is a no-op.
    pub fn register(&self, processor: Arc<dyn ActionProcessor<A>>, kind: A::Kind) {
        let mut processors = self.processors.write().unwrap_or_else(PoisonError::into_inner);
        let registered = processors.entry(kind).or_default();
        registered.retain(|weak| weak.strong_count() > 0);

        let id = processor_id(&processor);
        if registered.iter().any(|weak| weak_id(weak) == id) {
            return;
        }

        registered.push(Arc::downgrade(&processor));
        debug!(kind = ?kind, processors = registered.len(), "Registered action processor");
    }

    /// Remove `processor` from every kind it was registered for.
    pub fn unregister(&self, processor: &Arc<dyn ActionProcessor<A>>) {
        let id = processor_id(processor);
        let mut processors = self.processors.write().unwrap_or_else(PoisonError::into_inner);
        for registered in processors.values_mut() {
            registered.retain(|weak| weak_id(weak) != id && weak.strong_count() > 0);
        }
        processors.retain(|_, registered| !registered.is_empty());
    }

    pub fn has_processor(&self, kind: A::Kind) -> bool {
        !self.live_processors(kind).is_empty()
    }

    pub fn registered_kinds(&self) -> Vec<A::Kind> {
        let processors = self.processors.read().unwrap_or_else(PoisonError::into_inner);
        processors
            .iter()
            .filter(|(_, registered)| registered.iter().any(|weak| weak.strong_count() > 0))
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Deliver `action` to its processor on the calling thread.
    ///
    /// Returns once the processor's synchronous entry point returns. With no
    /// live processor the action goes to the misconfiguration policy: a panic
    /// when failing fast, otherwise its completion is resolved with a
    /// configuration error.
    pub fn dispatch(&self, action: A) -> DispatchOutcome {
        let kind = action.kind();
        let live = self.live_processors(kind);

        let Some(processor) = live.first() else {
            self.policy
                .reject_action(action, format!("No processor registered for {kind:?}"));
            return DispatchOutcome::Unhandled;
        };

        if live.len() > 1 {
            self.policy.report(format!(
                "{} processors registered for {kind:?}; delivering to the first",
                live.len()
            ));
        }

        trace!(kind = ?kind, "Dispatching action");
        processor.on_action(action);
        DispatchOutcome::Delivered
    }

    // The lock is released before any processor runs, so processors may
    // dispatch or register re-entrantly.
    fn live_processors(&self, kind: A::Kind) -> Vec<Arc<dyn ActionProcessor<A>>> {
        let processors = self.processors.read().unwrap_or_else(PoisonError::into_inner);
        processors
            .get(&kind)
            .map(|registered| registered.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }
}

impl<A: ActionLike> Default for Dispatcher<A> {
    fn default() -> Self {
        Self::new(MisconfigurationPolicy::default())
    }
}

fn processor_id<A: ActionLike>(processor: &Arc<dyn ActionProcessor<A>>) -> *const () {
    Arc::as_ptr(processor).cast::<()>()
}

fn weak_id<A: ActionLike>(processor: &Weak<dyn ActionProcessor<A>>) -> *const () {
    Weak::as_ptr(processor).cast::<()>()
}
