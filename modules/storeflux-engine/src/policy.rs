//! What happens when the action wiring is wrong.

use storeflux_common::{MisconfigurationMode, StoreError};
use tracing::error;

use crate::action::ActionLike;

/// Decides how configuration errors surface: an unregistered action kind, a
/// store handed a foreign family, or two stores registered for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MisconfigurationPolicy {
    mode: MisconfigurationMode,
}

impl MisconfigurationPolicy {
    pub fn new(mode: MisconfigurationMode) -> Self {
        Self { mode }
    }

    /// Panic on every configuration error.
    pub fn fail_fast() -> Self {
        Self::new(MisconfigurationMode::Panic)
    }

    /// Log and resolve the offending action with a configuration error.
    pub fn reject() -> Self {
        Self::new(MisconfigurationMode::Reject)
    }

    pub fn mode(&self) -> MisconfigurationMode {
        self.mode
    }

    /// `action` cannot be handled. Its completion receives
    /// [`StoreError::Configuration`] unless the policy panics first.
    pub fn reject_action<A: ActionLike>(&self, action: A, message: impl Into<String>) {
        let message = message.into();
        if self.mode == MisconfigurationMode::Panic {
            panic!("{message}");
        }

        error!(kind = ?action.kind(), message = message.as_str(), "Action rejected: misconfigured dispatch");
        action.reject(StoreError::Configuration(message));
    }

    /// A configuration error that does not prevent handling the action.
    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        if self.mode == MisconfigurationMode::Panic {
            panic!("{message}");
        }
        error!(message = message.as_str(), "Misconfigured dispatch");
    }
}
