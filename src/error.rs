//! Error types for the circuit breaker.
//!
//! Three classes of failure leave this crate: admission denials
//! ([`BreakerError::CallNotPermitted`]), misuse of the two-state protocol
//! ([`BreakerError::IllegalTransition`] and
//! [`BreakerError::UnsupportedOperation`]), and configuration rejected at
//! construction ([`BreakerError::InvalidConfig`]). Internal invariant
//! violations are bugs and panic instead of surfacing here.

use crate::breaker::State;

/// Convenience alias for results carrying [`BreakerError`].
pub type BreakerResult<T> = std::result::Result<T, BreakerError>;

/// Errors produced by circuit breaker operations.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum BreakerError {
    /// The open state's reopening policy declined admission.
    ///
    /// Only the failing acquire form yields this; the non-failing form
    /// reports the same denial as `false`.
    #[error("circuit breaker '{name}' does not permit further calls")]
    CallNotPermitted {
        /// Name of the breaker that denied admission.
        name: String,
    },

    /// A state edge that does not exist in the two-state model.
    #[error("circuit breaker '{name}' cannot transition from {from} state to {to} state")]
    IllegalTransition {
        /// Name of the breaker the transition was requested on.
        name: String,
        /// State the breaker was in.
        from: State,
        /// State that was requested.
        to: State,
    },

    /// An operation that only makes sense for states this model omits.
    #[error("circuit breaker '{name}' does not support {operation}")]
    UnsupportedOperation {
        /// Name of the breaker the operation was requested on.
        name: String,
        /// Description of the unsupported operation.
        operation: &'static str,
    },

    /// Configuration rejected during construction.
    #[error("invalid circuit breaker configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },
}

impl BreakerError {
    /// Admission denial for the named breaker.
    pub(crate) fn call_not_permitted(name: impl Into<String>) -> Self {
        Self::CallNotPermitted { name: name.into() }
    }

    /// A transition along an edge the state diagram does not define.
    pub(crate) fn illegal_transition(name: impl Into<String>, from: State, to: State) -> Self {
        Self::IllegalTransition {
            name: name.into(),
            from,
            to,
        }
    }

    /// An operation belonging to a state variant this model does not have.
    pub(crate) fn unsupported(name: impl Into<String>, operation: &'static str) -> Self {
        Self::UnsupportedOperation {
            name: name.into(),
            operation,
        }
    }

    /// A construction-time configuration failure.
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// True if this error is an admission denial rather than misuse.
    #[must_use]
    pub fn is_call_not_permitted(&self) -> bool {
        matches!(self, Self::CallNotPermitted { .. })
    }
}
