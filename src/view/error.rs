//! Error types for view operations

use crate::view::LifecyclePhase;

/// Errors that can occur while activating or deactivating views
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    /// The view is not in a phase that allows the operation
    #[error("Invalid lifecycle transition: cannot {operation} while in {phase:?} phase")]
    InvalidLifecycleTransition {
        phase: LifecyclePhase,
        operation: &'static str,
    },

    /// Neither a captured, binding, nor host scope was available
    #[error("View `{0}` has no scope to bind against")]
    MissingScope(String),

    /// A lifecycle hook returned an error
    #[error("Lifecycle hook `{hook}` failed: {error}")]
    Hook {
        hook: &'static str,
        error: anyhow::Error,
    },

    /// A binding could not be established
    #[error("Binding error: {0}")]
    Binding(String),
}

impl ViewError {
    pub(crate) fn hook(hook: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |error| Self::Hook { hook, error }
    }
}
