//! Error types for thunk dispatch

use core::fmt;

use crate::id::ThunkId;
use crate::state::ThunkState;
use crate::traits::TransportError;

/// Result type for thunk operations
pub type ThunkResult<T> = Result<T, ThunkError>;

/// Errors that can occur while dispatching or waiting on a thunk
#[derive(Debug)]
pub enum ThunkError {
    /// The transport could not move the thunk onto the loop thread.
    /// The context has already been told via `note_thunk_dispatch_failure`.
    DispatchFailed {
        id: ThunkId,
        source: TransportError,
    },

    /// The wait was interrupted via CancellationToken
    Cancelled,

    /// Operation not allowed in the thunk's current state
    InvalidState(ThunkState),

    /// The calling thread has no thunk context
    NoContext,

    /// The action unwound on the loop thread
    ActionPanicked { id: ThunkId },

    /// Invalid configuration
    Config(&'static str),

    /// Loop thread could not be spawned or joined
    LoopThread(String),
}

impl ThunkError {
    /// Check if this error is a dispatch failure
    #[inline]
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(self, ThunkError::DispatchFailed { .. })
    }

    /// Check if this error is a cancelled wait
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ThunkError::Cancelled)
    }
}

impl fmt::Display for ThunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThunkError::DispatchFailed { id, source } => {
                write!(f, "dispatch of thunk {} failed: {}", id, source)
            }
            ThunkError::Cancelled => write!(f, "wait cancelled"),
            ThunkError::InvalidState(state) => write!(f, "invalid thunk state: {}", state),
            ThunkError::NoContext => write!(f, "no thunk context on this thread"),
            ThunkError::ActionPanicked { id } => write!(f, "thunk {} panicked on loop thread", id),
            ThunkError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            ThunkError::LoopThread(msg) => write!(f, "loop thread error: {}", msg),
        }
    }
}

impl std::error::Error for ThunkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ThunkError::DispatchFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
