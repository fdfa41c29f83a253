//! Thunk lifecycle state

use core::fmt;

/// State of a thunk
///
/// ```text
/// Created ──dispatch──▶ Dispatching ──loop thread──▶ Executing ──▶ Completed
///    │                       │                           │
///    │                       └──transport error──▶ DispatchFailed
///    │                                                   └──unwind──▶ Panicked
///    └──dispatch on the loop thread (inline)──▶ Executing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThunkState {
    /// Constructed, not yet dispatched
    Created,

    /// Handed (or being handed) to the transport, waiting for the loop thread
    Dispatching,

    /// Action is running
    Executing,

    /// Action finished and waiters were released
    Completed,

    /// Transport refused the thunk; the action never ran
    DispatchFailed,

    /// Action unwound on the loop thread; waiters were released anyway
    Panicked,
}

impl ThunkState {
    /// Check if the loop thread may still run the action in this state
    #[inline]
    pub const fn is_executable(&self) -> bool {
        matches!(self, ThunkState::Created | ThunkState::Dispatching)
    }

    /// Check if the thunk reached a final state
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            ThunkState::Completed | ThunkState::DispatchFailed | ThunkState::Panicked
        )
    }
}

impl fmt::Display for ThunkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThunkState::Created => write!(f, "created"),
            ThunkState::Dispatching => write!(f, "dispatching"),
            ThunkState::Executing => write!(f, "executing"),
            ThunkState::Completed => write!(f, "completed"),
            ThunkState::DispatchFailed => write!(f, "dispatch-failed"),
            ThunkState::Panicked => write!(f, "panicked"),
        }
    }
}
