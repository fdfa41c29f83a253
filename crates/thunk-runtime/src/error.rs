//! Transport errors raised by the queue thunker.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopError {
    /// The loop thread's queue holds `capacity` thunks already.
    QueueFull { capacity: usize },
    /// The loop thread is shutting down and accepts no more thunks.
    Stopped,
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull { capacity } => write!(f, "loop queue full ({} slots)", capacity),
            Self::Stopped => write!(f, "loop thread stopped"),
        }
    }
}

impl std::error::Error for LoopError {}

#[cfg(test)]
mod tests {
    use super::*;
    use thunk_core::TransportError;

    #[test]
    fn test_display() {
        assert_eq!(
            LoopError::QueueFull { capacity: 8 }.to_string(),
            "loop queue full (8 slots)"
        );
        assert_eq!(LoopError::Stopped.to_string(), "loop thread stopped");
    }

    #[test]
    fn test_boxes_into_transport_error() {
        let boxed: TransportError = LoopError::Stopped.into();
        assert_eq!(boxed.downcast_ref::<LoopError>(), Some(&LoopError::Stopped));
    }
}
