//! Cancellation token for interruptible waits
//!
//! Rust threads cannot be interrupted from outside, so a caller blocked in
//! `Thunk::dispatch_cancellable` is interrupted by cancelling its token.
//! Tokens can be linked to form parent-child relationships, so cancelling a
//! session token interrupts every wait that was started with a child of it.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use crate::error::{ThunkError, ThunkResult};

/// Token for checking and triggering cancellation
///
/// Cloning a token shares its state. When cancelled, waits started with it
/// return `Err(ThunkError::Cancelled)`.
#[derive(Clone)]
pub struct CancellationToken {
    inner: CancellationInner,
}

#[derive(Clone)]
enum CancellationInner {
    /// Shared flag, optionally linked to a parent
    Owned(Arc<OwnedCancellation>),
    /// Token that never cancels; waits on it block without polling
    Never,
}

struct OwnedCancellation {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    /// Create a new independent cancellation token
    pub fn new() -> Self {
        Self {
            inner: CancellationInner::Owned(Arc::new(OwnedCancellation {
                cancelled: AtomicBool::new(false),
                parent: None,
            })),
        }
    }

    /// Create a token that never cancels
    ///
    /// Does not allocate. Waits using it park on the condvar without a timeout.
    pub const fn never() -> Self {
        Self {
            inner: CancellationInner::Never,
        }
    }

    /// Create a child token linked to this one
    ///
    /// If this token is cancelled, checking the child will also return cancelled.
    pub fn child(&self) -> Self {
        Self {
            inner: CancellationInner::Owned(Arc::new(OwnedCancellation {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            })),
        }
    }

    /// Whether this token can ever report cancellation
    #[inline]
    pub fn can_cancel(&self) -> bool {
        matches!(self.inner, CancellationInner::Owned(_))
    }

    /// Check if cancellation was requested
    ///
    /// Also checks parent tokens recursively.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match &self.inner {
            CancellationInner::Owned(arc) => {
                if arc.cancelled.load(Ordering::Acquire) {
                    return true;
                }
                match arc.parent {
                    Some(ref parent) => parent.is_cancelled(),
                    None => false,
                }
            }
            CancellationInner::Never => false,
        }
    }

    /// Request cancellation
    ///
    /// This only sets this token's flag, not the parent's.
    pub fn cancel(&self) {
        if let CancellationInner::Owned(arc) = &self.inner {
            arc.cancelled.store(true, Ordering::Release);
        }
    }

    /// Check if cancelled and return error if so
    #[inline]
    pub fn check(&self) -> ThunkResult<()> {
        if self.is_cancelled() {
            Err(ThunkError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("can_cancel", &self.can_cancel())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cancellation() {
        let token = CancellationToken::new();

        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        token.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ThunkError::Cancelled)));
    }

    #[test]
    fn test_child_token() {
        let parent = CancellationToken::new();
        let child = parent.child();

        assert!(!child.is_cancelled());

        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_independent_cancel() {
        let parent = CancellationToken::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_never_token() {
        let token = CancellationToken::never();
        assert!(!token.can_cancel());
        token.cancel(); // no-op
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        // A child of a never-token can still be cancelled on its own
        let child = token.child();
        assert!(child.can_cancel());
        child.cancel();
        assert!(child.is_cancelled());
    }
}
