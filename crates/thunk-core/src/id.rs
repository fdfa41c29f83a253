//! Thunk identifier type

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Next id handed out by [`ThunkId::next`]. Starts at 1 so that 0 is never seen.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a thunk
///
/// Ids are allocated from a process-wide counter and never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ThunkId(u64);

impl ThunkId {
    /// Allocate a fresh id
    #[inline]
    pub fn next() -> Self {
        ThunkId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ThunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThunkId({})", self.0)
    }
}

impl fmt::Display for ThunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_is_unique_and_increasing() {
        let a = ThunkId::next();
        let b = ThunkId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_thunk_id_display() {
        let id = ThunkId(7);
        assert_eq!(format!("{}", id), "#7");
        assert_eq!(format!("{:?}", id), "ThunkId(7)");
    }
}
