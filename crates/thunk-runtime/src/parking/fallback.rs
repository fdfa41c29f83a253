//! Condvar-based parking
//!
//! Used where futex is unavailable, or with the `condvar-parking` feature.

use super::LoopParking;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Condvar-based parking (portable)
pub struct CondvarParking {
    /// Wake pending
    pending: Mutex<bool>,

    condvar: Condvar,
}

impl CondvarParking {
    /// Create a new condvar parking instance
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }
}

impl Default for CondvarParking {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopParking for CondvarParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if *pending {
            *pending = false;
            return true;
        }

        pending = match timeout {
            Some(t) => {
                self.condvar
                    .wait_timeout_while(pending, t, |p| !*p)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => self
                .condvar
                .wait_while(pending, |p| !*p)
                .unwrap_or_else(PoisonError::into_inner),
        };

        std::mem::take(&mut *pending)
    }

    fn unpark(&self) {
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            *pending = true;
        }
        self.condvar.notify_one();
    }
}
