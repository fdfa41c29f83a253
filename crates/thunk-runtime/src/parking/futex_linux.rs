//! Linux futex-based loop thread parking
//!
//! Futex word semantics:
//! - 0 = no wake pending
//! - 1 = wake pending (the loop thread should re-check its queue)
//!
//! `unpark()` sets the word to 1 before waking, and FUTEX_WAIT only sleeps
//! while the word is 0, so a wake racing with `park()` is never lost.

use super::LoopParking;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// Linux futex-based parking
pub struct FutexParking {
    /// Futex word: 0 = sleep, 1 = wake pending
    futex: AtomicU32,

    /// Set while the loop thread is inside FUTEX_WAIT
    parked: AtomicBool,
}

impl FutexParking {
    /// Create a new futex parking instance
    pub fn new() -> Self {
        Self {
            futex: AtomicU32::new(0),
            parked: AtomicBool::new(false),
        }
    }

    fn futex_wait(&self, timeout: Option<Duration>) {
        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs() as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });
        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // Returns on FUTEX_WAKE, timeout, EINTR, or EAGAIN if the word is
        // already 1. The caller reads the word afterwards, so the result
        // itself carries no information.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn futex_wake(&self) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexParking {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopParking for FutexParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        if self.futex.swap(0, Ordering::SeqCst) == 1 {
            return true;
        }

        self.parked.store(true, Ordering::SeqCst);
        self.futex_wait(timeout);
        self.parked.store(false, Ordering::SeqCst);

        self.futex.swap(0, Ordering::SeqCst) == 1
    }

    fn unpark(&self) {
        self.futex.store(1, Ordering::SeqCst);
        if self.parked.load(Ordering::SeqCst) {
            self.futex_wake();
        }
    }
}
