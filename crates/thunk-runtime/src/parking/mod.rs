//! Loop thread parking
//!
//! The loop thread parks when its queue is empty; the transport unparks it
//! after every enqueue. An unpark that arrives before the loop thread parks
//! is remembered, so the next `park()` returns immediately.

use std::time::Duration;

/// Sleep/wake primitive for the single loop thread
pub trait LoopParking: Send + Sync {
    /// Park the calling thread until unparked or timeout
    ///
    /// Returns `true` if a pending or new unpark was consumed, `false` on
    /// timeout or spurious wakeup. Callers re-check their queue either way.
    fn park(&self, timeout: Option<Duration>) -> bool;

    /// Wake the parked thread, or make its next `park()` return at once
    fn unpark(&self);
}

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "linux", not(feature = "condvar-parking")))] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        mod fallback;
        pub use fallback::CondvarParking as PlatformParking;
    }
}

/// Create a new platform-appropriate parking instance
pub fn new_parking() -> Box<dyn LoopParking> {
    Box::new(PlatformParking::new())
}
