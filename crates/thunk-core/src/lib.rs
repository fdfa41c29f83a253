//! # thunk-core
//!
//! Core types and traits for thunking: handing a unit of work from a
//! synchronous thread to a single loop thread and blocking until it ran.
//!
//! This crate contains the dispatch protocol only. The loop thread, the
//! queue that feeds it and the per-thread context registry live in
//! `thunk-runtime`, behind the traits defined in [`traits`].
//!
//! ## Modules
//!
//! - `id` - Thunk identifier type
//! - `state` - Thunk lifecycle states
//! - `thunk` - The thunk and its dispatch / loop-thread protocol
//! - `traits` - Context and transport interfaces
//! - `cancel` - Cancellation token for interruptible waits
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod thunk;
pub mod traits;
pub mod cancel;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::ThunkId;
pub use state::ThunkState;
pub use thunk::{call, Action, Thunk};
pub use traits::{ThunkContext, Thunker, TransportError};
pub use cancel::CancellationToken;
pub use error::{ThunkError, ThunkResult};
pub use env::{env_get, env_get_bool, env_get_micros, env_get_str};

/// Tunable defaults
pub mod constants {
    /// How often a cancellable wait re-checks its token (microseconds).
    /// Override with `THUNK_CANCEL_POLL_US`.
    pub const CANCEL_POLL_US: u64 = 1_000;

    /// Default capacity of the loop thread's queue
    pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

    /// Default time the idle loop thread parks before re-checking (microseconds)
    pub const DEFAULT_IDLE_PARK_US: u64 = 100_000;

    /// Default name of the loop thread
    pub const DEFAULT_LOOP_THREAD_NAME: &str = "thunk-loop";
}
