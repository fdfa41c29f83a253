//! # thunk-runtime
//!
//! Reference runtime for thunking.
//!
//! This crate provides:
//! - The loop thread: a single named OS thread draining a FIFO of thunks
//! - `QueueThunker`: the transport that feeds it (bounded lock-free queue)
//! - `ThreadThunkContext`: per-synchronous-thread bookkeeping of in-flight thunks
//! - Thread-local sessions binding a context to the calling thread
//! - Parking for the idle loop thread (futex on Linux, condvar elsewhere)

pub mod config;
pub mod error;
pub mod parking;
pub mod loop_thread;
pub mod thunker;
pub mod context;
pub mod tls;

// Re-exports
pub use config::LoopConfig;
pub use error::LoopError;
pub use loop_thread::{LoopStats, LoopThread};
pub use thunker::QueueThunker;
pub use context::{ContextStats, ThreadThunkContext};
pub use tls::SessionGuard;
pub use parking::{new_parking, LoopParking};
