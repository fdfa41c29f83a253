//! # thunking - blocking hand-off of work to a loop thread
//!
//! Some resources may only be touched from one thread (an event loop, a
//! device handle, a non-thread-safe library). A *thunk* carries a unit of
//! work from any synchronous thread to that loop thread; the dispatching
//! thread blocks until the work ran. Dispatching from the loop thread
//! itself runs the work inline, so nested dispatch never deadlocks.
//!
//! ## Quick Start
//!
//! ```ignore
//! use thunking::{LoopConfig, Runtime};
//!
//! fn main() -> thunking::ThunkResult<()> {
//!     let runtime = Runtime::new(LoopConfig::default())?;
//!
//!     runtime.block_on(|| {
//!         // Runs on the loop thread; this thread waits for it
//!         thunking::dispatch(|| println!("hello from the loop thread"))?;
//!
//!         let answer = thunking::call(|| 6 * 7)?;
//!         assert_eq!(answer, 42);
//!         Ok(())
//!     })?
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐
//! │ sync thread  │  │ sync thread  │   Thunk::dispatch() blocks
//! │  (context)   │  │  (context)   │
//! └──────┬───────┘  └──────┬───────┘
//!        │   QueueThunker  │
//!        └────────┬────────┘
//!                 ▼
//!    ┌─────────────────────────┐
//!    │ bounded FIFO of thunks  │
//!    └────────────┬────────────┘
//!                 ▼
//!    ┌─────────────────────────┐
//!    │       loop thread       │   execute_on_loop_thread(),
//!    │                         │   notify all waiters
//!    └─────────────────────────┘
//! ```

use std::sync::Arc;

// Re-export core types
pub use thunk_core::{
    Action,
    CancellationToken,
    Thunk,
    ThunkContext,
    ThunkError,
    ThunkId,
    ThunkResult,
    ThunkState,
    Thunker,
    TransportError,
};

/// Call `f` on the loop thread behind an explicit context
pub use thunk_core::call as call_in;

// Re-export kprint macros for debug logging
pub use thunk_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use thunk_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled, set_thread_tag_enabled};

// Re-export runtime types
pub use thunk_runtime::{
    ContextStats,
    LoopConfig,
    LoopError,
    LoopStats,
    LoopThread,
    QueueThunker,
    SessionGuard,
    ThreadThunkContext,
};
pub use thunk_runtime::tls::{call, current_context, dispatch, has_context, new_thunk};

/// Runtime handle owning one loop thread
///
/// Dropping the runtime shuts the loop thread down after it drained the
/// thunks it already accepted.
#[derive(Debug)]
pub struct Runtime {
    loop_thread: LoopThread,
}

impl Runtime {
    /// Start a loop thread with the given configuration
    pub fn new(config: LoopConfig) -> ThunkResult<Self> {
        init_logging();
        let loop_thread = LoopThread::start(config)?;
        kdebug!("runtime started on {}", loop_thread.name());
        Ok(Self { loop_thread })
    }

    /// Start a loop thread configured from `THUNK_*` environment variables
    pub fn from_env() -> ThunkResult<Self> {
        Self::new(LoopConfig::from_env())
    }

    pub fn loop_thread(&self) -> &LoopThread {
        &self.loop_thread
    }

    /// New context for a thread that will dispatch to this runtime
    pub fn new_context(&self) -> Arc<ThreadThunkContext> {
        self.loop_thread.new_context()
    }

    /// Bind a fresh context to the calling thread
    ///
    /// While the guard lives, [`dispatch`] and [`call`] route to this
    /// runtime's loop thread.
    pub fn attach(&self) -> SessionGuard {
        thunk_runtime::tls::enter(self.new_context())
    }

    /// Run `f` with the calling thread attached, wait for its thunks, then
    /// shut the loop thread down
    pub fn block_on<F, T>(self, f: F) -> ThunkResult<T>
    where
        F: FnOnce() -> T,
    {
        let session = self.attach();
        let value = f();
        let stats = session.finish()?;
        kdebug!(
            "session done: {} dispatched, {} completed, {} failed",
            stats.dispatched,
            stats.completed,
            stats.failed
        );
        self.shutdown()?;
        Ok(value)
    }

    pub fn stats(&self) -> LoopStats {
        self.loop_thread.stats()
    }

    /// Stop the loop thread once drained and wait for it
    pub fn shutdown(self) -> ThunkResult<LoopStats> {
        self.loop_thread.join()
    }
}
