//! Context and transport traits
//!
//! These traits define the interface between the dispatch protocol in this
//! crate and whatever owns the loop thread. `thunk-runtime` provides the
//! default implementations (`ThreadThunkContext`, `QueueThunker`).

use std::sync::Arc;

use crate::thunk::Thunk;

/// Error raised by a transport. Wrapped into `ThunkError::DispatchFailed`.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Moves thunks from a synchronous thread onto the loop thread
///
/// **Contract:**
/// - `move_to_loop_thread()` must not run the thunk on the calling thread.
///   The loop thread calls `Thunk::execute_on_loop_thread()` exactly once
///   for every thunk accepted here.
/// - A thunk refused with `Err` is never executed.
pub trait Thunker: Send + Sync {
    /// Is the calling thread the loop thread?
    fn is_loop_thread(&self) -> bool;

    /// Enqueue the thunk for execution on the loop thread
    fn move_to_loop_thread(&self, thunk: Arc<Thunk>) -> Result<(), TransportError>;
}

/// Per-synchronous-thread bookkeeping of issued thunks
///
/// Called at three points of a thunk's life. Implementations synchronize
/// internally; the calls may arrive from the caller thread or the loop thread.
pub trait ThunkContext: Send + Sync {
    /// The thunk is about to be handed to the transport (caller thread)
    fn note_thunk_dispatching(&self, thunk: &Thunk);

    /// The transport refused a thunk previously noted as dispatching (caller thread)
    fn note_thunk_dispatch_failure(&self, thunk: &Thunk);

    /// The thunk's action ran and its waiters were released (loop thread)
    fn note_thunk_completion(&self, thunk: &Thunk);

    /// Transport bound to this context
    fn thunker(&self) -> Arc<dyn Thunker>;
}
