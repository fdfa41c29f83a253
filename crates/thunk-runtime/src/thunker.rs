//! Queue transport to the loop thread

use std::sync::Arc;

use thunk_core::kdebug;
use thunk_core::{Thunk, Thunker, TransportError};

use crate::loop_thread::LoopShared;

/// `Thunker` pushing thunks onto a loop thread's bounded queue
///
/// `move_to_loop_thread` never blocks: a full queue or a stopped loop is
/// reported as a `LoopError` boxed into the transport error.
pub struct QueueThunker {
    shared: Arc<LoopShared>,
}

impl QueueThunker {
    pub(crate) fn new(shared: Arc<LoopShared>) -> Self {
        Self { shared }
    }

    /// Queue slots
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Thunks accepted but not yet popped by the loop thread
    pub fn queued(&self) -> usize {
        self.shared.queued()
    }

    /// Whether the loop thread still accepts thunks
    pub fn is_accepting(&self) -> bool {
        self.shared.is_accepting()
    }
}

impl Thunker for QueueThunker {
    #[inline]
    fn is_loop_thread(&self) -> bool {
        self.shared.is_loop_thread()
    }

    fn move_to_loop_thread(&self, thunk: Arc<Thunk>) -> Result<(), TransportError> {
        let id = thunk.id();
        self.shared.enqueue(thunk).map_err(|e| {
            kdebug!("thunk {} not queued: {}", id, e);
            e.into()
        })
    }
}

impl std::fmt::Debug for QueueThunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueThunker")
            .field("capacity", &self.capacity())
            .field("queued", &self.queued())
            .field("accepting", &self.is_accepting())
            .finish()
    }
}
