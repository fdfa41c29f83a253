//! The thunk: one unit of work handed from a synchronous thread to the loop thread
//!
//! A thunk owns a boxed action and a monitor (mutex + condvar). The caller
//! thread calls [`Thunk::dispatch`], which either runs the action inline (when
//! the caller already is the loop thread) or hands the thunk to the context's
//! transport and blocks on the monitor. The loop thread calls
//! [`Thunk::execute_on_loop_thread`], which runs the action, releases every
//! waiter and then tells the context the thunk completed.
//!
//! ```text
//!  caller thread                         loop thread
//!  ─────────────                         ───────────
//!  dispatch()
//!   ├─ note_thunk_dispatching
//!   ├─ move_to_loop_thread ─────────▶   execute_on_loop_thread()
//!   └─ wait on monitor                    ├─ action()
//!          ▲                              ├─ state = Completed, notify_all
//!          └──────────────────────────────┤
//!                                         └─ note_thunk_completion
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::constants::CANCEL_POLL_US;
use crate::env::env_get_micros;
use crate::error::{ThunkError, ThunkResult};
use crate::id::ThunkId;
use crate::state::ThunkState;
use crate::traits::ThunkContext;
use crate::{kdebug, ktrace, kwarn};

/// Work carried by a thunk, run once on the loop thread
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Poll interval for cancellable waits, read once from `THUNK_CANCEL_POLL_US`
pub fn cancel_poll_interval() -> Duration {
    static INTERVAL: OnceLock<Duration> = OnceLock::new();
    *INTERVAL.get_or_init(|| {
        env_get_micros("THUNK_CANCEL_POLL_US", Duration::from_micros(CANCEL_POLL_US))
            .max(Duration::from_micros(1))
    })
}

/// State guarded by the thunk's monitor
struct Monitor {
    state: ThunkState,
    /// Taken exactly once, by whoever moves the state to `Executing`
    action: Option<Action>,
}

/// A unit of work bound to the context of the thread that created it
pub struct Thunk {
    id: ThunkId,
    context: Arc<dyn ThunkContext>,
    monitor: Mutex<Monitor>,
    released: Condvar,
}

impl Thunk {
    /// Create a thunk bound to `context`
    pub fn new<F>(context: Arc<dyn ThunkContext>, action: F) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::from_action(context, Box::new(action))
    }

    /// Create a thunk from an already boxed action
    pub fn from_action(context: Arc<dyn ThunkContext>, action: Action) -> Arc<Self> {
        Arc::new(Self {
            id: ThunkId::next(),
            context,
            monitor: Mutex::new(Monitor {
                state: ThunkState::Created,
                action: Some(action),
            }),
            released: Condvar::new(),
        })
    }

    #[inline]
    pub fn id(&self) -> ThunkId {
        self.id
    }

    /// Context of the thread that created this thunk
    #[inline]
    pub fn context(&self) -> &Arc<dyn ThunkContext> {
        &self.context
    }

    /// Current lifecycle state (a snapshot)
    pub fn state(&self) -> ThunkState {
        self.lock().state
    }

    /// Whether the thunk reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    fn lock(&self) -> MutexGuard<'_, Monitor> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Loop thread side
    // ------------------------------------------------------------------

    /// Run the action, release all waiters, then note completion.
    ///
    /// Must only be called on the loop thread, once per dequeued thunk.
    /// Further calls are ignored. If the action unwinds, waiters are still
    /// released (state `Panicked`) and the context is still notified before
    /// the panic continues into the runner.
    pub fn execute_on_loop_thread(&self) {
        let action = {
            let mut monitor = self.lock();
            if !monitor.state.is_executable() {
                kwarn!("thunk {} is {}, not executing it again", self.id, monitor.state);
                return;
            }
            monitor.state = ThunkState::Executing;
            monitor.action.take()
        };

        ktrace!("thunk {} executing", self.id);
        let _release = ReleaseOnDrop { thunk: self };
        if let Some(action) = action {
            action();
        }
    }

    /// Publish the final state, wake every waiter, then tell the context.
    fn release(&self, outcome: ThunkState) {
        {
            let mut monitor = self.lock();
            monitor.state = outcome;
            self.released.notify_all();
        }

        if outcome == ThunkState::Panicked {
            kwarn!("thunk {} action panicked, waiters released", self.id);
        } else {
            ktrace!("thunk {} completed", self.id);
        }
        self.context.note_thunk_completion(self);
    }

    // ------------------------------------------------------------------
    // Caller side
    // ------------------------------------------------------------------

    /// Run the action on the loop thread and block until it finished.
    ///
    /// On the loop thread itself the action runs inline. Otherwise the
    /// thunk is handed to the context's transport; if the transport refuses
    /// it, the context is told and `ThunkError::DispatchFailed` carries the
    /// transport's error. A panicking action yields `ActionPanicked` on both
    /// paths.
    pub fn dispatch(self: &Arc<Self>) -> ThunkResult<()> {
        self.dispatch_cancellable(&CancellationToken::never())
    }

    /// Like [`dispatch`](Self::dispatch), but the wait returns
    /// `ThunkError::Cancelled` once `token` is cancelled.
    ///
    /// A cancelled wait does not recall the thunk: the loop thread still runs
    /// it and the context still sees its completion.
    pub fn dispatch_cancellable(self: &Arc<Self>, token: &CancellationToken) -> ThunkResult<()> {
        let thunker = self.context.thunker();

        if thunker.is_loop_thread() {
            self.expect_created()?;
            kdebug!("thunk {} dispatched on the loop thread, running inline", self.id);
            // Same outcome as a handed-over thunk: the panic stays here
            if panic::catch_unwind(AssertUnwindSafe(|| self.execute_on_loop_thread())).is_err() {
                kwarn!("inline thunk {} panicked", self.id);
            }
            return self.outcome(self.state());
        }

        {
            let mut monitor = self.lock();
            if monitor.state != ThunkState::Created {
                return Err(ThunkError::InvalidState(monitor.state));
            }
            monitor.state = ThunkState::Dispatching;
        }
        self.context.note_thunk_dispatching(self);

        if let Err(source) = thunker.move_to_loop_thread(Arc::clone(self)) {
            self.fail_dispatch();
            self.context.note_thunk_dispatch_failure(self);
            kwarn!("thunk {} dispatch failed: {}", self.id, source);
            return Err(ThunkError::DispatchFailed { id: self.id, source });
        }

        kdebug!("thunk {} handed to the loop thread", self.id);
        self.wait_cancellable(token)
    }

    fn expect_created(&self) -> ThunkResult<()> {
        match self.state() {
            ThunkState::Created => Ok(()),
            other => Err(ThunkError::InvalidState(other)),
        }
    }

    fn fail_dispatch(&self) {
        let dropped = {
            let mut monitor = self.lock();
            if monitor.state != ThunkState::Dispatching {
                return;
            }
            monitor.state = ThunkState::DispatchFailed;
            self.released.notify_all();
            monitor.action.take()
        };
        // Drop the action outside the lock; its captures may do anything.
        drop(dropped);
    }

    /// Block until the thunk reaches a terminal state.
    ///
    /// Any number of threads may wait on the same thunk.
    pub fn wait(&self) -> ThunkResult<()> {
        self.wait_cancellable(&CancellationToken::never())
    }

    /// Block until the thunk reaches a terminal state or `token` is cancelled.
    pub fn wait_cancellable(&self, token: &CancellationToken) -> ThunkResult<()> {
        let poll = cancel_poll_interval();
        let mut monitor = self.lock();

        while !monitor.state.is_terminal() {
            if let Err(e) = token.check() {
                kdebug!("wait on thunk {} cancelled ({})", self.id, monitor.state);
                return Err(e);
            }
            monitor = if token.can_cancel() {
                self.released
                    .wait_timeout(monitor, poll)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            } else {
                self.released
                    .wait(monitor)
                    .unwrap_or_else(PoisonError::into_inner)
            };
        }

        self.outcome(monitor.state)
    }

    fn outcome(&self, state: ThunkState) -> ThunkResult<()> {
        match state {
            ThunkState::Completed => Ok(()),
            ThunkState::Panicked => Err(ThunkError::ActionPanicked { id: self.id }),
            other => Err(ThunkError::InvalidState(other)),
        }
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thunk")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Releases waiters when the action returns or unwinds
struct ReleaseOnDrop<'a> {
    thunk: &'a Thunk,
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        let outcome = if std::thread::panicking() {
            ThunkState::Panicked
        } else {
            ThunkState::Completed
        };
        self.thunk.release(outcome);
    }
}

/// Run `f` on the loop thread and return its value.
///
/// The value travels through a slot filled by the action; the caller reads
/// it after being released, which the monitor orders after the write.
pub fn call<T, F>(context: Arc<dyn ThunkContext>, f: F) -> ThunkResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let slot: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
    let out = Arc::clone(&slot);
    let thunk = Thunk::new(context, move || {
        let value = f();
        *out.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    });

    thunk.dispatch()?;

    let value = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    value.ok_or_else(|| ThunkError::InvalidState(thunk.state()))
}
