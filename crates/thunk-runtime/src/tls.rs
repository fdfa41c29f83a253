//! Thread-local dispatch sessions
//!
//! A session binds a `ThreadThunkContext` to the calling OS thread so code
//! deep in a call stack can dispatch without threading the context through.
//! Sessions nest. The innermost live session is the current one; a guard
//! dropped out of order removes only its own binding.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::sync::Arc;

use thunk_core::kwarn;
use thunk_core::{Thunk, ThunkError, ThunkResult};

use crate::context::{ContextStats, ThreadThunkContext};

struct Binding {
    session: u64,
    context: Arc<ThreadThunkContext>,
}

thread_local! {
    /// Live sessions of this OS thread, innermost last
    static SESSIONS: RefCell<Vec<Binding>> = const { RefCell::new(Vec::new()) };

    static NEXT_SESSION: Cell<u64> = const { Cell::new(0) };
}

/// Binding of a context to the current thread; unbinds on drop
#[must_use = "the session ends when the guard is dropped"]
pub struct SessionGuard {
    session: u64,
    context: Arc<ThreadThunkContext>,
    // Sessions are per thread
    _not_send: PhantomData<*const ()>,
}

impl SessionGuard {
    pub fn context(&self) -> &Arc<ThreadThunkContext> {
        &self.context
    }

    /// Wait for this session's outstanding thunks, then end it
    pub fn finish(self) -> ThunkResult<ContextStats> {
        self.context.wait_for_idle()?;
        Ok(self.context.stats())
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let session = self.session;
        // Thread-local may already be gone during thread teardown
        let _ = SESSIONS.try_with(|cell| {
            let mut sessions = cell.borrow_mut();
            match sessions.iter().rposition(|b| b.session == session) {
                Some(pos) if pos + 1 == sessions.len() => {
                    sessions.pop();
                }
                Some(pos) => {
                    kwarn!(
                        "session {} of {} ended while {} inner session(s) still live",
                        session,
                        self.context.owner(),
                        sessions.len() - pos - 1
                    );
                    sessions.remove(pos);
                }
                None => {}
            }
        });
    }
}

/// Bind `context` to the calling thread
pub fn enter(context: Arc<ThreadThunkContext>) -> SessionGuard {
    let session = NEXT_SESSION.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });
    SESSIONS.with(|cell| {
        cell.borrow_mut().push(Binding {
            session,
            context: Arc::clone(&context),
        })
    });
    SessionGuard {
        session,
        context,
        _not_send: PhantomData,
    }
}

/// Context bound to the calling thread, if any
#[inline]
pub fn current_context() -> Option<Arc<ThreadThunkContext>> {
    SESSIONS.with(|cell| cell.borrow().last().map(|b| Arc::clone(&b.context)))
}

#[inline]
pub fn has_context() -> bool {
    SESSIONS.with(|cell| !cell.borrow().is_empty())
}

/// New thunk bound to the current session's context
pub fn new_thunk<F>(action: F) -> ThunkResult<Arc<Thunk>>
where
    F: FnOnce() + Send + 'static,
{
    let context = current_context().ok_or(ThunkError::NoContext)?;
    Ok(Thunk::new(context, action))
}

/// Run `action` on the loop thread through the current session
pub fn dispatch<F>(action: F) -> ThunkResult<()>
where
    F: FnOnce() + Send + 'static,
{
    new_thunk(action)?.dispatch()
}

/// Run `f` on the loop thread through the current session, return its value
pub fn call<T, F>(f: F) -> ThunkResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let context = current_context().ok_or(ThunkError::NoContext)?;
    thunk_core::call(context, f)
}
