//! Per-thread dispatch context
//!
//! A `ThreadThunkContext` belongs to one synchronous thread (or one logical
//! session) and tracks the thunks it has handed to the loop thread. The
//! in-flight set is what `wait_for_idle` blocks on.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use thunk_core::thunk::cancel_poll_interval;
use thunk_core::{ktrace, kwarn};
use thunk_core::{CancellationToken, Thunk, ThunkContext, ThunkId, ThunkResult, Thunker};

/// Context counters (a snapshot)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    /// Thunks handed to the transport
    pub dispatched: u64,
    /// Handed-over thunks that finished on the loop thread
    pub completed: u64,
    /// Handed-over thunks the transport refused
    pub failed: u64,
    /// Thunks that completed without a hand-over (run inline on the loop thread)
    pub inline: u64,
}

#[derive(Default)]
struct ContextState {
    in_flight: HashSet<ThunkId>,
    stats: ContextStats,
}

/// `ThunkContext` for a synchronous thread
pub struct ThreadThunkContext {
    thunker: Arc<dyn Thunker>,
    owner: String,
    state: Mutex<ContextState>,
    idle: Condvar,
}

impl ThreadThunkContext {
    /// New context dispatching through `thunker`, owned by the calling thread
    pub fn new(thunker: Arc<dyn Thunker>) -> Arc<Self> {
        let owner = thread::current().name().unwrap_or("<unnamed>").to_string();
        Arc::new(Self {
            thunker,
            owner,
            state: Mutex::new(ContextState::default()),
            idle: Condvar::new(),
        })
    }

    /// Name of the thread that created this context
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Thunks dispatched and not yet completed or failed
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.lock().in_flight.is_empty()
    }

    pub fn stats(&self) -> ContextStats {
        self.lock().stats
    }

    /// Block until no dispatched thunk of this context is outstanding
    ///
    /// Must not be called on the loop thread while thunks are in flight:
    /// they could only finish after the caller returns.
    pub fn wait_for_idle(&self) -> ThunkResult<()> {
        self.wait_for_idle_cancellable(&CancellationToken::never())
    }

    /// `wait_for_idle` that gives up with `Cancelled` once `token` fires
    pub fn wait_for_idle_cancellable(&self, token: &CancellationToken) -> ThunkResult<()> {
        let poll = cancel_poll_interval();
        let mut state = self.lock();
        while !state.in_flight.is_empty() {
            token.check()?;
            state = if token.can_cancel() {
                self.idle
                    .wait_timeout(state, poll)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|e| e.into_inner().0)
            } else {
                self.idle.wait(state).unwrap_or_else(PoisonError::into_inner)
            };
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, state: &ContextState) {
        if state.in_flight.is_empty() {
            self.idle.notify_all();
        }
    }
}

impl ThunkContext for ThreadThunkContext {
    fn note_thunk_dispatching(&self, thunk: &Thunk) {
        let mut state = self.lock();
        if !state.in_flight.insert(thunk.id()) {
            kwarn!("thunk {} already in flight for {}", thunk.id(), self.owner);
        }
        state.stats.dispatched += 1;
        ktrace!("{}: thunk {} dispatching", self.owner, thunk.id());
    }

    fn note_thunk_dispatch_failure(&self, thunk: &Thunk) {
        let mut state = self.lock();
        state.in_flight.remove(&thunk.id());
        state.stats.failed += 1;
        self.settle(&state);
    }

    fn note_thunk_completion(&self, thunk: &Thunk) {
        let mut state = self.lock();
        if state.in_flight.remove(&thunk.id()) {
            state.stats.completed += 1;
        } else {
            state.stats.inline += 1;
        }
        self.settle(&state);
    }

    fn thunker(&self) -> Arc<dyn Thunker> {
        Arc::clone(&self.thunker)
    }
}

impl std::fmt::Debug for ThreadThunkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ThreadThunkContext")
            .field("owner", &self.owner)
            .field("in_flight", &state.in_flight.len())
            .field("stats", &state.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;
    use thunk_core::TransportError;

    /// Transport that parks thunks until the test runs them
    struct HoldingThunker {
        held: Mutex<Vec<Arc<Thunk>>>,
        refuse: AtomicBool,
    }

    impl HoldingThunker {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                held: Mutex::new(Vec::new()),
                refuse: AtomicBool::new(false),
            })
        }

        fn run_all(&self) {
            let held: Vec<_> = self.held.lock().unwrap().drain(..).collect();
            for thunk in held {
                thunk.execute_on_loop_thread();
            }
        }

        fn held(&self) -> usize {
            self.held.lock().unwrap().len()
        }
    }

    impl Thunker for HoldingThunker {
        fn is_loop_thread(&self) -> bool {
            false
        }

        fn move_to_loop_thread(&self, thunk: Arc<Thunk>) -> Result<(), TransportError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err("refused".into());
            }
            self.held.lock().unwrap().push(thunk);
            Ok(())
        }
    }

    fn dispatch_in_background(thunk: Arc<Thunk>) -> thread::JoinHandle<ThunkResult<()>> {
        thread::spawn(move || thunk.dispatch())
    }

    fn wait_for_held(thunker: &HoldingThunker, n: usize) {
        let start = std::time::Instant::now();
        while thunker.held() < n {
            assert!(start.elapsed() < Duration::from_secs(10), "thunks never arrived");
            thread::yield_now();
        }
    }

    #[test]
    fn test_tracks_in_flight_until_completion() {
        let thunker = HoldingThunker::new();
        let ctx = ThreadThunkContext::new(thunker.clone());

        let a = dispatch_in_background(Thunk::new(ctx.clone(), || {}));
        let b = dispatch_in_background(Thunk::new(ctx.clone(), || {}));
        wait_for_held(&thunker, 2);
        assert_eq!(ctx.in_flight(), 2);
        assert!(!ctx.is_idle());

        thunker.run_all();
        a.join().unwrap().unwrap();
        b.join().unwrap().unwrap();

        assert!(ctx.is_idle());
        let stats = ctx.stats();
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.inline, 0);
    }

    #[test]
    fn test_failure_leaves_nothing_in_flight() {
        let thunker = HoldingThunker::new();
        thunker.refuse.store(true, Ordering::SeqCst);
        let ctx = ThreadThunkContext::new(thunker.clone());

        let err = Thunk::new(ctx.clone(), || {}).dispatch().unwrap_err();
        assert!(err.is_dispatch_failure());
        assert_eq!(ctx.in_flight(), 0);
        assert_eq!(ctx.stats().failed, 1);
        ctx.wait_for_idle().unwrap();
    }

    #[test]
    fn test_completion_without_hand_over_counts_inline() {
        let ctx = ThreadThunkContext::new(HoldingThunker::new());
        Thunk::new(ctx.clone(), || {}).execute_on_loop_thread();
        assert_eq!(ctx.stats().inline, 1);
        assert_eq!(ctx.stats().completed, 0);
    }

    #[test]
    fn test_wait_for_idle_blocks_until_drained() {
        let thunker = HoldingThunker::new();
        let ctx = ThreadThunkContext::new(thunker.clone());
        let caller = dispatch_in_background(Thunk::new(ctx.clone(), || {}));
        wait_for_held(&thunker, 1);

        let (done_tx, done_rx) = mpsc::channel();
        let waiter_ctx = ctx.clone();
        let waiter = thread::spawn(move || {
            let result = waiter_ctx.wait_for_idle();
            let _ = done_tx.send(());
            result
        });

        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        thunker.run_all();
        waiter.join().unwrap().unwrap();
        caller.join().unwrap().unwrap();
    }

    #[test]
    fn test_wait_for_idle_cancelled() {
        let thunker = HoldingThunker::new();
        let ctx = ThreadThunkContext::new(thunker.clone());
        let caller = dispatch_in_background(Thunk::new(ctx.clone(), || {}));
        wait_for_held(&thunker, 1);

        let token = CancellationToken::new();
        token.cancel();
        let err = ctx.wait_for_idle_cancellable(&token).unwrap_err();
        assert!(err.is_cancelled());

        thunker.run_all();
        caller.join().unwrap().unwrap();
    }

    #[test]
    fn test_owner_is_creating_thread() {
        let owner = thread::Builder::new()
            .name("robot-sync".into())
            .spawn(|| ThreadThunkContext::new(HoldingThunker::new()).owner().to_string())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(owner, "robot-sync");
    }
}
