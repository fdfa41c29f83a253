//! The loop thread
//!
//! A single named OS thread that pops thunks from a bounded FIFO and runs
//! each one with `Thunk::execute_on_loop_thread()`. A panic escaping an
//! action is caught here, counted and logged; the loop keeps serving.
//!
//! Shutdown closes the queue to new thunks, then the loop drains whatever
//! was already accepted before exiting, so no caller stays blocked.

use crossbeam_queue::ArrayQueue;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use thunk_core::{kdebug, kerror, kinfo, ktrace, kwarn};
use thunk_core::{Thunk, ThunkError, ThunkResult};

use crate::config::LoopConfig;
use crate::context::ThreadThunkContext;
use crate::error::LoopError;
use crate::parking::{new_parking, LoopParking};
use crate::thunker::QueueThunker;

/// Counters of a loop thread (a snapshot)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Thunks whose action returned normally
    pub executed: u64,
    /// Thunks whose action panicked
    pub panicked: u64,
    /// Thunks accepted but not yet popped
    pub queued: usize,
}

/// State shared by the loop thread and its transport
pub(crate) struct LoopShared {
    queue: ArrayQueue<Arc<Thunk>>,
    parking: Box<dyn LoopParking>,
    accepting: AtomicBool,
    /// Transport calls between their `accepting` check and their push
    enqueuing: AtomicUsize,
    loop_thread: OnceLock<ThreadId>,
    executed: AtomicU64,
    panicked: AtomicU64,
    idle_park: Duration,
}

impl LoopShared {
    fn new(config: &LoopConfig) -> Self {
        Self {
            queue: ArrayQueue::new(config.queue_capacity),
            parking: new_parking(),
            accepting: AtomicBool::new(true),
            enqueuing: AtomicUsize::new(0),
            loop_thread: OnceLock::new(),
            executed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            idle_park: config.idle_park,
        }
    }

    #[inline]
    pub(crate) fn is_loop_thread(&self) -> bool {
        self.loop_thread.get() == Some(&thread::current().id())
    }

    #[inline]
    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    #[inline]
    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Push a thunk for the loop thread. Never blocks.
    pub(crate) fn enqueue(&self, thunk: Arc<Thunk>) -> Result<(), LoopError> {
        self.enqueuing.fetch_add(1, Ordering::SeqCst);
        let result = if !self.accepting.load(Ordering::SeqCst) {
            Err(LoopError::Stopped)
        } else {
            self.queue.push(thunk).map_err(|_| LoopError::QueueFull {
                capacity: self.queue.capacity(),
            })
        };
        self.enqueuing.fetch_sub(1, Ordering::SeqCst);

        if result.is_ok() {
            self.parking.unpark();
        }
        result
    }

    /// Closed, no push in progress, nothing left to run.
    fn should_exit(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
            && self.enqueuing.load(Ordering::SeqCst) == 0
            && self.queue.is_empty()
    }

    fn run_one(&self, thunk: Arc<Thunk>) {
        let id = thunk.id();
        ktrace!("running thunk {}", id);
        match panic::catch_unwind(AssertUnwindSafe(|| thunk.execute_on_loop_thread())) {
            Ok(()) => {
                self.executed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.panicked.fetch_add(1, Ordering::Relaxed);
                kerror!("thunk {} panicked: {}", id, panic_message(payload.as_ref()));
            }
        }
    }

    fn stats(&self) -> LoopStats {
        LoopStats {
            executed: self.executed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            queued: self.queue.len(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Loop thread main loop
fn run_loop(shared: Arc<LoopShared>) {
    kinfo!("loop thread started");
    loop {
        while let Some(thunk) = shared.queue.pop() {
            shared.run_one(thunk);
        }
        if shared.should_exit() {
            break;
        }
        shared.parking.park(Some(shared.idle_park));
    }
    let stats = shared.stats();
    kinfo!(
        "loop thread stopped ({} executed, {} panicked)",
        stats.executed,
        stats.panicked
    );
}

/// Handle to a running loop thread
///
/// Dropping the handle shuts the loop down and joins it.
pub struct LoopThread {
    shared: Arc<LoopShared>,
    thunker: Arc<QueueThunker>,
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl LoopThread {
    /// Validate `config` and spawn the loop thread
    pub fn start(config: LoopConfig) -> ThunkResult<Self> {
        config.validate().map_err(ThunkError::Config)?;

        let shared = Arc::new(LoopShared::new(&config));
        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_loop(loop_shared))
            .map_err(|e| {
                ThunkError::LoopThread(format!("failed to spawn {}: {}", config.thread_name, e))
            })?;

        // Taken from the handle so the identity is known before the thread runs
        let _ = shared.loop_thread.set(handle.thread().id());
        kdebug!(
            "loop thread {} spawned ({} queue slots)",
            config.thread_name,
            config.queue_capacity
        );

        Ok(Self {
            thunker: Arc::new(QueueThunker::new(Arc::clone(&shared))),
            shared,
            name: config.thread_name,
            handle: Some(handle),
        })
    }

    /// Transport feeding this loop thread
    pub fn thunker(&self) -> Arc<QueueThunker> {
        Arc::clone(&self.thunker)
    }

    /// New context for a synchronous thread dispatching to this loop
    pub fn new_context(&self) -> Arc<ThreadThunkContext> {
        ThreadThunkContext::new(self.thunker())
    }

    /// Loop thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loop thread identity
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.shared.loop_thread.get().copied()
    }

    /// Whether the loop thread is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    pub fn stats(&self) -> LoopStats {
        self.shared.stats()
    }

    /// Stop accepting thunks and let the loop drain and exit
    pub fn shutdown(&self) {
        if self.shared.accepting.swap(false, Ordering::SeqCst) {
            kdebug!("loop thread {} shutting down", self.name);
        }
        self.shared.parking.unpark();
    }

    /// Shut down, wait for the loop thread to exit, return final counters
    pub fn join(mut self) -> ThunkResult<LoopStats> {
        self.shutdown();
        self.join_inner()?;
        Ok(self.shared.stats())
    }

    fn join_inner(&mut self) -> ThunkResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if self.shared.is_loop_thread() {
            // Joining ourselves would deadlock; the loop exits once drained.
            return Err(ThunkError::LoopThread(
                "loop thread cannot join itself".to_string(),
            ));
        }
        handle
            .join()
            .map_err(|_| ThunkError::LoopThread(format!("{} panicked", self.name)))
    }
}

impl Drop for LoopThread {
    fn drop(&mut self) {
        self.shutdown();
        if let Err(e) = self.join_inner() {
            kwarn!("dropping loop thread handle: {}", e);
        }
    }
}

impl std::fmt::Debug for LoopThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopThread")
            .field("name", &self.name)
            .field("accepting", &self.shared.is_accepting())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Instant;
    use thunk_core::{ThunkContext, Thunker};

    fn small_loop(name: &str) -> LoopThread {
        LoopThread::start(
            LoopConfig::new()
                .thread_name(name)
                .idle_park(Duration::from_millis(5)),
        )
        .unwrap()
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let err = LoopThread::start(LoopConfig::new().queue_capacity(0)).unwrap_err();
        assert!(matches!(err, ThunkError::Config(_)));
    }

    #[test]
    fn test_identity_is_the_spawned_thread() {
        let lt = small_loop("identity-loop");
        let thunker = lt.thunker();
        assert!(!thunker.is_loop_thread());

        let ctx = lt.new_context();
        let seen = thunk_core::call(ctx, || thread::current().name().map(str::to_string)).unwrap();
        assert_eq!(seen.as_deref(), Some("identity-loop"));
        assert!(lt.is_running());
    }

    #[test]
    fn test_runs_in_fifo_order() {
        let lt = small_loop("fifo-loop");
        let ctx = lt.new_context();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        // Hold the loop so all thunks queue up behind the gate
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let gate = Thunk::new(ctx.clone(), move || {
            let _ = gate_rx.recv();
        });
        ctx.thunker().move_to_loop_thread(gate).unwrap();

        for i in 0..5 {
            let order = order.clone();
            let thunk = Thunk::new(ctx.clone(), move || order.lock().unwrap().push(i));
            ctx.thunker().move_to_loop_thread(thunk).unwrap();
        }
        gate_tx.send(()).unwrap();

        let stats = lt.join().unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(stats.executed, 6);
        assert_eq!(stats.queued, 0);
    }

    #[test]
    fn test_panic_is_contained() {
        let lt = small_loop("panic-loop");
        let ctx = lt.new_context();

        let bad = Thunk::new(ctx.clone(), || panic!("bad thunk"));
        let err = bad.dispatch().unwrap_err();
        assert!(matches!(err, ThunkError::ActionPanicked { .. }));

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        Thunk::new(ctx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .dispatch()
        .unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        let stats = lt.join().unwrap();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.executed, 1);
    }

    #[test]
    fn test_shutdown_refuses_new_thunks() {
        let lt = small_loop("stopped-loop");
        let ctx = lt.new_context();
        lt.shutdown();

        let thunk = Thunk::new(ctx.clone(), || {});
        let err = thunk.dispatch().unwrap_err();
        match err {
            ThunkError::DispatchFailed { source, .. } => {
                assert_eq!(source.downcast_ref::<LoopError>(), Some(&LoopError::Stopped));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(ctx.stats().failed, 1);
        assert_eq!(ctx.in_flight(), 0);

        let start = Instant::now();
        while lt.is_running() {
            assert!(start.elapsed() < Duration::from_secs(10));
            thread::yield_now();
        }
    }
}
