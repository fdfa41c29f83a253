//! Several synchronous threads sharing one runtime through sessions.

use std::sync::{Arc, Mutex};
use std::thread;

use thunking::{LoopConfig, Runtime, ThunkError};

#[test]
fn threads_share_one_loop_thread() {
    let runtime = Arc::new(Runtime::new(LoopConfig::new().thread_name("shared-loop")).unwrap());
    // Only ever touched on the loop thread
    let log = Arc::new(Mutex::new(Vec::new()));

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let runtime = runtime.clone();
            let log = log.clone();
            thread::spawn(move || {
                let session = runtime.attach();
                for step in 0..25 {
                    let log = log.clone();
                    thunking::dispatch(move || {
                        assert_eq!(thread::current().name(), Some("shared-loop"));
                        log.lock().unwrap().push((worker, step));
                    })
                    .unwrap();
                }
                session.finish().unwrap()
            })
        })
        .collect();

    for worker in workers {
        let stats = worker.join().unwrap();
        assert_eq!(stats.dispatched, 25);
        assert_eq!(stats.completed, 25);
    }

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 100);
    // Each worker's steps arrive in order
    for worker in 0..4 {
        let steps: Vec<_> = log.iter().filter(|(w, _)| *w == worker).map(|(_, s)| *s).collect();
        assert_eq!(steps, (0..25).collect::<Vec<_>>());
    }

    let runtime = Arc::try_unwrap(runtime).unwrap();
    assert_eq!(runtime.shutdown().unwrap().executed, 100);
}

#[test]
fn detached_thread_has_no_context() {
    let _runtime = Runtime::new(LoopConfig::new().thread_name("unused-loop")).unwrap();
    let result = thread::spawn(|| thunking::call(|| 1)).join().unwrap();
    assert!(matches!(result, Err(ThunkError::NoContext)));
}
