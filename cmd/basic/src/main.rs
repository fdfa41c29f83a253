//! Basic thunking example
//!
//! A few synchronous threads hand work to one loop thread that owns a
//! single-threaded counter, plus a nested dispatch from inside a thunk.
//!
//! # Environment Variables
//!
//! - `THUNK_FLUSH_EPRINT=1` - Flush debug output immediately
//! - `THUNK_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `THUNK_LOOP_NAME`, `THUNK_QUEUE_CAPACITY`, `THUNK_IDLE_PARK_US` - loop thread settings

use std::cell::RefCell;
use std::sync::Arc;
use std::thread;

use thunking::{kdebug, kinfo, Runtime, ThunkResult};

thread_local! {
    // Loop-thread-only state: never shared, never locked
    static TALLY: RefCell<u64> = const { RefCell::new(0) };
}

fn bump(by: u64) -> u64 {
    TALLY.with(|t| {
        *t.borrow_mut() += by;
        *t.borrow()
    })
}

// THUNK_LOG_LEVEL=debug THUNK_FLUSH_EPRINT=1 cargo run -p thunking-basic
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Thunking Basic Example ===\n");

    let runtime = Arc::new(Runtime::from_env()?);
    println!("Loop thread: {}", runtime.loop_thread().name());

    let callers: Vec<_> = (1..=3u64)
        .map(|i| {
            let runtime = runtime.clone();
            thread::Builder::new()
                .name(format!("caller-{}", i))
                .spawn(move || -> ThunkResult<u64> {
                    let session = runtime.attach();
                    for j in 0..3 {
                        let total = thunking::call(move || bump(i))?;
                        kdebug!("[caller {}] step {} -> tally {}", i, j, total);
                    }
                    let stats = session.finish()?;
                    Ok(stats.completed)
                })
        })
        .collect::<Result<_, _>>()?;

    for (i, caller) in callers.into_iter().enumerate() {
        let done = caller.join().map_err(|_| "caller panicked")??;
        println!("caller-{} completed {} thunks", i + 1, done);
    }

    // Dispatch from inside a thunk runs inline on the loop thread
    let ctx = runtime.new_context();
    let inner_ctx = ctx.clone();
    let nested = thunking::call_in(ctx, move || {
        let before = bump(0);
        thunking::call_in(inner_ctx, || bump(100)).map(|after| (before, after))
    })??;
    kinfo!("nested dispatch: tally {} -> {}", nested.0, nested.1);
    println!("Nested dispatch: tally {} -> {}", nested.0, nested.1);

    let runtime = Arc::try_unwrap(runtime).map_err(|_| "runtime still shared")?;
    let stats = runtime.shutdown()?;
    println!(
        "\nLoop thread ran {} thunks ({} panicked)",
        stats.executed, stats.panicked
    );

    println!("\n=== Example Complete ===");
    Ok(())
}
