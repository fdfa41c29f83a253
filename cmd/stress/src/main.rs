//! Stress test - many callers, one loop thread
//!
//! Usage: `stress [callers] [thunks-per-caller] [queue-capacity]`
//!
//! A small queue makes dispatch failures likely; they are counted, not fatal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use thunking::{LoopConfig, Runtime, Thunk, ThunkError};

fn arg(n: usize, default: usize) -> usize {
    std::env::args()
        .nth(n)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Thunking Stress Test ===\n");

    let num_callers = arg(1, 16);
    let per_caller = arg(2, 10_000);
    let capacity = arg(3, 1024);

    println!(
        "{} callers x {} thunks, queue capacity {}",
        num_callers, per_caller, capacity
    );

    let runtime = Runtime::new(
        LoopConfig::from_env()
            .queue_capacity(capacity)
            .thread_name("stress-loop"),
    )?;

    let executed = Arc::new(AtomicU64::new(0));
    let refused = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let callers: Vec<_> = (0..num_callers)
        .map(|_| {
            let ctx = runtime.new_context();
            let executed = executed.clone();
            let refused = refused.clone();
            thread::spawn(move || {
                for _ in 0..per_caller {
                    let executed = executed.clone();
                    let thunk = Thunk::new(ctx.clone(), move || {
                        executed.fetch_add(1, Ordering::Relaxed);
                    });
                    match thunk.dispatch() {
                        Ok(()) => {}
                        Err(e) if e.is_dispatch_failure() => {
                            refused.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok::<_, ThunkError>(ctx.stats())
            })
        })
        .collect();

    let mut dispatched = 0;
    for caller in callers {
        let stats = caller.join().map_err(|_| "caller panicked")??;
        dispatched += stats.dispatched;
    }
    let total_time = start.elapsed();
    let loop_stats = runtime.shutdown()?;

    let attempted = (num_callers * per_caller) as u64;
    println!("\n=== Results ===");
    println!("Attempted:       {}", attempted);
    println!("Dispatched:      {}", dispatched);
    println!("Executed:        {}", executed.load(Ordering::Relaxed));
    println!("Refused:         {}", refused.load(Ordering::Relaxed));
    println!("Loop executed:   {}", loop_stats.executed);
    println!("Total time:      {:?}", total_time);
    println!(
        "Throughput:      {:.0} thunks/sec",
        executed.load(Ordering::Relaxed) as f64 / total_time.as_secs_f64()
    );

    println!("\n=== Stress Test Complete ===");
    Ok(())
}
