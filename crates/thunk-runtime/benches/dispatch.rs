//! Benchmarks for thunk dispatch.
//!
//! Measures a full round trip from a synchronous thread through the queue
//! to the loop thread and back, against the inline path taken when the
//! dispatching thread already is the loop thread.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;
use thunk_core::Thunk;
use thunk_runtime::{LoopConfig, LoopThread};

fn bench_round_trip(c: &mut Criterion) {
    let lt = LoopThread::start(LoopConfig::new().thread_name("bench-loop")).unwrap();
    let ctx = lt.new_context();

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));
    group.bench_function("round_trip", |b| {
        b.iter(|| {
            let thunk = Thunk::new(ctx.clone(), || {
                black_box(1u64);
            });
            thunk.dispatch().unwrap();
        });
    });
    group.bench_function("call", |b| {
        b.iter(|| black_box(thunk_core::call(ctx.clone(), || 42u64).unwrap()));
    });
    group.finish();
}

fn bench_inline(c: &mut Criterion) {
    let lt = LoopThread::start(LoopConfig::new().thread_name("bench-inline")).unwrap();
    let ctx = lt.new_context();

    // Timed from inside one thunk so every dispatch sees the loop thread
    c.bench_function("dispatch/inline", |b| {
        b.iter_custom(|iters| {
            let inner = Arc::clone(&ctx);
            thunk_core::call(ctx.clone(), move || {
                let start = Instant::now();
                for _ in 0..iters {
                    Thunk::new(inner.clone(), || {
                        black_box(1u64);
                    })
                    .dispatch()
                    .unwrap();
                }
                start.elapsed()
            })
            .unwrap()
        });
    });
}

criterion_group!(benches, bench_round_trip, bench_inline,);
criterion_main!(benches);
