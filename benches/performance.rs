//! Performance benchmarks for dispatch and fan-out.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reflux::{Result, Store};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Clone, Default)]
struct Counter {
    value: u64,
    parity: bool,
}

enum Op {
    Add(u64),
}

fn reducer(op: &Op, state: Option<&Counter>) -> Result<Counter> {
    let state = state.cloned().unwrap_or_default();
    match op {
        Op::Add(n) => {
            let value = state.value + n;
            Ok(Counter {
                value,
                parity: value % 2 == 0,
            })
        }
    }
}

/// Benchmark a dispatch with a growing number of plain subscribers
fn bench_dispatch_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_fan_out");

    for subscribers in [0, 10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &count| {
                let store = Store::new(reducer, Counter::default());
                let sink = Rc::new(Cell::new(0u64));
                let handles: Vec<_> = (0..count)
                    .map(|_| {
                        let sink = Rc::clone(&sink);
                        Rc::new(move |state: &Counter| sink.set(state.value))
                    })
                    .collect();
                for handle in &handles {
                    store.subscribe(handle);
                }

                b.iter(|| {
                    store.dispatch(black_box(Op::Add(1))).unwrap();
                });
                black_box(sink.get());
            },
        );
    }

    group.finish();
}

/// Benchmark fan-out where most deliveries are skipped by a substate filter
fn bench_dispatch_filtered(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_filtered");

    for subscribers in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &count| {
                let store = Store::new(reducer, Counter::default());
                let sink = Rc::new(Cell::new(0u32));
                let handles: Vec<_> = (0..count)
                    .map(|_| {
                        let sink = Rc::clone(&sink);
                        Rc::new(move |_: &bool| sink.set(sink.get() + 1))
                    })
                    .collect();
                for handle in &handles {
                    store.subscribe_with(handle, |s| s.select(|state| state.parity).skip_repeats());
                }

                // Adding 2 keeps parity, so every delivery is skipped.
                b.iter(|| {
                    store.dispatch(black_box(Op::Add(2))).unwrap();
                });
                black_box(sink.get());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch_fan_out, bench_dispatch_filtered);
criterion_main!(benches);
