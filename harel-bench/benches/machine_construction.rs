//! Cost of building and validating definitions, and of starting an
//! interpreter — the fail-fast work applications pay once per machine.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

use harel_bench::fixtures::{BenchContext, BenchTypes, counting_registry, nested_machine, parallel_machine};
use harel_core::prelude::*;

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("definition_build");

    for depth in &[8usize, 32] {
        group.bench_with_input(BenchmarkId::new("nested_depth", depth), depth, |b, &depth| {
            b.iter(|| black_box(nested_machine(depth)));
        });
    }
    group.bench_function("parallel_8_regions", |b| {
        b.iter(|| black_box(parallel_machine(8)));
    });

    group.finish();
}

fn bench_start(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter_start");

    group.bench_function("parallel_8_regions", |b| {
        let def = Arc::new(parallel_machine(8));
        let registry = counting_registry();
        b.iter(|| {
            let mut interpreter: Interpreter<BenchTypes, _> = Interpreter::new(
                Arc::clone(&def),
                registry.clone(),
                BenchContext::default(),
                ManualScheduler::new(),
            )
            .unwrap();
            interpreter.start().unwrap();
            black_box(interpreter.snapshot())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_build, bench_start);
criterion_main!(benches);
