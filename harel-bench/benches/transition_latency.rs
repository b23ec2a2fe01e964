//! Latency of a single `send` across machine shapes.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use harel_bench::fixtures::{
    BenchEvent, counting_registry, flat_machine, interpreter, nested_machine, parallel_machine,
};

fn bench_flat_transition(c: &mut Criterion) {
    let mut group = c.benchmark_group("transition_latency");

    group.bench_function("flat_ping_pong", |b| {
        let mut machine = interpreter(flat_machine(), counting_registry());
        b.iter(|| {
            machine.send(black_box(BenchEvent("PING"))).unwrap();
        });
    });

    group.finish();
}

fn bench_nested_bubbling(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_bubbling");

    for depth in &[2usize, 8, 32] {
        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, &depth| {
            let mut machine = interpreter(nested_machine(depth), counting_registry());
            b.iter(|| {
                // Unhandled at the leaf; walks `depth` ancestors, exits and
                // re-enters the whole chain, then ping-pongs back.
                machine.send(black_box(BenchEvent("PING"))).unwrap();
                machine.send(black_box(BenchEvent("PING"))).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_parallel_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_broadcast");

    for regions in &[2usize, 8, 32] {
        group.bench_with_input(
            BenchmarkId::new("regions", regions),
            regions,
            |b, &regions| {
                let mut machine = interpreter(parallel_machine(regions), counting_registry());
                b.iter(|| {
                    machine.send(black_box(BenchEvent("PING"))).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    group.bench_function("parallel_8_regions", |b| {
        let machine = interpreter(parallel_machine(8), counting_registry());
        b.iter(|| black_box(machine.snapshot()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_flat_transition,
    bench_nested_bubbling,
    bench_parallel_broadcast,
    bench_snapshot
);
criterion_main!(benches);
