use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use ecosim_core::{build_headless_app, run_tick, EcologyConfig, Ecosystem};

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for size in [32u32, 64, 128, 256] {
        group.bench_with_input(BenchmarkId::new("grid", size), &size, |b, &size| {
            b.iter_batched(
                || build_headless_app(EcologyConfig::new(size, size, 7)),
                |mut app| {
                    run_tick(&mut app);
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_eruption(c: &mut Criterion) {
    let mut group = c.benchmark_group("eruption");
    group.sample_size(20);

    group.bench_function("flow_50_ticks", |b| {
        b.iter_batched(
            || {
                let mut world = Ecosystem::new(EcologyConfig::new(128, 128, 11));
                world.spawn_volcano_at(64, 64);
                world
            },
            |mut world| world.step_n(50),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(tick_benches, bench_tick, bench_eruption);
criterion_main!(tick_benches);
