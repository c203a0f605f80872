// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use echo_math::Vec3;
use echo_physics_benches::cube_grid;
use std::{hint::black_box, time::Duration};

const DT: f32 = 1.0 / 60.0;
const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    group
        .warm_up_time(Duration::from_secs(2))
        .measurement_time(Duration::from_secs(5))
        .sample_size(30);
    for &side in &[4_u32, 8, 16] {
        group.throughput(Throughput::Elements(u64::from(side * side)));
        group.bench_with_input(BenchmarkId::from_parameter(side), &side, |b, &side| {
            b.iter_batched(
                || {
                    let mut world = cube_grid(side, 1).unwrap();
                    // First step admits the bodies and builds the tree.
                    world.process(DT, GRAVITY).unwrap();
                    world
                },
                |mut world| {
                    for _ in 0..10 {
                        black_box(world.process(DT, GRAVITY).unwrap());
                    }
                },
                BatchSize::PerIteration,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_world_step);
criterion_main!(benches);
