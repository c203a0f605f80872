// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use echo_geom::{Aabb, AabbTree, BroadPhase};
use echo_math::Vec3;
use std::hint::black_box;

fn grid(n: u32) -> Vec<(u32, Aabb)> {
    (0..n * n)
        .map(|k| {
            #[allow(clippy::cast_precision_loss)]
            let center = Vec3::new((k % n) as f32 * 1.9, 0.0, (k / n) as f32 * 1.9);
            (k, Aabb::from_center_half_extents(center, Vec3::ONE))
        })
        .collect()
}

fn bench_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("aabb_tree_pairs");
    for &n in &[10_u32, 32, 64] {
        let mut tree = AabbTree::new(0.1);
        for (key, aabb) in grid(n) {
            tree.upsert(key, aabb);
        }
        group.throughput(Throughput::Elements(u64::from(n * n)));
        group.bench_with_input(BenchmarkId::from_parameter(n * n), &tree, |b, tree| {
            b.iter(|| black_box(tree.pairs()));
        });
    }
    group.finish();
}

fn bench_reinsert(c: &mut Criterion) {
    let boxes = grid(32);
    let mut tree = AabbTree::new(0.1);
    for (key, aabb) in &boxes {
        tree.upsert(*key, *aabb);
    }
    let mut offset = 0.0_f32;
    c.bench_function("aabb_tree_shift_all", |b| {
        b.iter(|| {
            offset += 0.25;
            for (key, aabb) in &boxes {
                black_box(tree.upsert(*key, aabb.translate(&Vec3::new(0.0, offset, 0.0))));
            }
        });
    });
}

criterion_group!(benches, bench_pairs, bench_reinsert);
criterion_main!(benches);
