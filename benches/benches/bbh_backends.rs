// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_bbh::{Aabb2D, Backend, FlatVec, RTree, RTreeConfig};

fn gen_grid_rects(n: usize, cell: f64) -> Vec<(usize, Aabb2D<f64>)> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * cell;
            let y0 = y as f64 * cell;
            out.push((out.len(), Aabb2D::from_xywh(x0, y0, cell, cell)));
        }
    }
    out
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1_u64 << 53) as f64)
    }
}

/// Rectangles scattered over a square world, like draws in a busy picture.
fn gen_random_rects(count: usize, world: f64, max_size: f64) -> Vec<(usize, Aabb2D<f64>)> {
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
    (0..count)
        .map(|i| {
            let x = rng.next_f64() * world;
            let y = rng.next_f64() * world;
            let w = rng.next_f64() * max_size + 1.0;
            let h = rng.next_f64() * max_size + 1.0;
            (i, Aabb2D::from_xywh(x, y, w, h))
        })
        .collect()
}

fn bench_bulk_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("bbh_bulk_load");
    for n in [32_usize, 100, 316] {
        let rects = gen_grid_rects(n, 10.0);
        group.throughput(Throughput::Elements(rects.len() as u64));
        group.bench_function(BenchmarkId::new("FlatVec", rects.len()), |b| {
            b.iter(|| {
                let mut index = FlatVec::default();
                index.bulk_load(black_box(&rects));
                index
            });
        });
        group.bench_function(BenchmarkId::new("RTree", rects.len()), |b| {
            b.iter(|| {
                let mut index = RTree::default();
                index.bulk_load(black_box(&rects));
                index
            });
        });
        group.bench_function(BenchmarkId::new("RTree(4..=8)", rects.len()), |b| {
            b.iter(|| {
                let mut index = RTree::with_config(RTreeConfig::new(4, 8));
                index.bulk_load(black_box(&rects));
                index
            });
        });
    }
    group.finish();
}

fn bench_visit_rect<B: Backend<f64>>(
    c: &mut Criterion,
    name: &str,
    make: impl Fn() -> B,
    rects: &[(usize, Aabb2D<f64>)],
) {
    let mut group = c.benchmark_group("bbh_visit_rect");
    let mut index = make();
    index.bulk_load(rects);
    let queries: Vec<_> = gen_random_rects(256, 5_000.0, 400.0)
        .into_iter()
        .map(|(_, r)| r)
        .collect();
    group.throughput(Throughput::Elements(queries.len() as u64));
    group.bench_function(BenchmarkId::new(name, rects.len()), |b| {
        b.iter(|| {
            let mut hits = 0_usize;
            for q in &queries {
                index.visit_rect(*q, |_| hits += 1);
            }
            black_box(hits)
        });
    });
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    for count in [1_000_usize, 10_000] {
        let rects = gen_random_rects(count, 5_000.0, 60.0);
        bench_visit_rect(c, "FlatVec", FlatVec::default, &rects);
        bench_visit_rect(c, "RTree", RTree::default, &rects);
    }
}

criterion_group!(benches, bench_bulk_load, bench_queries);
criterion_main!(benches);
