// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backends must report the same slots for the same queries.

use understory_bbh::{Aabb2D, Backend, FlatVec, RTree, RTreeConfig};

fn grid(n: i64, cell: i64) -> Vec<(usize, Aabb2D<i64>)> {
    let mut out = Vec::new();
    for y in 0..n {
        for x in 0..n {
            let slot = usize::try_from(y * n + x).unwrap();
            out.push((slot, Aabb2D::from_xywh(x * cell, y * cell, cell, cell)));
        }
    }
    out
}

fn collect<B: Backend<i64>>(b: &B, q: Aabb2D<i64>) -> Vec<usize> {
    let mut v = b.query_rect(q);
    v.sort_unstable();
    v
}

#[test]
fn grid_queries_agree_across_fan_outs() {
    let cells = grid(30, 8);
    let mut flat = FlatVec::default();
    flat.bulk_load(&cells);
    for (min, max) in [(2, 4), (3, 8), (6, 11), (8, 16)] {
        let mut tree = RTree::with_config(RTreeConfig::new(min, max));
        tree.bulk_load(&cells);
        for q in [
            Aabb2D::from_xywh(0, 0, 1, 1),
            Aabb2D::from_xywh(17, 33, 40, 9),
            Aabb2D::from_xywh(-50, -50, 10, 10),
            Aabb2D::from_xywh(100, 100, 1000, 1000),
        ] {
            assert_eq!(collect(&tree, q), collect(&flat, q), "fan-out {min}..={max}, {q:?}");
        }
    }
}

#[test]
fn clear_empties_everything() {
    let mut tree = RTree::default();
    tree.bulk_load(&grid(4, 10));
    assert_eq!(tree.len(), 16);
    tree.clear();
    assert!(tree.is_empty());
    assert!(tree.query_rect(Aabb2D::from_xywh(0, 0, 100, 100)).is_empty());
}
