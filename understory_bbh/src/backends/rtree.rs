// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bulk-loaded R-tree.
//!
//! Entries are packed with a sort-tile-recursive pass: sort by horizontal center, cut into
//! vertical strips, sort each strip by vertical center, then group runs of siblings into nodes.
//! Every level is built from the one below, so all leaves sit at the same depth. The first node
//! of a level gives up children so that the last node still reaches the minimum fan-out.
//!
//! Inserts after a build are buffered and scanned linearly by queries until the next
//! [`RTree::flush`], which rebuilds the tree from every entry.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::{Aabb2D, Scalar};

/// Fan-out limits for [`RTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RTreeConfig {
    min_children: usize,
    max_children: usize,
}

impl RTreeConfig {
    /// Create a config.
    ///
    /// `max_children` is raised to at least 2 and `min_children` is clamped to
    /// `1..=(max_children + 1) / 2`, which is the range the packing pass can always satisfy.
    pub fn new(min_children: usize, max_children: usize) -> Self {
        let max_children = max_children.max(2);
        let min_children = min_children.clamp(1, max_children.div_ceil(2));
        Self {
            min_children,
            max_children,
        }
    }

    /// Minimum number of children of every non-root node.
    pub fn min_children(&self) -> usize {
        self.min_children
    }

    /// Maximum number of children of every node.
    pub fn max_children(&self) -> usize {
        self.max_children
    }
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self::new(6, 11)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Child {
    Entry(usize),
    Node(usize),
}

#[derive(Clone, Copy, Debug)]
struct Branch<T> {
    bounds: Aabb2D<T>,
    child: Child,
}

#[derive(Clone, Debug)]
struct Node<T> {
    children: Vec<Branch<T>>,
}

/// Bulk-loaded R-tree backend.
#[derive(Clone)]
pub struct RTree<T> {
    config: RTreeConfig,
    nodes: Vec<Node<T>>,
    root: Option<usize>,
    height: usize,
    built: Vec<(usize, Aabb2D<T>)>,
    pending: Vec<(usize, Aabb2D<T>)>,
}

impl<T> Debug for RTree<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTree")
            .field("config", &self.config)
            .field("nodes", &self.nodes.len())
            .field("height", &self.height)
            .field("entries", &self.built.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<T> Default for RTree<T> {
    fn default() -> Self {
        Self::with_config(RTreeConfig::default())
    }
}

impl<T> RTree<T> {
    /// Create an empty tree.
    pub fn with_config(config: RTreeConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            root: None,
            height: 0,
            built: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Fan-out limits in use.
    pub fn config(&self) -> RTreeConfig {
        self.config
    }

    /// Number of levels, zero for an empty tree.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of entries inserted since the last build.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<T: Scalar> RTree<T> {
    /// Rebuild the tree so that it covers every inserted entry.
    pub fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.built.append(&mut self.pending);
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.height = 0;
        if self.built.is_empty() {
            return;
        }
        let mut level: Vec<Branch<T>> = self
            .built
            .iter()
            .map(|&(slot, bounds)| Branch {
                bounds,
                child: Child::Entry(slot),
            })
            .collect();
        loop {
            level = self.pack(level);
            self.height += 1;
            if level.len() == 1 {
                break;
            }
        }
        if let Some(Branch {
            child: Child::Node(root),
            ..
        }) = level.first()
        {
            self.root = Some(*root);
        }
    }

    /// Group one level of branches into parent nodes.
    fn pack(&mut self, mut branches: Vec<Branch<T>>) -> Vec<Branch<T>> {
        let max = self.config.max_children;
        let min = self.config.min_children;
        let count = branches.len();

        let mut node_count = count / max;
        let mut remainder = count % max;
        if remainder > 0 {
            node_count += 1;
            remainder = if remainder >= min { 0 } else { min - remainder };
        }
        let strips = ceil_sqrt(node_count);
        let strip_len = node_count.div_ceil(strips) * max;

        branches.sort_by(|a, b| a.bounds.center_x2().order(b.bounds.center_x2()));
        for strip in branches.chunks_mut(strip_len) {
            strip.sort_by(|a, b| a.bounds.center_y2().order(b.bounds.center_y2()));
        }

        let mut parents = Vec::with_capacity(node_count);
        let mut rest = branches.as_slice();
        while !rest.is_empty() {
            let mut take = max;
            if remainder != 0 {
                // The clamp in `RTreeConfig::new` keeps `remainder <= max - min`.
                take = max - remainder;
                remainder = 0;
            }
            let (group, tail) = rest.split_at(take.min(rest.len()));
            rest = tail;
            let mut bounds = group[0].bounds;
            for b in &group[1..] {
                bounds = bounds.union(&b.bounds);
            }
            let id = self.nodes.len();
            self.nodes.push(Node {
                children: group.to_vec(),
            });
            parents.push(Branch {
                bounds,
                child: Child::Node(id),
            });
        }
        parents
    }

    fn visit_tree<F, P, L>(&self, mut node_test: P, mut leaf_test: L, mut f: F)
    where
        F: FnMut(usize),
        P: FnMut(&Aabb2D<T>) -> bool,
        L: FnMut(&Aabb2D<T>) -> bool,
    {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = Vec::with_capacity(self.height * self.config.max_children);
        stack.push(root);
        while let Some(id) = stack.pop() {
            for branch in &self.nodes[id].children {
                match branch.child {
                    Child::Entry(slot) => {
                        if leaf_test(&branch.bounds) {
                            f(slot);
                        }
                    }
                    Child::Node(child) => {
                        if node_test(&branch.bounds) {
                            stack.push(child);
                        }
                    }
                }
            }
        }
    }

    /// Check the structural invariants, returning the number of entries reached.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> usize {
        fn walk<T: Scalar>(tree: &RTree<T>, id: usize, depth: usize, leaves: &mut usize) {
            let node = &tree.nodes[id];
            let is_root = Some(id) == tree.root;
            assert!(node.children.len() <= tree.config.max_children, "node too wide");
            if !is_root {
                assert!(node.children.len() >= tree.config.min_children, "node too narrow");
            }
            for branch in &node.children {
                match branch.child {
                    Child::Entry(_) => {
                        assert_eq!(depth, tree.height, "entries must sit on the last level");
                        *leaves += 1;
                    }
                    Child::Node(child) => {
                        let inner = &tree.nodes[child];
                        for c in &inner.children {
                            assert_eq!(
                                branch.bounds.union(&c.bounds),
                                branch.bounds,
                                "parent bounds cover children"
                            );
                        }
                        walk(tree, child, depth + 1, leaves);
                    }
                }
            }
        }
        let mut leaves = 0;
        if let Some(root) = self.root {
            walk(self, root, 1, &mut leaves);
        }
        leaves
    }
}

fn ceil_sqrt(n: usize) -> usize {
    let mut r = 0_usize;
    while r * r < n {
        r += 1;
    }
    r.max(1)
}

impl<T: Scalar> Backend<T> for RTree<T> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>) {
        self.pending.push((slot, aabb));
    }

    fn bulk_load(&mut self, entries: &[(usize, Aabb2D<T>)]) {
        self.built.extend_from_slice(&self.pending);
        self.pending.clear();
        self.built.extend_from_slice(entries);
        self.rebuild();
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.height = 0;
        self.built.clear();
        self.pending.clear();
    }

    fn len(&self) -> usize {
        self.built.len() + self.pending.len()
    }

    fn visit_point<F: FnMut(usize)>(&self, x: T, y: T, mut f: F) {
        let probe = Aabb2D::new(x, y, x, y);
        self.visit_tree(
            |b| b.overlaps(&probe),
            |b| b.contains_point(x, y),
            &mut f,
        );
        for (slot, b) in &self.pending {
            if b.contains_point(x, y) {
                f(*slot);
            }
        }
    }

    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb2D<T>, mut f: F) {
        self.visit_tree(|b| b.overlaps(&rect), |b| b.overlaps(&rect), &mut f);
        for (slot, b) in &self.pending {
            if b.overlaps(&rect) {
                f(*slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::backends::flatvec::FlatVec;
    use std::vec::Vec;

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

        fn next_f32(&mut self, max: f32) -> f32 {
            ((self.next_u64() >> 40) as f32 / (1_u64 << 24) as f32) * max
        }
    }

    fn random_boxes(n: usize, seed: u64) -> Vec<(usize, Aabb2D<f32>)> {
        let mut rng = Rng(seed);
        (0..n)
            .map(|i| {
                let x = rng.next_f32(1000.0);
                let y = rng.next_f32(1000.0);
                let w = rng.next_f32(60.0);
                let h = rng.next_f32(60.0);
                (i, Aabb2D::from_xywh(x, y, w, h))
            })
            .collect()
    }

    fn sorted(mut v: Vec<usize>) -> Vec<usize> {
        v.sort_unstable();
        v
    }

    #[test]
    fn matches_flat_scan() {
        let boxes = random_boxes(500, 0x9e37_79b9);
        let mut tree = RTree::<f32>::default();
        tree.bulk_load(&boxes);
        let mut flat = FlatVec::<f32>::default();
        flat.bulk_load(&boxes);

        let mut rng = Rng(7);
        for _ in 0..64 {
            let q = Aabb2D::from_xywh(
                rng.next_f32(1000.0),
                rng.next_f32(1000.0),
                rng.next_f32(200.0),
                rng.next_f32(200.0),
            );
            assert_eq!(
                sorted(tree.query_rect(q)),
                sorted(flat.query_rect(q)),
                "tree and flat scan disagree for {q:?}"
            );
        }
    }

    #[test]
    fn fan_out_and_balance_hold_for_many_sizes() {
        for n in [1_usize, 5, 6, 11, 12, 13, 17, 66, 121, 122, 400, 1331] {
            let mut tree = RTree::<f32>::default();
            tree.bulk_load(&random_boxes(n, n as u64 + 1));
            assert_eq!(tree.check_invariants(), n, "every entry reachable for n={n}");
        }
    }

    #[test]
    fn custom_fan_out() {
        let config = RTreeConfig::new(2, 4);
        let mut tree = RTree::<f32>::with_config(config);
        tree.bulk_load(&random_boxes(37, 3));
        assert_eq!(tree.check_invariants(), 37);
        assert!(tree.height() >= 3, "37 entries at fan-out 4 need three levels");
    }

    #[test]
    fn config_clamps_min() {
        let c = RTreeConfig::new(10, 11);
        assert_eq!(c.min_children(), 6);
        assert_eq!(c.max_children(), 11);
    }

    #[test]
    fn pending_inserts_are_visible_before_flush() {
        let mut tree = RTree::<f32>::default();
        tree.bulk_load(&random_boxes(30, 11));
        tree.insert(1000, Aabb2D::from_xywh(2000.0, 2000.0, 5.0, 5.0));
        assert_eq!(tree.pending(), 1);
        let q = Aabb2D::from_xywh(1990.0, 1990.0, 20.0, 20.0);
        assert_eq!(tree.query_rect(q), std::vec![1000]);
        tree.flush();
        assert_eq!(tree.pending(), 0);
        assert_eq!(tree.query_rect(q), std::vec![1000]);
        assert_eq!(tree.check_invariants(), 31);
    }

    #[test]
    fn point_queries() {
        let mut tree = RTree::<i64>::default();
        let boxes: Vec<_> = (0..50)
            .map(|i| (i as usize, Aabb2D::from_xywh(i * 10, 0, 10, 10)))
            .collect();
        tree.bulk_load(&boxes);
        let mut hits = Vec::new();
        tree.visit_point(125, 5, |s| hits.push(s));
        assert_eq!(hits, std::vec![12]);
    }

    #[test]
    fn empty_tree_queries_nothing() {
        let tree = RTree::<f64>::default();
        assert!(tree.query_rect(Aabb2D::from_xywh(0.0, 0.0, 1e9, 1e9)).is_empty());
        assert_eq!(tree.height(), 0);
    }
}
