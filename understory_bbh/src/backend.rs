// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait shared by the bounding-box hierarchy implementations.

use alloc::vec::Vec;

use crate::types::{Aabb2D, Scalar};

/// Spatial backend abstraction.
///
/// Slots are caller-chosen `usize` keys; a recorded picture uses the ordinal of each draw
/// instruction. Rectangle queries are conservative: they report every slot whose box
/// [overlaps](Aabb2D::overlaps) the query, touching edges included.
pub trait Backend<T: Scalar> {
    /// Insert a slot with its bounds.
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>);

    /// Insert many slots at once.
    ///
    /// The default implementation inserts one by one. Backends that can build a better structure
    /// from the whole set override this.
    fn bulk_load(&mut self, entries: &[(usize, Aabb2D<T>)]) {
        for &(slot, aabb) in entries {
            self.insert(slot, aabb);
        }
    }

    /// Remove every slot.
    fn clear(&mut self);

    /// Number of live slots.
    fn len(&self) -> usize;

    /// Returns `true` if there are no live slots.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit slots whose box contains the point.
    fn visit_point<F: FnMut(usize)>(&self, x: T, y: T, f: F);

    /// Visit slots whose box overlaps the rectangle.
    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb2D<T>, f: F);

    /// Collect slots overlapping the rectangle. Order is backend-specific.
    fn query_rect(&self, rect: Aabb2D<T>) -> Vec<usize> {
        let mut out = Vec::new();
        self.visit_rect(rect, |i| out.push(i));
        out
    }
}
