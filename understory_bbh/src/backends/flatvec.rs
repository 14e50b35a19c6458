// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat vector backend with linear scans. Small and simple; good for tiny sets and as an oracle.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::{Aabb2D, Scalar};

/// Flat vector backend with linear scans.
pub struct FlatVec<T> {
    entries: Vec<Option<Aabb2D<T>>>,
    live: usize,
}

impl<T> Default for FlatVec<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            live: 0,
        }
    }
}

impl<T> Debug for FlatVec<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlatVec")
            .field("total_slots", &self.entries.len())
            .field("alive", &self.live)
            .finish_non_exhaustive()
    }
}

impl<T: Scalar> Backend<T> for FlatVec<T> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>) {
        if self.entries.len() <= slot {
            self.entries.resize_with(slot + 1, || None);
        }
        if self.entries[slot].replace(aabb).is_none() {
            self.live += 1;
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.live = 0;
    }

    fn len(&self) -> usize {
        self.live
    }

    fn visit_point<F: FnMut(usize)>(&self, x: T, y: T, mut f: F) {
        for (i, slot) in self.entries.iter().enumerate() {
            if let Some(a) = slot.as_ref()
                && a.contains_point(x, y)
            {
                f(i);
            }
        }
    }

    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb2D<T>, mut f: F) {
        for (i, slot) in self.entries.iter().enumerate() {
            if let Some(a) = slot.as_ref()
                && a.overlaps(&rect)
            {
                f(i);
            }
        }
    }
}
