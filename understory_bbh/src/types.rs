// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scalar abstraction and axis-aligned bounding boxes.

use core::cmp::Ordering;
use core::fmt::Debug;
use core::ops::Add;

/// Coordinate type usable in a bounding-box hierarchy.
///
/// Float inputs are assumed to be finite. NaN coordinates do not panic but produce boxes that
/// never match a query.
pub trait Scalar: Copy + PartialOrd + Debug + Add<Output = Self> {
    /// Total-ish ordering used for sorting during bulk loads.
    fn order(self, other: Self) -> Ordering {
        self.partial_cmp(&other).unwrap_or(Ordering::Equal)
    }
}

impl Scalar for f32 {}
impl Scalar for f64 {}
impl Scalar for i64 {}

#[inline]
fn min_of<T: PartialOrd>(a: T, b: T) -> T {
    if b < a { b } else { a }
}

#[inline]
fn max_of<T: PartialOrd>(a: T, b: T) -> T {
    if b > a { b } else { a }
}

/// Axis-aligned bounding box with inclusive minimum and exclusive maximum edges.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb2D<T> {
    /// Left edge.
    pub min_x: T,
    /// Top edge.
    pub min_y: T,
    /// Right edge.
    pub max_x: T,
    /// Bottom edge.
    pub max_y: T,
}

impl<T: Scalar> Aabb2D<T> {
    /// Create a box from its edges.
    pub const fn new(min_x: T, min_y: T, max_x: T, max_y: T) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create a box from an origin and a size.
    pub fn from_xywh(x: T, y: T, w: T, h: T) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// Returns `true` if the box has no area.
    pub fn is_empty(&self) -> bool {
        !(self.min_x < self.max_x && self.min_y < self.max_y)
    }

    /// Returns `true` if `(x, y)` lies inside the half-open box.
    pub fn contains_point(&self, x: T, y: T) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Intersection of two boxes. The result may be empty.
    pub fn intersect(&self, other: &Self) -> Self {
        Self::new(
            max_of(self.min_x, other.min_x),
            max_of(self.min_y, other.min_y),
            min_of(self.max_x, other.max_x),
            min_of(self.max_y, other.max_y),
        )
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            min_of(self.min_x, other.min_x),
            min_of(self.min_y, other.min_y),
            max_of(self.max_x, other.max_x),
            max_of(self.max_y, other.max_y),
        )
    }

    /// Closed overlap test: boxes that only touch along an edge count as overlapping.
    ///
    /// Queries use this conservative form so that a culling pass never drops a candidate that a
    /// renderer with slightly different edge rules would still touch.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Twice the horizontal center. Only used for ordering.
    pub(crate) fn center_x2(&self) -> T {
        self.min_x + self.max_x
    }

    /// Twice the vertical center. Only used for ordering.
    pub(crate) fn center_y2(&self) -> T {
        self.min_y + self.max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_and_union() {
        let a = Aabb2D::<f32>::from_xywh(0.0, 0.0, 10.0, 10.0);
        let b = Aabb2D::<f32>::from_xywh(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersect(&b), Aabb2D::new(5.0, 5.0, 10.0, 10.0));
        assert_eq!(a.union(&b), Aabb2D::new(0.0, 0.0, 15.0, 15.0));
        let c = Aabb2D::<f32>::from_xywh(20.0, 0.0, 1.0, 1.0);
        assert!(a.intersect(&c).is_empty(), "disjoint boxes have empty intersection");
        assert!(!a.overlaps(&c), "disjoint boxes do not overlap");
    }

    #[test]
    fn touching_edges_overlap_but_do_not_intersect() {
        let a = Aabb2D::<i64>::from_xywh(0, 0, 10, 10);
        let b = Aabb2D::<i64>::from_xywh(10, 0, 10, 10);
        assert!(a.overlaps(&b), "shared edge is a conservative hit");
        assert!(a.intersect(&b).is_empty(), "shared edge has no area");
    }

    #[test]
    fn half_open_point_containment() {
        let a = Aabb2D::<f64>::from_xywh(0.0, 0.0, 2.0, 2.0);
        assert!(a.contains_point(0.0, 0.0), "min edge is inside");
        assert!(!a.contains_point(2.0, 1.0), "max edge is outside");
    }

    #[test]
    fn nan_box_is_empty() {
        let a = Aabb2D::<f32>::new(f32::NAN, 0.0, 1.0, 1.0);
        assert!(a.is_empty(), "NaN edges never form a box with area");
    }
}
