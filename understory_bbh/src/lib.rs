// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory BBH: bounding-box hierarchies for culling recorded drawing commands.
//!
//! A recorded picture stores the device-space bounds of each draw instruction under a slot
//! number. At playback time the picture asks the hierarchy which slots overlap the visible
//! viewport and skips the rest.
//!
//! - [`Aabb2D`]: axis-aligned box over a [`Scalar`] (`f32`, `f64`, `i64`).
//! - [`Backend`]: the insert/bulk-load/query surface shared by all implementations.
//! - [`FlatVec`]: linear scan. Useful for tiny sets and as a test oracle.
//! - [`RTree`]: sort-tile-recursive bulk-loaded R-tree with configurable fan-out
//!   ([`RTreeConfig`], default 6..=11 children per node).
//!
//! ```rust
//! use understory_bbh::{Aabb2D, Backend, RTree};
//!
//! let mut tree = RTree::<f32>::default();
//! tree.bulk_load(&[
//!     (0, Aabb2D::from_xywh(0.0, 0.0, 10.0, 10.0)),
//!     (1, Aabb2D::from_xywh(100.0, 100.0, 10.0, 10.0)),
//! ]);
//! assert_eq!(tree.query_rect(Aabb2D::from_xywh(95.0, 95.0, 10.0, 10.0)), vec![1]);
//! ```
//!
//! The hierarchy lives only in memory; it has no serialized form.

#![no_std]

extern crate alloc;

mod backend;
pub mod backends;
mod types;

pub use backend::Backend;
pub use backends::flatvec::FlatVec;
pub use backends::rtree::{RTree, RTreeConfig};
pub use types::{Aabb2D, Scalar};
