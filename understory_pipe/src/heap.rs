// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared bitmap heap for pipes whose consumer can read producer memory.
//!
//! Instead of serializing pixels, the producer stores a copy of each bitmap in the heap and
//! sends the heap handle. The consumer resolves the handle through its own [`SharedHeap`]
//! clone.

use std::sync::{Arc, PoisonError, RwLock};

use crate::bitmap::{Bitmap, PixelStorage};
use crate::op::MAX_DATA;

/// Handle to a bitmap stored in a heap.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u32);

impl HeapId {
    /// Raw handle value as carried in an instruction.
    pub const fn get(self) -> u32 {
        self.0
    }

    pub(crate) const fn from_raw(v: u32) -> Self {
        Self(v)
    }
}

#[derive(Clone, Debug)]
struct HeapEntry {
    bitmap: Arc<Bitmap>,
    /// Generation id of the bitmap that was added, not of the stored copy.
    source_generation: u32,
}

/// Bitmap store with deduplication by content version.
#[derive(Clone, Debug)]
pub struct BitmapHeap {
    entries: Vec<HeapEntry>,
    shallow_copies: bool,
}

impl BitmapHeap {
    /// Create an empty heap.
    ///
    /// With `shallow_copies`, immutable bitmaps are stored by sharing their pixel storage.
    /// Otherwise every new bitmap is deep-copied.
    pub fn new(shallow_copies: bool) -> Self {
        Self {
            entries: Vec::new(),
            shallow_copies,
        }
    }

    /// Store `bitmap`, returning its handle.
    ///
    /// Entries are scanned newest first. An entry with the same generation id and the same view
    /// (offset, size, row stride and format) is returned as is. If the generation is only
    /// stored under other views, its pixels are already copied, so the new entry reuses the
    /// newest such copy's storage. Returns `None` if the bitmap needs a copy that cannot be
    /// made.
    pub fn add_bitmap(&mut self, bitmap: &Bitmap) -> Option<HeapId> {
        let generation = bitmap.generation_id();
        let mut shared: Option<Arc<PixelStorage>> = None;
        for (i, entry) in self.entries.iter().enumerate().rev() {
            if entry.source_generation != generation {
                continue;
            }
            if same_view(&entry.bitmap, bitmap) {
                return Some(HeapId(u32::try_from(i).ok()?));
            }
            if shared.is_none() {
                shared = Some(Arc::clone(entry.bitmap.storage()));
            }
        }

        let id = u32::try_from(self.entries.len()).ok().filter(|id| *id <= MAX_DATA);
        let Some(id) = id else {
            tracing::warn!(entries = self.entries.len(), "bitmap heap is full");
            return None;
        };

        let copy = if self.shallow_copies && bitmap.is_immutable() {
            Ok(bitmap.clone())
        } else if let Some(storage) = shared {
            bitmap.with_storage(storage)
        } else {
            bitmap.deep_copy()
        };
        let copy = match copy {
            Ok(copy) => copy,
            Err(err) => {
                tracing::warn!(%err, generation, "cannot copy bitmap into heap");
                return None;
            }
        };
        self.entries.push(HeapEntry {
            bitmap: Arc::new(copy),
            source_generation: generation,
        });
        Some(HeapId(id))
    }

    /// Stored bitmap for a handle.
    pub fn get(&self, id: HeapId) -> Option<&Arc<Bitmap>> {
        self.entries.get(id.0 as usize).map(|e| &e.bitmap)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct pixel storages referenced by the entries.
    pub fn storage_count(&self) -> usize {
        let mut seen: Vec<*const PixelStorage> = self
            .entries
            .iter()
            .map(|e| Arc::as_ptr(e.bitmap.storage()))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }
}

fn same_view(a: &Bitmap, b: &Bitmap) -> bool {
    a.offset() == b.offset()
        && a.width() == b.width()
        && a.height() == b.height()
        && a.row_bytes() == b.row_bytes()
        && a.format() == b.format()
}

/// A [`BitmapHeap`] shared between a producer and its consumers.
#[derive(Clone, Debug)]
pub struct SharedHeap(Arc<RwLock<BitmapHeap>>);

impl SharedHeap {
    /// Wrap a new empty heap.
    pub fn new(shallow_copies: bool) -> Self {
        Self(Arc::new(RwLock::new(BitmapHeap::new(shallow_copies))))
    }

    /// See [`BitmapHeap::add_bitmap`].
    pub fn add_bitmap(&self, bitmap: &Bitmap) -> Option<HeapId> {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_bitmap(bitmap)
    }

    /// Stored bitmap for a handle.
    pub fn get(&self, id: HeapId) -> Option<Arc<Bitmap>> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// See [`BitmapHeap::storage_count`].
    pub fn storage_count(&self) -> usize {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .storage_count()
    }

    /// Independent heap with the same entries.
    ///
    /// The entry table is copied; stored bitmaps are immutable and stay shared.
    pub fn deep_clone(&self) -> Self {
        let heap = self.0.read().unwrap_or_else(PoisonError::into_inner).clone();
        Self(Arc::new(RwLock::new(heap)))
    }

    /// Returns `true` if both handles refer to the same heap.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::PixelFormat;
    use crate::geometry::IRect;

    fn bitmap() -> Bitmap {
        Bitmap::new(4, 4, PixelFormat::Rgba8888, vec![7; 64]).unwrap()
    }

    #[test]
    fn same_generation_and_offset_dedupes() {
        let mut heap = BitmapHeap::new(false);
        let bm = bitmap();
        let a = heap.add_bitmap(&bm).unwrap();
        let b = heap.add_bitmap(&bm.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn different_offsets_share_one_copy() {
        let mut heap = BitmapHeap::new(false);
        let bm = bitmap();
        let left = bm.extract_subset(IRect::new(0, 0, 2, 4)).unwrap();
        let right = bm.extract_subset(IRect::new(2, 0, 4, 4)).unwrap();
        let a = heap.add_bitmap(&left).unwrap();
        let b = heap.add_bitmap(&right).unwrap();
        assert_ne!(a, b);
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.storage_count(), 1, "one physical copy");
        assert!(!heap.get(a).unwrap().shares_storage_with(&bm), "deep copy");
        assert_eq!(heap.get(b).unwrap().read_pixels(), right.read_pixels());
    }

    #[test]
    fn subsets_at_the_parent_offset_get_their_own_entry() {
        let mut heap = BitmapHeap::new(false);
        let bm = bitmap();
        let corner = bm.extract_subset(IRect::new(0, 0, 2, 2)).unwrap();
        assert_eq!(corner.offset(), bm.offset());
        let a = heap.add_bitmap(&bm).unwrap();
        let b = heap.add_bitmap(&corner).unwrap();
        assert_ne!(a, b);
        assert_eq!(heap.storage_count(), 1);
        let stored = heap.get(b).unwrap();
        assert_eq!((stored.width(), stored.height()), (2, 2));
        assert_eq!(stored.read_pixels(), corner.read_pixels());
        assert_eq!(heap.add_bitmap(&corner), Some(b));
        assert_eq!(heap.add_bitmap(&bm), Some(a));
    }

    #[test]
    fn shallow_mode_shares_immutable_storage() {
        let mut heap = BitmapHeap::new(true);
        let frozen = bitmap().into_immutable();
        let id = heap.add_bitmap(&frozen).unwrap();
        assert!(heap.get(id).unwrap().shares_storage_with(&frozen));

        let mutable = bitmap();
        let id = heap.add_bitmap(&mutable).unwrap();
        assert!(
            !heap.get(id).unwrap().shares_storage_with(&mutable),
            "mutable sources are copied even in shallow mode"
        );
    }

    #[test]
    fn uncopyable_bitmaps_yield_none() {
        let mut heap = BitmapHeap::new(false);
        let bm = Bitmap::new(2, 2, PixelFormat::Index8, vec![1; 4]).unwrap();
        assert_eq!(heap.add_bitmap(&bm), None);
        assert!(heap.is_empty());
    }

    #[test]
    fn newer_generation_gets_a_new_entry() {
        let mut heap = BitmapHeap::new(false);
        let mut bm = bitmap();
        let a = heap.add_bitmap(&bm).unwrap();
        bm.storage_mut().unwrap()[0] = 1;
        let b = heap.add_bitmap(&bm).unwrap();
        assert_ne!(a, b);
        assert_eq!(heap.get(b).unwrap().read_pixels()[0], 1);
        assert_eq!(heap.get(a).unwrap().read_pixels()[0], 7);
    }

    #[test]
    fn deep_clone_is_independent() {
        let heap = SharedHeap::new(false);
        heap.add_bitmap(&bitmap()).unwrap();
        let copy = heap.deep_clone();
        heap.add_bitmap(&bitmap()).unwrap();
        assert_eq!(heap.len(), 2);
        assert_eq!(copy.len(), 1);
        assert!(!copy.ptr_eq(&heap));
    }
}
