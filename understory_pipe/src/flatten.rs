// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content-addressed table of flattened resources.
//!
//! Entries live in handle order. A parallel list of entry positions, sorted by byte content
//! (length first, then bytes), gives logarithmic lookups. Two resources whose flattened bytes
//! match share one handle even if they were built separately.

use core::cmp::Ordering;

use crate::op::MAX_DATA;

/// Result of [`FlatTable::intern`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Interned {
    /// Handle of the entry.
    pub handle: u32,
    /// `true` if the entry was just added and its definition has not been sent yet.
    pub is_new: bool,
}

/// Deduplicating table mapping flattened bytes to handles.
#[derive(Clone, Debug)]
pub struct FlatTable {
    entries: Vec<Box<[u8]>>,
    sorted: Vec<u32>,
    first_handle: u32,
}

fn compare(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl FlatTable {
    /// Table whose handles count up from 1; 0 stays free to mean "none".
    pub fn one_based() -> Self {
        Self::starting_at(1)
    }

    /// Table whose handles count up from 0.
    pub fn zero_based() -> Self {
        Self::starting_at(0)
    }

    fn starting_at(first_handle: u32) -> Self {
        Self {
            entries: Vec::new(),
            sorted: Vec::new(),
            first_handle,
        }
    }

    /// Handle for `bytes`, adding an entry on a miss.
    ///
    /// Returns `None` if a new entry would need a handle beyond the inline data range.
    pub fn intern(&mut self, bytes: &[u8]) -> Option<Interned> {
        let search = self
            .sorted
            .binary_search_by(|&pos| compare(&self.entries[pos as usize], bytes));
        match search {
            Ok(at) => Some(Interned {
                handle: self.sorted[at] + self.first_handle,
                is_new: false,
            }),
            Err(at) => {
                let pos = u32::try_from(self.entries.len()).ok()?;
                let handle = pos + self.first_handle;
                if handle > MAX_DATA {
                    return None;
                }
                self.entries.push(bytes.into());
                self.sorted.insert(at, pos);
                Some(Interned {
                    handle,
                    is_new: true,
                })
            }
        }
    }

    /// Bytes stored under `handle`.
    pub fn get(&self, handle: u32) -> Option<&[u8]> {
        let pos = handle.checked_sub(self.first_handle)?;
        self.entries.get(pos as usize).map(|b| &**b)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
