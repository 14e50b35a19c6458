// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typefaces, the injected font registry and the per-stream typeface table.
//!
//! A stream never carries a pointer to a typeface. The producer assigns each typeface a small
//! stream id on first use and emits a definition with the typeface's serialized descriptor;
//! the consumer rebuilds a typeface from that descriptor through its [`FontRegistry`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use hashbrown::HashMap;

use crate::error::DecodeError;
use crate::words::{WordReader, WordWriter};

/// Largest embedded font accepted when rebuilding a typeface.
pub const MAX_FONT_DATA: usize = 1 << 30;

bitflags::bitflags! {
    /// Coarse font style.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FontStyle: u32 {
        /// Bold weight.
        const BOLD = 1 << 0;
        /// Italic slant.
        const ITALIC = 1 << 1;
    }
}

static NEXT_TYPEFACE_ID: AtomicU32 = AtomicU32::new(1);

/// A typeface: a family name, a style, and optionally the font file bytes.
///
/// Equality compares the descriptor and data, not the process-local [`unique_id`](Self::unique_id).
#[derive(Clone, Debug)]
pub struct Typeface {
    unique_id: u32,
    family: String,
    style: FontStyle,
    data: Option<Arc<[u8]>>,
}

impl PartialEq for Typeface {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family && self.style == other.style && self.data == other.data
    }
}

impl Typeface {
    /// Typeface known only by name.
    pub fn new(family: impl Into<String>, style: FontStyle) -> Self {
        Self {
            unique_id: NEXT_TYPEFACE_ID.fetch_add(1, Ordering::Relaxed),
            family: family.into(),
            style,
            data: None,
        }
    }

    /// Typeface backed by font file bytes.
    ///
    /// Returns `None` for empty data or data of [`MAX_FONT_DATA`] bytes or more.
    pub fn from_data(family: impl Into<String>, style: FontStyle, data: Vec<u8>) -> Option<Self> {
        if data.is_empty() || data.len() >= MAX_FONT_DATA {
            return None;
        }
        let mut face = Self::new(family, style);
        face.data = Some(data.into());
        Some(face)
    }

    /// Process-local identity, stable for the lifetime of this value.
    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }

    /// Family name.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Style.
    pub fn style(&self) -> FontStyle {
        self.style
    }

    /// Font file bytes, if any.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Serialize the descriptor, embedding the font bytes when asked and available.
    ///
    /// The result names no particular instance, so it can cross a process boundary.
    pub fn serialize(&self, embed_data: bool) -> Vec<u8> {
        self.write_descriptor(embed_data, 0)
    }

    /// Serialize the descriptor together with this instance's [`unique_id`](Self::unique_id).
    ///
    /// Only meaningful to a consumer sharing the producer's [`FontRegistry`]: the id picks the
    /// registered instance even when other faces have the same family and style.
    pub fn serialize_local(&self) -> Vec<u8> {
        self.write_descriptor(false, self.unique_id)
    }

    fn write_descriptor(&self, embed_data: bool, identity: u32) -> Vec<u8> {
        let mut w = WordWriter::default();
        w.blob(self.family.as_bytes());
        w.u32(self.style.bits());
        match self.data.as_deref() {
            Some(data) if embed_data => w.blob(data),
            _ => w.u32(0),
        }
        w.u32(identity);
        w.into_bytes()
    }
}

/// Parsed typeface descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Descriptor<'a> {
    family: &'a str,
    style: FontStyle,
    data: Option<&'a [u8]>,
    /// Producer-side unique id, 0 when absent.
    identity: u32,
}

impl<'a> Descriptor<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let mut r = WordReader::new(bytes);
        let name = r.blob()?;
        let family = core::str::from_utf8(name)
            .map_err(|_| DecodeError::invalid("typeface family", 0))?;
        let style_bits = r.u32()?;
        let style = FontStyle::from_bits(style_bits)
            .ok_or(DecodeError::invalid("font style", style_bits))?;
        let data = r.blob()?;
        let identity = r.u32()?;
        Ok(Self {
            family,
            style,
            data: (!data.is_empty()).then_some(data),
            identity,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct FaceKey {
    family: String,
    style: FontStyle,
}

/// Thread-safe typeface cache shared by producers and consumers.
///
/// Pass one registry to both sides of a same-process pipe so that typefaces sent by name resolve
/// to the very same instance. A consumer in another process gets its own registry and rebuilds
/// typefaces from embedded data or by name.
#[derive(Debug, Default)]
pub struct FontRegistry {
    faces: RwLock<HashMap<FaceKey, Vec<Arc<Typeface>>>>,
}

impl FontRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typeface unless the same instance is already present.
    pub fn register(&self, face: &Arc<Typeface>) {
        let key = FaceKey {
            family: face.family.clone(),
            style: face.style,
        };
        let mut faces = self.faces.write().unwrap_or_else(PoisonError::into_inner);
        let bucket = faces.entry(key).or_default();
        if !bucket.iter().any(|f| f.unique_id == face.unique_id) {
            bucket.push(Arc::clone(face));
        }
    }

    /// Most recently registered typeface with this family and style.
    pub fn find(&self, family: &str, style: FontStyle) -> Option<Arc<Typeface>> {
        let faces = self.faces.read().unwrap_or_else(PoisonError::into_inner);
        let key = FaceKey {
            family: family.to_owned(),
            style,
        };
        faces.get(&key).and_then(|bucket| bucket.last().cloned())
    }

    /// Number of registered typefaces.
    pub fn len(&self) -> usize {
        let faces = self.faces.read().unwrap_or_else(PoisonError::into_inner);
        faces.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild a typeface from [`Typeface::serialize`] output.
    ///
    /// A descriptor from [`Typeface::serialize_local`] resolves to the registered instance with
    /// that unique id. Otherwise embedded data wins: a registered typeface with equal descriptor
    /// and bytes is reused, or a new one is created from the bytes. Without data the lookup goes
    /// by family and style, creating (and caching) a name-only typeface on a miss.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Arc<Typeface>, DecodeError> {
        let desc = Descriptor::parse(bytes)?;
        let key = FaceKey {
            family: desc.family.to_owned(),
            style: desc.style,
        };
        let mut faces = self.faces.write().unwrap_or_else(PoisonError::into_inner);
        let bucket = faces.entry(key).or_default();
        let by_identity = (desc.identity != 0)
            .then(|| bucket.iter().find(|f| f.unique_id == desc.identity))
            .flatten();
        let found = by_identity.or_else(|| match desc.data {
            Some(data) => bucket.iter().rev().find(|f| f.data() == Some(data)),
            None => bucket.last(),
        });
        if let Some(face) = found {
            return Ok(Arc::clone(face));
        }
        let face = match desc.data {
            Some(data) => Typeface::from_data(desc.family, desc.style, data.to_vec())
                .ok_or(DecodeError::BlobTooLarge(data.len()))?,
            None => Typeface::new(desc.family, desc.style),
        };
        let face = Arc::new(face);
        tracing::debug!(family = desc.family, id = face.unique_id, "created typeface");
        bucket.push(Arc::clone(&face));
        Ok(face)
    }
}

/// Producer-side map from typeface identity to stream id.
///
/// Ids start at 1 and are never reused within a stream; 0 means "no typeface".
#[derive(Debug, Default)]
pub(crate) struct TypefaceTable {
    ids: HashMap<u32, u32>,
}

impl TypefaceTable {
    /// Stream id for `face`, and whether it was just assigned.
    pub(crate) fn id_for(&mut self, face: &Typeface) -> (u32, bool) {
        let next = u32::try_from(self.ids.len() + 1).unwrap_or(u32::MAX);
        let mut is_new = false;
        let id = *self.ids.entry(face.unique_id).or_insert_with(|| {
            is_new = true;
            next
        });
        (id, is_new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_ids_are_stable_and_one_based() {
        let a = Typeface::new("Sans", FontStyle::empty());
        let b = Typeface::new("Sans", FontStyle::BOLD);
        let mut table = TypefaceTable::default();
        assert_eq!(table.id_for(&a), (1, true));
        assert_eq!(table.id_for(&b), (2, true));
        assert_eq!(table.id_for(&a), (1, false));
    }

    #[test]
    fn name_only_faces_resolve_through_the_registry() {
        let registry = FontRegistry::new();
        let face = Arc::new(Typeface::new("Serif", FontStyle::ITALIC));
        registry.register(&face);
        let back = registry.deserialize(&face.serialize(false)).unwrap();
        assert!(Arc::ptr_eq(&face, &back), "same-process lookup returns the instance");
    }

    #[test]
    fn local_descriptors_pick_the_exact_instance() {
        let registry = FontRegistry::new();
        let face = |data| Arc::new(Typeface::from_data("Font", FontStyle::empty(), data).unwrap());
        let first = face(vec![1, 2, 3, 4]);
        let second = face(vec![9, 9, 9, 9]);
        registry.register(&first);
        registry.register(&second);
        let back = registry.deserialize(&first.serialize_local()).unwrap();
        assert!(Arc::ptr_eq(&first, &back));
        let back = registry.deserialize(&second.serialize_local()).unwrap();
        assert!(Arc::ptr_eq(&second, &back));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn embedded_data_rebuilds_an_equal_face() {
        let face = Typeface::from_data("Mono", FontStyle::empty(), vec![1, 2, 3, 4, 5]).unwrap();
        let registry = FontRegistry::new();
        let back = registry.deserialize(&face.serialize(true)).unwrap();
        assert_eq!(*back, face);
        assert_ne!(back.unique_id(), face.unique_id());
        let again = registry.deserialize(&face.serialize(true)).unwrap();
        assert!(Arc::ptr_eq(&back, &again), "second lookup hits the cache");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_names_create_and_cache_a_face() {
        let registry = FontRegistry::new();
        let bytes = Typeface::new("Nowhere", FontStyle::BOLD).serialize(true);
        let a = registry.deserialize(&bytes).unwrap();
        let b = registry.deserialize(&bytes).unwrap();
        assert!(Arc::ptr_eq(&a, &b), "cache hit on the second request");
        assert_eq!(a.family(), "Nowhere");
        assert_eq!(a.data(), None);
    }

    #[test]
    fn empty_font_data_is_rejected() {
        assert!(Typeface::from_data("X", FontStyle::empty(), Vec::new()).is_none());
    }
}
