// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recorded pictures and clipped playback.
//!
//! A [`Picture`] is a finished in-memory stream together with the heap its bitmap handles
//! point into. When recorded with [`RecordFlags::OPTIMIZE_FOR_CLIPPED_PLAYBACK`] it also
//! carries a [`PictureIndex`]: an R-tree over the device bounds of every draw and a tree of
//! save scopes. Playback into a viewport then skips draws that cannot touch the viewport
//! and whole save scopes that contain no visible draw. Paint and definition instructions are
//! never skipped, so the reader's paint stays in step with the producer's.

use std::ops::Range;
use std::sync::Arc;

use kurbo::Rect;
use understory_bbh::{Aabb2D, Backend, RTree, RTreeConfig};

use crate::canvas::Canvas;
use crate::config::{PlaybackConfig, RecordConfig, RecordFlags};
use crate::error::{ConfigError, PlaybackError};
use crate::geometry::RectF;
use crate::heap::SharedHeap;
use crate::playback::{PipeReader, PlaybackStatus, SkipRange};
use crate::record::PipeCanvas;
use crate::typeface::FontRegistry;
use crate::writer::MemoryController;

fn aabb(r: Rect) -> Aabb2D<f64> {
    Aabb2D::new(r.x0, r.y0, r.x1, r.y1)
}

#[derive(Clone, Debug)]
struct Scope {
    parent: Option<usize>,
    save: Option<Range<usize>>,
    restore: Option<Range<usize>>,
    states: Vec<Range<usize>>,
    layer: bool,
}

impl Scope {
    fn root() -> Self {
        Self {
            parent: None,
            save: None,
            restore: None,
            states: Vec::new(),
            layer: false,
        }
    }
}

#[derive(Clone, Debug)]
struct DrawEntry {
    range: Range<usize>,
    scope: usize,
}

/// Collects instruction ranges while a picture is recorded.
#[derive(Clone, Debug)]
pub(crate) struct IndexBuilder {
    rtree: RTreeConfig,
    scopes: Vec<Scope>,
    open: Vec<usize>,
    draws: Vec<DrawEntry>,
    bounds: Vec<(usize, Aabb2D<f64>)>,
}

impl IndexBuilder {
    pub(crate) fn new(rtree: RTreeConfig) -> Self {
        Self {
            rtree,
            scopes: vec![Scope::root()],
            open: vec![0],
            draws: Vec::new(),
            bounds: Vec::new(),
        }
    }

    fn current(&self) -> usize {
        self.open.last().copied().unwrap_or(0)
    }

    pub(crate) fn save(&mut self, range: Range<usize>, layer: bool) {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            parent: Some(self.current()),
            save: Some(range),
            restore: None,
            states: Vec::new(),
            layer,
        });
        self.open.push(id);
    }

    pub(crate) fn restore(&mut self, range: Range<usize>) {
        if self.open.len() > 1
            && let Some(id) = self.open.pop()
        {
            self.scopes[id].restore = Some(range);
        }
    }

    pub(crate) fn state(&mut self, range: Range<usize>) {
        let id = self.current();
        self.scopes[id].states.push(range);
    }

    pub(crate) fn draw(&mut self, range: Range<usize>, device_bounds: Rect) {
        self.bounds.push((self.draws.len(), aabb(device_bounds)));
        self.draws.push(DrawEntry {
            range,
            scope: self.current(),
        });
    }

    pub(crate) fn finish(self) -> PictureIndex {
        let mut tree = RTree::with_config(self.rtree);
        tree.bulk_load(&self.bounds);
        PictureIndex {
            tree,
            scopes: self.scopes,
            draws: self.draws,
        }
    }
}

/// Spatial index of a recorded picture.
#[derive(Clone, Debug)]
pub struct PictureIndex {
    tree: RTree<f64>,
    scopes: Vec<Scope>,
    draws: Vec<DrawEntry>,
}

impl PictureIndex {
    /// Number of indexed draws.
    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    /// Number of save scopes, not counting the top level.
    pub fn scope_count(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Byte ranges playback may skip when only `viewport` matters.
    ///
    /// The result is sorted and adjacent ranges are merged.
    pub fn cull(&self, viewport: Rect) -> Vec<SkipRange> {
        let mut visible = vec![false; self.draws.len()];
        self.tree.visit_rect(aabb(viewport), |i| visible[i] = true);

        let mut live = vec![false; self.scopes.len()];
        let mark = |mut id: usize, live: &mut Vec<bool>| {
            while !live[id] {
                live[id] = true;
                match self.scopes[id].parent {
                    Some(parent) => id = parent,
                    None => break,
                }
            }
        };
        mark(0, &mut live);
        for (id, scope) in self.scopes.iter().enumerate() {
            // Layers composite on restore and unclosed scopes leak their state.
            if scope.layer || scope.restore.is_none() {
                mark(id, &mut live);
            }
        }
        for (draw, _) in self.draws.iter().zip(&visible).filter(|(_, v)| **v) {
            mark(draw.scope, &mut live);
        }

        let mut skips: Vec<SkipRange> = Vec::new();
        let mut skip = |r: &Range<usize>| {
            skips.push(SkipRange {
                start: r.start,
                end: r.end,
            });
        };
        for (draw, _) in self.draws.iter().zip(&visible).filter(|(_, v)| !**v) {
            skip(&draw.range);
        }
        for (scope, _) in self.scopes.iter().zip(&live).filter(|(_, l)| !**l) {
            scope.save.iter().chain(&scope.restore).for_each(&mut skip);
            scope.states.iter().for_each(&mut skip);
        }

        skips.sort_unstable();
        let mut merged: Vec<SkipRange> = Vec::with_capacity(skips.len());
        for s in skips {
            match merged.last_mut() {
                Some(last) if last.end == s.start => last.end = s.end,
                _ => merged.push(s),
            }
        }
        merged
    }
}

/// Records [`Canvas`] calls into a [`Picture`].
#[derive(Debug)]
pub struct PictureRecorder {
    canvas: PipeCanvas<MemoryController>,
    width: u32,
    height: u32,
}

impl PictureRecorder {
    /// Start recording a `width × height` picture.
    pub fn new(width: u32, height: u32, config: &RecordConfig) -> Result<Self, ConfigError> {
        let config = config.clone().with_device_size(width, height);
        Ok(Self {
            canvas: PipeCanvas::new(MemoryController::new(), &config)?,
            width,
            height,
        })
    }

    /// The recording surface.
    pub fn canvas(&mut self) -> &mut PipeCanvas<MemoryController> {
        &mut self.canvas
    }

    /// Stop recording.
    pub fn finish_recording(mut self) -> Picture {
        self.canvas.finish();
        let bytes = self.canvas.controller_mut().take_bytes();
        let index = self.canvas.take_index();
        tracing::debug!(
            bytes = bytes.len(),
            bitmaps = self.canvas.heap().len(),
            draws = index.as_ref().map_or(0, PictureIndex::draw_count),
            "finished picture"
        );
        Picture {
            width: self.width,
            height: self.height,
            bytes,
            heap: self.canvas.heap().clone(),
            flags: self.canvas.flags(),
            index,
            fonts: Arc::clone(self.canvas.fonts()),
        }
    }
}

/// An immutable recorded stream.
///
/// Cloning copies the bytes, the heap's entry table and the index. Pixel storage and
/// typefaces are immutable and stay shared.
#[derive(Debug)]
pub struct Picture {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
    heap: SharedHeap,
    flags: RecordFlags,
    index: Option<PictureIndex>,
    fonts: Arc<FontRegistry>,
}

impl Clone for Picture {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            bytes: self.bytes.clone(),
            heap: self.heap.deep_clone(),
            flags: self.flags,
            index: self.index.clone(),
            fonts: Arc::clone(&self.fonts),
        }
    }
}

impl Picture {
    /// Width given at recording time.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height given at recording time.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The encoded stream, ending with `Done`.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Flags the picture was recorded with.
    pub fn flags(&self) -> RecordFlags {
        self.flags
    }

    /// Heap the stream's bitmap handles resolve through.
    pub fn heap(&self) -> &SharedHeap {
        &self.heap
    }

    /// Spatial index, if one was built.
    pub fn index(&self) -> Option<&PictureIndex> {
        self.index.as_ref()
    }

    /// Fresh reader bound to this picture's heap and fonts.
    pub fn new_reader(&self) -> PipeReader {
        PipeReader::new(PlaybackConfig::new().with_fonts(Arc::clone(&self.fonts)))
            .with_heap(self.heap.clone())
    }

    /// Play into `canvas`, culled to its clip when both sides allow it.
    pub fn playback<K: Canvas + ?Sized>(
        &self,
        canvas: &mut K,
    ) -> Result<PlaybackStatus, PlaybackError> {
        let viewport = canvas.local_clip_bounds().map(RectF::to_kurbo);
        self.playback_with(&mut self.new_reader(), canvas, viewport)
    }

    /// Play into `canvas`, skipping what cannot touch `viewport`.
    pub fn playback_in<K: Canvas + ?Sized>(
        &self,
        canvas: &mut K,
        viewport: RectF,
    ) -> Result<PlaybackStatus, PlaybackError> {
        self.playback_with(&mut self.new_reader(), canvas, Some(viewport.to_kurbo()))
    }

    /// Play through a caller-provided reader, for example one whose abort handle is held
    /// elsewhere.
    pub fn playback_with<K: Canvas + ?Sized>(
        &self,
        reader: &mut PipeReader,
        canvas: &mut K,
        viewport: Option<Rect>,
    ) -> Result<PlaybackStatus, PlaybackError> {
        let skips = match (&self.index, viewport) {
            (Some(index), Some(viewport)) => index.cull(viewport),
            _ => Vec::new(),
        };
        let _span = tracing::debug_span!(
            "picture_playback",
            bytes = self.bytes.len(),
            skipped = skips.len()
        )
        .entered();
        reader.playback_culled(&self.bytes, canvas, &skips)
    }
}
