// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The recording surface.
//!
//! [`PipeCanvas`] turns [`Canvas`] calls into instructions. Resources are resolved before
//! the instruction that needs them: a paint becomes a delta against the last paint sent,
//! effects and typefaces are defined the first time they are referenced, and bitmaps go
//! either into the shared heap or into the stream.
//!
//! If the controller stops handing out blocks, the canvas keeps accepting calls and keeps
//! its matrix and clip up to date, but writes nothing more.

use std::sync::Arc;

use kurbo::{Affine, Rect};
use peniko::color::Rgba8;

use crate::bitmap::Bitmap;
use crate::canvas::{Canvas, CanvasState, SaveFlags};
use crate::config::{RecordConfig, RecordFlags};
use crate::effect::{Effect, EffectSlot};
use crate::error::ConfigError;
use crate::flatten::FlatTable;
use crate::geometry::{IRect, Path, PointF, PointMode, RectF, Region, RegionOp, Vertices};
use crate::heap::SharedHeap;
use crate::op::{DrawOp, Header, MAX_DATA, flags};
use crate::paint::{Paint, PaintStyle, StrokeJoin};
use crate::paint_delta::{PaintDeltaEncoder, PaintResources};
use crate::picture::{IndexBuilder, PictureIndex};
use crate::typeface::{FontRegistry, Typeface, TypefaceTable};
use crate::words::{WordWriter, blob_len};
use crate::writer::{BlockWriter, PipeController};

/// Where a draw lands, before the matrix is applied.
#[derive(Copy, Clone, Debug)]
enum Extent {
    /// Local-space bounds; `None` draws nothing.
    Local(Option<Rect>),
    /// Already in device space.
    Device(Rect),
    /// Anywhere inside the clip.
    Clip,
}

/// Resolves paint references, writing definitions into the stream as needed.
struct Resolver<'a, C: PipeController> {
    writer: &'a mut BlockWriter<C>,
    scratch: &'a mut WordWriter,
    effects: &'a mut FlatTable,
    typefaces: &'a mut TypefaceTable,
    fonts: &'a FontRegistry,
    flags: RecordFlags,
}

impl<C: PipeController> Resolver<'_, C> {
    fn define(&mut self, header: Header, blob: &[u8]) {
        self.scratch.clear();
        self.scratch.u32(header.encode());
        self.scratch.blob(blob);
        self.writer.write(self.scratch.as_bytes());
    }
}

impl<C: PipeController> PaintResources for Resolver<'_, C> {
    fn typeface_id(&mut self, face: Option<&Arc<Typeface>>) -> u32 {
        let Some(face) = face else { return 0 };
        let (id, is_new) = self.typefaces.id_for(face);
        if id > MAX_DATA {
            tracing::warn!(id, "typeface table overflow; recording the default typeface");
            return 0;
        }
        if is_new {
            let descriptor = if self.flags.contains(RecordFlags::CROSS_PROCESS) {
                face.serialize(true)
            } else {
                self.fonts.register(face);
                face.serialize_local()
            };
            tracing::debug!(id, family = face.family(), "defining typeface");
            self.define(Header::new(DrawOp::DefTypeface).with_data(id), &descriptor);
        }
        id
    }

    fn effect_handle(&mut self, slot: EffectSlot, effect: Option<&Arc<Effect>>) -> u32 {
        let Some(effect) = effect else { return 0 };
        let bytes = effect.flatten();
        let Some(interned) = self.effects.intern(&bytes) else {
            tracing::warn!(?slot, "effect table overflow; recording no effect");
            return 0;
        };
        if interned.is_new {
            tracing::debug!(?slot, handle = interned.handle, "defining effect");
            self.define(
                Header::new(DrawOp::DefFlattenable)
                    .with_flags(slot as u8)
                    .with_data(interned.handle),
                &bytes,
            );
        }
        interned.handle
    }
}

fn stroke_radius(paint: &Paint) -> f64 {
    let half = (f64::from(paint.stroke_width) / 2.0).max(0.5);
    let miter = match paint.join {
        StrokeJoin::Miter => f64::from(paint.stroke_miter).max(1.0),
        StrokeJoin::Round | StrokeJoin::Bevel => 1.0,
    };
    half * miter * core::f64::consts::SQRT_2
}

/// Returns `true` if `paint` can put pixels outside the geometry it is drawn with.
fn spreads(paint: &Paint) -> bool {
    [
        EffectSlot::Looper,
        EffectSlot::MaskFilter,
        EffectSlot::PathEffect,
        EffectSlot::Rasterizer,
        EffectSlot::ImageFilter,
    ]
    .into_iter()
    .any(|s| paint.effect(s).is_some())
}

/// Local bounds grown for what `paint` adds around the geometry. `None` when unbounded.
fn paint_bounds(local: Rect, paint: Option<&Paint>) -> Option<Rect> {
    let Some(paint) = paint else {
        return Some(local);
    };
    if spreads(paint) {
        return None;
    }
    Some(match paint.style {
        PaintStyle::Fill => local,
        PaintStyle::Stroke | PaintStyle::StrokeAndFill => {
            let r = stroke_radius(paint);
            local.inflate(r, r)
        }
    })
}

fn rect_of(points: impl IntoIterator<Item = PointF>) -> Option<Rect> {
    points
        .into_iter()
        .map(|p| {
            let k = p.to_kurbo();
            Rect::from_points(k, k)
        })
        .reduce(|a, b| a.union(b))
}

/// Recording surface writing to a [`PipeController`].
///
/// Dropping the canvas finishes the stream.
pub struct PipeCanvas<C: PipeController> {
    writer: BlockWriter<C>,
    flags: RecordFlags,
    heap: SharedHeap,
    effects: FlatTable,
    bitmaps: FlatTable,
    typefaces: TypefaceTable,
    fonts: Arc<FontRegistry>,
    paint: PaintDeltaEncoder,
    state: CanvasState,
    scratch: WordWriter,
    defs: WordWriter,
    index: Option<IndexBuilder>,
    /// Save count and device clip of the outermost open layer whose paint spreads pixels.
    spread_layer: Option<(usize, Rect)>,
}

impl<C: PipeController> core::fmt::Debug for PipeCanvas<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PipeCanvas")
            .field("flags", &self.flags)
            .field("written", &self.writer.total_written())
            .field("done", &self.writer.is_done())
            .field("effects", &self.effects.len())
            .field("heap", &self.heap.len())
            .field("save_count", &self.state.save_count())
            .finish_non_exhaustive()
    }
}

impl<C: PipeController> PipeCanvas<C> {
    /// Start a stream on `controller`.
    ///
    /// The first instruction reports the stream flags to the consumer.
    pub fn new(controller: C, config: &RecordConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let flags = config.flags;
        let index = flags
            .contains(RecordFlags::OPTIMIZE_FOR_CLIPPED_PLAYBACK)
            .then(|| IndexBuilder::new(config.rtree));
        let mut canvas = Self {
            writer: BlockWriter::new(controller, config.min_block_size),
            flags,
            heap: SharedHeap::new(flags.shallow_heap()),
            effects: FlatTable::one_based(),
            bitmaps: FlatTable::zero_based(),
            typefaces: TypefaceTable::default(),
            fonts: Arc::clone(&config.fonts),
            paint: PaintDeltaEncoder::new(),
            state: CanvasState::new(config.device_width, config.device_height),
            scratch: WordWriter::default(),
            defs: WordWriter::default(),
            index,
            spread_layer: None,
        };
        canvas.emit(
            Header::new(DrawOp::ReportFlags).with_flags(flags.bits()),
            |_| {},
        );
        Ok(canvas)
    }

    /// Write `Done` and close the stream. Later calls record nothing.
    pub fn finish(&mut self) {
        self.writer.finish();
    }

    /// Returns `true` once nothing more will be written.
    pub fn is_done(&self) -> bool {
        self.writer.is_done()
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> usize {
        self.writer.total_written()
    }

    /// Stream flags.
    pub fn flags(&self) -> RecordFlags {
        self.flags
    }

    /// Heap that consumers of this stream resolve bitmap handles through.
    pub fn heap(&self) -> &SharedHeap {
        &self.heap
    }

    /// Font registry same-process typefaces are published to.
    pub fn fonts(&self) -> &Arc<FontRegistry> {
        &self.fonts
    }

    /// Current matrix.
    pub fn total_matrix(&self) -> Affine {
        self.state.matrix()
    }

    /// Current device clip bounds.
    pub fn clip_bounds(&self) -> Rect {
        self.state.clip_bounds()
    }

    /// Number of saves not yet restored.
    pub fn save_count(&self) -> usize {
        self.state.save_count()
    }

    /// The controller.
    pub fn controller(&self) -> &C {
        self.writer.controller()
    }

    /// The controller, mutably.
    pub fn controller_mut(&mut self) -> &mut C {
        self.writer.controller_mut()
    }

    pub(crate) fn take_index(&mut self) -> Option<PictureIndex> {
        self.index.take().map(IndexBuilder::finish)
    }

    /// Write one instruction and notify. Returns its byte range if it was written.
    fn emit(
        &mut self,
        header: Header,
        payload: impl FnOnce(&mut WordWriter),
    ) -> Option<core::ops::Range<usize>> {
        let mut buf = core::mem::take(&mut self.scratch);
        buf.clear();
        buf.u32(header.encode());
        payload(&mut buf);
        let start = self.writer.total_written();
        let written = self.writer.write(buf.as_bytes());
        self.writer.notify();
        self.scratch = buf;
        written.then(|| start..self.writer.total_written())
    }

    /// Send whatever differs between `paint` and the last paint sent.
    fn write_paint(&mut self, paint: &Paint) {
        let mut resolver = Resolver {
            writer: &mut self.writer,
            scratch: &mut self.defs,
            effects: &mut self.effects,
            typefaces: &mut self.typefaces,
            fonts: &self.fonts,
            flags: self.flags,
        };
        let words = self.paint.encode(paint, &mut resolver);
        if words.is_empty() {
            return;
        }
        let size = blob_len(words.len() * 4);
        self.emit(Header::new(DrawOp::PaintOp).with_data(size), |w| {
            for word in &words {
                w.u32(*word);
            }
        });
    }

    /// Stream handle for a bitmap, defining it first if needed.
    fn bitmap_handle(&mut self, bitmap: &Bitmap) -> Option<u32> {
        if !self.flags.flattens_bitmaps() {
            return self.heap.add_bitmap(bitmap).map(|id| id.get());
        }
        let bytes = bitmap.flatten();
        let Some(interned) = self.bitmaps.intern(&bytes) else {
            tracing::warn!("bitmap table overflow; skipping draw");
            return None;
        };
        if interned.is_new {
            tracing::debug!(handle = interned.handle, "defining bitmap");
            self.emit(
                Header::new(DrawOp::DefBitmap).with_data(interned.handle),
                |w| w.blob(&bytes),
            );
        }
        Some(interned.handle)
    }

    fn state_op(&mut self, header: Header, payload: impl FnOnce(&mut WordWriter)) {
        let range = self.emit(header, payload);
        if let (Some(index), Some(range)) = (&mut self.index, range) {
            index.state(range);
        }
    }

    fn device_extent(&self, extent: Extent, paint: Option<&Paint>) -> Rect {
        let clip = self.state.clip_bounds();
        if let Extent::Local(None) = extent {
            return Rect::new(clip.x0, clip.y0, clip.x0, clip.y0);
        }
        // The layer may move its content anywhere inside the clip it was opened with.
        if let Some((_, layer_clip)) = self.spread_layer {
            return layer_clip;
        }
        let device = match extent {
            Extent::Local(Some(local)) => match paint_bounds(local, paint) {
                Some(b) => self.state.map_rect(b),
                None => clip,
            },
            Extent::Device(r) => r,
            Extent::Local(None) | Extent::Clip => clip,
        };
        device.inflate(1.0, 1.0).intersect(clip)
    }

    /// Write a draw instruction after its paint, and index it.
    fn draw(
        &mut self,
        paint: Option<&Paint>,
        header: Header,
        extent: Extent,
        payload: impl FnOnce(&mut WordWriter),
    ) {
        if let Some(p) = paint {
            self.write_paint(p);
        }
        self.emit_draw(paint, header, extent, payload);
    }

    fn emit_draw(
        &mut self,
        paint: Option<&Paint>,
        header: Header,
        extent: Extent,
        payload: impl FnOnce(&mut WordWriter),
    ) {
        let bounds = self.index.is_some().then(|| self.device_extent(extent, paint));
        let range = self.emit(header, payload);
        if let (Some(index), Some(range), Some(bounds)) = (&mut self.index, range, bounds) {
            index.draw(range, bounds);
        }
    }

    fn bitmap_draw(
        &mut self,
        bitmap: &Bitmap,
        paint: Option<&Paint>,
        header: Header,
        extent: Extent,
        payload: impl FnOnce(&mut WordWriter),
    ) {
        let mut header = header;
        if let Some(p) = paint {
            self.write_paint(p);
            header = header.with_flags(header.flags | flags::HAS_PAINT);
        }
        let Some(handle) = self.bitmap_handle(bitmap) else {
            return;
        };
        self.emit_draw(paint, header.with_data(handle), extent, payload);
    }
}

impl<C: PipeController> Drop for PipeCanvas<C> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<C: PipeController> Canvas for PipeCanvas<C> {
    fn save(&mut self, save_flags: SaveFlags) {
        self.state.save();
        let range = self.emit(Header::new(DrawOp::Save).with_data(save_flags.bits()), |_| {});
        if let (Some(index), Some(range)) = (&mut self.index, range) {
            index.save(range, false);
        }
    }

    fn save_layer(&mut self, bounds: Option<RectF>, paint: Option<&Paint>, save_flags: SaveFlags) {
        self.state.save();
        if self.spread_layer.is_none() && paint.is_some_and(spreads) {
            self.spread_layer = Some((self.state.save_count(), self.state.clip_bounds()));
        }
        let mut bits = 0;
        if bounds.is_some() {
            bits |= flags::HAS_BOUNDS;
        }
        if let Some(p) = paint {
            self.write_paint(p);
            bits |= flags::HAS_PAINT;
        }
        let header = Header::new(DrawOp::SaveLayer)
            .with_flags(bits)
            .with_data(save_flags.bits());
        let range = self.emit(header, |w| {
            if let Some(b) = bounds {
                b.write(w);
            }
        });
        if let (Some(index), Some(range)) = (&mut self.index, range) {
            index.save(range, true);
        }
    }

    fn restore(&mut self) {
        if !self.state.restore() {
            tracing::debug!("ignoring unbalanced restore");
            return;
        }
        if self
            .spread_layer
            .is_some_and(|(depth, _)| self.state.save_count() < depth)
        {
            self.spread_layer = None;
        }
        let range = self.emit(Header::new(DrawOp::Restore), |_| {});
        if let (Some(index), Some(range)) = (&mut self.index, range) {
            index.restore(range);
        }
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.state.translate(dx, dy);
        if dx != 0.0 || dy != 0.0 {
            self.state_op(Header::new(DrawOp::Translate), |w| {
                w.f32(dx);
                w.f32(dy);
            });
        }
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.state.scale(sx, sy);
        if sx != 0.0 || sy != 0.0 {
            self.state_op(Header::new(DrawOp::Scale), |w| {
                w.f32(sx);
                w.f32(sy);
            });
        }
    }

    fn rotate(&mut self, degrees: f32) {
        self.state.rotate(degrees);
        if degrees != 0.0 {
            self.state_op(Header::new(DrawOp::Rotate), |w| w.f32(degrees));
        }
    }

    fn skew(&mut self, sx: f32, sy: f32) {
        self.state.skew(sx, sy);
        if sx != 0.0 || sy != 0.0 {
            self.state_op(Header::new(DrawOp::Skew), |w| {
                w.f32(sx);
                w.f32(sy);
            });
        }
    }

    fn concat(&mut self, matrix: Affine) {
        self.state.concat(matrix);
        if matrix != Affine::IDENTITY {
            self.state_op(Header::new(DrawOp::Concat), |w| w.affine(matrix));
        }
    }

    fn set_matrix(&mut self, matrix: Affine) {
        self.state.set_matrix(matrix);
        self.state_op(Header::new(DrawOp::SetMatrix), |w| w.affine(matrix));
    }

    fn clip_rect(&mut self, rect: RectF, op: RegionOp, anti_alias: bool) {
        self.state.clip_local(Some(rect.to_kurbo()), op);
        let header = Header::new(DrawOp::ClipRect)
            .with_flags(if anti_alias { flags::ANTI_ALIAS } else { 0 })
            .with_data(op as u32);
        self.state_op(header, |w| rect.write(w));
    }

    fn clip_path(&mut self, path: &Path, op: RegionOp, anti_alias: bool) {
        self.state.clip_local(path.bounds(), op);
        let header = Header::new(DrawOp::ClipPath)
            .with_flags(if anti_alias { flags::ANTI_ALIAS } else { 0 })
            .with_data(op as u32);
        self.state_op(header, |w| path.write(w));
    }

    fn clip_region(&mut self, region: &Region, op: RegionOp) {
        self.state.clip_device(region.bounds(), op);
        self.state_op(
            Header::new(DrawOp::ClipRegion).with_data(op as u32),
            |w| region.write(w),
        );
    }

    fn clear(&mut self, color: Rgba8) {
        let transparent = Rgba8 {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        };
        let has_color = color != transparent;
        let header = Header::new(DrawOp::Clear).with_flags(if has_color {
            flags::HAS_COLOR
        } else {
            0
        });
        self.emit_draw(None, header, Extent::Clip, |w| {
            if has_color {
                w.color(color);
            }
        });
    }

    fn draw_paint(&mut self, paint: &Paint) {
        self.draw(Some(paint), Header::new(DrawOp::DrawPaint), Extent::Clip, |_| {});
    }

    fn draw_points(&mut self, mode: PointMode, points: &[PointF], paint: &Paint) {
        if points.is_empty() {
            return;
        }
        let extent = Extent::Local(rect_of(points.iter().copied()).map(|r| {
            let s = stroke_radius(paint);
            r.inflate(s, s)
        }));
        self.draw(
            Some(paint),
            Header::new(DrawOp::DrawPoints).with_data(mode as u32),
            extent,
            |w| {
                w.u32(blob_len(points.len()));
                for p in points {
                    p.write(w);
                }
            },
        );
    }

    fn draw_rect(&mut self, rect: RectF, paint: &Paint) {
        let extent = Extent::Local(Some(rect.to_kurbo().abs()));
        self.draw(Some(paint), Header::new(DrawOp::DrawRect), extent, |w| {
            rect.write(w);
        });
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        self.draw(
            Some(paint),
            Header::new(DrawOp::DrawPath),
            Extent::Local(path.bounds()),
            |w| path.write(w),
        );
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, left: f32, top: f32, paint: Option<&Paint>) {
        let extent = Extent::Local(Some(Rect::new(
            f64::from(left),
            f64::from(top),
            f64::from(left) + f64::from(bitmap.width()),
            f64::from(top) + f64::from(bitmap.height()),
        )));
        self.bitmap_draw(bitmap, paint, Header::new(DrawOp::DrawBitmap), extent, |w| {
            w.f32(left);
            w.f32(top);
        });
    }

    fn draw_bitmap_rect(
        &mut self,
        bitmap: &Bitmap,
        src: Option<IRect>,
        dst: RectF,
        paint: Option<&Paint>,
    ) {
        let header = Header::new(DrawOp::DrawBitmapRect).with_flags(if src.is_some() {
            flags::HAS_SRC
        } else {
            0
        });
        let extent = Extent::Local(Some(dst.to_kurbo().abs()));
        self.bitmap_draw(bitmap, paint, header, extent, |w| {
            if let Some(src) = src {
                src.write(w);
            }
            dst.write(w);
        });
    }

    fn draw_bitmap_matrix(&mut self, _bitmap: &Bitmap, _matrix: Affine, _paint: Option<&Paint>) {
        tracing::warn!("draw_bitmap_matrix cannot be recorded; dropping the call");
    }

    fn draw_bitmap_nine(
        &mut self,
        bitmap: &Bitmap,
        center: IRect,
        dst: RectF,
        paint: Option<&Paint>,
    ) {
        let extent = Extent::Local(Some(dst.to_kurbo().abs()));
        self.bitmap_draw(
            bitmap,
            paint,
            Header::new(DrawOp::DrawBitmapNine),
            extent,
            |w| {
                center.write(w);
                dst.write(w);
            },
        );
    }

    fn draw_sprite(&mut self, bitmap: &Bitmap, left: i32, top: i32, paint: Option<&Paint>) {
        let device = IRect::new(
            left,
            top,
            left.saturating_add_unsigned(bitmap.width()),
            top.saturating_add_unsigned(bitmap.height()),
        );
        let extent = Extent::Device(device.to_kurbo());
        self.bitmap_draw(bitmap, paint, Header::new(DrawOp::DrawSprite), extent, |w| {
            w.i32(left);
            w.i32(top);
        });
    }

    fn draw_text(&mut self, text: &[u8], x: f32, y: f32, paint: &Paint) {
        if text.is_empty() {
            return;
        }
        self.draw(Some(paint), Header::new(DrawOp::DrawText), Extent::Clip, |w| {
            w.blob(text);
            w.f32(x);
            w.f32(y);
        });
    }

    fn draw_pos_text(&mut self, text: &[u8], pos: &[PointF], paint: &Paint) {
        let glyphs = paint.count_glyphs(text);
        if glyphs == 0 {
            return;
        }
        if pos.len() < glyphs {
            tracing::warn!(glyphs, positions = pos.len(), "too few glyph positions; dropping text");
            return;
        }
        let pos = &pos[..glyphs];
        self.draw(
            Some(paint),
            Header::new(DrawOp::DrawPosText),
            Extent::Clip,
            |w| {
                w.blob(text);
                w.u32(blob_len(pos.len()));
                for p in pos {
                    p.write(w);
                }
            },
        );
    }

    fn draw_pos_text_h(&mut self, text: &[u8], xs: &[f32], y: f32, paint: &Paint) {
        let glyphs = paint.count_glyphs(text);
        if glyphs == 0 {
            return;
        }
        if xs.len() < glyphs {
            tracing::warn!(glyphs, positions = xs.len(), "too few glyph positions; dropping text");
            return;
        }
        let xs = &xs[..glyphs];
        self.draw(
            Some(paint),
            Header::new(DrawOp::DrawPosTextH),
            Extent::Clip,
            |w| {
                w.blob(text);
                w.u32(blob_len(xs.len()));
                for x in xs {
                    w.f32(*x);
                }
                w.f32(y);
            },
        );
    }

    fn draw_text_on_path(
        &mut self,
        text: &[u8],
        path: &Path,
        matrix: Option<Affine>,
        paint: &Paint,
    ) {
        if text.is_empty() {
            return;
        }
        let header = Header::new(DrawOp::DrawTextOnPath).with_flags(if matrix.is_some() {
            flags::HAS_MATRIX
        } else {
            0
        });
        self.draw(Some(paint), header, Extent::Clip, |w| {
            w.blob(text);
            path.write(w);
            if let Some(m) = matrix {
                w.affine(m);
            }
        });
    }

    fn draw_vertices(&mut self, vertices: &Vertices<'_>, paint: &Paint) {
        let n = vertices.positions.len();
        if n == 0 {
            return;
        }
        let texs = vertices.tex_coords.filter(|t| !t.is_empty());
        let colors = vertices.colors.filter(|c| !c.is_empty());
        let indices = vertices.indices.filter(|i| !i.is_empty());
        if texs.is_some_and(|t| t.len() != n) || colors.is_some_and(|c| c.len() != n) {
            tracing::warn!(vertices = n, "per-vertex arrays differ in length; dropping mesh");
            return;
        }
        let mut bits = 0;
        if texs.is_some() {
            bits |= flags::HAS_TEXS;
        }
        if colors.is_some() {
            bits |= flags::HAS_COLORS;
        }
        if indices.is_some() {
            bits |= flags::HAS_INDICES;
        }
        let header = Header::new(DrawOp::DrawVertices).with_flags(bits);
        let mode = vertices.mode;
        let positions = vertices.positions;
        self.draw(Some(paint), header, Extent::Local(vertices.bounds()), |w| {
            w.u32(mode as u32);
            w.u32(blob_len(n));
            for p in positions {
                p.write(w);
            }
            for t in texs.into_iter().flatten() {
                t.write(w);
            }
            for c in colors.into_iter().flatten() {
                w.color(*c);
            }
            if let Some(indices) = indices {
                let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
                w.blob(&bytes);
            }
        });
    }

    fn draw_data(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let len = blob_len(data.len());
        let inline = len <= MAX_DATA;
        let header = Header::new(DrawOp::DrawData).with_data(if inline { len } else { 0 });
        // Not indexed: data has no extent and is never culled.
        self.emit(header, |w| {
            if !inline {
                w.u32(len);
            }
            w.padded(data);
        });
    }

    fn local_clip_bounds(&self) -> Option<RectF> {
        let m = self.state.matrix();
        if m.determinant() == 0.0 {
            return None;
        }
        Some(RectF::from_kurbo(
            m.inverse().transform_rect_bbox(self.state.clip_bounds()),
        ))
    }
}
