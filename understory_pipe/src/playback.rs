// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The playback dispatcher.
//!
//! A [`PipeReader`] holds the consumer half of a stream's state: the current paint and the
//! resources defined so far. Each instruction is fully decoded before it touches that state
//! or the target canvas, and the abort flag is checked on both sides of decoding, so an
//! aborted session never applies half an instruction.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kurbo::Affine;
use peniko::color::Rgba8;

use crate::bitmap::Bitmap;
use crate::canvas::{Canvas, SaveFlags};
use crate::config::{PlaybackConfig, RecordFlags};
use crate::effect::{Effect, EffectSlot};
use crate::error::{DecodeError, PlaybackError};
use crate::geometry::{
    IRect, Path, PointF, PointMode, RectF, Region, RegionOp, VertexMode, Vertices,
};
use crate::heap::{HeapId, SharedHeap};
use crate::op::{DrawOp, Header, flags};
use crate::paint::Paint;
use crate::paint_delta::apply_paint_words;
use crate::typeface::Typeface;
use crate::words::WordReader;

/// Lifecycle of a [`PipeReader`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Nothing played yet.
    Idle,
    /// At least one buffer played; more may follow.
    Playing,
    /// A `Done` instruction was reached.
    Finished,
    /// The abort flag was raised.
    Aborted,
    /// A corrupt instruction was found.
    Failed,
}

impl PlaybackState {
    /// Returns `true` for states that accept no more input.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Aborted | Self::Failed)
    }
}

/// Why a call to [`PipeReader::playback`] returned successfully.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackStatus {
    /// The stream ended with `Done`. Bytes after it were ignored.
    Done,
    /// The buffer ended on an instruction boundary; the stream may continue in the next one.
    Eof,
    /// The abort flag was raised.
    Aborted,
}

/// Cooperative cancellation flag shared with a [`PipeReader`].
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Ask the reader to stop before its next instruction.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once [`abort`](Self::abort) was called.
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Byte range of a buffer that playback jumps over without decoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkipRange {
    /// Offset of the first skipped instruction header.
    pub start: usize,
    /// Offset just past the last skipped instruction.
    pub end: usize,
}

/// One decoded instruction. Borrowed slices point into the playback buffer.
#[derive(Clone, Debug)]
enum Command<'a> {
    ReportFlags(RecordFlags),
    Save(SaveFlags),
    SaveLayer {
        bounds: Option<RectF>,
        has_paint: bool,
        flags: SaveFlags,
    },
    Restore,
    Translate(f32, f32),
    Scale(f32, f32),
    Rotate(f32),
    Skew(f32, f32),
    Concat(Affine),
    SetMatrix(Affine),
    ClipRect {
        rect: RectF,
        op: RegionOp,
        anti_alias: bool,
    },
    ClipPath {
        path: Path,
        op: RegionOp,
        anti_alias: bool,
    },
    ClipRegion {
        region: Region,
        op: RegionOp,
    },
    Clear(Rgba8),
    DrawPaint,
    DrawPoints {
        mode: PointMode,
        points: Vec<PointF>,
    },
    DrawRect(RectF),
    DrawPath(Path),
    DrawBitmap {
        handle: u32,
        has_paint: bool,
        left: f32,
        top: f32,
    },
    DrawBitmapRect {
        handle: u32,
        has_paint: bool,
        src: Option<IRect>,
        dst: RectF,
    },
    DrawBitmapNine {
        handle: u32,
        has_paint: bool,
        center: IRect,
        dst: RectF,
    },
    DrawSprite {
        handle: u32,
        has_paint: bool,
        left: i32,
        top: i32,
    },
    DrawText {
        text: &'a [u8],
        x: f32,
        y: f32,
    },
    DrawPosText {
        text: &'a [u8],
        pos: Vec<PointF>,
    },
    DrawPosTextH {
        text: &'a [u8],
        xs: Vec<f32>,
        y: f32,
    },
    DrawTextOnPath {
        text: &'a [u8],
        path: Path,
        matrix: Option<Affine>,
    },
    DrawVertices {
        mode: VertexMode,
        positions: Vec<PointF>,
        tex_coords: Option<Vec<PointF>>,
        colors: Option<Vec<Rgba8>>,
        indices: Option<Vec<u16>>,
    },
    DrawData(&'a [u8]),
    Paint(&'a [u8]),
    DefTypeface {
        id: u32,
        bytes: &'a [u8],
    },
    DefFlattenable {
        handle: u32,
        effect: Effect,
    },
    DefBitmap {
        handle: u32,
        bitmap: Bitmap,
    },
    Done,
}

fn points(r: &mut WordReader<'_>) -> Result<Vec<PointF>, DecodeError> {
    let n = r.count(8)?;
    (0..n).map(|_| PointF::read(r)).collect()
}

fn save_flags(data: u32) -> Result<SaveFlags, DecodeError> {
    SaveFlags::from_bits(data).ok_or(DecodeError::invalid("save flags", data))
}

fn decode<'a>(header: Header, r: &mut WordReader<'a>) -> Result<Command<'a>, DecodeError> {
    let has = |mask| header.has(mask);
    Ok(match header.op {
        DrawOp::ReportFlags => Command::ReportFlags(
            RecordFlags::from_bits(header.flags)
                .ok_or(DecodeError::invalid("stream flags", u32::from(header.flags)))?,
        ),
        DrawOp::Save => Command::Save(save_flags(header.data)?),
        DrawOp::SaveLayer => Command::SaveLayer {
            bounds: has(flags::HAS_BOUNDS).then(|| RectF::read(r)).transpose()?,
            has_paint: has(flags::HAS_PAINT),
            flags: save_flags(header.data)?,
        },
        DrawOp::Restore => Command::Restore,
        DrawOp::Translate => Command::Translate(r.f32()?, r.f32()?),
        DrawOp::Scale => Command::Scale(r.f32()?, r.f32()?),
        DrawOp::Rotate => Command::Rotate(r.f32()?),
        DrawOp::Skew => Command::Skew(r.f32()?, r.f32()?),
        DrawOp::Concat => Command::Concat(r.affine()?),
        DrawOp::SetMatrix => Command::SetMatrix(r.affine()?),
        DrawOp::ClipRect => Command::ClipRect {
            rect: RectF::read(r)?,
            op: RegionOp::from_u32(header.data)?,
            anti_alias: has(flags::ANTI_ALIAS),
        },
        DrawOp::ClipPath => Command::ClipPath {
            path: Path::read(r)?,
            op: RegionOp::from_u32(header.data)?,
            anti_alias: has(flags::ANTI_ALIAS),
        },
        DrawOp::ClipRegion => Command::ClipRegion {
            region: Region::read(r)?,
            op: RegionOp::from_u32(header.data)?,
        },
        DrawOp::Clear => Command::Clear(if has(flags::HAS_COLOR) {
            r.color()?
        } else {
            Rgba8 {
                r: 0,
                g: 0,
                b: 0,
                a: 0,
            }
        }),
        DrawOp::DrawPaint => Command::DrawPaint,
        DrawOp::DrawPoints => Command::DrawPoints {
            mode: PointMode::from_u32(header.data)?,
            points: points(r)?,
        },
        DrawOp::DrawRect => Command::DrawRect(RectF::read(r)?),
        DrawOp::DrawPath => Command::DrawPath(Path::read(r)?),
        DrawOp::DrawBitmap => Command::DrawBitmap {
            handle: header.data,
            has_paint: has(flags::HAS_PAINT),
            left: r.f32()?,
            top: r.f32()?,
        },
        DrawOp::DrawBitmapRect => Command::DrawBitmapRect {
            handle: header.data,
            has_paint: has(flags::HAS_PAINT),
            src: has(flags::HAS_SRC).then(|| IRect::read(r)).transpose()?,
            dst: RectF::read(r)?,
        },
        DrawOp::DrawBitmapNine => Command::DrawBitmapNine {
            handle: header.data,
            has_paint: has(flags::HAS_PAINT),
            center: IRect::read(r)?,
            dst: RectF::read(r)?,
        },
        DrawOp::DrawSprite => Command::DrawSprite {
            handle: header.data,
            has_paint: has(flags::HAS_PAINT),
            left: r.i32()?,
            top: r.i32()?,
        },
        DrawOp::DrawText => Command::DrawText {
            text: r.blob()?,
            x: r.f32()?,
            y: r.f32()?,
        },
        DrawOp::DrawPosText => Command::DrawPosText {
            text: r.blob()?,
            pos: points(r)?,
        },
        DrawOp::DrawPosTextH => {
            let text = r.blob()?;
            let n = r.count(4)?;
            let xs = (0..n).map(|_| r.f32()).collect::<Result<Vec<_>, _>>()?;
            Command::DrawPosTextH {
                text,
                xs,
                y: r.f32()?,
            }
        }
        DrawOp::DrawTextOnPath => Command::DrawTextOnPath {
            text: r.blob()?,
            path: Path::read(r)?,
            matrix: has(flags::HAS_MATRIX).then(|| r.affine()).transpose()?,
        },
        DrawOp::DrawVertices => {
            let mode = VertexMode::from_u32(r.u32()?)?;
            let positions = points(r)?;
            let n = positions.len();
            let tex_coords = has(flags::HAS_TEXS)
                .then(|| points_of(r, n))
                .transpose()?;
            let colors = has(flags::HAS_COLORS)
                .then(|| (0..n).map(|_| r.color()).collect::<Result<Vec<_>, _>>())
                .transpose()?;
            let indices = has(flags::HAS_INDICES)
                .then(|| indices(r))
                .transpose()?;
            Command::DrawVertices {
                mode,
                positions,
                tex_coords,
                colors,
                indices,
            }
        }
        DrawOp::DrawData => {
            let len = match header.data {
                0 => r.u32()?,
                n => n,
            };
            Command::DrawData(r.padded(len as usize)?)
        }
        DrawOp::PaintOp => {
            if header.data % 4 != 0 {
                return Err(DecodeError::invalid("paint size", header.data));
            }
            Command::Paint(r.take(header.data as usize)?)
        }
        DrawOp::DefTypeface => Command::DefTypeface {
            id: header.data,
            bytes: r.blob()?,
        },
        DrawOp::DefFlattenable => {
            let slot = EffectSlot::from_u8(header.flags)
                .ok_or(DecodeError::invalid("effect slot", u32::from(header.flags)))?;
            let effect = Effect::unflatten(r.blob()?)?;
            if effect.slot() != slot {
                return Err(DecodeError::SlotMismatch {
                    slot: slot as u8,
                    found: effect.slot() as u8,
                });
            }
            Command::DefFlattenable {
                handle: header.data,
                effect,
            }
        }
        DrawOp::DefBitmap => Command::DefBitmap {
            handle: header.data,
            bitmap: Bitmap::unflatten(r.blob()?)?,
        },
        DrawOp::Done => Command::Done,
    })
}

fn indices(r: &mut WordReader<'_>) -> Result<Vec<u16>, DecodeError> {
    let bytes = r.blob()?;
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::invalid(
            "index blob length",
            u32::try_from(bytes.len()).unwrap_or(u32::MAX),
        ));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect())
}

fn points_of(r: &mut WordReader<'_>, n: usize) -> Result<Vec<PointF>, DecodeError> {
    (0..n).map(|_| PointF::read(r)).collect()
}

fn check_order(kind: &'static str, expected: usize, found: u32) -> Result<(), DecodeError> {
    if found as usize == expected {
        Ok(())
    } else {
        Err(DecodeError::DefinitionOrder {
            kind,
            expected: u32::try_from(expected).unwrap_or(u32::MAX),
            found,
        })
    }
}

/// Consumer half of a stream.
#[derive(Debug)]
pub struct PipeReader {
    config: PlaybackConfig,
    state: PlaybackState,
    flags: RecordFlags,
    paint: Paint,
    typefaces: Vec<Arc<Typeface>>,
    effects: Vec<Arc<Effect>>,
    bitmaps: Vec<Arc<Bitmap>>,
    heap: Option<SharedHeap>,
    save_depth: usize,
    abort: AbortHandle,
}

impl PipeReader {
    /// Reader for a stream whose bitmaps, if any, travel inside the stream.
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            state: PlaybackState::Idle,
            flags: RecordFlags::empty(),
            paint: Paint::default(),
            typefaces: Vec::new(),
            effects: Vec::new(),
            bitmaps: Vec::new(),
            heap: None,
            save_depth: 0,
            abort: AbortHandle::default(),
        }
    }

    /// Resolve bitmap handles through the producer's heap.
    pub fn with_heap(mut self, heap: SharedHeap) -> Self {
        self.heap = Some(heap);
        self
    }

    /// Handle that aborts this reader from anywhere.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Stream flags reported by the producer.
    pub fn flags(&self) -> RecordFlags {
        self.flags
    }

    /// Paint as of the last paint instruction.
    pub fn paint(&self) -> &Paint {
        &self.paint
    }

    /// Save nesting as seen by the stream.
    pub fn save_depth(&self) -> usize {
        self.save_depth
    }

    /// Play every instruction in `data` into `canvas`.
    ///
    /// A stream delivered in several buffers is played by calling this once per buffer, in
    /// order. Offsets in errors are relative to `data`.
    pub fn playback<K: Canvas + ?Sized>(
        &mut self,
        data: &[u8],
        canvas: &mut K,
    ) -> Result<PlaybackStatus, PlaybackError> {
        self.playback_culled(data, canvas, &[])
    }

    /// Like [`playback`](Self::playback), jumping over `skips`.
    ///
    /// `skips` must be sorted, non-overlapping and start on instruction boundaries.
    pub fn playback_culled<K: Canvas + ?Sized>(
        &mut self,
        data: &[u8],
        canvas: &mut K,
        skips: &[SkipRange],
    ) -> Result<PlaybackStatus, PlaybackError> {
        if self.state.is_terminal() {
            return Err(PlaybackError::Terminated(self.state));
        }
        self.state = PlaybackState::Playing;
        let mut r = WordReader::new(data);
        let mut skips = skips.iter().peekable();
        loop {
            if self.abort.is_aborted() {
                self.state = PlaybackState::Aborted;
                return Ok(PlaybackStatus::Aborted);
            }
            while let Some(skip) = skips.peek() {
                if skip.end <= r.pos() {
                    skips.next();
                } else if skip.start <= r.pos() {
                    r.seek(skip.end);
                    skips.next();
                } else {
                    break;
                }
            }
            if r.is_empty() {
                return Ok(PlaybackStatus::Eof);
            }
            let offset = r.pos();
            let command = match r.u32().and_then(Header::decode) {
                Ok(header) => {
                    tracing::trace!(op = header.op.name(), offset, "dispatch");
                    decode(header, &mut r)
                }
                Err(err) => Err(err),
            };
            let command = match command {
                Ok(command) => command,
                Err(source) => {
                    self.state = PlaybackState::Failed;
                    return Err(PlaybackError::Corrupt { offset, source });
                }
            };
            if self.abort.is_aborted() {
                self.state = PlaybackState::Aborted;
                return Ok(PlaybackStatus::Aborted);
            }
            match self.apply(command, canvas) {
                Ok(true) => {
                    self.state = PlaybackState::Finished;
                    return Ok(PlaybackStatus::Done);
                }
                Ok(false) => {}
                Err(err) => {
                    self.state = PlaybackState::Failed;
                    return Err(match err {
                        Fault::Decode(source) => PlaybackError::Corrupt { offset, source },
                        Fault::Depth => PlaybackError::SaveDepthExceeded {
                            limit: self.config.max_save_depth,
                        },
                    });
                }
            }
        }
    }

    fn bitmap(&self, handle: u32) -> Result<Arc<Bitmap>, DecodeError> {
        let found = if self.flags.flattens_bitmaps() {
            self.bitmaps.get(handle as usize).cloned()
        } else {
            self.heap
                .as_ref()
                .and_then(|heap| heap.get(HeapId::from_raw(handle)))
        };
        found.ok_or(DecodeError::undefined("bitmap", handle))
    }

    fn push_save(&mut self) -> Result<(), Fault> {
        if self.save_depth >= self.config.max_save_depth {
            return Err(Fault::Depth);
        }
        self.save_depth += 1;
        Ok(())
    }

    /// Commit one command. Returns `Ok(true)` at the end of the stream.
    fn apply<K: Canvas + ?Sized>(
        &mut self,
        command: Command<'_>,
        canvas: &mut K,
    ) -> Result<bool, Fault> {
        match command {
            Command::ReportFlags(flags) => self.flags = flags,
            Command::Save(flags) => {
                self.push_save()?;
                canvas.save(flags);
            }
            Command::SaveLayer {
                bounds,
                has_paint,
                flags,
            } => {
                self.push_save()?;
                canvas.save_layer(bounds, has_paint.then_some(&self.paint), flags);
            }
            Command::Restore => {
                if self.save_depth == 0 {
                    tracing::debug!("ignoring unbalanced restore");
                } else {
                    self.save_depth -= 1;
                    canvas.restore();
                }
            }
            Command::Translate(dx, dy) => canvas.translate(dx, dy),
            Command::Scale(sx, sy) => canvas.scale(sx, sy),
            Command::Rotate(deg) => canvas.rotate(deg),
            Command::Skew(sx, sy) => canvas.skew(sx, sy),
            Command::Concat(m) => canvas.concat(m),
            Command::SetMatrix(m) => canvas.set_matrix(m),
            Command::ClipRect {
                rect,
                op,
                anti_alias,
            } => canvas.clip_rect(rect, op, anti_alias),
            Command::ClipPath {
                path,
                op,
                anti_alias,
            } => canvas.clip_path(&path, op, anti_alias),
            Command::ClipRegion { region, op } => canvas.clip_region(&region, op),
            Command::Clear(color) => canvas.clear(color),
            Command::DrawPaint => canvas.draw_paint(&self.paint),
            Command::DrawPoints { mode, points } => canvas.draw_points(mode, &points, &self.paint),
            Command::DrawRect(rect) => canvas.draw_rect(rect, &self.paint),
            Command::DrawPath(path) => canvas.draw_path(&path, &self.paint),
            Command::DrawBitmap {
                handle,
                has_paint,
                left,
                top,
            } => {
                let bitmap = self.bitmap(handle)?;
                let paint = has_paint.then_some(&self.paint);
                canvas.draw_bitmap(&bitmap, left, top, paint);
            }
            Command::DrawBitmapRect {
                handle,
                has_paint,
                src,
                dst,
            } => {
                let bitmap = self.bitmap(handle)?;
                let paint = has_paint.then_some(&self.paint);
                canvas.draw_bitmap_rect(&bitmap, src, dst, paint);
            }
            Command::DrawBitmapNine {
                handle,
                has_paint,
                center,
                dst,
            } => {
                let bitmap = self.bitmap(handle)?;
                let paint = has_paint.then_some(&self.paint);
                canvas.draw_bitmap_nine(&bitmap, center, dst, paint);
            }
            Command::DrawSprite {
                handle,
                has_paint,
                left,
                top,
            } => {
                let bitmap = self.bitmap(handle)?;
                let paint = has_paint.then_some(&self.paint);
                canvas.draw_sprite(&bitmap, left, top, paint);
            }
            Command::DrawText { text, x, y } => canvas.draw_text(text, x, y, &self.paint),
            Command::DrawPosText { text, pos } => canvas.draw_pos_text(text, &pos, &self.paint),
            Command::DrawPosTextH { text, xs, y } => {
                canvas.draw_pos_text_h(text, &xs, y, &self.paint);
            }
            Command::DrawTextOnPath { text, path, matrix } => {
                canvas.draw_text_on_path(text, &path, matrix, &self.paint);
            }
            Command::DrawVertices {
                mode,
                positions,
                tex_coords,
                colors,
                indices,
            } => {
                let vertices = Vertices {
                    mode,
                    positions: &positions,
                    tex_coords: tex_coords.as_deref(),
                    colors: colors.as_deref(),
                    indices: indices.as_deref(),
                };
                canvas.draw_vertices(&vertices, &self.paint);
            }
            Command::DrawData(data) => canvas.draw_data(data),
            Command::Paint(words) => {
                apply_paint_words(&mut self.paint, words, &self.typefaces, &self.effects)?;
            }
            Command::DefTypeface { id, bytes } => {
                check_order("typeface", self.typefaces.len() + 1, id)?;
                let face = self.config.fonts.deserialize(bytes)?;
                self.typefaces.push(face);
            }
            Command::DefFlattenable { handle, effect } => {
                check_order("effect", self.effects.len() + 1, handle)?;
                self.effects.push(Arc::new(effect));
            }
            Command::DefBitmap { handle, bitmap } => {
                check_order("bitmap", self.bitmaps.len(), handle)?;
                self.bitmaps.push(Arc::new(bitmap));
            }
            Command::Done => return Ok(true),
        }
        Ok(false)
    }
}

/// Failure while committing a command.
#[derive(Debug)]
enum Fault {
    Decode(DecodeError),
    Depth,
}

impl From<DecodeError> for Fault {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err)
    }
}
