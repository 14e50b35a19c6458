// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Pipe: record drawing-surface calls into a compact instruction stream and play
//! them back.
//!
//! A producer draws on a [`PipeCanvas`], which encodes every call as 32-bit words and hands
//! them to a [`PipeController`] block by block. A consumer feeds the bytes to a
//! [`PipeReader`], which decodes them and re-issues the calls on any [`Canvas`].
//!
//! # The stream
//!
//! Every instruction starts with a header word: 8 bits of opcode, 4 bits of flags and 20 bits
//! of inline data (see [`op`]). Payload words follow in little-endian order; byte blobs are
//! length-prefixed and padded to a word boundary.
//!
//! The stream never repeats what the reader already knows:
//!
//! - **Paint deltas**: before a draw, only the paint fields that changed since the last draw
//!   are sent, in a fixed field order.
//! - **Definitions**: effects, typefaces and (cross-process) bitmaps are defined once and then
//!   referenced by a small handle. Equal effects share a handle because they are
//!   deduplicated by their encoding.
//! - **Shared heap**: in the same address space, bitmaps travel as [`HeapId`]s into a
//!   [`SharedHeap`] that both sides hold. Immutable pixels are shared rather than copied.
//!
//! # Flow control
//!
//! [`BlockWriter`] asks the controller for room before each instruction and reports written
//! bytes as they become complete. A controller that refuses a block ends the stream: the
//! producer keeps accepting calls and drops them, so drawing code never sees an error.
//!
//! # Playback
//!
//! [`PipeReader::playback`] processes whole instructions and may be called again with more
//! bytes. An [`AbortHandle`] stops playback between instructions from any thread.
//!
//! # Pictures
//!
//! [`PictureRecorder`] records into memory and produces a [`Picture`]. With
//! [`RecordFlags::OPTIMIZE_FOR_CLIPPED_PLAYBACK`] the picture also carries an R-tree over
//! draw bounds and a tree of save scopes, so [`Picture::playback`] can skip whatever cannot
//! touch the target's clip.
//!
//! ```rust
//! use understory_pipe::{Canvas, Paint, PictureRecorder, RecordConfig, RectF, SaveFlags};
//! use peniko::color::palette::css::RED;
//!
//! let mut recorder = PictureRecorder::new(100, 100, &RecordConfig::new()).unwrap();
//! let canvas = recorder.canvas();
//! canvas.save(SaveFlags::default());
//! canvas.translate(10.0, 10.0);
//! canvas.draw_rect(RectF::new(0.0, 0.0, 20.0, 20.0), &Paint::new(RED.to_rgba8()));
//! canvas.restore();
//! let picture = recorder.finish_recording();
//! assert!(!picture.bytes().is_empty());
//! ```

mod bitmap;
mod canvas;
mod config;
mod effect;
mod error;
mod flatten;
mod geometry;
mod heap;
pub mod op;
mod paint;
mod paint_delta;
mod picture;
mod playback;
mod record;
mod typeface;
mod words;
mod writer;

#[cfg(test)]
mod testing;

pub use bitmap::{Bitmap, PixelFormat, PixelStorage};
pub use canvas::{Canvas, CanvasState, SaveFlags};
pub use config::{
    DEFAULT_DEVICE_SIZE, DEFAULT_MAX_SAVE_DEPTH, DEFAULT_MIN_BLOCK_SIZE, PlaybackConfig,
    RecordConfig, RecordFlags,
};
pub use effect::{
    BlurStyle, ColorFilter, DrawLooper, Effect, EffectSlot, GradientStop, ImageFilter,
    MaskFilter, PathEffect, Rasterizer, Shader,
};
pub use error::{BitmapError, ConfigError, DecodeError, PlaybackError};
pub use flatten::{FlatTable, Interned};
pub use geometry::{
    IRect, Path, PathCmd, PointF, PointMode, RectF, Region, RegionOp, VertexMode, Vertices,
};
pub use heap::{BitmapHeap, HeapId, SharedHeap};
pub use paint::{Hinting, Paint, PaintFlags, PaintStyle, StrokeCap, StrokeJoin, TextAlign, TextEncoding};
pub use paint_delta::{PaintDeltaEncoder, PaintResources, PaintWords, apply_paint_words};
pub use picture::{Picture, PictureIndex, PictureRecorder};
pub use playback::{AbortHandle, PipeReader, PlaybackState, PlaybackStatus, SkipRange};
pub use record::PipeCanvas;
pub use typeface::{FontRegistry, FontStyle, MAX_FONT_DATA, Typeface};
pub use writer::{BlockWriter, MemoryController, PipeController};

pub use understory_bbh::RTreeConfig;
