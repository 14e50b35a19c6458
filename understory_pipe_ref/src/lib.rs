// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Pipe reference surfaces.
//!
//! Two small [`Canvas`](understory_pipe::Canvas) implementations for tests and debugging:
//!
//! - [`RefCanvas`] logs every call, with owned arguments and the matrix and clip in effect,
//!   so a recording can be compared call by call against its playback.
//! - [`PixelCanvas`] rasterizes axis-aligned boxes into an RGBA buffer, so a clipped playback
//!   can be compared pixel by pixel against a full one.
//!
//! Neither is a renderer. They do not define how anything should look.
//!
//! ```rust
//! use understory_pipe::{Canvas, Paint, PictureRecorder, RecordConfig, RectF, SaveFlags};
//! use understory_pipe_ref::RefCanvas;
//!
//! let mut recorder = PictureRecorder::new(64, 64, &RecordConfig::new()).unwrap();
//! let canvas = recorder.canvas();
//! canvas.save(SaveFlags::default());
//! canvas.translate(10.0, 10.0);
//! canvas.draw_rect(RectF::new(0.0, 0.0, 8.0, 8.0), &Paint::default());
//! canvas.restore();
//! let picture = recorder.finish_recording();
//!
//! let mut log = RefCanvas::new(64, 64);
//! picture.playback(&mut log).unwrap();
//! assert_eq!(log.names(), ["save", "translate", "draw_rect", "restore"]);
//! ```

mod events;
mod pixels;

pub use events::{BitmapSnapshot, Call, Event, MeshSnapshot, RefCanvas, StateSnapshot};
pub use pixels::PixelCanvas;
