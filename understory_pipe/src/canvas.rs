// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing-surface contract shared by the recorder and playback targets.

use kurbo::{Affine, Rect};
use peniko::color::Rgba8;

use crate::bitmap::Bitmap;
use crate::geometry::{IRect, Path, PointF, PointMode, RectF, Region, RegionOp, Vertices};
use crate::paint::Paint;
use crate::picture::Picture;

bitflags::bitflags! {
    /// What a save scope covers.
    ///
    /// Carried through the stream unchanged. [`CanvasState`] always saves both matrix and clip.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct SaveFlags: u32 {
        /// Restore the matrix.
        const MATRIX = 1 << 0;
        /// Restore the clip.
        const CLIP = 1 << 1;
        /// The layer needs an alpha channel.
        const HAS_ALPHA_LAYER = 1 << 2;
        /// The layer needs full color precision.
        const FULL_COLOR_LAYER = 1 << 3;
        /// Clip drawing to the layer bounds.
        const CLIP_TO_LAYER = 1 << 4;
    }
}

impl Default for SaveFlags {
    fn default() -> Self {
        Self::MATRIX
            | Self::CLIP
            | Self::HAS_ALPHA_LAYER
            | Self::FULL_COLOR_LAYER
            | Self::CLIP_TO_LAYER
    }
}

/// A drawing surface.
///
/// Drawing calls are immediate: implementations either rasterize, forward or record them.
/// Text is passed as bytes interpreted through the paint's text encoding.
pub trait Canvas {
    /// Push the matrix and clip.
    fn save(&mut self, flags: SaveFlags);

    /// Push the matrix and clip and start an offscreen layer, composited with `paint` on restore.
    fn save_layer(&mut self, bounds: Option<RectF>, paint: Option<&Paint>, flags: SaveFlags);

    /// Pop the most recent save. Unbalanced restores are ignored.
    fn restore(&mut self);

    /// Pre-translate the matrix.
    fn translate(&mut self, dx: f32, dy: f32);

    /// Pre-scale the matrix.
    fn scale(&mut self, sx: f32, sy: f32);

    /// Pre-rotate the matrix by `degrees` clockwise.
    fn rotate(&mut self, degrees: f32);

    /// Pre-skew the matrix.
    fn skew(&mut self, sx: f32, sy: f32);

    /// Pre-multiply the matrix.
    fn concat(&mut self, matrix: Affine);

    /// Replace the matrix.
    fn set_matrix(&mut self, matrix: Affine);

    /// Combine the clip with a rectangle in local coordinates.
    fn clip_rect(&mut self, rect: RectF, op: RegionOp, anti_alias: bool);

    /// Combine the clip with a path in local coordinates.
    fn clip_path(&mut self, path: &Path, op: RegionOp, anti_alias: bool);

    /// Combine the clip with a region in device coordinates.
    fn clip_region(&mut self, region: &Region, op: RegionOp);

    /// Fill the clip with `color`, ignoring the matrix.
    fn clear(&mut self, color: Rgba8);

    /// Fill the clip with `paint`.
    fn draw_paint(&mut self, paint: &Paint);

    /// Draw points, segments or a polyline.
    fn draw_points(&mut self, mode: PointMode, points: &[PointF], paint: &Paint);

    /// Draw a rectangle.
    fn draw_rect(&mut self, rect: RectF, paint: &Paint);

    /// Draw a path.
    fn draw_path(&mut self, path: &Path, paint: &Paint);

    /// Draw a bitmap with its top-left corner at `(left, top)`.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, left: f32, top: f32, paint: Option<&Paint>);

    /// Draw the `src` part of a bitmap (all of it when `None`) scaled into `dst`.
    fn draw_bitmap_rect(
        &mut self,
        bitmap: &Bitmap,
        src: Option<IRect>,
        dst: RectF,
        paint: Option<&Paint>,
    );

    /// Draw a bitmap through an extra matrix.
    fn draw_bitmap_matrix(&mut self, bitmap: &Bitmap, matrix: Affine, paint: Option<&Paint>);

    /// Draw a bitmap as a nine-patch: corners unscaled, `center` stretched to fill `dst`.
    fn draw_bitmap_nine(
        &mut self,
        bitmap: &Bitmap,
        center: IRect,
        dst: RectF,
        paint: Option<&Paint>,
    );

    /// Draw a bitmap at device pixel `(left, top)`, ignoring the matrix.
    fn draw_sprite(&mut self, bitmap: &Bitmap, left: i32, top: i32, paint: Option<&Paint>);

    /// Draw text starting at `(x, y)`.
    fn draw_text(&mut self, text: &[u8], x: f32, y: f32, paint: &Paint);

    /// Draw text with one position per glyph.
    fn draw_pos_text(&mut self, text: &[u8], pos: &[PointF], paint: &Paint);

    /// Draw text with one x per glyph on a shared baseline.
    fn draw_pos_text_h(&mut self, text: &[u8], xs: &[f32], y: f32, paint: &Paint);

    /// Draw text along a path.
    fn draw_text_on_path(
        &mut self,
        text: &[u8],
        path: &Path,
        matrix: Option<Affine>,
        paint: &Paint,
    );

    /// Draw a triangle mesh.
    fn draw_vertices(&mut self, vertices: &Vertices<'_>, paint: &Paint);

    /// Pass opaque bytes through to the target.
    fn draw_data(&mut self, data: &[u8]);

    /// Replay a recorded picture into this surface.
    fn draw_picture(&mut self, picture: &Picture) {
        if let Err(err) = picture.playback(self) {
            tracing::warn!(%err, "nested picture playback failed");
        }
    }

    /// Clip bounds mapped back into the current local coordinates, if known.
    ///
    /// Picture playback uses this to skip instructions that cannot touch the clip.
    fn local_clip_bounds(&self) -> Option<RectF> {
        None
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Frame {
    matrix: Affine,
    clip: Rect,
}

/// Matrix and device clip bounds tracker.
///
/// The clip is kept as a conservative device-space rectangle: operations that can only shrink
/// the real clip shrink it, operations that can grow it grow it to the bounding box.
#[derive(Clone, Debug)]
pub struct CanvasState {
    device: Rect,
    current: Frame,
    stack: Vec<Frame>,
}

impl CanvasState {
    /// Fresh state for a device of the given size: identity matrix, clip equal to the device.
    pub fn new(width: u32, height: u32) -> Self {
        let device = Rect::new(0.0, 0.0, f64::from(width), f64::from(height));
        Self {
            device,
            current: Frame {
                matrix: Affine::IDENTITY,
                clip: device,
            },
            stack: Vec::new(),
        }
    }

    /// Current matrix.
    pub fn matrix(&self) -> Affine {
        self.current.matrix
    }

    /// Current device clip bounds. May have zero area.
    pub fn clip_bounds(&self) -> Rect {
        self.current.clip
    }

    /// Returns `true` when nothing can be drawn.
    pub fn is_clip_empty(&self) -> bool {
        self.current.clip.is_zero_area()
    }

    /// Number of saves not yet restored.
    pub fn save_count(&self) -> usize {
        self.stack.len()
    }

    /// Push the current frame.
    pub fn save(&mut self) {
        self.stack.push(self.current);
    }

    /// Pop a frame. Returns `false` if there was nothing to pop.
    pub fn restore(&mut self) -> bool {
        match self.stack.pop() {
            Some(frame) => {
                self.current = frame;
                true
            }
            None => false,
        }
    }

    /// Pre-multiply the matrix.
    pub fn concat(&mut self, m: Affine) {
        self.current.matrix *= m;
    }

    /// Replace the matrix.
    pub fn set_matrix(&mut self, m: Affine) {
        self.current.matrix = m;
    }

    /// Pre-translate.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.concat(Affine::translate((f64::from(dx), f64::from(dy))));
    }

    /// Pre-scale.
    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.concat(Affine::scale_non_uniform(f64::from(sx), f64::from(sy)));
    }

    /// Pre-rotate by degrees.
    pub fn rotate(&mut self, degrees: f32) {
        self.concat(Affine::rotate(f64::from(degrees).to_radians()));
    }

    /// Pre-skew.
    pub fn skew(&mut self, sx: f32, sy: f32) {
        self.concat(Affine::skew(f64::from(sx), f64::from(sy)));
    }

    /// Device bounds of a local rectangle under the current matrix.
    pub fn map_rect(&self, r: Rect) -> Rect {
        self.current.matrix.transform_rect_bbox(r)
    }

    /// Combine the clip with local-space bounds.
    pub fn clip_local(&mut self, bounds: Option<Rect>, op: RegionOp) {
        let device = bounds.map(|b| self.map_rect(b));
        self.clip_device(device, op);
    }

    /// Combine the clip with device-space bounds. `None` is an empty shape.
    pub fn clip_device(&mut self, bounds: Option<Rect>, op: RegionOp) {
        let empty = Rect::new(
            self.current.clip.x0,
            self.current.clip.y0,
            self.current.clip.x0,
            self.current.clip.y0,
        );
        let shape = bounds.map(|b| b.abs().intersect(self.device));
        let clip = self.current.clip;
        self.current.clip = match (op, shape) {
            (RegionOp::Intersect, Some(s)) => clip.intersect(s),
            (RegionOp::Intersect, None) => empty,
            (RegionOp::Difference, _) => clip,
            (RegionOp::Union | RegionOp::Xor, Some(s)) => {
                if clip.is_zero_area() {
                    s
                } else if s.is_zero_area() {
                    clip
                } else {
                    clip.union(s)
                }
            }
            (RegionOp::Union | RegionOp::Xor, None) => clip,
            (RegionOp::ReverseDifference | RegionOp::Replace, Some(s)) => s,
            (RegionOp::ReverseDifference | RegionOp::Replace, None) => empty,
        };
    }
}
