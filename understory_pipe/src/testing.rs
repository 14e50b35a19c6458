// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Call log canvas for unit tests.

use kurbo::Affine;
use peniko::color::Rgba8;

use crate::bitmap::Bitmap;
use crate::canvas::{Canvas, SaveFlags};
use crate::geometry::{IRect, Path, PointF, PointMode, RectF, Region, RegionOp, Vertices};
use crate::paint::Paint;

/// Records the name of every call plus the arguments tests tend to look at.
#[derive(Debug, Default)]
pub(crate) struct OpLog {
    pub(crate) ops: Vec<&'static str>,
    pub(crate) paints: Vec<Paint>,
    pub(crate) rects: Vec<RectF>,
    pub(crate) bitmaps: Vec<Bitmap>,
    pub(crate) data: Vec<Vec<u8>>,
}

impl OpLog {
    fn paint(&mut self, op: &'static str, paint: Option<&Paint>) {
        self.ops.push(op);
        if let Some(p) = paint {
            self.paints.push(p.clone());
        }
    }
}

impl Canvas for OpLog {
    fn save(&mut self, _: SaveFlags) {
        self.ops.push("save");
    }
    fn save_layer(&mut self, _: Option<RectF>, paint: Option<&Paint>, _: SaveFlags) {
        self.paint("save_layer", paint);
    }
    fn restore(&mut self) {
        self.ops.push("restore");
    }
    fn translate(&mut self, _: f32, _: f32) {
        self.ops.push("translate");
    }
    fn scale(&mut self, _: f32, _: f32) {
        self.ops.push("scale");
    }
    fn rotate(&mut self, _: f32) {
        self.ops.push("rotate");
    }
    fn skew(&mut self, _: f32, _: f32) {
        self.ops.push("skew");
    }
    fn concat(&mut self, _: Affine) {
        self.ops.push("concat");
    }
    fn set_matrix(&mut self, _: Affine) {
        self.ops.push("set_matrix");
    }
    fn clip_rect(&mut self, rect: RectF, _: RegionOp, _: bool) {
        self.ops.push("clip_rect");
        self.rects.push(rect);
    }
    fn clip_path(&mut self, _: &Path, _: RegionOp, _: bool) {
        self.ops.push("clip_path");
    }
    fn clip_region(&mut self, _: &Region, _: RegionOp) {
        self.ops.push("clip_region");
    }
    fn clear(&mut self, _: Rgba8) {
        self.ops.push("clear");
    }
    fn draw_paint(&mut self, paint: &Paint) {
        self.paint("draw_paint", Some(paint));
    }
    fn draw_points(&mut self, _: PointMode, _: &[PointF], paint: &Paint) {
        self.paint("draw_points", Some(paint));
    }
    fn draw_rect(&mut self, rect: RectF, paint: &Paint) {
        self.paint("draw_rect", Some(paint));
        self.rects.push(rect);
    }
    fn draw_path(&mut self, _: &Path, paint: &Paint) {
        self.paint("draw_path", Some(paint));
    }
    fn draw_bitmap(&mut self, bitmap: &Bitmap, _: f32, _: f32, paint: Option<&Paint>) {
        self.paint("draw_bitmap", paint);
        self.bitmaps.push(bitmap.clone());
    }
    fn draw_bitmap_rect(&mut self, bitmap: &Bitmap, _: Option<IRect>, dst: RectF, paint: Option<&Paint>) {
        self.paint("draw_bitmap_rect", paint);
        self.bitmaps.push(bitmap.clone());
        self.rects.push(dst);
    }
    fn draw_bitmap_matrix(&mut self, bitmap: &Bitmap, _: Affine, paint: Option<&Paint>) {
        self.paint("draw_bitmap_matrix", paint);
        self.bitmaps.push(bitmap.clone());
    }
    fn draw_bitmap_nine(&mut self, bitmap: &Bitmap, _: IRect, dst: RectF, paint: Option<&Paint>) {
        self.paint("draw_bitmap_nine", paint);
        self.bitmaps.push(bitmap.clone());
        self.rects.push(dst);
    }
    fn draw_sprite(&mut self, bitmap: &Bitmap, _: i32, _: i32, paint: Option<&Paint>) {
        self.paint("draw_sprite", paint);
        self.bitmaps.push(bitmap.clone());
    }
    fn draw_text(&mut self, text: &[u8], _: f32, _: f32, paint: &Paint) {
        self.paint("draw_text", Some(paint));
        self.data.push(text.to_vec());
    }
    fn draw_pos_text(&mut self, text: &[u8], _: &[PointF], paint: &Paint) {
        self.paint("draw_pos_text", Some(paint));
        self.data.push(text.to_vec());
    }
    fn draw_pos_text_h(&mut self, text: &[u8], _: &[f32], _: f32, paint: &Paint) {
        self.paint("draw_pos_text_h", Some(paint));
        self.data.push(text.to_vec());
    }
    fn draw_text_on_path(&mut self, text: &[u8], _: &Path, _: Option<Affine>, paint: &Paint) {
        self.paint("draw_text_on_path", Some(paint));
        self.data.push(text.to_vec());
    }
    fn draw_vertices(&mut self, _: &Vertices<'_>, paint: &Paint) {
        self.paint("draw_vertices", Some(paint));
    }
    fn draw_data(&mut self, data: &[u8]) {
        self.ops.push("draw_data");
        self.data.push(data.to_vec());
    }
}
