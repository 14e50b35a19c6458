// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A deliberately tiny rasterizer.

use core::ops::Range;

use kurbo::{Affine, Point, Rect};
use peniko::color::Rgba8;
use understory_pipe::{
    Bitmap, Canvas, CanvasState, IRect, Paint, PaintStyle, Path, PixelFormat, PointF, PointMode,
    RectF, Region, RegionOp, SaveFlags, Vertices,
};

const TRANSPARENT: Rgba8 = Rgba8 {
    r: 0,
    g: 0,
    b: 0,
    a: 0,
};

/// Source-over with straight alpha, rounded to the nearest step.
#[expect(
    clippy::cast_possible_truncation,
    reason = "channel math stays within 0..=255"
)]
fn over(dst: Rgba8, src: Rgba8) -> Rgba8 {
    match src.a {
        255 => src,
        0 => dst,
        a => {
            let a = u32::from(a);
            let inv = 255 - a;
            let mix = |s: u8, d: u8| ((u32::from(s) * a + u32::from(d) * inv + 127) / 255) as u8;
            Rgba8 {
                r: mix(src.r, dst.r),
                g: mix(src.g, dst.g),
                b: mix(src.b, dst.b),
                a: (a + (u32::from(dst.a) * inv + 127) / 255) as u8,
            }
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "channel math stays within 0..=255"
)]
fn with_alpha(c: Rgba8, alpha: u8) -> Rgba8 {
    Rgba8 {
        a: ((u32::from(c.a) * u32::from(alpha) + 127) / 255) as u8,
        ..c
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "channel math stays within 0..=255"
)]
fn sample(bitmap: &Bitmap, x: u32, y: u32, tint: Rgba8) -> Option<Rgba8> {
    let row = bitmap.row(y)?;
    let bpp = bitmap.format().bytes_per_pixel();
    let px = row.get(x as usize * bpp..(x as usize + 1) * bpp)?;
    Some(match bitmap.format() {
        PixelFormat::Rgba8888 => Rgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a: px[3],
        },
        PixelFormat::Bgra8888 => Rgba8 {
            r: px[2],
            g: px[1],
            b: px[0],
            a: px[3],
        },
        PixelFormat::Alpha8 => with_alpha(tint, px[0]),
        PixelFormat::Rgb565 => {
            let v = u16::from_le_bytes([px[0], px[1]]);
            let expand = |bits: u16, max: u16| (u32::from(bits) * 255 / u32::from(max)) as u8;
            Rgba8 {
                r: expand(v >> 11, 31),
                g: expand((v >> 5) & 63, 63),
                b: expand(v & 31, 31),
                a: 255,
            }
        }
        PixelFormat::Index8 => return None,
    })
}

/// Axis-aligned rasterizer over an RGBA buffer.
///
/// A pixel is covered when its center lies inside the shape's device bounding box and the clip
/// bounds. Fills are boxes: rectangles are exact under scale and translate, everything else
/// (paths, meshes, rotated geometry) is filled as its bounding box. Strokes are drawn as the
/// band between the outset and inset box. Bitmaps are sampled nearest-neighbor; nine-patches
/// are stretched whole. Text is not rasterized and layers composite straight into the target.
///
/// These rules are crude but deterministic, which is what comparing two playbacks needs.
#[derive(Clone, Debug)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgba8>,
    state: CanvasState,
}

impl PixelCanvas {
    /// Transparent `width × height` canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width as usize * height as usize],
            state: CanvasState::new(width, height),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// All pixels, row-major.
    pub fn pixels(&self) -> &[Rgba8] {
        &self.pixels
    }

    /// One pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        (x < self.width && y < self.height)
            .then(|| self.pixels[y as usize * self.width as usize + x as usize])
    }

    /// Pixels inside `area`, row-major. Parts outside the canvas are left out.
    pub fn crop(&self, area: IRect) -> Vec<Rgba8> {
        let (xs, ys) = self.span(area.to_kurbo());
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .map(|(x, y)| self.pixels[y * self.width as usize + x])
            .collect()
    }

    /// Current tracked state.
    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    /// Pixel columns and rows whose centers fall inside `r`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "clamped to the canvas size first"
    )]
    fn span(&self, r: Rect) -> (Range<usize>, Range<usize>) {
        let axis = |lo: f64, hi: f64, n: u32| {
            let n = f64::from(n);
            let start = (lo - 0.5).ceil().clamp(0.0, n) as usize;
            let end = (hi - 0.5).ceil().clamp(0.0, n) as usize;
            start..end.max(start)
        };
        (
            axis(r.x0, r.x1, self.width),
            axis(r.y0, r.y1, self.height),
        )
    }

    fn visit(&mut self, device: Rect, mut shade: impl FnMut(Point, Rgba8) -> Rgba8) {
        let area = device.abs().intersect(self.state.clip_bounds());
        let (xs, ys) = self.span(area);
        let width = self.width as usize;
        for y in ys {
            for x in xs.clone() {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let px = &mut self.pixels[y * width + x];
                *px = shade(center, *px);
            }
        }
    }

    fn fill_device(&mut self, device: Rect, color: Rgba8) {
        self.visit(device, |_, dst| over(dst, color));
    }

    fn fill_local(&mut self, local: Rect, paint: &Paint) {
        let local = local.abs();
        match paint.style {
            PaintStyle::Fill => self.fill_device(self.state.map_rect(local), paint.color),
            PaintStyle::Stroke | PaintStyle::StrokeAndFill => {
                let half = (f64::from(paint.stroke_width) / 2.0).max(0.5);
                let outer = self.state.map_rect(local.inflate(half, half));
                let inner = (paint.style == PaintStyle::Stroke
                    && local.width() > 2.0 * half
                    && local.height() > 2.0 * half)
                    .then(|| self.state.map_rect(local.inflate(-half, -half)));
                let color = paint.color;
                self.visit(outer, |p, dst| match inner {
                    Some(hole) if hole.contains(p) => dst,
                    _ => over(dst, color),
                });
            }
        }
    }

    /// Map device pixel centers back through `matrix` into `dst` and sample `src` of `bitmap`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "sample coordinates are clamped by the bitmap lookup"
    )]
    fn blit(&mut self, bitmap: &Bitmap, src: IRect, dst: Rect, matrix: Affine, paint: Option<&Paint>) {
        let dst = dst.abs();
        if matrix.determinant() == 0.0 || dst.is_zero_area() || src.is_empty() {
            return;
        }
        let inverse = matrix.inverse();
        let (alpha, tint) = paint.map_or((255, TRANSPARENT), |p| (p.color.a, p.color));
        let sx = f64::from(src.width()) / dst.width();
        let sy = f64::from(src.height()) / dst.height();
        self.visit(matrix.transform_rect_bbox(dst), |p, px| {
            let q = inverse * p;
            if !dst.contains(q) {
                return px;
            }
            let u = (f64::from(src.left) + ((q.x - dst.x0) * sx).floor()) as u32;
            let v = (f64::from(src.top) + ((q.y - dst.y0) * sy).floor()) as u32;
            match sample(bitmap, u, v, tint) {
                Some(c) => over(px, with_alpha(c, alpha)),
                None => px,
            }
        });
    }

    fn whole(bitmap: &Bitmap) -> IRect {
        IRect::new(
            0,
            0,
            i32::try_from(bitmap.width()).unwrap_or(i32::MAX),
            i32::try_from(bitmap.height()).unwrap_or(i32::MAX),
        )
    }
}

impl Canvas for PixelCanvas {
    fn save(&mut self, _flags: SaveFlags) {
        self.state.save();
    }

    fn save_layer(&mut self, _bounds: Option<RectF>, _paint: Option<&Paint>, _flags: SaveFlags) {
        self.state.save();
    }

    fn restore(&mut self) {
        self.state.restore();
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.state.translate(dx, dy);
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.state.scale(sx, sy);
    }

    fn rotate(&mut self, degrees: f32) {
        self.state.rotate(degrees);
    }

    fn skew(&mut self, sx: f32, sy: f32) {
        self.state.skew(sx, sy);
    }

    fn concat(&mut self, matrix: Affine) {
        self.state.concat(matrix);
    }

    fn set_matrix(&mut self, matrix: Affine) {
        self.state.set_matrix(matrix);
    }

    fn clip_rect(&mut self, rect: RectF, op: RegionOp, _anti_alias: bool) {
        self.state.clip_local(Some(rect.to_kurbo()), op);
    }

    fn clip_path(&mut self, path: &Path, op: RegionOp, _anti_alias: bool) {
        self.state.clip_local(path.bounds(), op);
    }

    fn clip_region(&mut self, region: &Region, op: RegionOp) {
        self.state.clip_device(region.bounds(), op);
    }

    fn clear(&mut self, color: Rgba8) {
        self.visit(self.state.clip_bounds(), |_, _| color);
    }

    fn draw_paint(&mut self, paint: &Paint) {
        self.fill_device(self.state.clip_bounds(), paint.color);
    }

    fn draw_points(&mut self, mode: PointMode, points: &[PointF], paint: &Paint) {
        let half = f64::from(paint.stroke_width.max(1.0)) / 2.0;
        let dot = |p: &PointF| {
            let k = p.to_kurbo();
            Rect::from_center_size(k, (2.0 * half, 2.0 * half))
        };
        match mode {
            PointMode::Points => {
                for p in points {
                    self.fill_device(self.state.map_rect(dot(p)), paint.color);
                }
            }
            // Segments are boxed like everything else.
            PointMode::Lines => {
                for pair in points.chunks_exact(2) {
                    let r = dot(&pair[0]).union(dot(&pair[1]));
                    self.fill_device(self.state.map_rect(r), paint.color);
                }
            }
            PointMode::Polygon => {
                for pair in points.windows(2) {
                    let r = dot(&pair[0]).union(dot(&pair[1]));
                    self.fill_device(self.state.map_rect(r), paint.color);
                }
            }
        }
    }

    fn draw_rect(&mut self, rect: RectF, paint: &Paint) {
        self.fill_local(rect.to_kurbo(), paint);
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        if let Some(bounds) = path.bounds() {
            self.fill_local(bounds, paint);
        }
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, left: f32, top: f32, paint: Option<&Paint>) {
        let dst = Rect::new(
            f64::from(left),
            f64::from(top),
            f64::from(left) + f64::from(bitmap.width()),
            f64::from(top) + f64::from(bitmap.height()),
        );
        self.blit(bitmap, Self::whole(bitmap), dst, self.state.matrix(), paint);
    }

    fn draw_bitmap_rect(
        &mut self,
        bitmap: &Bitmap,
        src: Option<IRect>,
        dst: RectF,
        paint: Option<&Paint>,
    ) {
        let whole = Self::whole(bitmap);
        let src = src.map_or(whole, |s| {
            IRect::new(
                s.left.max(0),
                s.top.max(0),
                s.right.min(whole.right),
                s.bottom.min(whole.bottom),
            )
        });
        self.blit(bitmap, src, dst.to_kurbo(), self.state.matrix(), paint);
    }

    fn draw_bitmap_matrix(&mut self, bitmap: &Bitmap, matrix: Affine, paint: Option<&Paint>) {
        let dst = Rect::new(0.0, 0.0, f64::from(bitmap.width()), f64::from(bitmap.height()));
        self.blit(bitmap, Self::whole(bitmap), dst, self.state.matrix() * matrix, paint);
    }

    fn draw_bitmap_nine(
        &mut self,
        bitmap: &Bitmap,
        _center: IRect,
        dst: RectF,
        paint: Option<&Paint>,
    ) {
        self.blit(bitmap, Self::whole(bitmap), dst.to_kurbo(), self.state.matrix(), paint);
    }

    fn draw_sprite(&mut self, bitmap: &Bitmap, left: i32, top: i32, paint: Option<&Paint>) {
        let dst = Rect::new(
            f64::from(left),
            f64::from(top),
            f64::from(left) + f64::from(bitmap.width()),
            f64::from(top) + f64::from(bitmap.height()),
        );
        self.blit(bitmap, Self::whole(bitmap), dst, Affine::IDENTITY, paint);
    }

    fn draw_text(&mut self, _text: &[u8], _x: f32, _y: f32, _paint: &Paint) {
        tracing::trace!("text is not rasterized");
    }

    fn draw_pos_text(&mut self, _text: &[u8], _pos: &[PointF], _paint: &Paint) {
        tracing::trace!("text is not rasterized");
    }

    fn draw_pos_text_h(&mut self, _text: &[u8], _xs: &[f32], _y: f32, _paint: &Paint) {
        tracing::trace!("text is not rasterized");
    }

    fn draw_text_on_path(
        &mut self,
        _text: &[u8],
        _path: &Path,
        _matrix: Option<Affine>,
        _paint: &Paint,
    ) {
        tracing::trace!("text is not rasterized");
    }

    fn draw_vertices(&mut self, vertices: &Vertices<'_>, paint: &Paint) {
        if let Some(bounds) = vertices.bounds() {
            self.fill_local(bounds, paint);
        }
    }

    fn draw_data(&mut self, _data: &[u8]) {}

    fn local_clip_bounds(&self) -> Option<RectF> {
        let m = self.state.matrix();
        (m.determinant() != 0.0)
            .then(|| RectF::from_kurbo(m.inverse().transform_rect_bbox(self.state.clip_bounds())))
    }
}
