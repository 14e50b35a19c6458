// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event-log surface.

use kurbo::{Affine, Rect};
use peniko::color::Rgba8;
use understory_pipe::{
    Bitmap, Canvas, CanvasState, DEFAULT_DEVICE_SIZE, IRect, Paint, Path, PixelFormat, PointF,
    PointMode, RectF, Region, RegionOp, SaveFlags, VertexMode, Vertices,
};

/// Matrix and clip in effect when a call arrived.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StateSnapshot {
    /// Current matrix.
    pub matrix: Affine,
    /// Device clip bounds.
    pub clip: Rect,
    /// Saves not yet restored.
    pub save_count: usize,
}

/// Visible pixels of a bitmap, copied out so calls can be compared by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitmapSnapshot {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Rows packed tightly.
    pub pixels: Vec<u8>,
}

impl From<&Bitmap> for BitmapSnapshot {
    fn from(bitmap: &Bitmap) -> Self {
        Self {
            width: bitmap.width(),
            height: bitmap.height(),
            format: bitmap.format(),
            pixels: bitmap.read_pixels(),
        }
    }
}

/// Owned copy of a [`Vertices`] mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshSnapshot {
    /// Primitive assembly.
    pub mode: VertexMode,
    /// Positions.
    pub positions: Vec<PointF>,
    /// Texture coordinates.
    pub tex_coords: Option<Vec<PointF>>,
    /// Per-vertex colors.
    pub colors: Option<Vec<Rgba8>>,
    /// Index buffer.
    pub indices: Option<Vec<u16>>,
}

impl From<&Vertices<'_>> for MeshSnapshot {
    fn from(v: &Vertices<'_>) -> Self {
        Self {
            mode: v.mode,
            positions: v.positions.to_vec(),
            tex_coords: v.tex_coords.map(<[_]>::to_vec),
            colors: v.colors.map(<[_]>::to_vec),
            indices: v.indices.map(<[_]>::to_vec),
        }
    }
}

/// One [`Canvas`] call with owned arguments.
#[derive(Clone, Debug, PartialEq)]
#[expect(missing_docs, reason = "variants mirror the Canvas methods of the same name")]
pub enum Call {
    Save(SaveFlags),
    SaveLayer {
        bounds: Option<RectF>,
        paint: Option<Paint>,
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
    DrawPaint(Paint),
    DrawPoints {
        mode: PointMode,
        points: Vec<PointF>,
        paint: Paint,
    },
    DrawRect {
        rect: RectF,
        paint: Paint,
    },
    DrawPath {
        path: Path,
        paint: Paint,
    },
    DrawBitmap {
        bitmap: BitmapSnapshot,
        left: f32,
        top: f32,
        paint: Option<Paint>,
    },
    DrawBitmapRect {
        bitmap: BitmapSnapshot,
        src: Option<IRect>,
        dst: RectF,
        paint: Option<Paint>,
    },
    DrawBitmapMatrix {
        bitmap: BitmapSnapshot,
        matrix: Affine,
        paint: Option<Paint>,
    },
    DrawBitmapNine {
        bitmap: BitmapSnapshot,
        center: IRect,
        dst: RectF,
        paint: Option<Paint>,
    },
    DrawSprite {
        bitmap: BitmapSnapshot,
        left: i32,
        top: i32,
        paint: Option<Paint>,
    },
    DrawText {
        text: Vec<u8>,
        x: f32,
        y: f32,
        paint: Paint,
    },
    DrawPosText {
        text: Vec<u8>,
        pos: Vec<PointF>,
        paint: Paint,
    },
    DrawPosTextH {
        text: Vec<u8>,
        xs: Vec<f32>,
        y: f32,
        paint: Paint,
    },
    DrawTextOnPath {
        text: Vec<u8>,
        path: Path,
        matrix: Option<Affine>,
        paint: Paint,
    },
    DrawVertices {
        mesh: MeshSnapshot,
        paint: Paint,
    },
    DrawData(Vec<u8>),
}

impl Call {
    /// Name of the [`Canvas`] method that produced this call.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Save(_) => "save",
            Self::SaveLayer { .. } => "save_layer",
            Self::Restore => "restore",
            Self::Translate(..) => "translate",
            Self::Scale(..) => "scale",
            Self::Rotate(_) => "rotate",
            Self::Skew(..) => "skew",
            Self::Concat(_) => "concat",
            Self::SetMatrix(_) => "set_matrix",
            Self::ClipRect { .. } => "clip_rect",
            Self::ClipPath { .. } => "clip_path",
            Self::ClipRegion { .. } => "clip_region",
            Self::Clear(_) => "clear",
            Self::DrawPaint(_) => "draw_paint",
            Self::DrawPoints { .. } => "draw_points",
            Self::DrawRect { .. } => "draw_rect",
            Self::DrawPath { .. } => "draw_path",
            Self::DrawBitmap { .. } => "draw_bitmap",
            Self::DrawBitmapRect { .. } => "draw_bitmap_rect",
            Self::DrawBitmapMatrix { .. } => "draw_bitmap_matrix",
            Self::DrawBitmapNine { .. } => "draw_bitmap_nine",
            Self::DrawSprite { .. } => "draw_sprite",
            Self::DrawText { .. } => "draw_text",
            Self::DrawPosText { .. } => "draw_pos_text",
            Self::DrawPosTextH { .. } => "draw_pos_text_h",
            Self::DrawTextOnPath { .. } => "draw_text_on_path",
            Self::DrawVertices { .. } => "draw_vertices",
            Self::DrawData(_) => "draw_data",
        }
    }

    /// Returns `true` for calls that produce pixels.
    pub fn is_draw(&self) -> bool {
        !matches!(
            self,
            Self::Save(_)
                | Self::SaveLayer { .. }
                | Self::Restore
                | Self::Translate(..)
                | Self::Scale(..)
                | Self::Rotate(_)
                | Self::Skew(..)
                | Self::Concat(_)
                | Self::SetMatrix(_)
                | Self::ClipRect { .. }
                | Self::ClipPath { .. }
                | Self::ClipRegion { .. }
                | Self::DrawData(_)
        )
    }
}

/// A call and the state it was applied in. For state calls the snapshot is taken after the
/// call.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// What was called.
    pub call: Call,
    /// State at the time.
    pub state: StateSnapshot,
}

/// Surface that logs every call with a state snapshot.
///
/// This is not a renderer. It exists for tests that compare call sequences, for example a
/// recording against its playback.
#[derive(Clone, Debug)]
pub struct RefCanvas {
    state: CanvasState,
    events: Vec<Event>,
}

impl Default for RefCanvas {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_SIZE, DEFAULT_DEVICE_SIZE)
    }
}

impl RefCanvas {
    /// Surface over a `width × height` device.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: CanvasState::new(width, height),
            events: Vec::new(),
        }
    }

    /// Events in the order they were applied.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Calls without their snapshots.
    pub fn calls(&self) -> impl Iterator<Item = &Call> + '_ {
        self.events.iter().map(|e| &e.call)
    }

    /// Method names, handy for short assertions.
    pub fn names(&self) -> Vec<&'static str> {
        self.calls().map(Call::name).collect()
    }

    /// Drop the log but keep the current state.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Current tracked state.
    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            matrix: self.state.matrix(),
            clip: self.state.clip_bounds(),
            save_count: self.state.save_count(),
        }
    }

    fn push(&mut self, call: Call) {
        let state = self.snapshot();
        self.events.push(Event { call, state });
    }
}

impl Canvas for RefCanvas {
    fn save(&mut self, flags: SaveFlags) {
        self.state.save();
        self.push(Call::Save(flags));
    }

    fn save_layer(&mut self, bounds: Option<RectF>, paint: Option<&Paint>, flags: SaveFlags) {
        self.state.save();
        self.push(Call::SaveLayer {
            bounds,
            paint: paint.cloned(),
            flags,
        });
    }

    fn restore(&mut self) {
        if self.state.restore() {
            self.push(Call::Restore);
        }
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.state.translate(dx, dy);
        self.push(Call::Translate(dx, dy));
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.state.scale(sx, sy);
        self.push(Call::Scale(sx, sy));
    }

    fn rotate(&mut self, degrees: f32) {
        self.state.rotate(degrees);
        self.push(Call::Rotate(degrees));
    }

    fn skew(&mut self, sx: f32, sy: f32) {
        self.state.skew(sx, sy);
        self.push(Call::Skew(sx, sy));
    }

    fn concat(&mut self, matrix: Affine) {
        self.state.concat(matrix);
        self.push(Call::Concat(matrix));
    }

    fn set_matrix(&mut self, matrix: Affine) {
        self.state.set_matrix(matrix);
        self.push(Call::SetMatrix(matrix));
    }

    fn clip_rect(&mut self, rect: RectF, op: RegionOp, anti_alias: bool) {
        self.state.clip_local(Some(rect.to_kurbo()), op);
        self.push(Call::ClipRect {
            rect,
            op,
            anti_alias,
        });
    }

    fn clip_path(&mut self, path: &Path, op: RegionOp, anti_alias: bool) {
        self.state.clip_local(path.bounds(), op);
        self.push(Call::ClipPath {
            path: path.clone(),
            op,
            anti_alias,
        });
    }

    fn clip_region(&mut self, region: &Region, op: RegionOp) {
        self.state.clip_device(region.bounds(), op);
        self.push(Call::ClipRegion {
            region: region.clone(),
            op,
        });
    }

    fn clear(&mut self, color: Rgba8) {
        self.push(Call::Clear(color));
    }

    fn draw_paint(&mut self, paint: &Paint) {
        self.push(Call::DrawPaint(paint.clone()));
    }

    fn draw_points(&mut self, mode: PointMode, points: &[PointF], paint: &Paint) {
        self.push(Call::DrawPoints {
            mode,
            points: points.to_vec(),
            paint: paint.clone(),
        });
    }

    fn draw_rect(&mut self, rect: RectF, paint: &Paint) {
        self.push(Call::DrawRect {
            rect,
            paint: paint.clone(),
        });
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        self.push(Call::DrawPath {
            path: path.clone(),
            paint: paint.clone(),
        });
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, left: f32, top: f32, paint: Option<&Paint>) {
        self.push(Call::DrawBitmap {
            bitmap: bitmap.into(),
            left,
            top,
            paint: paint.cloned(),
        });
    }

    fn draw_bitmap_rect(
        &mut self,
        bitmap: &Bitmap,
        src: Option<IRect>,
        dst: RectF,
        paint: Option<&Paint>,
    ) {
        self.push(Call::DrawBitmapRect {
            bitmap: bitmap.into(),
            src,
            dst,
            paint: paint.cloned(),
        });
    }

    fn draw_bitmap_matrix(&mut self, bitmap: &Bitmap, matrix: Affine, paint: Option<&Paint>) {
        self.push(Call::DrawBitmapMatrix {
            bitmap: bitmap.into(),
            matrix,
            paint: paint.cloned(),
        });
    }

    fn draw_bitmap_nine(
        &mut self,
        bitmap: &Bitmap,
        center: IRect,
        dst: RectF,
        paint: Option<&Paint>,
    ) {
        self.push(Call::DrawBitmapNine {
            bitmap: bitmap.into(),
            center,
            dst,
            paint: paint.cloned(),
        });
    }

    fn draw_sprite(&mut self, bitmap: &Bitmap, left: i32, top: i32, paint: Option<&Paint>) {
        self.push(Call::DrawSprite {
            bitmap: bitmap.into(),
            left,
            top,
            paint: paint.cloned(),
        });
    }

    fn draw_text(&mut self, text: &[u8], x: f32, y: f32, paint: &Paint) {
        self.push(Call::DrawText {
            text: text.to_vec(),
            x,
            y,
            paint: paint.clone(),
        });
    }

    fn draw_pos_text(&mut self, text: &[u8], pos: &[PointF], paint: &Paint) {
        self.push(Call::DrawPosText {
            text: text.to_vec(),
            pos: pos.to_vec(),
            paint: paint.clone(),
        });
    }

    fn draw_pos_text_h(&mut self, text: &[u8], xs: &[f32], y: f32, paint: &Paint) {
        self.push(Call::DrawPosTextH {
            text: text.to_vec(),
            xs: xs.to_vec(),
            y,
            paint: paint.clone(),
        });
    }

    fn draw_text_on_path(
        &mut self,
        text: &[u8],
        path: &Path,
        matrix: Option<Affine>,
        paint: &Paint,
    ) {
        self.push(Call::DrawTextOnPath {
            text: text.to_vec(),
            path: path.clone(),
            matrix,
            paint: paint.clone(),
        });
    }

    fn draw_vertices(&mut self, vertices: &Vertices<'_>, paint: &Paint) {
        self.push(Call::DrawVertices {
            mesh: vertices.into(),
            paint: paint.clone(),
        });
    }

    fn draw_data(&mut self, data: &[u8]) {
        self.push(Call::DrawData(data.to_vec()));
    }

    fn local_clip_bounds(&self) -> Option<RectF> {
        let m = self.state.matrix();
        (m.determinant() != 0.0)
            .then(|| RectF::from_kurbo(m.inverse().transform_rect_bbox(self.state.clip_bounds())))
    }
}
