// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry values carried by drawing calls.
//!
//! Coordinates are `f32` on the wire. Math on them (transforms, bounds) goes through `kurbo`.

use kurbo::Rect;

use crate::error::DecodeError;
use crate::words::{WordReader, WordWriter};

pub use peniko::Fill as FillRule;

/// A point in `f32` coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PointF {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}

impl PointF {
    /// Create a point.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Convert to kurbo's point type.
    #[inline]
    pub fn to_kurbo(self) -> kurbo::Point {
        kurbo::Point::new(f64::from(self.x), f64::from(self.y))
    }

    pub(crate) fn write(self, w: &mut WordWriter) {
        w.f32(self.x);
        w.f32(self.y);
    }

    pub(crate) fn read(r: &mut WordReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self::new(r.f32()?, r.f32()?))
    }
}

/// Axis-aligned rectangle in `f32` coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RectF {
    /// Minimum X coordinate.
    pub x0: f32,
    /// Minimum Y coordinate.
    pub y0: f32,
    /// Maximum X coordinate.
    pub x1: f32,
    /// Maximum Y coordinate.
    pub y1: f32,
}

impl RectF {
    /// Create a new rectangle from min/max corners.
    #[inline]
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Create a rectangle from an origin and a size.
    #[inline]
    pub const fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// Convert to kurbo's rectangle type.
    #[inline]
    pub fn to_kurbo(self) -> Rect {
        Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }

    /// Convert from kurbo's rectangle type, rounding to `f32`.
    #[inline]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "wire coordinates are f32 by definition"
    )]
    pub fn from_kurbo(r: Rect) -> Self {
        Self::new(r.x0 as f32, r.y0 as f32, r.x1 as f32, r.y1 as f32)
    }

    pub(crate) fn write(self, w: &mut WordWriter) {
        w.f32(self.x0);
        w.f32(self.y0);
        w.f32(self.x1);
        w.f32(self.y1);
    }

    pub(crate) fn read(r: &mut WordReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self::new(r.f32()?, r.f32()?, r.f32()?, r.f32()?))
    }
}

/// Axis-aligned rectangle in integer device coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IRect {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl IRect {
    /// Create a rectangle from its edges.
    #[inline]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a rectangle from an origin and a size.
    #[inline]
    pub const fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// Width, zero if inverted.
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left).max(0).unsigned_abs()
    }

    /// Height, zero if inverted.
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top).max(0).unsigned_abs()
    }

    /// Returns `true` if the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Convert to kurbo's rectangle type.
    pub fn to_kurbo(self) -> Rect {
        Rect::new(
            f64::from(self.left),
            f64::from(self.top),
            f64::from(self.right),
            f64::from(self.bottom),
        )
    }

    pub(crate) fn write(self, w: &mut WordWriter) {
        w.i32(self.left);
        w.i32(self.top);
        w.i32(self.right);
        w.i32(self.bottom);
    }

    pub(crate) fn read(r: &mut WordReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self::new(r.i32()?, r.i32()?, r.i32()?, r.i32()?))
    }
}

/// Simple path command enumeration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PathCmd {
    /// Move the current point without drawing.
    MoveTo {
        /// X coordinate of the new point.
        x: f32,
        /// Y coordinate of the new point.
        y: f32,
    },
    /// Draw a line from the current point to the given point.
    LineTo {
        /// X coordinate of the line end.
        x: f32,
        /// Y coordinate of the line end.
        y: f32,
    },
    /// Quadratic Bézier curve through one control point.
    QuadTo {
        /// X coordinate of the control point.
        x1: f32,
        /// Y coordinate of the control point.
        y1: f32,
        /// X coordinate of the curve end.
        x: f32,
        /// Y coordinate of the curve end.
        y: f32,
    },
    /// Cubic Bézier curve through two control points.
    CurveTo {
        /// X coordinate of the first control point.
        x1: f32,
        /// Y coordinate of the first control point.
        y1: f32,
        /// X coordinate of the second control point.
        x2: f32,
        /// Y coordinate of the second control point.
        y2: f32,
        /// X coordinate of the curve end.
        x: f32,
        /// Y coordinate of the curve end.
        y: f32,
    },
    /// Close the current subpath.
    Close,
}

impl PathCmd {
    fn tag(&self) -> u32 {
        match self {
            Self::MoveTo { .. } => 0,
            Self::LineTo { .. } => 1,
            Self::QuadTo { .. } => 2,
            Self::CurveTo { .. } => 3,
            Self::Close => 4,
        }
    }
}

/// A path: commands plus the fill rule used when filling or clipping with it.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    /// Fill rule.
    pub fill: FillRule,
    /// Commands in order.
    pub commands: Vec<PathCmd>,
}

impl Default for Path {
    fn default() -> Self {
        Self {
            fill: FillRule::NonZero,
            commands: Vec::new(),
        }
    }
}

impl Path {
    /// Start an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a move.
    pub fn move_to(mut self, x: f32, y: f32) -> Self {
        self.commands.push(PathCmd::MoveTo { x, y });
        self
    }

    /// Append a line.
    pub fn line_to(mut self, x: f32, y: f32) -> Self {
        self.commands.push(PathCmd::LineTo { x, y });
        self
    }

    /// Append a quadratic curve.
    pub fn quad_to(mut self, x1: f32, y1: f32, x: f32, y: f32) -> Self {
        self.commands.push(PathCmd::QuadTo { x1, y1, x, y });
        self
    }

    /// Append a cubic curve.
    pub fn curve_to(mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) -> Self {
        self.commands.push(PathCmd::CurveTo {
            x1,
            y1,
            x2,
            y2,
            x,
            y,
        });
        self
    }

    /// Close the current subpath.
    pub fn close(mut self) -> Self {
        self.commands.push(PathCmd::Close);
        self
    }

    /// Closed rectangle path.
    pub fn from_rect(r: RectF) -> Self {
        Self::new()
            .move_to(r.x0, r.y0)
            .line_to(r.x1, r.y0)
            .line_to(r.x1, r.y1)
            .line_to(r.x0, r.y1)
            .close()
    }

    /// Bounds of all points, control points included. `None` for a path without points.
    pub fn bounds(&self) -> Option<Rect> {
        let mut out: Option<Rect> = None;
        let mut add = |x: f32, y: f32| {
            let p = kurbo::Point::new(f64::from(x), f64::from(y));
            out = Some(match out {
                Some(r) => r.union_pt(p),
                None => Rect::from_points(p, p),
            });
        };
        for cmd in &self.commands {
            match *cmd {
                PathCmd::MoveTo { x, y } | PathCmd::LineTo { x, y } => add(x, y),
                PathCmd::QuadTo { x1, y1, x, y } => {
                    add(x1, y1);
                    add(x, y);
                }
                PathCmd::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    add(x1, y1);
                    add(x2, y2);
                    add(x, y);
                }
                PathCmd::Close => {}
            }
        }
        out
    }

    pub(crate) fn write(&self, w: &mut WordWriter) {
        w.u32(match self.fill {
            FillRule::NonZero => 0,
            FillRule::EvenOdd => 1,
        });
        w.u32(crate::words::blob_len(self.commands.len()));
        for cmd in &self.commands {
            w.u32(cmd.tag());
            match *cmd {
                PathCmd::MoveTo { x, y } | PathCmd::LineTo { x, y } => {
                    w.f32(x);
                    w.f32(y);
                }
                PathCmd::QuadTo { x1, y1, x, y } => {
                    for v in [x1, y1, x, y] {
                        w.f32(v);
                    }
                }
                PathCmd::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    for v in [x1, y1, x2, y2, x, y] {
                        w.f32(v);
                    }
                }
                PathCmd::Close => {}
            }
        }
    }

    pub(crate) fn read(r: &mut WordReader<'_>) -> Result<Self, DecodeError> {
        let fill = match r.u32()? {
            0 => FillRule::NonZero,
            1 => FillRule::EvenOdd,
            v => return Err(DecodeError::invalid("fill rule", v)),
        };
        let n = r.count(4)?;
        let mut commands = Vec::with_capacity(n);
        for _ in 0..n {
            let cmd = match r.u32()? {
                0 => PathCmd::MoveTo {
                    x: r.f32()?,
                    y: r.f32()?,
                },
                1 => PathCmd::LineTo {
                    x: r.f32()?,
                    y: r.f32()?,
                },
                2 => PathCmd::QuadTo {
                    x1: r.f32()?,
                    y1: r.f32()?,
                    x: r.f32()?,
                    y: r.f32()?,
                },
                3 => PathCmd::CurveTo {
                    x1: r.f32()?,
                    y1: r.f32()?,
                    x2: r.f32()?,
                    y2: r.f32()?,
                    x: r.f32()?,
                    y: r.f32()?,
                },
                4 => PathCmd::Close,
                v => return Err(DecodeError::invalid("path verb", v)),
            };
            commands.push(cmd);
        }
        Ok(Self { fill, commands })
    }
}

/// A device-space region: the union of a set of integer rectangles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    /// Component rectangles.
    pub rects: Vec<IRect>,
}

impl Region {
    /// Region covering a single rectangle.
    pub fn from_rect(r: IRect) -> Self {
        Self { rects: vec![r] }
    }

    /// Bounds of all non-empty rectangles.
    pub fn bounds(&self) -> Option<Rect> {
        self.rects
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| r.to_kurbo())
            .reduce(|a, b| a.union(b))
    }

    pub(crate) fn write(&self, w: &mut WordWriter) {
        w.u32(crate::words::blob_len(self.rects.len()));
        for r in &self.rects {
            r.write(w);
        }
    }

    pub(crate) fn read(r: &mut WordReader<'_>) -> Result<Self, DecodeError> {
        let n = r.count(16)?;
        let mut rects = Vec::with_capacity(n);
        for _ in 0..n {
            rects.push(IRect::read(r)?);
        }
        Ok(Self { rects })
    }
}

/// How a new clip combines with the current one.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegionOp {
    /// Subtract the new shape.
    Difference = 0,
    /// Keep only the overlap.
    #[default]
    Intersect = 1,
    /// Add the new shape.
    Union = 2,
    /// Keep what is in exactly one of the two.
    Xor = 3,
    /// New shape minus the current clip.
    ReverseDifference = 4,
    /// Replace the current clip.
    Replace = 5,
}

impl RegionOp {
    pub(crate) fn from_u32(v: u32) -> Result<Self, DecodeError> {
        Ok(match v {
            0 => Self::Difference,
            1 => Self::Intersect,
            2 => Self::Union,
            3 => Self::Xor,
            4 => Self::ReverseDifference,
            5 => Self::Replace,
            _ => return Err(DecodeError::invalid("region op", v)),
        })
    }
}

/// Interpretation of a point array in `draw_points`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PointMode {
    /// Each point is a dot.
    Points = 0,
    /// Pairs of points are line segments.
    Lines = 1,
    /// Points form an open polyline.
    Polygon = 2,
}

impl PointMode {
    pub(crate) fn from_u32(v: u32) -> Result<Self, DecodeError> {
        Ok(match v {
            0 => Self::Points,
            1 => Self::Lines,
            2 => Self::Polygon,
            _ => return Err(DecodeError::invalid("point mode", v)),
        })
    }
}

/// Primitive assembly for `draw_vertices`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexMode {
    /// Independent triangles.
    Triangles = 0,
    /// Triangle strip.
    TriangleStrip = 1,
    /// Triangle fan.
    TriangleFan = 2,
}

impl VertexMode {
    pub(crate) fn from_u32(v: u32) -> Result<Self, DecodeError> {
        Ok(match v {
            0 => Self::Triangles,
            1 => Self::TriangleStrip,
            2 => Self::TriangleFan,
            _ => return Err(DecodeError::invalid("vertex mode", v)),
        })
    }
}

/// Borrowed mesh passed to `draw_vertices`.
#[derive(Copy, Clone, Debug)]
pub struct Vertices<'a> {
    /// Primitive assembly.
    pub mode: VertexMode,
    /// Vertex positions.
    pub positions: &'a [PointF],
    /// Optional texture coordinates, one per position.
    pub tex_coords: Option<&'a [PointF]>,
    /// Optional per-vertex colors, one per position.
    pub colors: Option<&'a [peniko::color::Rgba8]>,
    /// Optional index buffer.
    pub indices: Option<&'a [u16]>,
}

impl<'a> Vertices<'a> {
    /// Mesh with positions only.
    pub fn new(mode: VertexMode, positions: &'a [PointF]) -> Self {
        Self {
            mode,
            positions,
            tex_coords: None,
            colors: None,
            indices: None,
        }
    }

    /// Bounds of the positions.
    pub fn bounds(&self) -> Option<Rect> {
        self.positions
            .iter()
            .map(|p| {
                let k = p.to_kurbo();
                Rect::from_points(k, k)
            })
            .reduce(|a, b| a.union(b))
    }
}
