// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instruction headers and opcodes.
//!
//! Every instruction starts with one 32-bit header word:
//!
//! ```text
//!  31      24 23  20 19                 0
//! +----------+------+--------------------+
//! |  opcode  | flags|     inline data    |
//! +----------+------+--------------------+
//! ```
//!
//! followed by zero or more payload words. Paint state travels inside a [`DrawOp::PaintOp`]
//! instruction whose payload is a run of paint words that use the same header layout with
//! [`PaintOp`] opcodes.

use crate::error::DecodeError;

/// Width of the opcode field.
pub const OP_BITS: u32 = 8;
/// Width of the flags field.
pub const FLAG_BITS: u32 = 4;
/// Width of the inline data field.
pub const DATA_BITS: u32 = 20;

/// Largest value that fits in the inline data field.
pub const MAX_DATA: u32 = (1 << DATA_BITS) - 1;
/// Largest value that fits in the flags field.
pub const MAX_FLAGS: u8 = (1 << FLAG_BITS) - 1;

const FLAG_SHIFT: u32 = DATA_BITS;
const OP_SHIFT: u32 = DATA_BITS + FLAG_BITS;

/// Pack the three header fields into a word.
///
/// Out-of-range flags and data are masked to their field widths.
#[inline]
pub const fn pack(op: u8, flags: u8, data: u32) -> u32 {
    ((op as u32) << OP_SHIFT) | (((flags & MAX_FLAGS) as u32) << FLAG_SHIFT) | (data & MAX_DATA)
}

/// Split a header word into opcode, flags and inline data.
#[inline]
#[expect(
    clippy::cast_possible_truncation,
    reason = "fields are masked to their widths before narrowing"
)]
pub const fn unpack(word: u32) -> (u8, u8, u32) {
    (
        (word >> OP_SHIFT) as u8,
        ((word >> FLAG_SHIFT) as u8) & MAX_FLAGS,
        word & MAX_DATA,
    )
}

macro_rules! opcodes {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value,)*
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(v: u8) -> Result<Self, u8> {
                match v {
                    $($value => Ok(Self::$variant),)*
                    other => Err(other),
                }
            }
        }

        impl $name {
            /// Human-readable name for logs.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

opcodes! {
    /// Top-level instruction opcodes. Zero is never a valid opcode.
    pub enum DrawOp {
        /// Push matrix/clip state. Data: save flags.
        Save = 1,
        /// Push state and an offscreen layer. Flags: [`flags::HAS_BOUNDS`], [`flags::HAS_PAINT`].
        SaveLayer = 2,
        /// Pop state.
        Restore = 3,
        /// Pre-translate the matrix.
        Translate = 4,
        /// Pre-scale the matrix.
        Scale = 5,
        /// Pre-rotate the matrix (degrees).
        Rotate = 6,
        /// Pre-skew the matrix.
        Skew = 7,
        /// Pre-concatenate an affine matrix.
        Concat = 8,
        /// Replace the matrix.
        SetMatrix = 9,
        /// Clip with a rectangle. Data: region op.
        ClipRect = 10,
        /// Clip with a path. Data: region op.
        ClipPath = 11,
        /// Clip with a device region. Data: region op.
        ClipRegion = 12,
        /// Fill the clip with a color, or transparent.
        Clear = 13,
        /// Fill the clip with the current paint.
        DrawPaint = 14,
        /// Draw points, lines or a polyline. Data: point mode.
        DrawPoints = 15,
        /// Draw a rectangle.
        DrawRect = 16,
        /// Draw a path.
        DrawPath = 17,
        /// Draw a bitmap at a position. Data: bitmap handle.
        DrawBitmap = 18,
        /// Draw a bitmap into a rectangle. Data: bitmap handle.
        DrawBitmapRect = 19,
        /// Draw a nine-patch bitmap. Data: bitmap handle.
        DrawBitmapNine = 20,
        /// Draw a bitmap in device space, ignoring the matrix. Data: bitmap handle.
        DrawSprite = 21,
        /// Draw a text run at a position.
        DrawText = 22,
        /// Draw a text run with a position per glyph.
        DrawPosText = 23,
        /// Draw a text run with an x position per glyph and a shared y.
        DrawPosTextH = 24,
        /// Draw a text run along a path.
        DrawTextOnPath = 25,
        /// Draw a triangle mesh.
        DrawVertices = 26,
        /// Pass opaque bytes through to the target. Data: length if it fits.
        DrawData = 27,
        /// Update the current paint. Data: byte length of the paint words.
        PaintOp = 28,
        /// Define a typeface. Data: typeface id.
        DefTypeface = 29,
        /// Define a flattened paint effect. Flags: slot. Data: handle.
        DefFlattenable = 30,
        /// Define a flattened bitmap. Data: bitmap index.
        DefBitmap = 31,
        /// Announce the stream flags. Flags: [`crate::RecordFlags`] wire bits.
        ReportFlags = 32,
        /// End of stream.
        Done = 33,
    }
}

opcodes! {
    /// Paint-state opcodes used inside a [`DrawOp::PaintOp`] payload.
    ///
    /// The numeric order matches the order in which a paint delta emits fields.
    pub enum PaintOp {
        /// Data: paint flags.
        Flags = 1,
        /// One payload word: color.
        Color = 2,
        /// Data: style.
        Style = 3,
        /// Data: stroke join.
        Join = 4,
        /// Data: stroke cap.
        Cap = 5,
        /// One payload word: stroke width.
        Width = 6,
        /// One payload word: miter limit.
        Miter = 7,
        /// Data: text encoding.
        Encoding = 8,
        /// Data: hinting.
        Hinting = 9,
        /// Data: text alignment.
        Align = 10,
        /// One payload word: text size.
        TextSize = 11,
        /// One payload word: horizontal text scale.
        TextScaleX = 12,
        /// One payload word: horizontal text skew.
        TextSkewX = 13,
        /// Data: typeface id, zero for none.
        Typeface = 14,
        /// Flags: effect slot. Data: effect handle, zero for none.
        FlatIndex = 15,
    }
}

/// Per-opcode flag bits.
pub mod flags {
    /// `SaveLayer`: bounds rectangle follows.
    pub const HAS_BOUNDS: u8 = 1 << 0;
    /// `SaveLayer` and bitmap draws: the current paint applies.
    pub const HAS_PAINT: u8 = 1 << 1;
    /// `DrawBitmapRect`: a source rectangle follows.
    pub const HAS_SRC: u8 = 1 << 0;
    /// Clips: anti-aliased edges.
    pub const ANTI_ALIAS: u8 = 1 << 0;
    /// `Clear`: a color follows.
    pub const HAS_COLOR: u8 = 1 << 0;
    /// `DrawTextOnPath`: a matrix follows.
    pub const HAS_MATRIX: u8 = 1 << 0;
    /// `DrawVertices`: texture coordinates follow.
    pub const HAS_TEXS: u8 = 1 << 0;
    /// `DrawVertices`: colors follow.
    pub const HAS_COLORS: u8 = 1 << 1;
    /// `DrawVertices`: indices follow.
    pub const HAS_INDICES: u8 = 1 << 2;
}

/// A decoded instruction header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Opcode.
    pub op: DrawOp,
    /// Four flag bits.
    pub flags: u8,
    /// Twenty bits of inline data.
    pub data: u32,
}

impl Header {
    /// Header with no flags and no data.
    pub const fn new(op: DrawOp) -> Self {
        Self {
            op,
            flags: 0,
            data: 0,
        }
    }

    /// Set the flags.
    pub const fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// Set the inline data.
    pub const fn with_data(mut self, data: u32) -> Self {
        self.data = data;
        self
    }

    /// Returns `true` if any of `mask` is set.
    pub const fn has(&self, mask: u8) -> bool {
        self.flags & mask != 0
    }

    /// Pack into a word.
    pub const fn encode(self) -> u32 {
        pack(self.op as u8, self.flags, self.data)
    }

    /// Unpack a word.
    pub fn decode(word: u32) -> Result<Self, DecodeError> {
        let (op, flags, data) = unpack(word);
        let op = DrawOp::try_from(op).map_err(DecodeError::UnknownDrawOp)?;
        Ok(Self { op, flags, data })
    }
}
