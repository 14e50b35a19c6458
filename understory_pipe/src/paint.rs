// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint snapshots.

use std::sync::Arc;

use peniko::color::Rgba8;

use crate::effect::{Effect, EffectSlot};
use crate::error::DecodeError;
use crate::typeface::Typeface;

bitflags::bitflags! {
    /// Boolean paint settings.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PaintFlags: u32 {
        /// Anti-alias edges.
        const ANTI_ALIAS = 1 << 0;
        /// Filter bitmaps when scaling.
        const FILTER_BITMAP = 1 << 1;
        /// Dither gradients.
        const DITHER = 1 << 2;
        /// Underline text.
        const UNDERLINE_TEXT = 1 << 3;
        /// Strike through text.
        const STRIKE_THRU_TEXT = 1 << 4;
        /// Synthesize bold text.
        const FAKE_BOLD_TEXT = 1 << 5;
        /// Lay out text without hinting to the pixel grid.
        const LINEAR_TEXT = 1 << 6;
        /// Position glyphs at subpixel offsets.
        const SUBPIXEL_TEXT = 1 << 7;
        /// Apply device kerning.
        const DEV_KERN_TEXT = 1 << 8;
        /// Render glyphs with LCD subpixel coverage.
        const LCD_RENDER_TEXT = 1 << 9;
        /// Use bitmaps embedded in the font.
        const EMBEDDED_BITMAP_TEXT = 1 << 10;
        /// Force the auto-hinter.
        const AUTOHINTING = 1 << 11;
        /// Lay text out vertically.
        const VERTICAL_TEXT = 1 << 12;
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident : $what:literal {
            $(#[$dmeta:meta])* $default:ident = $dvalue:literal,
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $(#[$dmeta])*
            #[default]
            $default = $dvalue,
            $($(#[$vmeta])* $variant = $value,)*
        }

        impl $name {
            pub(crate) fn from_u32(v: u32) -> Result<Self, DecodeError> {
                match v {
                    $dvalue => Ok(Self::$default),
                    $($value => Ok(Self::$variant),)*
                    _ => Err(DecodeError::invalid($what, v)),
                }
            }
        }
    };
}

wire_enum! {
    /// Geometry fill/stroke mode.
    pub enum PaintStyle : "paint style" {
        /// Fill the interior.
        Fill = 0,
        /// Stroke the outline.
        Stroke = 1,
        /// Fill and stroke.
        StrokeAndFill = 2,
    }
}

wire_enum! {
    /// Stroke corner shape.
    pub enum StrokeJoin : "stroke join" {
        /// Sharp corner, limited by the miter limit.
        Miter = 0,
        /// Rounded corner.
        Round = 1,
        /// Cut-off corner.
        Bevel = 2,
    }
}

wire_enum! {
    /// Stroke end shape.
    pub enum StrokeCap : "stroke cap" {
        /// Flat end at the endpoint.
        Butt = 0,
        /// Semicircle past the endpoint.
        Round = 1,
        /// Square past the endpoint.
        Square = 2,
    }
}

wire_enum! {
    /// How text bytes map to glyphs.
    pub enum TextEncoding : "text encoding" {
        /// UTF-8.
        Utf8 = 0,
        /// UTF-16, native byte order.
        Utf16 = 1,
        /// UTF-32, native byte order.
        Utf32 = 2,
        /// 16-bit glyph ids.
        GlyphId = 3,
    }
}

wire_enum! {
    /// Outline hinting strength.
    pub enum Hinting : "hinting" {
        /// Normal hinting.
        Normal = 2,
        /// No hinting.
        None = 0,
        /// Light hinting.
        Slight = 1,
        /// Strongest hinting.
        Full = 3,
    }
}

wire_enum! {
    /// Text anchor relative to the origin.
    pub enum TextAlign : "text align" {
        /// Origin at the start.
        Left = 0,
        /// Origin in the middle.
        Center = 1,
        /// Origin at the end.
        Right = 2,
    }
}

/// Everything that governs how a draw looks.
#[derive(Clone, Debug)]
pub struct Paint {
    /// Boolean settings.
    pub flags: PaintFlags,
    /// Color used when no shader is set.
    pub color: Rgba8,
    /// Fill/stroke mode.
    pub style: PaintStyle,
    /// Stroke corner shape.
    pub join: StrokeJoin,
    /// Stroke end shape.
    pub cap: StrokeCap,
    /// Stroke width; zero is a hairline.
    pub stroke_width: f32,
    /// Miter limit.
    pub stroke_miter: f32,
    /// How text bytes map to glyphs.
    pub text_encoding: TextEncoding,
    /// Outline hinting.
    pub hinting: Hinting,
    /// Text anchor.
    pub text_align: TextAlign,
    /// Text size.
    pub text_size: f32,
    /// Horizontal text scale.
    pub text_scale_x: f32,
    /// Horizontal text skew.
    pub text_skew_x: f32,
    /// Typeface, or the default one.
    pub typeface: Option<Arc<Typeface>>,
    pub(crate) effects: [Option<Arc<Effect>>; EffectSlot::COUNT],
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            flags: PaintFlags::empty(),
            color: Rgba8 {
                r: 0,
                g: 0,
                b: 0,
                a: 255,
            },
            style: PaintStyle::Fill,
            join: StrokeJoin::Miter,
            cap: StrokeCap::Butt,
            stroke_width: 0.0,
            stroke_miter: 4.0,
            text_encoding: TextEncoding::Utf8,
            hinting: Hinting::Normal,
            text_align: TextAlign::Left,
            text_size: 12.0,
            text_scale_x: 1.0,
            text_skew_x: 0.0,
            typeface: None,
            effects: [const { None }; EffectSlot::COUNT],
        }
    }
}

#[inline]
fn same_f32(a: f32, b: f32) -> bool {
    a.to_bits() == b.to_bits()
}

/// Field-by-field equality. Floats compare by bit pattern; typefaces and effects by value.
impl PartialEq for Paint {
    fn eq(&self, other: &Self) -> bool {
        self.flags == other.flags
            && self.color == other.color
            && self.style == other.style
            && self.join == other.join
            && self.cap == other.cap
            && same_f32(self.stroke_width, other.stroke_width)
            && same_f32(self.stroke_miter, other.stroke_miter)
            && self.text_encoding == other.text_encoding
            && self.hinting == other.hinting
            && self.text_align == other.text_align
            && same_f32(self.text_size, other.text_size)
            && same_f32(self.text_scale_x, other.text_scale_x)
            && same_f32(self.text_skew_x, other.text_skew_x)
            && self.typeface == other.typeface
            && self.effects == other.effects
    }
}

impl Paint {
    /// Default paint with a color.
    pub fn new(color: Rgba8) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    /// Stroking paint.
    pub fn stroke(color: Rgba8, width: f32) -> Self {
        Self {
            color,
            style: PaintStyle::Stroke,
            stroke_width: width,
            ..Self::default()
        }
    }

    /// Effect in `slot`.
    pub fn effect(&self, slot: EffectSlot) -> Option<&Arc<Effect>> {
        self.effects[slot.index()].as_ref()
    }

    /// Put `effect` in its slot, replacing what was there.
    pub fn set_effect(&mut self, effect: impl Into<Effect>) {
        self.set_shared_effect(Arc::new(effect.into()));
    }

    /// Put an already shared effect in its slot.
    pub fn set_shared_effect(&mut self, effect: Arc<Effect>) {
        let slot = effect.slot();
        self.effects[slot.index()] = Some(effect);
    }

    /// Builder form of [`set_effect`](Self::set_effect).
    pub fn with_effect(mut self, effect: impl Into<Effect>) -> Self {
        self.set_effect(effect);
        self
    }

    /// Empty a slot.
    pub fn clear_effect(&mut self, slot: EffectSlot) {
        self.effects[slot.index()] = None;
    }

    /// Returns `true` if any slot is occupied.
    pub fn has_effects(&self) -> bool {
        self.effects.iter().any(Option::is_some)
    }

    /// Store a decoded effect after checking it matches the slot.
    pub(crate) fn put_effect(
        &mut self,
        slot: EffectSlot,
        effect: Option<Arc<Effect>>,
    ) -> Result<(), DecodeError> {
        if let Some(e) = &effect
            && e.slot() != slot
        {
            return Err(DecodeError::SlotMismatch {
                slot: slot as u8,
                found: e.slot() as u8,
            });
        }
        self.effects[slot.index()] = effect;
        Ok(())
    }

    /// Number of glyphs `text` encodes under this paint's text encoding.
    ///
    /// Trailing partial code units are ignored.
    pub fn count_glyphs(&self, text: &[u8]) -> usize {
        match self.text_encoding {
            TextEncoding::Utf8 => text.iter().filter(|&&b| (b & 0xC0) != 0x80).count(),
            TextEncoding::Utf16 => text
                .chunks_exact(2)
                .filter(|u| !(0xDC00..=0xDFFF).contains(&u16::from_ne_bytes([u[0], u[1]])))
                .count(),
            TextEncoding::Utf32 => text.len() / 4,
            TextEncoding::GlyphId => text.len() / 2,
        }
    }
}
