// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint effects and their flattened byte form.
//!
//! A paint has eight effect slots. Each slot holds at most one effect of the matching kind.
//! Effects are compared and deduplicated by their flattened bytes, so two effects built
//! separately with the same parameters share one stream definition.
//!
//! Flattened layout: one word with the slot, one word with the variant tag, then the variant's
//! fields as words.

use peniko::color::Rgba8;
use peniko::{BlendMode, Compose, Extend, Mix};

use crate::error::DecodeError;
use crate::geometry::PointF;
use crate::words::{WordReader, WordWriter};

/// Paint effect slot, in the order the paint delta emits them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EffectSlot {
    /// Color filter.
    ColorFilter = 0,
    /// Draw looper.
    Looper = 1,
    /// Mask filter.
    MaskFilter = 2,
    /// Path effect.
    PathEffect = 3,
    /// Rasterizer.
    Rasterizer = 4,
    /// Shader.
    Shader = 5,
    /// Image filter.
    ImageFilter = 6,
    /// Blend mode.
    Blend = 7,
}

impl EffectSlot {
    /// Number of slots.
    pub const COUNT: usize = 8;

    /// Every slot, in emission order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::ColorFilter,
        Self::Looper,
        Self::MaskFilter,
        Self::PathEffect,
        Self::Rasterizer,
        Self::Shader,
        Self::ImageFilter,
        Self::Blend,
    ];

    /// Slot from its wire value.
    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(usize::from(v)).copied()
    }

    /// Index into a per-slot array.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Color filter effects.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorFilter {
    /// Blend a constant color over the source.
    Blend {
        /// Constant color.
        color: Rgba8,
        /// Blend mode used.
        mode: BlendMode,
    },
    /// 4x5 row-major color matrix.
    Matrix(Box<[f32; 20]>),
    /// Multiply then add per channel.
    Lighting {
        /// Channel multiplier.
        mul: Rgba8,
        /// Channel offset.
        add: Rgba8,
    },
}

/// Draw loopers.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawLooper {
    /// Draw a blurred offset copy under each draw.
    Shadow {
        /// Offset along X.
        dx: f32,
        /// Offset along Y.
        dy: f32,
        /// Blur standard deviation.
        sigma: f32,
        /// Shadow color.
        color: Rgba8,
    },
}

/// Blur style of a mask filter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlurStyle {
    /// Blur inside and outside.
    Normal = 0,
    /// Solid inside, blurred outside.
    Solid = 1,
    /// Nothing inside, blurred outside.
    Outer = 2,
    /// Blurred inside, nothing outside.
    Inner = 3,
}

/// Mask filters.
#[derive(Clone, Debug, PartialEq)]
pub enum MaskFilter {
    /// Gaussian blur of the coverage mask.
    Blur {
        /// Where the blur applies.
        style: BlurStyle,
        /// Standard deviation.
        sigma: f32,
    },
    /// Emboss lighting.
    Emboss {
        /// Light direction.
        direction: [f32; 3],
        /// Ambient light.
        ambient: f32,
        /// Specular exponent.
        specular: f32,
        /// Blur standard deviation.
        sigma: f32,
    },
}

/// Path effects.
#[derive(Clone, Debug, PartialEq)]
pub enum PathEffect {
    /// Dashed stroke.
    Dash {
        /// On/off lengths, alternating.
        intervals: Vec<f32>,
        /// Offset into the pattern.
        phase: f32,
    },
    /// Round sharp corners.
    Corner {
        /// Corner radius.
        radius: f32,
    },
    /// Jitter the outline.
    Discrete {
        /// Segment length.
        segment_length: f32,
        /// Maximum displacement.
        deviation: f32,
        /// Random seed.
        seed: u32,
    },
}

/// Rasterizers.
#[derive(Clone, Debug, PartialEq)]
pub enum Rasterizer {
    /// Draw the shape once per offset.
    Layers {
        /// Layer offsets.
        offsets: Vec<PointF>,
    },
}

/// A gradient color stop.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GradientStop {
    /// Position in `0..=1`.
    pub offset: f32,
    /// Color at this position.
    pub color: Rgba8,
}

/// Shaders.
#[derive(Clone, Debug, PartialEq)]
pub enum Shader {
    /// Solid color.
    Solid(Rgba8),
    /// Linear gradient.
    LinearGradient {
        /// Start point.
        start: PointF,
        /// End point.
        end: PointF,
        /// Color stops.
        stops: Vec<GradientStop>,
        /// Behavior outside the gradient.
        extend: Extend,
    },
    /// Radial gradient.
    RadialGradient {
        /// Center.
        center: PointF,
        /// Radius.
        radius: f32,
        /// Color stops.
        stops: Vec<GradientStop>,
        /// Behavior outside the gradient.
        extend: Extend,
    },
}

/// Image filters.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageFilter {
    /// Fill the output with a solid color.
    Flood {
        /// Flood color.
        color: Rgba8,
    },
    /// Gaussian blur with separate X/Y standard deviations.
    Blur {
        /// Standard deviation along X.
        std_deviation_x: f32,
        /// Standard deviation along Y.
        std_deviation_y: f32,
    },
    /// Drop shadow under the source content.
    DropShadow {
        /// Offset along X.
        dx: f32,
        /// Offset along Y.
        dy: f32,
        /// Blur standard deviation along X.
        std_deviation_x: f32,
        /// Blur standard deviation along Y.
        std_deviation_y: f32,
        /// Shadow color.
        color: Rgba8,
    },
    /// Translate the output.
    Offset {
        /// Offset along X.
        dx: f32,
        /// Offset along Y.
        dy: f32,
    },
}

/// Any paint effect.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// See [`ColorFilter`].
    ColorFilter(ColorFilter),
    /// See [`DrawLooper`].
    Looper(DrawLooper),
    /// See [`MaskFilter`].
    MaskFilter(MaskFilter),
    /// See [`PathEffect`].
    PathEffect(PathEffect),
    /// See [`Rasterizer`].
    Rasterizer(Rasterizer),
    /// See [`Shader`].
    Shader(Shader),
    /// See [`ImageFilter`].
    ImageFilter(ImageFilter),
    /// Blend mode used to composite the draw.
    Blend(BlendMode),
}

macro_rules! impl_from {
    ($($ty:ident => $variant:ident),*) => {
        $(impl From<$ty> for Effect {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        })*
    };
}

impl_from!(
    ColorFilter => ColorFilter,
    DrawLooper => Looper,
    MaskFilter => MaskFilter,
    PathEffect => PathEffect,
    Rasterizer => Rasterizer,
    Shader => Shader,
    ImageFilter => ImageFilter,
    BlendMode => Blend
);

impl Effect {
    /// Slot this effect occupies in a paint.
    pub fn slot(&self) -> EffectSlot {
        match self {
            Self::ColorFilter(_) => EffectSlot::ColorFilter,
            Self::Looper(_) => EffectSlot::Looper,
            Self::MaskFilter(_) => EffectSlot::MaskFilter,
            Self::PathEffect(_) => EffectSlot::PathEffect,
            Self::Rasterizer(_) => EffectSlot::Rasterizer,
            Self::Shader(_) => EffectSlot::Shader,
            Self::ImageFilter(_) => EffectSlot::ImageFilter,
            Self::Blend(_) => EffectSlot::Blend,
        }
    }

    /// Flatten into self-describing bytes.
    pub fn flatten(&self) -> Vec<u8> {
        let mut w = WordWriter::default();
        w.u32(self.slot() as u32);
        match self {
            Self::ColorFilter(cf) => match cf {
                ColorFilter::Blend { color, mode } => {
                    w.u32(0);
                    w.color(*color);
                    write_blend(&mut w, *mode);
                }
                ColorFilter::Matrix(m) => {
                    w.u32(1);
                    for v in m.iter() {
                        w.f32(*v);
                    }
                }
                ColorFilter::Lighting { mul, add } => {
                    w.u32(2);
                    w.color(*mul);
                    w.color(*add);
                }
            },
            Self::Looper(DrawLooper::Shadow {
                dx,
                dy,
                sigma,
                color,
            }) => {
                w.u32(0);
                w.f32(*dx);
                w.f32(*dy);
                w.f32(*sigma);
                w.color(*color);
            }
            Self::MaskFilter(mf) => match mf {
                MaskFilter::Blur { style, sigma } => {
                    w.u32(0);
                    w.u32(*style as u32);
                    w.f32(*sigma);
                }
                MaskFilter::Emboss {
                    direction,
                    ambient,
                    specular,
                    sigma,
                } => {
                    w.u32(1);
                    for v in direction {
                        w.f32(*v);
                    }
                    w.f32(*ambient);
                    w.f32(*specular);
                    w.f32(*sigma);
                }
            },
            Self::PathEffect(pe) => match pe {
                PathEffect::Dash { intervals, phase } => {
                    w.u32(0);
                    w.u32(crate::words::blob_len(intervals.len()));
                    for v in intervals {
                        w.f32(*v);
                    }
                    w.f32(*phase);
                }
                PathEffect::Corner { radius } => {
                    w.u32(1);
                    w.f32(*radius);
                }
                PathEffect::Discrete {
                    segment_length,
                    deviation,
                    seed,
                } => {
                    w.u32(2);
                    w.f32(*segment_length);
                    w.f32(*deviation);
                    w.u32(*seed);
                }
            },
            Self::Rasterizer(Rasterizer::Layers { offsets }) => {
                w.u32(0);
                w.u32(crate::words::blob_len(offsets.len()));
                for p in offsets {
                    p.write(&mut w);
                }
            }
            Self::Shader(sh) => match sh {
                Shader::Solid(c) => {
                    w.u32(0);
                    w.color(*c);
                }
                Shader::LinearGradient {
                    start,
                    end,
                    stops,
                    extend,
                } => {
                    w.u32(1);
                    start.write(&mut w);
                    end.write(&mut w);
                    write_stops(&mut w, stops, *extend);
                }
                Shader::RadialGradient {
                    center,
                    radius,
                    stops,
                    extend,
                } => {
                    w.u32(2);
                    center.write(&mut w);
                    w.f32(*radius);
                    write_stops(&mut w, stops, *extend);
                }
            },
            Self::ImageFilter(f) => match f {
                ImageFilter::Flood { color } => {
                    w.u32(0);
                    w.color(*color);
                }
                ImageFilter::Blur {
                    std_deviation_x,
                    std_deviation_y,
                } => {
                    w.u32(1);
                    w.f32(*std_deviation_x);
                    w.f32(*std_deviation_y);
                }
                ImageFilter::DropShadow {
                    dx,
                    dy,
                    std_deviation_x,
                    std_deviation_y,
                    color,
                } => {
                    w.u32(2);
                    w.f32(*dx);
                    w.f32(*dy);
                    w.f32(*std_deviation_x);
                    w.f32(*std_deviation_y);
                    w.color(*color);
                }
                ImageFilter::Offset { dx, dy } => {
                    w.u32(3);
                    w.f32(*dx);
                    w.f32(*dy);
                }
            },
            Self::Blend(mode) => {
                w.u32(0);
                write_blend(&mut w, *mode);
            }
        }
        w.into_bytes()
    }

    /// Rebuild an effect from [`flatten`](Self::flatten) output.
    pub fn unflatten(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = WordReader::new(bytes);
        let slot_word = r.u32()?;
        let slot = u8::try_from(slot_word)
            .ok()
            .and_then(EffectSlot::from_u8)
            .ok_or(DecodeError::invalid("effect slot", slot_word))?;
        let tag = r.u32()?;
        let bad_tag = || DecodeError::invalid("effect variant", tag);
        let effect = match slot {
            EffectSlot::ColorFilter => Self::ColorFilter(match tag {
                0 => ColorFilter::Blend {
                    color: r.color()?,
                    mode: read_blend(&mut r)?,
                },
                1 => {
                    let mut m = Box::new([0.0_f32; 20]);
                    for v in m.iter_mut() {
                        *v = r.f32()?;
                    }
                    ColorFilter::Matrix(m)
                }
                2 => ColorFilter::Lighting {
                    mul: r.color()?,
                    add: r.color()?,
                },
                _ => return Err(bad_tag()),
            }),
            EffectSlot::Looper => match tag {
                0 => Self::Looper(DrawLooper::Shadow {
                    dx: r.f32()?,
                    dy: r.f32()?,
                    sigma: r.f32()?,
                    color: r.color()?,
                }),
                _ => return Err(bad_tag()),
            },
            EffectSlot::MaskFilter => Self::MaskFilter(match tag {
                0 => MaskFilter::Blur {
                    style: match r.u32()? {
                        0 => BlurStyle::Normal,
                        1 => BlurStyle::Solid,
                        2 => BlurStyle::Outer,
                        3 => BlurStyle::Inner,
                        v => return Err(DecodeError::invalid("blur style", v)),
                    },
                    sigma: r.f32()?,
                },
                1 => MaskFilter::Emboss {
                    direction: [r.f32()?, r.f32()?, r.f32()?],
                    ambient: r.f32()?,
                    specular: r.f32()?,
                    sigma: r.f32()?,
                },
                _ => return Err(bad_tag()),
            }),
            EffectSlot::PathEffect => Self::PathEffect(match tag {
                0 => {
                    let n = r.count(4)?;
                    let mut intervals = Vec::with_capacity(n);
                    for _ in 0..n {
                        intervals.push(r.f32()?);
                    }
                    PathEffect::Dash {
                        intervals,
                        phase: r.f32()?,
                    }
                }
                1 => PathEffect::Corner { radius: r.f32()? },
                2 => PathEffect::Discrete {
                    segment_length: r.f32()?,
                    deviation: r.f32()?,
                    seed: r.u32()?,
                },
                _ => return Err(bad_tag()),
            }),
            EffectSlot::Rasterizer => match tag {
                0 => {
                    let n = r.count(8)?;
                    let mut offsets = Vec::with_capacity(n);
                    for _ in 0..n {
                        offsets.push(PointF::read(&mut r)?);
                    }
                    Self::Rasterizer(Rasterizer::Layers { offsets })
                }
                _ => return Err(bad_tag()),
            },
            EffectSlot::Shader => Self::Shader(match tag {
                0 => Shader::Solid(r.color()?),
                1 => {
                    let start = PointF::read(&mut r)?;
                    let end = PointF::read(&mut r)?;
                    let (stops, extend) = read_stops(&mut r)?;
                    Shader::LinearGradient {
                        start,
                        end,
                        stops,
                        extend,
                    }
                }
                2 => {
                    let center = PointF::read(&mut r)?;
                    let radius = r.f32()?;
                    let (stops, extend) = read_stops(&mut r)?;
                    Shader::RadialGradient {
                        center,
                        radius,
                        stops,
                        extend,
                    }
                }
                _ => return Err(bad_tag()),
            }),
            EffectSlot::ImageFilter => Self::ImageFilter(match tag {
                0 => ImageFilter::Flood { color: r.color()? },
                1 => ImageFilter::Blur {
                    std_deviation_x: r.f32()?,
                    std_deviation_y: r.f32()?,
                },
                2 => ImageFilter::DropShadow {
                    dx: r.f32()?,
                    dy: r.f32()?,
                    std_deviation_x: r.f32()?,
                    std_deviation_y: r.f32()?,
                    color: r.color()?,
                },
                3 => ImageFilter::Offset {
                    dx: r.f32()?,
                    dy: r.f32()?,
                },
                _ => return Err(bad_tag()),
            }),
            EffectSlot::Blend => match tag {
                0 => Self::Blend(read_blend(&mut r)?),
                _ => return Err(bad_tag()),
            },
        };
        Ok(effect)
    }
}

fn write_blend(w: &mut WordWriter, mode: BlendMode) {
    w.u32(u32::from(mode.mix as u8));
    w.u32(u32::from(mode.compose as u8));
}

fn read_blend(r: &mut WordReader<'_>) -> Result<BlendMode, DecodeError> {
    let mix = match r.u32()? {
        0 => Mix::Normal,
        1 => Mix::Multiply,
        2 => Mix::Screen,
        3 => Mix::Overlay,
        4 => Mix::Darken,
        5 => Mix::Lighten,
        6 => Mix::ColorDodge,
        7 => Mix::ColorBurn,
        8 => Mix::HardLight,
        9 => Mix::SoftLight,
        10 => Mix::Difference,
        11 => Mix::Exclusion,
        12 => Mix::Hue,
        13 => Mix::Saturation,
        14 => Mix::Color,
        15 => Mix::Luminosity,
        v => return Err(DecodeError::invalid("blend mix", v)),
    };
    let compose = match r.u32()? {
        0 => Compose::Clear,
        1 => Compose::Copy,
        2 => Compose::Dest,
        3 => Compose::SrcOver,
        4 => Compose::DestOver,
        5 => Compose::SrcIn,
        6 => Compose::DestIn,
        7 => Compose::SrcOut,
        8 => Compose::DestOut,
        9 => Compose::SrcAtop,
        10 => Compose::DestAtop,
        11 => Compose::Xor,
        12 => Compose::Plus,
        13 => Compose::PlusLighter,
        v => return Err(DecodeError::invalid("blend compose", v)),
    };
    Ok(BlendMode::new(mix, compose))
}

fn write_stops(w: &mut WordWriter, stops: &[GradientStop], extend: Extend) {
    w.u32(match extend {
        Extend::Pad => 0,
        Extend::Repeat => 1,
        Extend::Reflect => 2,
    });
    w.u32(crate::words::blob_len(stops.len()));
    for s in stops {
        w.f32(s.offset);
        w.color(s.color);
    }
}

fn read_stops(r: &mut WordReader<'_>) -> Result<(Vec<GradientStop>, Extend), DecodeError> {
    let extend = match r.u32()? {
        0 => Extend::Pad,
        1 => Extend::Repeat,
        2 => Extend::Reflect,
        v => return Err(DecodeError::invalid("gradient extend", v)),
    };
    let n = r.count(8)?;
    let mut stops = Vec::with_capacity(n);
    for _ in 0..n {
        stops.push(GradientStop {
            offset: r.f32()?,
            color: r.color()?,
        });
    }
    Ok((stops, extend))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba8 = Rgba8 {
        r: 255,
        g: 0,
        b: 0,
        a: 255,
    };

    #[test]
    fn flattened_bytes_rebuild_the_effect() {
        let effects = [
            Effect::from(ColorFilter::Blend {
                color: RED,
                mode: BlendMode::new(Mix::Multiply, Compose::SrcIn),
            }),
            Effect::from(PathEffect::Dash {
                intervals: vec![4.0, 2.0, 1.0, 2.0],
                phase: 0.5,
            }),
            Effect::from(Shader::RadialGradient {
                center: PointF::new(10.0, 10.0),
                radius: 5.0,
                stops: vec![
                    GradientStop {
                        offset: 0.0,
                        color: RED,
                    },
                    GradientStop {
                        offset: 1.0,
                        color: Rgba8 {
                            r: 0,
                            g: 0,
                            b: 255,
                            a: 128,
                        },
                    },
                ],
                extend: Extend::Reflect,
            }),
            Effect::from(BlendMode::new(Mix::Screen, Compose::SrcOver)),
        ];
        for e in effects {
            assert_eq!(Effect::unflatten(&e.flatten()).unwrap(), e);
        }
    }

    #[test]
    fn equal_parameters_flatten_identically() {
        let a = Effect::from(MaskFilter::Blur {
            style: BlurStyle::Outer,
            sigma: 3.0,
        });
        let b = Effect::from(MaskFilter::Blur {
            style: BlurStyle::Outer,
            sigma: 3.0,
        });
        assert_eq!(a.flatten(), b.flatten());
    }

    #[test]
    fn unknown_variant_is_rejected() {
        let mut w = WordWriter::default();
        w.u32(EffectSlot::Shader as u32);
        w.u32(77);
        assert_eq!(
            Effect::unflatten(w.as_bytes()),
            Err(DecodeError::invalid("effect variant", 77))
        );
    }

    #[test]
    fn slot_order_is_stable() {
        for (i, slot) in EffectSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
            assert_eq!(EffectSlot::from_u8(u8::try_from(i).unwrap()), Some(*slot));
        }
        assert_eq!(EffectSlot::from_u8(8), None);
    }
}
