// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint deltas: the minimal run of paint words that turns the last sent paint into the next.
//!
//! Fields are visited in a fixed order (flags, color, style, join, cap, width, miter, encoding,
//! hinting, align, text size, text scale, text skew, typeface, then the eight effect slots).
//! Each differing field contributes one word, or two for fields with a payload.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::effect::{Effect, EffectSlot};
use crate::error::DecodeError;
use crate::op::{PaintOp, pack, unpack};
use crate::paint::{
    Hinting, Paint, PaintFlags, PaintStyle, StrokeCap, StrokeJoin, TextAlign, TextEncoding,
};
use crate::typeface::Typeface;
use crate::words::WordReader;

/// Paint words for one delta. Large enough for every field changing at once.
pub type PaintWords = SmallVec<[u32; 32]>;

/// Resolves references held by a paint into stream handles.
///
/// Implementations emit definition instructions for resources the stream has not seen yet,
/// before returning their handle.
pub trait PaintResources {
    /// Stream id for a typeface; 0 for none.
    fn typeface_id(&mut self, face: Option<&Arc<Typeface>>) -> u32;

    /// Handle for the effect in `slot`; 0 for none.
    fn effect_handle(&mut self, slot: EffectSlot, effect: Option<&Arc<Effect>>) -> u32;
}

fn same_ref<T>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn color_word(c: peniko::color::Rgba8) -> u32 {
    u32::from_le_bytes([c.r, c.g, c.b, c.a])
}

/// Producer side: remembers the last paint sent and the handles it resolved to.
#[derive(Debug, Default)]
pub struct PaintDeltaEncoder {
    base: Paint,
    typeface_id: u32,
    effect_handles: [u32; EffectSlot::COUNT],
}

impl PaintDeltaEncoder {
    /// Encoder whose base is the default paint, matching a fresh decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The paint the consumer currently holds.
    pub fn last_sent(&self) -> &Paint {
        &self.base
    }

    /// Words that bring the consumer from [`last_sent`](Self::last_sent) to `paint`.
    ///
    /// Empty when nothing differs. The base is updated as if the words were delivered.
    pub fn encode<R: PaintResources + ?Sized>(&mut self, paint: &Paint, res: &mut R) -> PaintWords {
        let mut out = PaintWords::new();
        let base = &mut self.base;

        if paint.flags != base.flags {
            out.push(pack(PaintOp::Flags as u8, 0, paint.flags.bits()));
            base.flags = paint.flags;
        }
        if paint.color != base.color {
            out.push(pack(PaintOp::Color as u8, 0, 0));
            out.push(color_word(paint.color));
            base.color = paint.color;
        }
        if paint.style != base.style {
            out.push(pack(PaintOp::Style as u8, 0, paint.style as u32));
            base.style = paint.style;
        }
        if paint.join != base.join {
            out.push(pack(PaintOp::Join as u8, 0, paint.join as u32));
            base.join = paint.join;
        }
        if paint.cap != base.cap {
            out.push(pack(PaintOp::Cap as u8, 0, paint.cap as u32));
            base.cap = paint.cap;
        }
        let mut scalar = |op: PaintOp, next: f32, current: &mut f32| {
            if next.to_bits() != current.to_bits() {
                out.push(pack(op as u8, 0, 0));
                out.push(next.to_bits());
                *current = next;
            }
        };
        scalar(PaintOp::Width, paint.stroke_width, &mut base.stroke_width);
        scalar(PaintOp::Miter, paint.stroke_miter, &mut base.stroke_miter);
        if paint.text_encoding != base.text_encoding {
            out.push(pack(PaintOp::Encoding as u8, 0, paint.text_encoding as u32));
            base.text_encoding = paint.text_encoding;
        }
        if paint.hinting != base.hinting {
            out.push(pack(PaintOp::Hinting as u8, 0, paint.hinting as u32));
            base.hinting = paint.hinting;
        }
        if paint.text_align != base.text_align {
            out.push(pack(PaintOp::Align as u8, 0, paint.text_align as u32));
            base.text_align = paint.text_align;
        }
        let mut scalar = |op: PaintOp, next: f32, current: &mut f32| {
            if next.to_bits() != current.to_bits() {
                out.push(pack(op as u8, 0, 0));
                out.push(next.to_bits());
                *current = next;
            }
        };
        scalar(PaintOp::TextSize, paint.text_size, &mut base.text_size);
        scalar(PaintOp::TextScaleX, paint.text_scale_x, &mut base.text_scale_x);
        scalar(PaintOp::TextSkewX, paint.text_skew_x, &mut base.text_skew_x);

        if !same_ref(paint.typeface.as_ref(), base.typeface.as_ref()) {
            let id = res.typeface_id(paint.typeface.as_ref());
            if id != self.typeface_id {
                out.push(pack(PaintOp::Typeface as u8, 0, id));
                self.typeface_id = id;
            }
            // A refused typeface reaches the consumer as none.
            base.typeface = if id == 0 { None } else { paint.typeface.clone() };
        }

        for slot in EffectSlot::ALL {
            let next = paint.effect(slot);
            if same_ref(next, base.effect(slot)) {
                continue;
            }
            let handle = res.effect_handle(slot, next);
            if handle != self.effect_handles[slot.index()] {
                out.push(pack(PaintOp::FlatIndex as u8, slot as u8, handle));
                self.effect_handles[slot.index()] = handle;
            }
            match next {
                Some(e) if handle != 0 => base.set_shared_effect(Arc::clone(e)),
                _ => base.clear_effect(slot),
            }
        }
        out
    }
}

/// Consumer side: apply a run of paint words to `paint`.
///
/// `typefaces[i]` is stream typeface id `i + 1`; `effects[i]` is effect handle `i + 1`.
/// On error `paint` is left unchanged.
pub fn apply_paint_words(
    paint: &mut Paint,
    bytes: &[u8],
    typefaces: &[Arc<Typeface>],
    effects: &[Arc<Effect>],
) -> Result<(), DecodeError> {
    let mut next = paint.clone();
    let mut r = WordReader::new(bytes);
    while !r.is_empty() {
        let (op, flags, data) = unpack(r.u32()?);
        let op = PaintOp::try_from(op).map_err(DecodeError::UnknownPaintOp)?;
        match op {
            PaintOp::Flags => {
                next.flags = PaintFlags::from_bits(data)
                    .ok_or(DecodeError::invalid("paint flags", data))?;
            }
            PaintOp::Color => next.color = r.color()?,
            PaintOp::Style => next.style = PaintStyle::from_u32(data)?,
            PaintOp::Join => next.join = StrokeJoin::from_u32(data)?,
            PaintOp::Cap => next.cap = StrokeCap::from_u32(data)?,
            PaintOp::Width => next.stroke_width = r.f32()?,
            PaintOp::Miter => next.stroke_miter = r.f32()?,
            PaintOp::Encoding => next.text_encoding = TextEncoding::from_u32(data)?,
            PaintOp::Hinting => next.hinting = Hinting::from_u32(data)?,
            PaintOp::Align => next.text_align = TextAlign::from_u32(data)?,
            PaintOp::TextSize => next.text_size = r.f32()?,
            PaintOp::TextScaleX => next.text_scale_x = r.f32()?,
            PaintOp::TextSkewX => next.text_skew_x = r.f32()?,
            PaintOp::Typeface => {
                next.typeface = match data {
                    0 => None,
                    id => Some(Arc::clone(
                        typefaces
                            .get(id as usize - 1)
                            .ok_or(DecodeError::undefined("typeface", id))?,
                    )),
                };
            }
            PaintOp::FlatIndex => {
                let slot = EffectSlot::from_u8(flags)
                    .ok_or(DecodeError::invalid("effect slot", u32::from(flags)))?;
                let effect = match data {
                    0 => None,
                    handle => Some(Arc::clone(
                        effects
                            .get(handle as usize - 1)
                            .ok_or(DecodeError::undefined("effect", handle))?,
                    )),
                };
                next.put_effect(slot, effect)?;
            }
        }
    }
    *paint = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{BlurStyle, MaskFilter, Shader};
    use crate::flatten::FlatTable;
    use crate::typeface::{FontStyle, TypefaceTable};
    use peniko::color::Rgba8;
    use proptest::prelude::*;

    /// Resolves handles without a stream, keeping the decoded tables alongside.
    struct Tables {
        faces: TypefaceTable,
        face_list: Vec<Arc<Typeface>>,
        flat: FlatTable,
        effect_list: Vec<Arc<Effect>>,
        definitions: usize,
    }

    impl Tables {
        fn new() -> Self {
            Self {
                faces: TypefaceTable::default(),
                face_list: Vec::new(),
                flat: FlatTable::one_based(),
                effect_list: Vec::new(),
                definitions: 0,
            }
        }
    }

    impl PaintResources for Tables {
        fn typeface_id(&mut self, face: Option<&Arc<Typeface>>) -> u32 {
            let Some(face) = face else { return 0 };
            let (id, is_new) = self.faces.id_for(face);
            if is_new {
                self.face_list.push(Arc::clone(face));
                self.definitions += 1;
            }
            id
        }

        fn effect_handle(&mut self, _slot: EffectSlot, effect: Option<&Arc<Effect>>) -> u32 {
            let Some(effect) = effect else { return 0 };
            let interned = self.flat.intern(&effect.flatten()).unwrap();
            if interned.is_new {
                self.effect_list.push(Arc::clone(effect));
                self.definitions += 1;
            }
            interned.handle
        }
    }

    fn to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn identical_paint_emits_nothing() {
        let mut enc = PaintDeltaEncoder::new();
        let mut tables = Tables::new();
        assert!(enc.encode(&Paint::default(), &mut tables).is_empty());
        let p = Paint::stroke(
            Rgba8 {
                r: 9,
                g: 9,
                b: 9,
                a: 9,
            },
            2.0,
        );
        assert!(!enc.encode(&p, &mut tables).is_empty());
        assert!(enc.encode(&p, &mut tables).is_empty());
    }

    #[test]
    fn one_changed_field_is_one_word_group() {
        let mut enc = PaintDeltaEncoder::new();
        let mut tables = Tables::new();
        let p = Paint {
            style: PaintStyle::Stroke,
            ..Paint::default()
        };
        let words = enc.encode(&p, &mut tables);
        assert_eq!(words.as_slice(), &[pack(PaintOp::Style as u8, 0, 1)]);

        let p = Paint {
            text_size: 20.0,
            ..p
        };
        let words = enc.encode(&p, &mut tables);
        assert_eq!(
            words.as_slice(),
            &[pack(PaintOp::TextSize as u8, 0, 0), 20.0_f32.to_bits()]
        );
    }

    #[test]
    fn fields_come_out_in_fixed_order() {
        let mut enc = PaintDeltaEncoder::new();
        let mut tables = Tables::new();
        let p = Paint {
            text_skew_x: -0.25,
            flags: PaintFlags::ANTI_ALIAS,
            cap: StrokeCap::Round,
            ..Paint::default()
        };
        let ops: Vec<u8> = enc
            .encode(&p, &mut tables)
            .iter()
            .filter_map(|w| {
                let (op, _, _) = unpack(*w);
                PaintOp::try_from(op).ok()
            })
            .map(|op| op as u8)
            .collect();
        assert!(ops.is_sorted(), "paint ops out of order: {ops:?}");
    }

    #[test]
    fn equal_effects_built_twice_share_a_handle() {
        let mut enc = PaintDeltaEncoder::new();
        let mut tables = Tables::new();
        let blur = || MaskFilter::Blur {
            style: BlurStyle::Normal,
            sigma: 2.0,
        };
        let a = Paint::default().with_effect(blur());
        let b = Paint::default().with_effect(blur());
        assert_eq!(enc.encode(&a, &mut tables).len(), 1);
        assert!(
            enc.encode(&b, &mut tables).is_empty(),
            "same bytes resolve to the same handle"
        );
        assert_eq!(tables.definitions, 1);
    }

    #[test]
    fn unknown_handles_leave_the_paint_untouched() {
        let mut paint = Paint::default();
        let words = [
            pack(PaintOp::Style as u8, 0, 1),
            pack(PaintOp::FlatIndex as u8, EffectSlot::Shader as u8, 3),
        ];
        assert_eq!(
            apply_paint_words(&mut paint, &to_bytes(&words), &[], &[]),
            Err(DecodeError::undefined("effect", 3))
        );
        assert_eq!(paint, Paint::default());
    }

    #[test]
    fn unknown_paint_ops_are_rejected() {
        let mut paint = Paint::default();
        let words = [pack(99, 0, 0)];
        assert_eq!(
            apply_paint_words(&mut paint, &to_bytes(&words), &[], &[]),
            Err(DecodeError::UnknownPaintOp(99))
        );
    }

    /// Every table is full.
    struct Exhausted;

    impl PaintResources for Exhausted {
        fn typeface_id(&mut self, _face: Option<&Arc<Typeface>>) -> u32 {
            0
        }

        fn effect_handle(&mut self, _slot: EffectSlot, _effect: Option<&Arc<Effect>>) -> u32 {
            0
        }
    }

    #[test]
    fn refused_handles_leave_the_base_empty() {
        let mut enc = PaintDeltaEncoder::new();
        let mut p = Paint::default().with_effect(MaskFilter::Blur {
            style: BlurStyle::Normal,
            sigma: 2.0,
        });
        p.typeface = Some(Arc::new(Typeface::new("Sans", FontStyle::empty())));
        let words = enc.encode(&p, &mut Exhausted);
        assert!(words.is_empty());
        assert_eq!(enc.last_sent().typeface, None);
        assert!(enc.last_sent().effect(EffectSlot::MaskFilter).is_none());

        let mut decoded = Paint::default();
        apply_paint_words(&mut decoded, &to_bytes(&words), &[], &[]).unwrap();
        assert_eq!(&decoded, enc.last_sent());

        let mut tables = Tables::new();
        let words = enc.encode(&p, &mut tables);
        assert_eq!(words.len(), 2, "both resolve once the tables have room");
        apply_paint_words(&mut decoded, &to_bytes(&words), &tables.face_list, &tables.effect_list)
            .unwrap();
        assert_eq!(&decoded, enc.last_sent());
        assert_eq!(decoded, p);
    }

    fn arb_paint() -> impl Strategy<Value = Paint> {
        (
            (any::<u8>(), any::<u8>(), 0_u32..3, 0_u32..3, 0_u32..3),
            (0.0_f32..20.0, 1.0_f32..10.0, 0_u32..4, 6.0_f32..72.0),
            (any::<bool>(), any::<bool>(), any::<bool>(), 0_u32..0x2000),
        )
            .prop_map(
                |((r, g, style, join, cap), (width, miter, enc, size), (face, shader, blur, flags))| {
                    let mut p = Paint {
                        flags: PaintFlags::from_bits_truncate(flags),
                        color: Rgba8 { r, g, b: 7, a: 255 },
                        style: PaintStyle::from_u32(style).unwrap(),
                        join: StrokeJoin::from_u32(join).unwrap(),
                        cap: StrokeCap::from_u32(cap).unwrap(),
                        stroke_width: width,
                        stroke_miter: miter,
                        text_encoding: TextEncoding::from_u32(enc).unwrap(),
                        text_size: size,
                        ..Paint::default()
                    };
                    if face {
                        p.typeface = Some(Arc::new(Typeface::new("Sans", FontStyle::BOLD)));
                    }
                    if shader {
                        p.set_effect(Shader::Solid(Rgba8 { r: g, g: r, b: 0, a: 255 }));
                    }
                    if blur {
                        p.set_effect(MaskFilter::Blur {
                            style: BlurStyle::Inner,
                            sigma: width,
                        });
                    }
                    p
                },
            )
    }

    proptest! {
        #[test]
        fn decoder_tracks_encoder(paints in proptest::collection::vec(arb_paint(), 1..12)) {
            let mut enc = PaintDeltaEncoder::new();
            let mut tables = Tables::new();
            let mut current = Paint::default();
            for p in &paints {
                let words = enc.encode(p, &mut tables);
                apply_paint_words(&mut current, &to_bytes(&words), &tables.face_list, &tables.effect_list).unwrap();
                prop_assert_eq!(&current, p);
                prop_assert_eq!(&current, enc.last_sent());
            }
        }
    }
}
