// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drawing straight onto a surface and drawing through a recording produce the same calls.

use std::sync::Arc;

use kurbo::Affine;
use peniko::color::Rgba8;
use peniko::color::palette::css;
use peniko::{BlendMode, Extend, Mix};
use proptest::prelude::*;
use understory_pipe::{
    Bitmap, BlurStyle, Canvas, ColorFilter, DrawLooper, FontRegistry, FontStyle, GradientStop,
    Hinting, IRect, ImageFilter, MaskFilter, Paint, PaintFlags, PaintStyle, Path, PathEffect,
    PictureRecorder, PixelFormat, PointF, PointMode, RecordConfig, RecordFlags, RectF, Region,
    RegionOp, SaveFlags, Shader, StrokeCap, StrokeJoin, TextAlign, Typeface, VertexMode,
    Vertices,
};
use understory_pipe_ref::{Call, RefCanvas};

const W: u32 = 200;
const H: u32 = 150;

fn rgba(c: peniko::color::AlphaColor<peniko::color::Srgb>) -> Rgba8 {
    c.to_rgba8()
}

/// Bitmaps and typefaces a scene draws with.
struct Assets {
    image: Bitmap,
    mask: Bitmap,
    face: Arc<Typeface>,
}

impl Assets {
    fn new() -> Self {
        let mut pixels = Vec::new();
        for y in 0..3_u8 {
            for x in 0..4_u8 {
                pixels.extend_from_slice(&[x * 60, y * 80, 128, 255]);
            }
        }
        Self {
            image: Bitmap::new(4, 3, PixelFormat::Rgba8888, pixels).unwrap(),
            mask: Bitmap::new(2, 2, PixelFormat::Alpha8, vec![0, 85, 170, 255])
                .unwrap()
                .into_immutable(),
            face: Arc::new(Typeface::new("Serif", FontStyle::BOLD)),
        }
    }
}

/// Touches every kind of call, with every optional argument both present and absent.
///
/// Avoids calls that record nothing (identity transforms, empty draws).
fn scene<K: Canvas + ?Sized>(c: &mut K, assets: &Assets) {
    let red = Paint::new(rgba(css::RED));
    let mut stroke = Paint::stroke(rgba(css::NAVY), 3.0);
    stroke.join = StrokeJoin::Round;
    stroke.cap = StrokeCap::Square;
    stroke.flags = PaintFlags::ANTI_ALIAS | PaintFlags::DITHER;
    let wedge = Path::new()
        .move_to(0.0, 0.0)
        .line_to(50.0, 0.0)
        .quad_to(60.0, 10.0, 50.0, 50.0)
        .curve_to(40.0, 60.0, 10.0, 60.0, 0.0, 50.0)
        .close();

    c.clear(rgba(css::WHITE));
    c.save(SaveFlags::MATRIX);
    c.translate(12.5, -3.0);
    c.scale(2.0, 0.5);
    c.rotate(30.0);
    c.skew(0.25, 0.0);
    c.concat(Affine::new([1.0, 0.5, 0.0, 1.0, 3.0, 4.0]));
    c.clip_rect(RectF::new(0.0, 0.0, 100.0, 100.0), RegionOp::Intersect, true);
    c.clip_path(&wedge, RegionOp::Difference, false);
    c.clip_region(&Region::from_rect(IRect::new(0, 0, 120, 90)), RegionOp::Union);
    c.draw_rect(RectF::new(1.0, 2.0, 30.0, 40.0), &red);
    c.draw_rect(RectF::new(5.0, 5.0, 25.0, 25.0), &stroke);
    c.restore();

    let layer = Paint::new(Rgba8 {
        r: 0,
        g: 0,
        b: 255,
        a: 128,
    })
    .with_effect(BlendMode::from(Mix::Multiply));
    c.save_layer(Some(RectF::new(10.0, 10.0, 90.0, 70.0)), Some(&layer), SaveFlags::default());
    let gradient = Paint::default().with_effect(Shader::LinearGradient {
        start: PointF::new(0.0, 0.0),
        end: PointF::new(100.0, 0.0),
        stops: vec![
            GradientStop {
                offset: 0.0,
                color: rgba(css::GOLD),
            },
            GradientStop {
                offset: 1.0,
                color: rgba(css::TEAL),
            },
        ],
        extend: Extend::Reflect,
    });
    c.draw_paint(&gradient);
    let dashed = Paint::stroke(rgba(css::BLACK), 2.0).with_effect(PathEffect::Dash {
        intervals: vec![4.0, 2.0],
        phase: 1.0,
    });
    c.draw_points(
        PointMode::Lines,
        &[
            PointF::new(0.0, 0.0),
            PointF::new(20.0, 20.0),
            PointF::new(40.0, 0.0),
            PointF::new(60.0, 20.0),
        ],
        &dashed,
    );
    let mut filtered = Paint::new(rgba(css::ORANGE))
        .with_effect(ColorFilter::Lighting {
            mul: rgba(css::GRAY),
            add: rgba(css::BLACK),
        })
        .with_effect(MaskFilter::Blur {
            style: BlurStyle::Outer,
            sigma: 2.0,
        });
    filtered.style = PaintStyle::StrokeAndFill;
    filtered.stroke_width = 1.5;
    c.draw_path(&wedge, &filtered);
    c.restore();

    c.save_layer(None, None, SaveFlags::CLIP);
    c.draw_bitmap(&assets.image, 1.0, 2.0, None);
    c.draw_bitmap(&assets.image, 1.0, 2.0, Some(&red));
    c.draw_bitmap_rect(
        &assets.image,
        Some(IRect::new(1, 0, 3, 2)),
        RectF::new(50.0, 50.0, 70.0, 60.0),
        None,
    );
    let shadowed = Paint::default()
        .with_effect(DrawLooper::Shadow {
            dx: 2.0,
            dy: 3.0,
            sigma: 1.0,
            color: rgba(css::DIM_GRAY),
        })
        .with_effect(ImageFilter::Offset { dx: 4.0, dy: -4.0 });
    c.draw_bitmap_rect(&assets.image, None, RectF::new(0.0, 80.0, 40.0, 110.0), Some(&shadowed));
    c.draw_bitmap_nine(
        &assets.image,
        IRect::new(1, 1, 3, 2),
        RectF::new(100.0, 10.0, 180.0, 60.0),
        None,
    );
    c.draw_sprite(&assets.mask, 5, 6, Some(&red));
    c.restore();

    let mut text = Paint::new(rgba(css::DARK_GREEN));
    text.typeface = Some(Arc::clone(&assets.face));
    text.text_size = 18.0;
    text.text_align = TextAlign::Center;
    text.hinting = Hinting::Full;
    text.text_scale_x = 1.25;
    text.text_skew_x = -0.25;
    text.flags = PaintFlags::SUBPIXEL_TEXT | PaintFlags::LINEAR_TEXT;
    c.draw_text(b"hello", 10.0, 20.0, &text);
    c.draw_pos_text(
        b"abc",
        &[
            PointF::new(1.0, 1.0),
            PointF::new(9.0, 1.0),
            PointF::new(17.0, 2.0),
        ],
        &text,
    );
    c.draw_pos_text_h(b"abcd", &[0.0, 8.0, 16.0, 24.0], 40.0, &text);
    c.draw_text_on_path(b"path", &wedge, Some(Affine::scale(2.0)), &text);
    c.draw_text_on_path(b"path", &wedge, None, &text);

    let tri = [
        PointF::new(0.0, 0.0),
        PointF::new(30.0, 0.0),
        PointF::new(0.0, 30.0),
    ];
    let texs = [
        PointF::new(0.0, 0.0),
        PointF::new(1.0, 0.0),
        PointF::new(0.0, 1.0),
    ];
    let colors = [rgba(css::RED), rgba(css::LIME), rgba(css::BLUE)];
    c.draw_vertices(
        &Vertices {
            mode: VertexMode::Triangles,
            positions: &tri,
            tex_coords: Some(&texs),
            colors: Some(&colors),
            indices: Some(&[0, 1, 2]),
        },
        &red,
    );
    let fan = [
        PointF::new(50.0, 50.0),
        PointF::new(60.0, 50.0),
        PointF::new(60.0, 60.0),
        PointF::new(50.0, 60.0),
    ];
    c.draw_vertices(&Vertices::new(VertexMode::TriangleFan, &fan), &stroke);
    c.draw_data(b"opaque bytes!");

    c.set_matrix(Affine::translate((1.0, 1.0)));
    c.draw_rect(RectF::from_xywh(0.0, 0.0, 8.0, 8.0), &Paint::default());
    c.clear(Rgba8 {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    });
}

fn direct(assets: &Assets) -> RefCanvas {
    let mut canvas = RefCanvas::new(W, H);
    scene(&mut canvas, assets);
    canvas
}

fn recorded(config: &RecordConfig, assets: &Assets) -> RefCanvas {
    let mut recorder = PictureRecorder::new(W, H, config).unwrap();
    scene(recorder.canvas(), assets);
    let picture = recorder.finish_recording();
    let mut canvas = RefCanvas::new(W, H);
    picture.playback(&mut canvas).unwrap();
    canvas
}

fn assert_same_events(expected: &RefCanvas, actual: &RefCanvas) {
    assert_eq!(expected.names(), actual.names());
    for (i, (e, a)) in expected.events().iter().zip(actual.events()).enumerate() {
        assert_eq!(e, a, "event {i} ({}) differs", e.call.name());
    }
}

#[test]
fn same_process_recording_replays_every_call() {
    let assets = Assets::new();
    assert_same_events(&direct(&assets), &recorded(&RecordConfig::new(), &assets));
}

#[test]
fn cross_process_recording_replays_every_call() {
    let assets = Assets::new();
    let config = RecordConfig::new()
        .with_flags(RecordFlags::CROSS_PROCESS)
        .with_fonts(Arc::new(FontRegistry::new()));
    assert_same_events(&direct(&assets), &recorded(&config, &assets));
}

#[test]
fn shared_address_space_keeps_bitmaps_in_the_heap() {
    let assets = Assets::new();
    let config = RecordConfig::new()
        .with_flags(RecordFlags::CROSS_PROCESS | RecordFlags::SHARED_ADDRESS_SPACE);
    let mut recorder = PictureRecorder::new(W, H, &config).unwrap();
    scene(recorder.canvas(), &assets);
    let picture = recorder.finish_recording();
    assert!(!picture.heap().is_empty());

    let mut canvas = RefCanvas::new(W, H);
    picture.playback(&mut canvas).unwrap();
    assert_same_events(&direct(&assets), &canvas);
}

#[test]
fn small_blocks_record_the_same_calls() {
    let assets = Assets::new();
    let config = RecordConfig::new().with_min_block_size(4);
    assert_same_events(&direct(&assets), &recorded(&config, &assets));
}

#[test]
fn nested_pictures_play_inline() {
    let assets = Assets::new();
    let mut inner = PictureRecorder::new(W, H, &RecordConfig::new()).unwrap();
    inner.canvas().translate(5.0, 5.0);
    inner.canvas().draw_sprite(&assets.mask, 1, 1, None);
    inner
        .canvas()
        .draw_rect(RectF::new(0.0, 0.0, 4.0, 4.0), &Paint::new(rgba(css::PLUM)));
    let inner = inner.finish_recording();

    let mut outer = PictureRecorder::new(W, H, &RecordConfig::new()).unwrap();
    outer.canvas().save(SaveFlags::default());
    outer.canvas().draw_picture(&inner);
    outer.canvas().restore();
    let outer = outer.finish_recording();

    let mut canvas = RefCanvas::new(W, H);
    outer.playback(&mut canvas).unwrap();
    assert_eq!(
        canvas.names(),
        ["save", "translate", "draw_sprite", "draw_rect", "restore"]
    );
    let Some(Call::DrawSprite { bitmap, .. }) = canvas.calls().nth(2) else {
        panic!("expected a sprite");
    };
    assert_eq!(bitmap.pixels, assets.mask.read_pixels());
}

#[derive(Clone, Debug)]
enum Op {
    Save,
    Restore,
    Translate(f32, f32),
    Clip(RectF),
    Rect(RectF, u8, Option<f32>),
    Text(u8, f32),
}

fn rect() -> impl Strategy<Value = RectF> {
    (0_i16..150, 0_i16..150, 1_i16..60, 1_i16..60).prop_map(|(x, y, w, h)| {
        RectF::from_xywh(f32::from(x), f32::from(y), f32::from(w), f32::from(h))
    })
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Save),
        Just(Op::Restore),
        (1_i16..40, -20_i16..20)
            .prop_map(|(dx, dy)| Op::Translate(f32::from(dx), f32::from(dy))),
        rect().prop_map(Op::Clip),
        (rect(), any::<u8>(), proptest::option::of(1_u8..8))
            .prop_map(|(r, shade, w)| Op::Rect(r, shade, w.map(f32::from))),
        (any::<u8>(), 4_u8..40).prop_map(|(shade, size)| Op::Text(shade, f32::from(size))),
    ]
}

fn apply<K: Canvas + ?Sized>(c: &mut K, ops: &[Op]) {
    for op in ops {
        match *op {
            Op::Save => c.save(SaveFlags::default()),
            Op::Restore => c.restore(),
            Op::Translate(dx, dy) => c.translate(dx, dy),
            Op::Clip(r) => c.clip_rect(r, RegionOp::Intersect, false),
            Op::Rect(r, shade, width) => {
                let color = Rgba8 {
                    r: shade,
                    g: 255 - shade,
                    b: 7,
                    a: 255,
                };
                let paint = match width {
                    Some(w) => Paint::stroke(color, w),
                    None => Paint::new(color),
                };
                c.draw_rect(r, &paint);
            }
            Op::Text(shade, size) => {
                let mut paint = Paint::new(Rgba8 {
                    r: shade,
                    g: shade,
                    b: shade,
                    a: 255,
                });
                paint.text_size = size;
                c.draw_text(b"xy", 3.0, 4.0, &paint);
            }
        }
    }
}

proptest! {
    #[test]
    fn random_scenes_replay_exactly(ops in proptest::collection::vec(op(), 0..40)) {
        let mut expected = RefCanvas::new(W, H);
        apply(&mut expected, &ops);

        let mut recorder = PictureRecorder::new(W, H, &RecordConfig::new()).unwrap();
        apply(recorder.canvas(), &ops);
        let picture = recorder.finish_recording();
        let mut actual = RefCanvas::new(W, H);
        picture.playback(&mut actual).unwrap();

        prop_assert_eq!(expected.events(), actual.events());
    }
}
