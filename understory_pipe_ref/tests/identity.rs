// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resources that share storage or names still replay as the one that was drawn.

use std::sync::Arc;

use peniko::color::Rgba8;
use proptest::prelude::*;
use understory_pipe::{
    Bitmap, Canvas, FontRegistry, FontStyle, IRect, Paint, PictureRecorder, PixelFormat,
    RecordConfig, RecordFlags, Typeface,
};
use understory_pipe_ref::RefCanvas;

const SIZE: u32 = 64;

/// A 4x4 bitmap whose pixels are all distinct.
fn parent(immutable: bool) -> Bitmap {
    let mut pixels = Vec::new();
    for i in 0..16_u8 {
        pixels.extend_from_slice(&[i, i * 8, 255 - i, 255]);
    }
    let bm = Bitmap::new(4, 4, PixelFormat::Rgba8888, pixels).unwrap();
    if immutable { bm.into_immutable() } else { bm }
}

/// Faces that agree on family and, for the first three, on style.
fn faces() -> Vec<Arc<Typeface>> {
    let face = |style, data| Arc::new(Typeface::from_data("Font", style, data).unwrap());
    vec![
        face(FontStyle::empty(), vec![1, 2, 3, 4]),
        face(FontStyle::empty(), vec![9, 9, 9, 9]),
        face(FontStyle::empty(), vec![5, 6, 7, 8, 9]),
        face(FontStyle::BOLD, vec![1, 2, 3, 4]),
    ]
}

fn configs() -> [(&'static str, RecordConfig); 3] {
    [
        ("same process", RecordConfig::new()),
        (
            "cross process",
            RecordConfig::new()
                .with_flags(RecordFlags::CROSS_PROCESS)
                .with_fonts(Arc::new(FontRegistry::new())),
        ),
        (
            "shared address space",
            RecordConfig::new()
                .with_flags(RecordFlags::CROSS_PROCESS | RecordFlags::SHARED_ADDRESS_SPACE)
                .with_fonts(Arc::new(FontRegistry::new())),
        ),
    ]
}

fn replayed(config: &RecordConfig, scene: &dyn Fn(&mut dyn Canvas)) -> RefCanvas {
    let mut recorder = PictureRecorder::new(SIZE, SIZE, config).unwrap();
    scene(recorder.canvas());
    let picture = recorder.finish_recording();
    let mut canvas = RefCanvas::new(SIZE, SIZE);
    picture.playback(&mut canvas).unwrap();
    canvas
}

fn assert_replays(scene: &dyn Fn(&mut dyn Canvas)) {
    let mut direct = RefCanvas::new(SIZE, SIZE);
    scene(&mut direct);
    for (name, config) in configs() {
        let played = replayed(&config, scene);
        assert_eq!(direct.events(), played.events(), "{name}");
    }
}

#[test]
fn subsets_sharing_the_parent_offset_replay_as_subsets() {
    for immutable in [false, true] {
        let bm = parent(immutable);
        let corner = bm.extract_subset(IRect::new(0, 0, 2, 2)).unwrap();
        let row = bm.extract_subset(IRect::new(0, 0, 4, 1)).unwrap();
        let column = bm.extract_subset(IRect::new(0, 0, 1, 4)).unwrap();
        assert_eq!(corner.offset(), bm.offset());
        assert_replays(&|c: &mut dyn Canvas| {
            c.draw_bitmap(&bm, 0.0, 0.0, None);
            c.draw_bitmap(&corner, 10.0, 0.0, None);
            c.draw_sprite(&row, 20, 0, None);
            c.draw_bitmap(&column, 30.0, 0.0, None);
            c.draw_bitmap(&bm, 40.0, 0.0, None);
            c.draw_bitmap(&corner, 50.0, 0.0, None);
        });
    }
}

#[test]
fn subsets_drawn_before_their_parent_replay_as_drawn() {
    let bm = parent(false);
    let inner = bm.extract_subset(IRect::new(1, 1, 3, 3)).unwrap();
    let corner = bm.extract_subset(IRect::new(0, 0, 2, 2)).unwrap();
    assert_replays(&|c: &mut dyn Canvas| {
        c.draw_bitmap(&inner, 0.0, 0.0, None);
        c.draw_bitmap(&corner, 8.0, 0.0, None);
        c.draw_bitmap(&bm, 16.0, 0.0, None);
        c.draw_bitmap(&inner, 24.0, 0.0, None);
    });
}

#[test]
fn same_named_typefaces_replay_as_drawn() {
    let faces = faces();
    assert_replays(&|c: &mut dyn Canvas| {
        for (i, face) in faces.iter().chain(faces.iter().rev()).enumerate() {
            let mut paint = Paint::default();
            paint.typeface = Some(Arc::clone(face));
            c.draw_text(b"abc", 0.0, 10.0 * f32::from(u8::try_from(i).unwrap()), &paint);
        }
    });
}

#[derive(Clone, Debug)]
enum Draw {
    Subset(IRect),
    Text(usize),
}

fn subset() -> impl Strategy<Value = IRect> {
    (0_i32..4, 0_i32..4, 1_i32..5, 1_i32..5).prop_map(|(x, y, w, h)| {
        IRect::new(x, y, (x + w).min(4), (y + h).min(4))
    })
}

fn draw() -> impl Strategy<Value = Draw> {
    prop_oneof![
        subset().prop_map(Draw::Subset),
        (0_usize..4).prop_map(Draw::Text),
    ]
}

proptest! {
    #[test]
    fn shared_storage_and_names_replay_exactly(
        immutable in any::<bool>(),
        draws in proptest::collection::vec(draw(), 1..24),
    ) {
        let bm = parent(immutable);
        let faces = faces();
        let scene = |c: &mut dyn Canvas| {
            for d in &draws {
                match *d {
                    Draw::Subset(r) => {
                        let view = bm.extract_subset(r).unwrap();
                        c.draw_bitmap(&view, 1.0, 1.0, None);
                    }
                    Draw::Text(i) => {
                        let mut paint = Paint::new(Rgba8 { r: 1, g: 2, b: 3, a: 255 });
                        paint.typeface = Some(Arc::clone(&faces[i]));
                        c.draw_text(b"z", 2.0, 2.0, &paint);
                    }
                }
            }
        };
        let mut direct = RefCanvas::new(SIZE, SIZE);
        scene(&mut direct);
        for (name, config) in configs() {
            let played = replayed(&config, &scene);
            prop_assert_eq!(direct.events(), played.events(), "{}", name);
        }
    }
}
