// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use peniko::color::Rgba8;
use understory_pipe::{
    Canvas, Paint, Picture, PictureRecorder, RecordConfig, RecordFlags, RectF, RegionOp,
    SaveFlags,
};
use understory_pipe_ref::RefCanvas;

const SIZE: u32 = 2048;

/// `n × n` cells, each in its own scope with a fresh color.
fn grid<K: Canvas + ?Sized>(c: &mut K, n: u16) {
    let cell = SIZE as f32 / f32::from(n);
    for row in 0..n {
        for col in 0..n {
            c.save(SaveFlags::default());
            c.translate(f32::from(col) * cell, f32::from(row) * cell);
            let shade = ((row ^ col) & 0xFF) as u8;
            let color = Rgba8 {
                r: shade,
                g: 255 - shade,
                b: 90,
                a: 255,
            };
            if (row + col) % 2 == 0 {
                c.draw_rect(RectF::new(1.0, 1.0, cell - 1.0, cell - 1.0), &Paint::new(color));
            } else {
                c.draw_rect(
                    RectF::new(2.0, 2.0, cell - 2.0, cell - 2.0),
                    &Paint::stroke(color, 2.0),
                );
            }
            c.restore();
        }
    }
}

fn record(n: u16, flags: RecordFlags) -> Picture {
    let mut recorder = PictureRecorder::new(SIZE, SIZE, &RecordConfig::new().with_flags(flags))
        .expect("valid config");
    grid(recorder.canvas(), n);
    recorder.finish_recording()
}

fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipe_record");
    for n in [16_u16, 64] {
        let draws = u64::from(n) * u64::from(n);
        group.throughput(Throughput::Elements(draws));
        group.bench_function(BenchmarkId::new("plain", draws), |b| {
            b.iter(|| record(black_box(n), RecordFlags::empty()));
        });
        group.bench_function(BenchmarkId::new("indexed", draws), |b| {
            b.iter(|| record(black_box(n), RecordFlags::OPTIMIZE_FOR_CLIPPED_PLAYBACK));
        });
    }
    group.finish();
}

fn bench_playback(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipe_playback");
    let n = 64;
    let plain = record(n, RecordFlags::empty());
    let indexed = record(n, RecordFlags::OPTIMIZE_FOR_CLIPPED_PLAYBACK);
    group.throughput(Throughput::Bytes(plain.bytes().len() as u64));
    group.bench_function("full", |b| {
        b.iter(|| {
            let mut canvas = RefCanvas::new(SIZE, SIZE);
            plain.playback(&mut canvas).expect("well-formed stream");
            canvas
        });
    });
    for viewport in [64.0_f32, 256.0, 1024.0] {
        group.bench_function(BenchmarkId::new("culled", viewport), |b| {
            b.iter(|| {
                let mut canvas = RefCanvas::new(SIZE, SIZE);
                canvas.clip_rect(
                    RectF::new(100.0, 100.0, 100.0 + viewport, 100.0 + viewport),
                    RegionOp::Intersect,
                    false,
                );
                indexed.playback(&mut canvas).expect("well-formed stream");
                canvas
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_record, bench_playback);
criterion_main!(benches);
