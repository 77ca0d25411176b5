//! Performance benchmarks for wayshim
//!
//! Configure classification runs on every compositor configure and software
//! painting runs every frame on the shm backend; both are on the hot path.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use wayshim::present::{paint_pixels, ChannelLayout, Rgba};
use wayshim::shell::{ConfigureAck, Geometry, GeometryUpdate, StateFlags, ToplevelState};

struct DiscardAck;

impl ConfigureAck for DiscardAck {
    fn ack_configure(&self, serial: u32) {
        black_box(serial);
    }
}

fn wire_states(raw: &[u32]) -> Vec<u8> {
    raw.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// Benchmark state-array decoding and resize classification
fn bench_configure_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("configure_classification");

    let activated = wire_states(&[4]);
    let tiled = wire_states(&[4, 5, 6, 7, 8]);
    let noisy = wire_states(&[1, 2, 3, 4, 99, 100, 101]);

    for (name, bytes) in [("activated", &activated), ("tiled", &tiled), ("noisy", &noisy)] {
        group.bench_function(format!("decode_{}", name), |b| {
            b.iter(|| {
                let flags = StateFlags::from_wire(black_box(bytes));
                black_box(flags.is_resizing_context())
            })
        });
    }

    group.bench_function("handle_configure", |b| {
        let states = StateFlags::from_wire(&tiled);
        b.iter_batched(
            || ToplevelState::new(Geometry::new(320, 200)),
            |mut state| {
                for serial in 0..32 {
                    let update = GeometryUpdate::new(640 + serial, 480, states);
                    black_box(state.handle_configure(update, serial as u32, &DiscardAck));
                }
                state
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Benchmark full-frame software painting
fn bench_framebuffer_paint(c: &mut Criterion) {
    let mut group = c.benchmark_group("framebuffer_paint");
    let layout = ChannelLayout::default();

    for (width, height) in [(320usize, 200usize), (1280, 720), (1920, 1080)] {
        let mut pixels = vec![0u8; width * height * 4];
        group.bench_function(format!("gradient_{}x{}", width, height), |b| {
            b.iter(|| {
                paint_pixels(&mut pixels, width, height, width * 4, layout, |x, y| {
                    Rgba::opaque((x * 255 / width) as u8, (y * 255 / height) as u8, 0)
                });
                black_box(&pixels);
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_configure_classification,
    bench_framebuffer_paint
);
criterion_main!(benches);
