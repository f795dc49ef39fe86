//! Benchmarks for sprite recording and command replay

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use strata_render::{
    Color, RenderStateCache, Renderer2D, Renderer2DConfig,
    state::{BlendState, RenderStateSnapshot},
    strata_core::math::Vec2,
};
use strata_test_utils::MockBackend2D;

fn setup() -> (Arc<MockBackend2D>, Renderer2D) {
    let backend = Arc::new(MockBackend2D::new());
    let renderer = Renderer2D::new(backend.clone(), Renderer2DConfig::default()).expect("renderer");
    (backend, renderer)
}

fn bench_record_merged_rects(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_merged_rects");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let (_backend, mut renderer) = setup();
            b.iter(|| {
                renderer.begin_frame();
                for i in 0..count {
                    let x = (i % 100) as f32 * 8.0;
                    let y = (i / 100) as f32 * 8.0;
                    renderer.add_rect(Vec2::new(x, y), Vec2::splat(6.0), Color::WHITE);
                }
                black_box(renderer.commands().len())
            });
        });
    }

    group.finish();
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let (backend, mut renderer) = setup();
            b.iter(|| {
                for i in 0..count {
                    let x = (i % 100) as f32 * 8.0;
                    let y = (i / 100) as f32 * 8.0;
                    renderer.add_rect(Vec2::new(x, y), Vec2::splat(6.0), Color::WHITE);
                }
                renderer.flush().expect("flush");
                backend.clear_calls();
            });
        });
    }

    group.finish();
}

fn bench_flush_alternating_blend(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush_alternating_blend");

    for count in [100, 1_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let (backend, mut renderer) = setup();
            b.iter(|| {
                for i in 0..count {
                    let blend = if i % 2 == 0 {
                        BlendState::NON_PREMULTIPLIED
                    } else {
                        BlendState::ADDITIVE
                    };
                    renderer.set_blend_state(blend);
                    renderer.add_rect(Vec2::splat(i as f32), Vec2::splat(4.0), Color::RED);
                }
                renderer.flush().expect("flush");
                backend.clear_calls();
            });
        });
    }

    group.finish();
}

fn bench_state_cache_hit(c: &mut Criterion) {
    let backend = MockBackend2D::new();
    let mut cache = RenderStateCache::new();
    let snapshot = RenderStateSnapshot::DEFAULT_2D;

    c.bench_function("state_cache_hit", |b| {
        b.iter(|| black_box(cache.set(&backend, black_box(&snapshot)).expect("set")));
    });
}

criterion_group!(
    benches,
    bench_record_merged_rects,
    bench_flush,
    bench_flush_alternating_blend,
    bench_state_cache_hit
);
criterion_main!(benches);
