//! Benchmarks for reducing captured frames to one color
//!
//! Measures every extraction algorithm on a synthetic gradient frame at
//! common capture zone sizes, plus decoding of the telemetry pages polled on
//! the hot path.
//!
//! Platform: Cross-platform (synthetic data, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use racelight::color::ExtractionAlgorithm;
use racelight::telemetry::{Graphics, Physics, SharedMemoryStruct};
use racelight::test_utils::gradient_frame;
use std::hint::black_box;

const ZONES: [(u32, u32); 3] = [(320, 180), (1920, 200), (1920, 1080)];

fn bench_algorithms(c: &mut Criterion) {
    let mut group = c.benchmark_group("color_extraction");
    group.sample_size(20);

    for (width, height) in ZONES {
        let frame = gradient_frame(width, height);
        group.throughput(Throughput::Elements(frame.pixel_count() as u64));

        for algorithm in ExtractionAlgorithm::CATALOG {
            group.bench_with_input(
                BenchmarkId::new(algorithm.to_string(), format!("{width}x{height}")),
                &frame,
                |b, frame| b.iter(|| black_box(algorithm.extract(black_box(frame)))),
            );
        }
    }

    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let frame = gradient_frame(1920, 200);
    c.bench_function("compare_all_algorithms", |b| {
        b.iter(|| black_box(ExtractionAlgorithm::compare(black_box(&frame))))
    });
}

fn bench_page_decode(c: &mut Criterion) {
    let physics = Physics { rpms: 7200, gear: 4, ..Default::default() }.encode();
    let graphics = Graphics { status: 2, flag: 2, ..Default::default() }.encode();

    let mut group = c.benchmark_group("page_decode");
    group.bench_function("physics", |b| {
        b.iter(|| black_box(Physics::decode(black_box(&physics)).unwrap()))
    });
    group.bench_function("graphics", |b| {
        b.iter(|| black_box(Graphics::decode(black_box(&graphics)).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_algorithms, bench_compare, bench_page_decode);
criterion_main!(benches);
