use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use probewatch_engine::RangeCache;
use probewatch_types::RawPoint;

fn points(start: i64, end: i64) -> Vec<RawPoint> {
    (start..end).step_by(60).map(|t| RawPoint::new(t, t as f64)).collect()
}

/// Cache holding `segments` disjoint one hour segments for one key.
fn fragmented_cache(segments: i64) -> RangeCache<RawPoint> {
    let mut cache = RangeCache::new();
    for i in 0..segments {
        let start = i * 7_200;
        cache.merge("cpu", start, start + 3_600, points(start, start + 3_600));
    }
    cache
}

/// Benchmark gap detection over fragmented caches
fn bench_missing_ranges(c: &mut Criterion) {
    let mut group = c.benchmark_group("missing_ranges");

    for segments in [1i64, 10, 100].iter() {
        let cache = fragmented_cache(*segments);
        let end = segments * 7_200;
        group.bench_with_input(BenchmarkId::from_parameter(segments), &end, |b, &end| {
            b.iter(|| cache.missing_ranges(black_box("cpu"), black_box(0), black_box(end)));
        });
    }
    group.finish();
}

/// Benchmark merging a range that bridges every existing segment
fn bench_merge_bridging(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_bridging");

    for segments in [1i64, 10, 100].iter() {
        let cache = fragmented_cache(*segments);
        let end = segments * 7_200;
        let incoming = points(0, end);
        group.bench_with_input(BenchmarkId::from_parameter(segments), &end, |b, &end| {
            b.iter(|| {
                let mut cache = cache.clone();
                cache.merge("cpu", 0, end, black_box(incoming.clone()));
                cache
            });
        });
    }
    group.finish();
}

/// Benchmark reading a window out of a large segment
fn bench_read(c: &mut Criterion) {
    let mut cache = RangeCache::new();
    cache.merge("cpu", 0, 86_400 * 7, points(0, 86_400 * 7));

    c.bench_function("read_one_day_of_week", |b| {
        b.iter(|| cache.read(black_box(&["cpu"]), black_box(86_400), black_box(172_800)));
    });
}

/// Benchmark point lookups
fn bench_at_time(c: &mut Criterion) {
    let cache = fragmented_cache(100);

    c.bench_function("at_time", |b| {
        b.iter(|| cache.at_time(black_box(&["cpu"]), black_box(360_030)));
    });
}

criterion_group!(
    benches,
    bench_missing_ranges,
    bench_merge_bridging,
    bench_read,
    bench_at_time,
);
criterion_main!(benches);
