//! Snapshot normalization benchmarks
//!
//! Measures the pure text processing of the structure check (no network):
//! filtering and sorting a raw snapshot, stripping values, and the path diff.
//!
//! Run with: `cargo bench`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use metricmatch::snapshot::{NormalizedSnapshot, RelevanceFilter, hide_values};
use std::hint::black_box;

/// Synthetic graphite snapshot: every third line belongs to another subsystem
fn synthetic_snapshot(lines: usize) -> String {
    (0..lines)
        .rev()
        .map(|i| match i % 3 {
            0 => format!("http.handler.total;path=/v1/{} {} 1690000000", i, i),
            1 => format!(
                "mongo.by-collection.success;mongo_collection=c{};mongo_op=find {} 1690000000",
                i, i
            ),
            _ => format!("mongo.pool.current-size;mongo_pool_name=p{} {} 1690000000", i, i),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_normalize(c: &mut Criterion) {
    let filter = RelevanceFilter::default();
    let mut group = c.benchmark_group("normalize");

    for lines in [100, 1_000, 10_000] {
        let raw = synthetic_snapshot(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &raw, |b, raw| {
            b.iter(|| NormalizedSnapshot::from_raw(black_box(raw), &filter));
        });
    }

    group.finish();
}

fn bench_hide_values(c: &mut Criterion) {
    let filter = RelevanceFilter::default();
    let normalized = NormalizedSnapshot::from_raw(&synthetic_snapshot(10_000), &filter);

    c.bench_function("hide_values_10000", |b| {
        b.iter(|| hide_values(black_box(normalized.as_str())));
    });
}

fn bench_path_diff(c: &mut Criterion) {
    let filter = RelevanceFilter::default();
    let live = NormalizedSnapshot::from_raw(&synthetic_snapshot(10_000), &filter).paths();
    let fixture = NormalizedSnapshot::from_raw(&synthetic_snapshot(9_000), &filter).paths();

    c.bench_function("path_diff_10000", |b| {
        b.iter(|| black_box(&live).diff(black_box(&fixture)));
    });
}

criterion_group!(benches, bench_normalize, bench_hide_values, bench_path_diff);
criterion_main!(benches);
