//! # Mirror Benchmarks
//!
//! Performance benchmarks for mirel-core mirror operations.
//!
//! Run with: `cargo bench -p mirel-core`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mirel_core::{Link, LinkId, Mirror, Predicate};
use std::hint::black_box;

/// A chain: link i points from link i-1, so every link is both a node and
/// an edge.
fn chain_links(size: usize) -> Vec<Link> {
    (0..size)
        .map(|i| {
            let mut link = Link::new(LinkId(i as u64));
            if i > 0 {
                link = link.with_from(LinkId((i - 1) as u64));
            }
            link
        })
        .collect()
}

fn chain_mirror(size: usize) -> Mirror {
    Mirror::load(chain_links(size)).expect("load")
}

/// A star: every spoke points from the hub, typed by spoke parity.
fn star_mirror(size: usize) -> Mirror {
    let mut links = vec![Link::new(LinkId(0)), Link::new(LinkId(1)), Link::new(LinkId(2))];
    for i in 3..size {
        links.push(
            Link::new(LinkId(i as u64))
                .with_from(LinkId(0))
                .with_type(LinkId(1 + (i as u64 % 2))),
        );
    }
    Mirror::load(links).expect("load")
}

// =============================================================================
// SCENARIOS
// =============================================================================

fn bench_feed_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("feed_insertion");

    for size in [64, 512, 4096].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut mirror = Mirror::new();
                for link in chain_links(size) {
                    let _ = mirror.add(link);
                }
                black_box(mirror)
            });
        });
    }

    group.finish();
}

fn bench_bulk_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_load");

    for size in [64, 512, 4096].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(Mirror::load(chain_links(size))));
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for size in [64, 512, 4096].iter() {
        let mirror = chain_mirror(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                // Lookup a link in the middle
                black_box(mirror.get(LinkId((size / 2) as u64)))
            });
        });
    }

    group.finish();
}

fn bench_type_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("type_query");

    let indexed = Predicate::parse(&serde_json::json!({ "type_id": 1 })).expect("parse");
    // Identical semantics, but _in never plans through an index.
    let scanned =
        Predicate::parse(&serde_json::json!({ "type_id": { "_in": [1] } })).expect("parse");

    for size in [128, 512, 2048].iter() {
        let mirror = star_mirror(*size);

        group.bench_with_input(BenchmarkId::new("indexed", size), size, |b, _| {
            b.iter(|| black_box(mirror.query(&indexed)));
        });
        group.bench_with_input(BenchmarkId::new("scan", size), size, |b, _| {
            b.iter(|| black_box(mirror.query(&scanned)));
        });
    }

    group.finish();
}

fn bench_relation_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("relation_query");

    let predicate =
        Predicate::parse(&serde_json::json!({ "out": { "type_id": 2 } })).expect("parse");

    for size in [128, 512, 2048].iter() {
        let mirror = star_mirror(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(mirror.query(&predicate)));
        });
    }

    group.finish();
}

fn bench_removal_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("removal_churn");

    for size in [128, 512, 2048].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut mirror = chain_mirror(size);
                // Tear out every second link, dangling its successor.
                for i in (0..size).step_by(2) {
                    let _ = mirror.remove(LinkId(i as u64));
                }
                black_box(mirror)
            });
        });
    }

    group.finish();
}

fn bench_export_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_snapshot");

    for size in [128, 512, 2048].iter() {
        let mirror = chain_mirror(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(mirel_core::export_snapshot(mirror.store())));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_feed_insertion,
    bench_bulk_load,
    bench_lookup,
    bench_type_query,
    bench_relation_query,
    bench_removal_churn,
    bench_export_snapshot,
);

criterion_main!(benches);
