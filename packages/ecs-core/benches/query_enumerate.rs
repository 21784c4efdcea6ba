//! Query enumeration throughput over populated entity headers.
//!
//! Performance regression tests:
//! - Enumeration cost scales with matching population, not capacity.
//! - Chunk-skip (population_in_range) keeps sparse matches cheap.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ecs_core::{BitMask256, EntityIndex, QueryDef};
use std::hint::black_box;

fn populate(entity_count: u32, mask: BitMask256) -> EntityIndex {
    let mut index = EntityIndex::reserve(entity_count);
    for _ in 0..entity_count {
        let e = index.create(0).unwrap();
        let header = index.get_header_mut(e.index, 1).unwrap();
        header.component_mask = mask;
    }
    index
}

fn benchmark_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_enumerate_full_match");
    let mask = BitMask256::ZERO.with_bit(3);
    let query = QueryDef::builder().with_include(mask).build();

    for count in [1_000u32, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("entities", count), count, |b, &count| {
            let mut index = populate(count, mask);
            b.iter(|| {
                let matched: u32 =
                    query.enumerate(index.chunk_table(), index.max_issued()).map(|_| 1u32).sum();
                black_box(matched);
            });
            black_box(&mut index);
        });
    }

    group.finish();
}

fn benchmark_sparse_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_enumerate_sparse_match");
    let present = BitMask256::ZERO.with_bit(3);
    let absent = BitMask256::ZERO.with_bit(9);

    group.bench_function("one_percent_match_over_100k", |b| {
        let mut index = EntityIndex::reserve(100_000);
        for i in 0..100_000u32 {
            let e = index.create(0).unwrap();
            let header = index.get_header_mut(e.index, 1).unwrap();
            header.component_mask = if i % 100 == 0 { present } else { absent };
        }
        let query = QueryDef::builder().with_include(present).build();

        b.iter(|| {
            let matched: u32 =
                query.enumerate(index.chunk_table(), index.max_issued()).map(|_| 1u32).sum();
            black_box(matched);
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_full_scan, benchmark_sparse_scan);
criterion_main!(benches);
