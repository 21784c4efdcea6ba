//! Chunk commit/decommit throughput for the raw storage layer.
//!
//! Performance regression tests:
//! - Sequential writes across fresh chunks stay close to memcpy cost.
//! - Decommit of an emptied chunk does not regress with chunk count.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ecs_core::ChunkedTable;
use std::hint::black_box;

#[derive(Copy, Clone)]
#[repr(C)]
struct Transform {
    x: f32,
    y: f32,
    z: f32,
    w: f32,
}

fn benchmark_sequential_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_commit_sequential_writes");

    for count in [1_000usize, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("entities", count), count, |b, &count| {
            b.iter(|| {
                let mut table: ChunkedTable<Transform> = ChunkedTable::reserve(count as u32);
                for i in 0..count as u32 {
                    let slot = table.get_rw(i, 1).unwrap();
                    *slot = Transform { x: 1.0, y: 2.0, z: 3.0, w: 4.0 };
                    table.mark_populated(i);
                }
                black_box(&table);
            })
        });
    }

    group.finish();
}

fn benchmark_decommit(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_decommit");

    group.bench_function("empty_chunk_round_trip", |b| {
        b.iter(|| {
            let mut table: ChunkedTable<Transform> = ChunkedTable::reserve(4096);
            let slot = table.get_rw(0, 1).unwrap();
            *slot = Transform { x: 0.0, y: 0.0, z: 0.0, w: 0.0 };
            table.mark_populated(0);
            table.mark_unpopulated(0);
            let chunk = table.chunk_of(0);
            black_box(table.try_decommit(chunk).unwrap());
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_sequential_commit, benchmark_decommit);
criterion_main!(benches);
