use ecs_core::ChunkedTable;
use std::hint::black_box;
use std::time::Instant;

#[derive(Copy, Clone)]
#[repr(C)]
struct Transform {
    x: f32,
    y: f32,
    z: f32,
    w: f32,
}

pub fn run(entity_count: u32) {
    println!("Running chunk commit throughput test...");
    println!("Entity count: {entity_count}");

    let mut table: ChunkedTable<Transform> = ChunkedTable::reserve(entity_count);
    let start = Instant::now();

    for i in 0..entity_count {
        let slot = table.get_rw(i, 1).expect("index within capacity");
        *slot = Transform { x: 1.0, y: 2.0, z: 3.0, w: 4.0 };
        table.mark_populated(i);
    }

    let elapsed = start.elapsed();
    black_box(&table);
    let writes_per_sec = entity_count as f64 / elapsed.as_secs_f64();

    println!("Results:");
    println!("  Total time: {elapsed:?}");
    println!("  Writes per second: {writes_per_sec:.2}");
}
