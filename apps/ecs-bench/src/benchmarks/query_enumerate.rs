use ecs_core::{BitMask256, EntityIndex, QueryDef};
use std::hint::black_box;
use std::time::Instant;

pub fn run(entity_count: u32, match_percent: u8) {
    println!("Running query enumerate throughput test...");
    println!("Entity count: {entity_count}, match percent: {match_percent}%");

    let present = BitMask256::ZERO.with_bit(3);
    let absent = BitMask256::ZERO.with_bit(9);
    let stride = if match_percent == 0 { u32::MAX } else { (100 / match_percent.max(1) as u32).max(1) };

    let mut index = EntityIndex::reserve(entity_count);
    for i in 0..entity_count {
        let e = index.create(0).expect("capacity reserved above");
        let header = index.get_header_mut(e.index, 1).expect("just created");
        header.component_mask = if i % stride == 0 { present } else { absent };
    }

    let query = QueryDef::builder().with_include(present).build();

    let start = Instant::now();
    let matched: u32 = query.enumerate(index.chunk_table(), index.max_issued()).map(|_| 1u32).sum();
    let elapsed = start.elapsed();
    black_box(matched);

    println!("Results:");
    println!("  Total time: {elapsed:?}");
    println!("  Matched entities: {matched}");
    println!(
        "  Entities scanned per second: {:.2}",
        entity_count as f64 / elapsed.as_secs_f64()
    );
}
