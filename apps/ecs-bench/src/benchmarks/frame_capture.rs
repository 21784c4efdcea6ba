use ecs_core::SnapshotPolicy;
use ecs_recorder::{FlightRecorder, RecorderConfig};
use ecs_runtime::{Repository, RuntimeConfig};
use std::time::Instant;

#[derive(Copy, Clone)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
}

pub fn run(entity_count: u32, frames: u32, keyframe_interval: u32) {
    println!("Running flight recorder frame-capture throughput test...");
    println!("Entity count: {entity_count}, frames: {frames}, keyframe interval: {keyframe_interval}");

    let dir = tempfile::tempdir().expect("tempdir creation should not fail");
    let path = dir.path().join("bench.bin");

    let mut config = RuntimeConfig::default();
    config.core.max_entities = entity_count + 1;
    let mut repo = Repository::new(config);
    repo.register_plain::<Position>("Position", SnapshotPolicy::Persistent).expect("fresh registry");

    let entities: Vec<_> = (0..entity_count)
        .map(|i| {
            let e = repo.create().expect("capacity reserved above");
            repo.add(e, Position { x: i as f32, y: 0.0 }).expect("just created");
            e
        })
        .collect();

    let rec_config = RecorderConfig { keyframe_interval, ..Default::default() };
    let mut recorder = FlightRecorder::create(&path, rec_config, &mut repo).expect("fresh file");

    let start = Instant::now();
    for frame in 0..frames {
        repo.tick().expect("tick never fails once started");
        for &e in &entities {
            let updated = Position { x: frame as f32, y: frame as f32 };
            repo.set(e, updated).expect("component present");
        }
        recorder.capture_frame(&mut repo).expect("write should not fail against a tempdir");
    }
    let elapsed = start.elapsed();
    recorder.finish(0, Vec::new()).expect("finish should not fail");

    let frames_per_sec = frames as f64 / elapsed.as_secs_f64();
    let file_len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    println!("Results:");
    println!("  Total time: {elapsed:?}");
    println!("  Frames per second: {frames_per_sec:.2}");
    println!("  Recording size: {file_len} bytes");
}
