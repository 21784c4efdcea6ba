//! End-to-end exercises of the flight recorder: write a sequence of frames
//! against a live repository, then reconstruct earlier ticks purely from
//! the file on disk, without any single module's internals in scope.

use ecs_core::SnapshotPolicy;
use ecs_recorder::config::RecorderConfig;
use ecs_recorder::reader::RecordingReader;
use ecs_recorder::writer::FlightRecorder;
use ecs_runtime::{Repository, RuntimeConfig};

#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct DamageEvent {
    target: u32,
    amount: u32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct ChatMessage {
    sender: String,
    text: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct MatchClock {
    elapsed_ticks: u32,
}

fn small_repo() -> Repository {
    let mut config = RuntimeConfig::default();
    config.core.max_entities = 4096;
    Repository::new(config)
}

#[test]
fn seeking_to_every_recorded_tick_reproduces_that_tick_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.bin");

    let mut repo = small_repo();
    let position = repo.register_plain::<Position>("Position", SnapshotPolicy::Persistent).unwrap();
    repo.register_plain::<Velocity>("Velocity", SnapshotPolicy::Persistent).unwrap();

    let e = repo.create().unwrap();
    repo.add(e, Position { x: 0.0, y: 0.0 }).unwrap();
    repo.add(e, Velocity { dx: 1.0, dy: 0.0 }).unwrap();

    let mut rec = FlightRecorder::create(&path, RecorderConfig { keyframe_interval: 3, ..Default::default() }, &mut repo).unwrap();

    let mut expected_positions = Vec::new();
    for step in 1..=6u32 {
        repo.tick().unwrap();
        let updated = Position { x: step as f32, y: 0.0 };
        repo.set(e, updated).unwrap();
        rec.capture_frame(&mut repo).unwrap();
        expected_positions.push((repo.current_tick(), updated));
    }
    rec.finish(0, Vec::new()).unwrap();
    let _ = position;

    let mut reader = RecordingReader::open(&path).unwrap();
    assert_eq!(reader.frame_count(), 7); // 1 opening keyframe + 6 captured frames

    for (tick, expected) in expected_positions {
        let mut replica = small_repo();
        replica.register_plain::<Position>("Position", SnapshotPolicy::Persistent).unwrap();
        replica.register_plain::<Velocity>("Velocity", SnapshotPolicy::Persistent).unwrap();
        reader.seek_to(&mut replica, tick as u64).unwrap();
        assert_eq!(*replica.get_ro::<Position>(e).unwrap(), expected, "mismatch at tick {tick}");
    }
}

#[test]
fn destroyed_entity_slot_reuse_survives_a_seek() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.bin");

    let mut repo = small_repo();
    repo.register_plain::<Position>("Position", SnapshotPolicy::Persistent).unwrap();

    let a = repo.create().unwrap();
    repo.add(a, Position { x: 1.0, y: 1.0 }).unwrap();
    let mut rec = FlightRecorder::create(&path, RecorderConfig::default(), &mut repo).unwrap();
    let tick_a_alive = repo.current_tick();

    repo.tick().unwrap();
    repo.destroy(a).unwrap();
    rec.capture_frame(&mut repo).unwrap();
    let tick_a_destroyed = repo.current_tick();

    repo.tick().unwrap();
    let b = repo.create().unwrap();
    repo.add(b, Position { x: 9.0, y: 9.0 }).unwrap();
    rec.capture_frame(&mut repo).unwrap();
    let tick_b_created = repo.current_tick();
    assert_eq!(a.index, b.index, "freelist should hand the freed slot back out");
    rec.finish(0, Vec::new()).unwrap();

    let mut reader = RecordingReader::open(&path).unwrap();

    let mut replica = small_repo();
    replica.register_plain::<Position>("Position", SnapshotPolicy::Persistent).unwrap();
    reader.seek_to(&mut replica, tick_a_alive as u64).unwrap();
    assert!(replica.is_alive(a));

    reader.seek_to(&mut replica, tick_a_destroyed as u64).unwrap();
    assert!(!replica.is_alive(a));

    reader.seek_to(&mut replica, tick_b_created as u64).unwrap();
    assert!(!replica.is_alive(a));
    assert!(replica.is_alive(b));
    assert_eq!(*replica.get_ro::<Position>(b).unwrap(), Position { x: 9.0, y: 9.0 });
}

#[test]
fn events_and_singletons_restore_only_for_their_own_recorded_tick() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.bin");

    let mut repo = small_repo();
    repo.set_singleton_plain(MatchClock { elapsed_ticks: 0 });
    let mut rec = FlightRecorder::create(&path, RecorderConfig::default(), &mut repo).unwrap();

    repo.tick().unwrap();
    repo.set_singleton_plain(MatchClock { elapsed_ticks: 1 });
    repo.publish_plain(DamageEvent { target: 1, amount: 5 });
    rec.capture_frame(&mut repo).unwrap();
    let tick_one = repo.current_tick();

    repo.tick().unwrap();
    repo.publish_plain(DamageEvent { target: 2, amount: 9 });
    rec.capture_frame(&mut repo).unwrap();
    let tick_two = repo.current_tick();
    rec.finish(0, Vec::new()).unwrap();

    let mut reader = RecordingReader::open(&path).unwrap();

    let mut replica = small_repo();
    reader.seek_to(&mut replica, tick_one as u64).unwrap();
    assert_eq!(replica.get_singleton_plain::<MatchClock>().unwrap(), MatchClock { elapsed_ticks: 1 });
    assert_eq!(replica.consume_plain::<DamageEvent>(), &[DamageEvent { target: 1, amount: 5 }]);

    reader.seek_to(&mut replica, tick_two as u64).unwrap();
    // The singleton was not rewritten this tick; its last recorded value persists.
    assert_eq!(replica.get_singleton_plain::<MatchClock>().unwrap(), MatchClock { elapsed_ticks: 1 });
    assert_eq!(replica.consume_plain::<DamageEvent>(), &[DamageEvent { target: 2, amount: 9 }]);
}

#[test]
fn reference_events_round_trip_through_a_registered_codec() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.bin");

    let mut repo = small_repo();
    repo.register_ref_event_codec::<ChatMessage>("ChatMessage");
    let mut rec = FlightRecorder::create(&path, RecorderConfig::default(), &mut repo).unwrap();

    repo.tick().unwrap();
    repo.publish_ref(ChatMessage { sender: "alice".to_string(), text: "gg".to_string() });
    rec.capture_frame(&mut repo).unwrap();
    let tick = repo.current_tick();
    rec.finish(0, Vec::new()).unwrap();

    let mut reader = RecordingReader::open(&path).unwrap();
    let mut replica = small_repo();
    replica.register_ref_event_codec::<ChatMessage>("ChatMessage");
    reader.seek_to(&mut replica, tick as u64).unwrap();

    let consumed = replica.consume_ref::<ChatMessage>();
    assert_eq!(consumed.len(), 1);
    assert_eq!(*consumed[0], ChatMessage { sender: "alice".to_string(), text: "gg".to_string() });
}

#[test]
fn compressed_recordings_round_trip_identically_to_uncompressed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.bin");

    let mut repo = small_repo();
    repo.register_plain::<Position>("Position", SnapshotPolicy::Persistent).unwrap();
    let e = repo.create().unwrap();
    repo.add(e, Position { x: 3.5, y: -2.5 }).unwrap();

    let mut rec = FlightRecorder::create(&path, RecorderConfig { compress: true, ..Default::default() }, &mut repo).unwrap();
    repo.tick().unwrap();
    repo.set(e, Position { x: 7.0, y: 7.0 }).unwrap();
    rec.capture_frame(&mut repo).unwrap();
    let tick = repo.current_tick();
    rec.finish(0, Vec::new()).unwrap();

    let mut reader = RecordingReader::open(&path).unwrap();
    let mut replica = small_repo();
    replica.register_plain::<Position>("Position", SnapshotPolicy::Persistent).unwrap();
    reader.seek_to(&mut replica, tick as u64).unwrap();
    assert_eq!(*replica.get_ro::<Position>(e).unwrap(), Position { x: 7.0, y: 7.0 });
}

#[test]
fn recording_survives_without_an_explicit_finish() {
    // A process that crashes mid-recording still leaves a seekable file:
    // no sidecar trailer, but every already-flushed frame is intact.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.bin");

    let mut repo = small_repo();
    repo.register_plain::<Position>("Position", SnapshotPolicy::Persistent).unwrap();
    let e = repo.create().unwrap();
    repo.add(e, Position { x: 1.0, y: 1.0 }).unwrap();
    let rec = FlightRecorder::create(&path, RecorderConfig::default(), &mut repo).unwrap();
    let tick = repo.current_tick();
    drop(rec); // no finish(): BufWriter's Drop flushes, but no sidecar is appended.

    let mut reader = RecordingReader::open(&path).unwrap();
    assert!(reader.sidecar().is_none());
    let mut replica = small_repo();
    replica.register_plain::<Position>("Position", SnapshotPolicy::Persistent).unwrap();
    reader.seek_to(&mut replica, tick as u64).unwrap();
    assert_eq!(*replica.get_ro::<Position>(e).unwrap(), Position { x: 1.0, y: 1.0 });
}
