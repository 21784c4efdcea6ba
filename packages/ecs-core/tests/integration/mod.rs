//! End-to-end exercises across entity index, storage, query engine, event
//! bus and command buffer without any single module's internals in scope.

use ecs_core::{
    BitMask256, ChunkedTable, CommandBuffer, CoreConfig, EntityIndex, EventBus, Lifecycle,
    QueryDef, SnapshotPolicy, StorageKind, TypeRegistry,
};

#[derive(Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[test]
fn entity_lifecycle_and_query_round_trip() {
    let config = CoreConfig::default();
    let mut index = EntityIndex::reserve(config.max_entities.min(4096));
    let mut positions: ChunkedTable<Position> = ChunkedTable::reserve(config.max_entities.min(4096));

    let mut registry = TypeRegistry::new();
    let position_ord = registry
        .register::<Position>(
            "Position",
            std::mem::size_of::<Position>(),
            StorageKind::Plain,
            SnapshotPolicy::Persistent,
        )
        .unwrap();

    let e0 = index.create(1).unwrap();
    index.set_lifecycle(e0, Lifecycle::Active, 1).unwrap();
    index.get_header_mut(e0.index, 1).unwrap().component_mask.set_bit(position_ord);
    *positions.get_rw(e0.index, 1).unwrap() = Position { x: 1.0, y: 2.0 };
    positions.mark_populated(e0.index);

    let e1 = index.create(1).unwrap();
    index.set_lifecycle(e1, Lifecycle::Active, 1).unwrap();

    let query = QueryDef::builder().with_include(BitMask256::ZERO.with_bit(position_ord)).build();
    let got: Vec<_> = query.enumerate(index.chunk_table(), 2).collect();
    assert_eq!(got, vec![e0]);

    index.destroy(e0, 2).unwrap();
    let got: Vec<_> = query.enumerate(index.chunk_table(), 2).collect();
    assert!(got.is_empty());
}

#[test]
fn command_buffer_playback_is_the_only_way_worker_threads_mutate_state() {
    let mut idx = EntityIndex::reserve(64);
    let e0 = idx.create(1).unwrap();
    idx.set_lifecycle(e0, Lifecycle::Active, 1).unwrap();

    let mut buffer = CommandBuffer::new();
    ecs_core::command_buffer::with_local(|local| {
        local.destroy_entity(e0);
    });
    let mut local = ecs_core::command_buffer::take_local();
    buffer.append(&mut local);

    let mut applied = 0;
    for command in buffer.drain() {
        if let ecs_core::Command::DestroyEntity { entity } = command {
            idx.destroy(entity, 2).unwrap();
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    assert!(!idx.is_alive(e0));
}

#[test]
fn event_bus_previous_buffer_survives_until_next_swap() {
    let mut bus = EventBus::new();
    bus.publish_plain(42u32);
    bus.swap();
    assert_eq!(bus.consume_plain::<u32>(), &[42]);
    bus.publish_plain(7u32);
    assert_eq!(bus.consume_plain::<u32>(), &[42]);
    bus.swap();
    assert_eq!(bus.consume_plain::<u32>(), &[7]);
}
