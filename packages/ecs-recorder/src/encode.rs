//! Builds one frame's payload bytes from a live [`ecs_runtime::Repository`].
//!
//! Grounded in the teacher's `DatabaseSnapshot::from_database`
//! (`ecsdb/src/persistence/snapshot.rs`): read the facade's tables directly
//! rather than walking a lower-level storage type, because the facade is
//! the thing that knows which ordinals are registered and what their
//! policies are.

use ecs_core::config::CHUNK_BYTES;
use ecs_runtime::Repository;

use crate::format::*;

const ENTITY_HEADER_ORDINAL: i32 = -1;

/// Sanitizes every dirty component chunk's dead slots (§4.2) before
/// copying it, matching §6.1's "Before writing any chunk, the recorder
/// sanitizes dead slots" invariant -- this is what makes two recordings of
/// the same operation sequence byte-identical (P3): a chunk's unused slots
/// would otherwise still hold whatever a previous, now-dead, occupant left
/// there.
fn sanitize_and_copy_chunk(repo: &mut Repository, ordinal: u16, chunk: usize) -> Vec<u8> {
    let cap = repo.plain_erased(ordinal).map(|s| s.cap_per_chunk()).unwrap_or(0) as u32;
    let start = chunk as u32 * cap;
    let end = start + cap;
    let max_issued = repo.entities().max_issued();
    let liveness: Vec<bool> = (start..end)
        .map(|index| {
            if index >= max_issued {
                return false;
            }
            repo.entities()
                .chunk_table()
                .peek(index)
                .map(|h| h.component_mask.test_bit(ordinal))
                .unwrap_or(false)
        })
        .collect();

    let store = repo.plain_erased_mut(ordinal).expect("ordinal vanished between lookups");
    store.sanitize_chunk(chunk, &liveness);
    let mut buf = vec![0u8; CHUNK_BYTES];
    store.copy_chunk_to(chunk, &mut buf);
    buf
}

fn copy_header_chunk(repo: &Repository, chunk: usize) -> Vec<u8> {
    let mut buf = vec![0u8; CHUNK_BYTES];
    repo.entities().chunk_table().copy_chunk_to(chunk, &mut buf);
    buf
}

fn maybe_compress(bytes: Vec<u8>, compress: bool) -> Vec<u8> {
    if !compress {
        return bytes;
    }
    zstd::encode_all(&bytes[..], 3).expect("zstd compression of a chunk payload cannot fail")
}

/// Every chunk id that needs recording for `ordinal`'s table, plus the
/// entity header table when `ordinal == ENTITY_HEADER_ORDINAL`:
/// every committed chunk for a keyframe, or every chunk whose version
/// exceeds `baseline_tick` for a delta.
fn dirty_chunks_plain(repo: &Repository, ordinal: u16, kind: FrameKind, baseline_tick: u64) -> Vec<usize> {
    let store = repo.plain_erased(ordinal).expect("ordinal vanished between lookups");
    (0..store.chunk_count())
        .filter(|&c| match kind {
            FrameKind::Keyframe => store.is_committed(c),
            FrameKind::Delta => store.is_committed(c) && store.version(c) as u64 > baseline_tick,
        })
        .collect()
}

fn dirty_chunks_headers(repo: &Repository, kind: FrameKind, baseline_tick: u64) -> Vec<usize> {
    let table = repo.entities().chunk_table();
    (0..table.chunk_count())
        .filter(|&c| match kind {
            FrameKind::Keyframe => table.is_committed(c),
            FrameKind::Delta => table.is_committed(c) && table.version(c) as u64 > baseline_tick,
        })
        .collect()
}

/// Encodes one frame's full payload (everything after the outer
/// tick/kind/flags/length/checksum framing the writer applies).
pub fn encode_frame_payload(
    repo: &mut Repository,
    kind: FrameKind,
    baseline_tick: u64,
    compress: bool,
) -> Vec<u8> {
    let mut buf = Vec::new();

    // Destruction section.
    let destroyed = repo.destroyed_this_tick().to_vec();
    push_i32(&mut buf, destroyed.len() as i32);
    for e in &destroyed {
        push_i32(&mut buf, e.index as i32);
        push_u16(&mut buf, e.generation);
    }

    // Event section: plain streams, then reference streams.
    let frame_events = repo.snapshot_current_events();
    push_i32(&mut buf, frame_events.plain.len() as i32);
    for view in &frame_events.plain {
        push_i32(&mut buf, view.ordinal);
        push_i32(&mut buf, view.bytes.len() as i32);
        push_bytes(&mut buf, view.bytes);
    }

    let mut ref_streams: std::collections::BTreeMap<i32, Vec<u8>> = std::collections::BTreeMap::new();
    for (ordinal, _name, bytes) in &frame_events.encoded_refs {
        let stream = ref_streams.entry(*ordinal).or_default();
        push_u32(stream, bytes.len() as u32);
        push_bytes(stream, bytes);
    }
    push_i32(&mut buf, ref_streams.len() as i32);
    for (ordinal, bytes) in &ref_streams {
        push_i32(&mut buf, *ordinal);
        push_i32(&mut buf, bytes.len() as i32);
        push_bytes(&mut buf, bytes);
    }
    drop(frame_events);

    // Singleton section: every singleton on a keyframe, only those set
    // during this tick on a delta.
    let singletons = repo.singleton_plain_entries();
    let to_write: Vec<(i32, Vec<u8>)> = singletons
        .into_iter()
        .filter(|(_, _, set_tick)| kind == FrameKind::Keyframe || *set_tick as u64 == repo.current_tick() as u64)
        .map(|(ord, bytes, _)| (ord, bytes.to_vec()))
        .collect();
    push_i32(&mut buf, to_write.len() as i32);
    for (ordinal, bytes) in &to_write {
        push_i32(&mut buf, *ordinal);
        push_i32(&mut buf, bytes.len() as i32);
        push_bytes(&mut buf, bytes);
    }

    // Component chunk section: entity-header chunks first, then every
    // registered plain-component ordinal in ascending order (stable so two
    // recordings of the same operations agree byte-for-byte, per P3).
    let mut per_chunk: std::collections::BTreeMap<i32, Vec<(i32, Vec<u8>)>> = std::collections::BTreeMap::new();

    for chunk in dirty_chunks_headers(repo, kind, baseline_tick) {
        let bytes = maybe_compress(copy_header_chunk(repo, chunk), compress);
        per_chunk.entry(chunk as i32).or_default().push((ENTITY_HEADER_ORDINAL, bytes));
    }

    let mut ordinals = repo.plain_ordinals();
    ordinals.sort_unstable();
    for ordinal in ordinals {
        for chunk in dirty_chunks_plain(repo, ordinal, kind, baseline_tick) {
            let bytes = maybe_compress(sanitize_and_copy_chunk(repo, ordinal, chunk), compress);
            per_chunk.entry(chunk as i32).or_default().push((ordinal as i32, bytes));
        }
    }

    push_i32(&mut buf, per_chunk.len() as i32);
    for (chunk_id, types) in &per_chunk {
        push_i32(&mut buf, *chunk_id);
        push_i32(&mut buf, types.len() as i32);
        for (type_ordinal, bytes) in types {
            push_i32(&mut buf, *type_ordinal);
            push_i32(&mut buf, bytes.len() as i32);
            push_bytes(&mut buf, bytes);
        }
    }

    buf
}
