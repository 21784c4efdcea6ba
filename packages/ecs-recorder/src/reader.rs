//! Opens a recording file, indexes every frame's offset by tick, and
//! reconstructs repository state at a previously recorded tick by replaying
//! the nearest keyframe followed by every delta up to the target.
//!
//! Grounded in the teacher's `FileWal::open` (scans every record in a file
//! once at open time to rebuild in-memory bookkeeping -- a transaction-id
//! cursor there, a tick-to-offset index here) and `DatabaseSnapshot`'s
//! restore path for the section-by-section way a frame's bytes turn back
//! into table state.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use ecs_runtime::{EntityLifecycleEvent, LifecycleEventKind, Repository};

use crate::decode::{decode_frame_payload, split_ref_event_stream};
use crate::error::{Error, Result};
use crate::format::{
    DecodedFrame, FrameKind, GlobalHeader, Sidecar, FRAME_FLAG_COMPRESSED, GLOBAL_HEADER_SIZE, SIDECAR_MAGIC,
};

const ENTITY_HEADER_ORDINAL: i32 = -1;
const FRAME_OUTER_SIZE: usize = 18; // tick(8) + kind(1) + flags(1) + length(4) + crc32(4)

#[derive(Clone, Copy)]
struct FrameLocation {
    tick: u64,
    kind: FrameKind,
    flags: u8,
    payload_offset: u64,
    payload_len: u32,
    crc32: u32,
}

/// Per-frame shape summary returned by [`RecordingReader::frame_summaries`].
#[derive(Debug, Clone, Copy)]
pub struct FrameSummary {
    pub tick: u64,
    pub kind: FrameKind,
    pub payload_len: u32,
}

/// A recording file opened for seeking playback.
pub struct RecordingReader {
    file: File,
    header: GlobalHeader,
    sidecar: Option<Sidecar>,
    frames: Vec<FrameLocation>,
}

impl RecordingReader {
    /// Opens `path`, validates the global header, and indexes every frame's
    /// offset by scanning the file once from start to end (or to the start
    /// of the trailing sidecar blob, if one closed out the recording).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let mut header_buf = [0u8; GLOBAL_HEADER_SIZE];
        file.read_exact(&mut header_buf)?;
        let header = GlobalHeader::decode(&header_buf)?;

        let (sidecar, frames_end) = read_trailer(&mut file, file_len)?;

        let mut frames = Vec::new();
        let mut pos = GLOBAL_HEADER_SIZE as u64;
        while pos < frames_end {
            file.seek(SeekFrom::Start(pos))?;
            let mut outer = [0u8; FRAME_OUTER_SIZE];
            file.read_exact(&mut outer)?;
            let tick = u64::from_le_bytes(outer[0..8].try_into().unwrap());
            let kind = FrameKind::from_byte(outer[8])?;
            let flags = outer[9];
            let payload_len = u32::from_le_bytes(outer[10..14].try_into().unwrap());
            let crc32 = u32::from_le_bytes(outer[14..18].try_into().unwrap());
            let payload_offset = pos + FRAME_OUTER_SIZE as u64;
            frames.push(FrameLocation { tick, kind, flags, payload_offset, payload_len, crc32 });
            pos = payload_offset + payload_len as u64;
        }
        if pos != frames_end {
            return Err(Error::Truncated(pos));
        }

        Ok(Self { file, header, sidecar, frames })
    }

    pub fn start_tick(&self) -> u64 {
        self.header.start_tick
    }

    pub fn sidecar(&self) -> Option<&Sidecar> {
        self.sidecar.as_ref()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.frames.last().map(|f| f.tick)
    }

    /// One summary per frame in file order, for inspection tooling that
    /// wants to list a recording's shape without decoding any payload.
    pub fn frame_summaries(&self) -> Vec<FrameSummary> {
        self.frames
            .iter()
            .map(|f| FrameSummary { tick: f.tick, kind: f.kind, payload_len: f.payload_len })
            .collect()
    }

    fn read_payload(&mut self, loc: FrameLocation) -> Result<DecodedFrame> {
        self.file.seek(SeekFrom::Start(loc.payload_offset))?;
        let mut payload = vec![0u8; loc.payload_len as usize];
        self.file.read_exact(&mut payload)?;
        if crc32fast::hash(&payload) != loc.crc32 {
            return Err(Error::ChecksumMismatch(loc.tick));
        }
        let mut frame = decode_frame_payload(loc.tick, loc.kind, &payload)?;
        if loc.flags & FRAME_FLAG_COMPRESSED != 0 {
            for chunk in frame.chunks.iter_mut() {
                for entry in chunk.types.iter_mut() {
                    entry.bytes = zstd::decode_all(&entry.bytes[..])?;
                }
            }
        }
        Ok(frame)
    }

    /// Reconstructs `repo`'s state at `target_tick`: finds the latest
    /// keyframe at or before `target_tick`, applies it, then applies every
    /// subsequent frame up to and including `target_tick` in order. Fails
    /// with [`Error::NoKeyframeBefore`] if the recording has no keyframe
    /// that early (a seek before the first keyframe, or an empty file).
    pub fn seek_to(&mut self, repo: &mut Repository, target_tick: u64) -> Result<()> {
        let keyframe_idx = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind == FrameKind::Keyframe && f.tick <= target_tick)
            .max_by_key(|(_, f)| f.tick)
            .map(|(i, _)| i)
            .ok_or(Error::NoKeyframeBefore(target_tick))?;

        for i in keyframe_idx..self.frames.len() {
            if self.frames[i].tick > target_tick {
                break;
            }
            let loc = self.frames[i];
            let frame = self.read_payload(loc)?;
            apply_frame(repo, &frame)?;
        }
        Ok(())
    }

    /// Replays every frame in the recording, in order, from its very first
    /// keyframe -- a full re-derivation of the live history rather than a
    /// seek to one point in it.
    pub fn replay_all(&mut self, repo: &mut Repository) -> Result<()> {
        if let Some(last) = self.last_tick() {
            self.seek_to(repo, last)?;
        }
        Ok(())
    }

    /// Every distinct component/event/singleton ordinal this recording ever
    /// mentions, `-1` (the entity header) excluded. The recording has no
    /// type names of its own -- those live only in a process's type
    /// registry -- so this is ordinal-only schema inspection: enough to
    /// compare two recordings' shape, or to notice a recording was made by
    /// a process with a different component set than the one reading it.
    pub fn distinct_type_ordinals(&mut self) -> Result<std::collections::BTreeSet<i32>> {
        let mut ordinals = std::collections::BTreeSet::new();
        for i in 0..self.frames.len() {
            let loc = self.frames[i];
            let frame = self.read_payload(loc)?;
            for entry in &frame.chunks {
                for t in &entry.types {
                    if t.type_ordinal != ENTITY_HEADER_ORDINAL {
                        ordinals.insert(t.type_ordinal);
                    }
                }
            }
            ordinals.extend(frame.singletons.iter().map(|s| s.type_ordinal));
            ordinals.extend(frame.plain_events.iter().map(|e| e.type_ordinal));
            ordinals.extend(frame.ref_events.iter().map(|e| e.type_ordinal));
        }
        Ok(ordinals)
    }
}

/// Applies one decoded frame's sections to `repo`: entity-header chunks
/// first (component liveness for every other type is read from them), then
/// every component chunk, then singletons, then events, publishing a
/// lifecycle event for each destruction the frame recorded.
fn apply_frame(repo: &mut Repository, frame: &DecodedFrame) -> Result<()> {
    repo.set_tick(frame.tick as u32);
    repo.clear_current_events();

    for entry in &frame.chunks {
        for t in &entry.types {
            if t.type_ordinal == ENTITY_HEADER_ORDINAL {
                repo.entities_mut().chunk_table_mut().restore_chunk_from(
                    entry.chunk_id as usize,
                    &t.bytes,
                    frame.tick as u32,
                    0,
                );
            }
        }
    }
    repo.entities_mut().recompute_allocator_state();

    for entry in &frame.chunks {
        for t in &entry.types {
            if t.type_ordinal == ENTITY_HEADER_ORDINAL {
                continue;
            }
            let ordinal = t.type_ordinal as u16;
            let population = population_after_restore(repo, ordinal, entry.chunk_id as usize);
            match repo.plain_erased_mut(ordinal) {
                Some(store) => store.restore_chunk_from(entry.chunk_id as usize, &t.bytes, frame.tick as u32, population),
                None => return Err(Error::SchemaMismatch(ordinal)),
            }
        }
    }

    for s in &frame.singletons {
        repo.restore_singleton_plain_by_ordinal(s.type_ordinal, &s.bytes);
    }

    for e in &frame.plain_events {
        repo.inject_into_current_by_ordinal(e.type_ordinal, &e.bytes);
    }
    for e in &frame.ref_events {
        for blob in split_ref_event_stream(&e.bytes)? {
            repo.inject_ref_event_encoded_by_ordinal(e.type_ordinal, &blob);
        }
    }

    for d in &frame.destroyed {
        repo.publish_plain(EntityLifecycleEvent {
            entity: ecs_core::Entity::new(d.index, d.generation),
            kind: LifecycleEventKind::Destroyed,
        });
    }

    repo.swap_events();
    Ok(())
}

/// Liveness of `ordinal`'s component across the restored entity-header
/// chunks overlapping `chunk_id`'s index range, the read-side counterpart
/// of `encode::sanitize_and_copy_chunk`'s liveness computation.
fn population_after_restore(repo: &Repository, ordinal: u16, chunk_id: usize) -> i32 {
    let Some(store) = repo.plain_erased(ordinal) else { return 0 };
    let cap = store.cap_per_chunk() as u32;
    let start = chunk_id as u32 * cap;
    let end = (start + cap).min(repo.entities().max_entities());
    if start >= end {
        return 0;
    }
    (start..end)
        .filter(|&index| {
            repo.entities()
                .chunk_table()
                .peek(index)
                .map(|h| h.component_mask.test_bit(ordinal))
                .unwrap_or(false)
        })
        .count() as i32
}

/// Looks for a trailing sidecar blob: `[payload][ECSS magic][Sidecar bincode]
/// [u32 trailer length]` at the very end of the file. Returns `(None,
/// file_len)` if the file is too short or the trailer doesn't check out --
/// a recording that was never `finish()`-ed is still fully seekable, just
/// without sidecar metadata.
fn read_trailer(file: &mut File, file_len: u64) -> Result<(Option<Sidecar>, u64)> {
    if file_len < GLOBAL_HEADER_SIZE as u64 + 4 {
        return Ok((None, file_len));
    }
    file.seek(SeekFrom::End(-4))?;
    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf)?;
    let trailer_len = u32::from_le_bytes(len_buf) as u64;
    if trailer_len < 4 || trailer_len + 4 > file_len {
        return Ok((None, file_len));
    }
    let trailer_start = file_len - 4 - trailer_len;
    file.seek(SeekFrom::Start(trailer_start))?;
    let mut magic_buf = [0u8; 4];
    file.read_exact(&mut magic_buf)?;
    if u32::from_le_bytes(magic_buf) != SIDECAR_MAGIC {
        return Ok((None, file_len));
    }
    let mut body = vec![0u8; (trailer_len - 4) as usize];
    file.read_exact(&mut body)?;
    let sidecar: Sidecar = bincode::deserialize(&body)?;
    Ok((Some(sidecar), trailer_start))
}
