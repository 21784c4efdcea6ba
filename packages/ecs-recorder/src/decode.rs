//! Parses one frame's payload bytes (the mirror image of `encode.rs`).

use crate::error::Result;
use crate::format::*;

pub fn decode_frame_payload(tick: u64, kind: FrameKind, payload: &[u8]) -> Result<DecodedFrame> {
    let mut r = ByteReader::new(payload);

    let destroyed_count = r.i32()?;
    let mut destroyed = Vec::with_capacity(destroyed_count.max(0) as usize);
    for _ in 0..destroyed_count {
        let index = r.i32()? as u32;
        let generation = r.u16()?;
        destroyed.push(DestroyedEntry { index, generation });
    }

    let plain_count = r.i32()?;
    let mut plain_events = Vec::with_capacity(plain_count.max(0) as usize);
    for _ in 0..plain_count {
        let type_ordinal = r.i32()?;
        let byte_count = r.i32()? as usize;
        let bytes = r.bytes(byte_count)?;
        plain_events.push(EventStream { type_ordinal, bytes });
    }

    let ref_count = r.i32()?;
    let mut ref_events = Vec::with_capacity(ref_count.max(0) as usize);
    for _ in 0..ref_count {
        let type_ordinal = r.i32()?;
        let byte_count = r.i32()? as usize;
        let bytes = r.bytes(byte_count)?;
        ref_events.push(EventStream { type_ordinal, bytes });
    }

    let singleton_count = r.i32()?;
    let mut singletons = Vec::with_capacity(singleton_count.max(0) as usize);
    for _ in 0..singleton_count {
        let type_ordinal = r.i32()?;
        let byte_count = r.i32()? as usize;
        let bytes = r.bytes(byte_count)?;
        singletons.push(SingletonEntry { type_ordinal, bytes });
    }

    let chunk_count = r.i32()?;
    let mut chunks = Vec::with_capacity(chunk_count.max(0) as usize);
    for _ in 0..chunk_count {
        let chunk_id = r.i32()?;
        let type_count = r.i32()?;
        let mut types = Vec::with_capacity(type_count.max(0) as usize);
        for _ in 0..type_count {
            let type_ordinal = r.i32()?;
            let byte_count = r.i32()? as usize;
            let bytes = r.bytes(byte_count)?;
            types.push(ChunkTypeEntry { type_ordinal, bytes });
        }
        chunks.push(ChunkEntry { chunk_id, types });
    }

    Ok(DecodedFrame { tick, kind, destroyed, plain_events, ref_events, singletons, chunks })
}

/// Reference event streams are a length-prefixed sequence of
/// individually-encoded instances (§6.1); this splits one decoded stream
/// back into its constituent encoded blobs.
pub fn split_ref_event_stream(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut r = ByteReader::new(bytes);
    let mut out = Vec::new();
    while !r.is_empty() {
        let len = r.u32()? as usize;
        out.push(r.bytes(len)?);
    }
    Ok(out)
}
