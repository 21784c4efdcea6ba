//! Lazily-committed, chunked storage for one plain-data type.
//!
//! Grounded in the teacher's `AtomicBuffer`/`BufferStorage` (copy-on-write
//! over `Vec<u8>` or a memory-mapped file, gated by the `persist` feature)
//! and, per Design Notes §9, on real OS virtual-memory semantics: an
//! anonymous `mmap` reserves address space without committing physical
//! pages, and pages fault in lazily on first touch — this is what the data
//! model calls "reserve virtual address space... allocate no physical
//! memory" rather than something this module has to simulate by hand.
//! `try_decommit` hands the pages back with `madvise(MADV_DONTNEED)`
//! (`memmap2`'s `advise_range`), keeping the reservation intact.

use crate::config::CHUNK_BYTES;
use crate::error::{Error, Result};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Mutex;

struct ChunkMeta {
    version: AtomicU32,
    population: AtomicI32,
    committed: AtomicBool,
}

impl ChunkMeta {
    fn fresh() -> Self {
        Self {
            version: AtomicU32::new(0),
            population: AtomicI32::new(0),
            committed: AtomicBool::new(false),
        }
    }
}

enum Backing {
    Heap(Vec<u8>),
    #[cfg(feature = "persist")]
    Mapped(memmap2::MmapMut),
}

impl Backing {
    fn as_mut_ptr(&mut self) -> *mut u8 {
        match self {
            Backing::Heap(v) => v.as_mut_ptr(),
            #[cfg(feature = "persist")]
            Backing::Mapped(m) => m.as_mut_ptr(),
        }
    }

    fn as_ptr(&self) -> *const u8 {
        match self {
            Backing::Heap(v) => v.as_ptr(),
            #[cfg(feature = "persist")]
            Backing::Mapped(m) => m.as_ptr(),
        }
    }

    #[cfg_attr(not(feature = "persist"), allow(unused_variables))]
    fn decommit_range(&mut self, offset: usize, len: usize) {
        match self {
            Backing::Heap(v) => v[offset..offset + len].fill(0),
            #[cfg(feature = "persist")]
            Backing::Mapped(m) => {
                let _ = m.advise_range(memmap2::Advice::DontNeed, offset, len);
            }
        }
    }
}

/// One plain-data component type's storage, reserved for the repository's
/// entire configured entity capacity at construction.
pub struct ChunkedTable<T: Copy + 'static> {
    backing: Backing,
    metas: Vec<ChunkMeta>,
    commit_guard: Mutex<()>,
    elem_size: usize,
    cap_per_chunk: usize,
    max_entities: u32,
    _marker: PhantomData<T>,
}

// Safety: all mutation of `backing` bytes goes through per-chunk atomics and
// the commit guard; `&mut self` methods additionally require exclusive
// access at the Rust level, so there is no unsynchronized concurrent write.
unsafe impl<T: Copy + Send + 'static> Send for ChunkedTable<T> {}
unsafe impl<T: Copy + Send + 'static> Sync for ChunkedTable<T> {}

impl<T: Copy + 'static> ChunkedTable<T> {
    pub fn reserve(max_entities: u32) -> Self {
        let elem_size = std::mem::size_of::<T>();
        assert!(elem_size > 0, "zero-sized components are not supported");
        let cap_per_chunk = CHUNK_BYTES / elem_size;
        assert!(cap_per_chunk > 0, "component type larger than one chunk");
        let chunk_count = (max_entities as usize).div_ceil(cap_per_chunk).max(1);
        let total_bytes = chunk_count * CHUNK_BYTES;

        #[cfg(feature = "persist")]
        let backing = {
            let mmap = memmap2::MmapOptions::new()
                .len(total_bytes)
                .map_anon()
                .expect("anonymous mmap reservation failed");
            Backing::Mapped(mmap)
        };
        #[cfg(not(feature = "persist"))]
        let backing = Backing::Heap(vec![0u8; total_bytes]);

        let metas = (0..chunk_count).map(|_| ChunkMeta::fresh()).collect();

        Self {
            backing,
            metas,
            commit_guard: Mutex::new(()),
            elem_size,
            cap_per_chunk,
            max_entities,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn cap_per_chunk(&self) -> usize {
        self.cap_per_chunk
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.metas.len()
    }

    #[inline]
    pub fn max_entities(&self) -> u32 {
        self.max_entities
    }

    #[inline]
    fn locate(&self, index: u32) -> (usize, usize) {
        let slot = index as usize;
        (slot / self.cap_per_chunk, slot % self.cap_per_chunk)
    }

    #[inline]
    pub fn chunk_of(&self, index: u32) -> usize {
        self.locate(index).0
    }

    pub fn version(&self, chunk: usize) -> u32 {
        self.metas[chunk].version.load(Ordering::Acquire)
    }

    pub fn population(&self, chunk: usize) -> i32 {
        self.metas[chunk].population.load(Ordering::Acquire)
    }

    pub fn is_committed(&self, chunk: usize) -> bool {
        self.metas[chunk].committed.load(Ordering::Acquire)
    }

    /// Sum of `population` over every chunk whose element range overlaps
    /// entity indices `[start, end)`. Used by the query engine to decide
    /// whether an index range can contain no match for a required type
    /// without touching its bytes; see `storage::erased::ErasedPlainStore`.
    pub fn population_in_range(&self, start: u32, end: u32) -> i32 {
        if start >= end {
            return 0;
        }
        let first = self.locate(start).0;
        let last = self.locate(end - 1).0.min(self.metas.len().saturating_sub(1));
        (first..=last).map(|c| self.population(c)).sum()
    }

    /// Raw bytes of the element at `index`, committing its chunk but never
    /// bumping its version. Used by ambient inspection tooling (`ecs-api`)
    /// and the recorder, which both operate on opaque payloads.
    pub fn get_raw(&mut self, index: u32) -> &[u8] {
        let (chunk, slot) = self.locate(index);
        self.ensure_chunk(chunk);
        let offset = chunk * CHUNK_BYTES + slot * self.elem_size;
        unsafe { std::slice::from_raw_parts(self.backing.as_ptr().add(offset), self.elem_size) }
    }

    /// Raw mutable bytes of the element at `index`, with the same
    /// version-bump semantics as `get_rw`.
    pub fn get_raw_mut(&mut self, index: u32, current_tick: u32) -> &mut [u8] {
        let (chunk, slot) = self.locate(index);
        self.ensure_chunk(chunk);
        if self.metas[chunk].version.load(Ordering::Relaxed) != current_tick {
            self.metas[chunk]
                .version
                .store(current_tick, Ordering::Release);
        }
        let offset = chunk * CHUNK_BYTES + slot * self.elem_size;
        unsafe { std::slice::from_raw_parts_mut(self.backing.as_mut_ptr().add(offset), self.elem_size) }
    }

    fn check_index(&self, index: u32) -> Result<()> {
        #[cfg(debug_assertions)]
        {
            if index >= self.max_entities {
                return Err(Error::IndexOutOfRange {
                    index,
                    capacity: self.max_entities,
                });
            }
        }
        let _ = index;
        Ok(())
    }

    /// Commits `chunk` if not yet committed. Thread-safe: a double-checked
    /// guard behind the table's single commit/decommit lock, matching the
    /// "one lock per table, acquired only on first touch" resource rule.
    pub fn ensure_chunk(&mut self, chunk: usize) {
        if self.metas[chunk].committed.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.commit_guard.lock().unwrap();
        if self.metas[chunk].committed.load(Ordering::Acquire) {
            return;
        }
        let offset = chunk * CHUNK_BYTES;
        unsafe {
            std::ptr::write_bytes(self.backing.as_mut_ptr().add(offset), 0, CHUNK_BYTES);
        }
        self.metas[chunk].committed.store(true, Ordering::Release);
    }

    /// Commits the containing chunk; bumps its version if this is the first
    /// write this tick (check-before-write avoids cache-line thrash from
    /// repeated stores of the same value).
    pub fn get_rw(&mut self, index: u32, current_tick: u32) -> Result<&mut T> {
        self.check_index(index)?;
        let (chunk, slot) = self.locate(index);
        self.ensure_chunk(chunk);
        if self.metas[chunk].version.load(Ordering::Relaxed) != current_tick {
            self.metas[chunk]
                .version
                .store(current_tick, Ordering::Release);
        }
        let offset = chunk * CHUNK_BYTES + slot * self.elem_size;
        unsafe {
            let ptr = self.backing.as_mut_ptr().add(offset) as *mut T;
            Ok(&mut *ptr)
        }
    }

    /// Commits the containing chunk (a read of a previously-uncommitted
    /// region therefore yields a zeroed element) and returns an immutable
    /// reference without touching the chunk's version.
    pub fn get_ro(&mut self, index: u32) -> Result<&T> {
        self.check_index(index)?;
        let (chunk, slot) = self.locate(index);
        self.ensure_chunk(chunk);
        let offset = chunk * CHUNK_BYTES + slot * self.elem_size;
        unsafe {
            let ptr = self.backing.as_ptr().add(offset) as *const T;
            Ok(&*ptr)
        }
    }

    /// Reads the element at `index` without committing its chunk: `None`
    /// if the chunk has never been written, meaning every slot in it is
    /// still the zero-initialized "never used" value. Used by the query
    /// engine, which must not mutate commit state while scanning.
    pub fn peek(&self, index: u32) -> Option<&T> {
        let (chunk, slot) = self.locate(index);
        if !self.is_committed(chunk) {
            return None;
        }
        let offset = chunk * CHUNK_BYTES + slot * self.elem_size;
        unsafe {
            let ptr = self.backing.as_ptr().add(offset) as *const T;
            Some(&*ptr)
        }
    }

    pub fn mark_populated(&mut self, index: u32) {
        let (chunk, _) = self.locate(index);
        self.metas[chunk].population.fetch_add(1, Ordering::AcqRel);
    }

    pub fn mark_unpopulated(&mut self, index: u32) {
        let (chunk, _) = self.locate(index);
        self.metas[chunk].population.fetch_sub(1, Ordering::AcqRel);
    }

    /// Bit-exact copy of a chunk's 65,536 bytes.
    pub fn copy_chunk_to(&self, chunk: usize, out: &mut [u8]) {
        debug_assert_eq!(out.len(), CHUNK_BYTES);
        let offset = chunk * CHUNK_BYTES;
        unsafe {
            std::ptr::copy_nonoverlapping(self.backing.as_ptr().add(offset), out.as_mut_ptr(), CHUNK_BYTES);
        }
    }

    /// Restores a chunk's bytes, committing it, and sets its version and
    /// population to the caller-supplied values (used by both `sync_dirty_
    /// from` and the recorder's playback).
    pub fn restore_chunk_from(&mut self, chunk: usize, data: &[u8], version: u32, population: i32) {
        debug_assert_eq!(data.len(), CHUNK_BYTES);
        let offset = chunk * CHUNK_BYTES;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.backing.as_mut_ptr().add(offset), CHUNK_BYTES);
        }
        self.metas[chunk].committed.store(true, Ordering::Release);
        self.metas[chunk].version.store(version, Ordering::Release);
        self.metas[chunk].population.store(population, Ordering::Release);
    }

    /// Zeroes the bytes of every element in `chunk` whose slot bit in
    /// `liveness` (length `cap_per_chunk`) is clear. Required before any
    /// snapshot or recording of the chunk so dead-slot history cannot leak
    /// into the recorded bytes.
    pub fn sanitize_chunk(&mut self, chunk: usize, liveness: &[bool]) {
        debug_assert_eq!(liveness.len(), self.cap_per_chunk);
        if !self.metas[chunk].committed.load(Ordering::Acquire) {
            return;
        }
        let base = chunk * CHUNK_BYTES;
        for (slot, &alive) in liveness.iter().enumerate() {
            if alive {
                continue;
            }
            let offset = base + slot * self.elem_size;
            unsafe {
                std::ptr::write_bytes(self.backing.as_mut_ptr().add(offset), 0, self.elem_size);
            }
        }
    }

    /// Releases physical pages for `chunk`; succeeds only when empty.
    pub fn try_decommit(&mut self, chunk: usize) -> Result<()> {
        if self.metas[chunk].population.load(Ordering::Acquire) != 0 {
            return Err(Error::DecommitRefused(chunk as u32));
        }
        let offset = chunk * CHUNK_BYTES;
        self.backing.decommit_range(offset, CHUNK_BYTES);
        self.metas[chunk].committed.store(false, Ordering::Release);
        self.metas[chunk].version.store(0, Ordering::Release);
        Ok(())
    }

    /// For each chunk whose version differs from `self`'s: if `other` is
    /// committed, copy its bytes and adopt its version/population; if
    /// `other` is uncommitted and `self` is committed, decommit `self`.
    /// Chunks with `version == 0` ("never written") on the source side are
    /// skipped entirely.
    pub fn sync_dirty_from(&mut self, other: &ChunkedTable<T>) {
        debug_assert_eq!(self.metas.len(), other.metas.len());
        let mut buf = vec![0u8; CHUNK_BYTES];
        for c in 0..self.metas.len() {
            let other_version = other.version(c);
            if other_version == 0 {
                continue;
            }
            if other_version == self.version(c) {
                continue;
            }
            if other.is_committed(c) {
                other.copy_chunk_to(c, &mut buf);
                self.restore_chunk_from(c, &buf, other_version, other.population(c));
            } else if self.is_committed(c) {
                let _ = self.try_decommit(c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Default, PartialEq, Debug)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    #[test]
    fn uncommitted_chunk_reports_zero_version_and_population() {
        let table = ChunkedTable::<Position>::reserve(1024);
        assert_eq!(table.version(0), 0);
        assert_eq!(table.population(0), 0);
        assert!(!table.is_committed(0));
    }

    #[test]
    fn get_ro_on_uncommitted_yields_zero() {
        let mut table = ChunkedTable::<Position>::reserve(1024);
        let v = *table.get_ro(5).unwrap();
        assert_eq!(v, Position::default());
        assert!(table.is_committed(table.chunk_of(5)));
    }

    #[test]
    fn get_rw_bumps_version_once_per_tick() {
        let mut table = ChunkedTable::<Position>::reserve(1024);
        let chunk = table.chunk_of(0);
        *table.get_rw(0, 7).unwrap() = Position { x: 1.0, y: 2.0, z: 3.0 };
        assert_eq!(table.version(chunk), 7);
        *table.get_rw(1, 7).unwrap() = Position { x: 4.0, y: 5.0, z: 6.0 };
        assert_eq!(table.version(chunk), 7);
    }

    #[test]
    fn copy_then_restore_is_identity() {
        let mut table = ChunkedTable::<Position>::reserve(1024);
        *table.get_rw(0, 1).unwrap() = Position { x: 1.0, y: 2.0, z: 3.0 };
        let chunk = table.chunk_of(0);
        let mut buf = vec![0u8; CHUNK_BYTES];
        table.copy_chunk_to(chunk, &mut buf);

        let mut other = ChunkedTable::<Position>::reserve(1024);
        other.restore_chunk_from(chunk, &buf, 1, 1);
        assert_eq!(*other.get_ro(0).unwrap(), Position { x: 1.0, y: 2.0, z: 3.0 });
    }

    #[test]
    fn sanitize_zeroes_only_dead_slots() {
        let mut table = ChunkedTable::<Position>::reserve(1024);
        *table.get_rw(0, 1).unwrap() = Position { x: 1.0, y: 1.0, z: 1.0 };
        *table.get_rw(1, 1).unwrap() = Position { x: 2.0, y: 2.0, z: 2.0 };
        let chunk = table.chunk_of(0);
        let mut liveness = vec![false; table.cap_per_chunk()];
        liveness[1] = true;
        table.sanitize_chunk(chunk, &liveness);
        assert_eq!(*table.get_ro(0).unwrap(), Position::default());
        assert_eq!(*table.get_ro(1).unwrap(), Position { x: 2.0, y: 2.0, z: 2.0 });
    }

    #[test]
    fn sanitize_then_copy_is_deterministic_regardless_of_dead_slot_history() {
        let mut a = ChunkedTable::<Position>::reserve(1024);
        *a.get_rw(0, 1).unwrap() = Position { x: 9.0, y: 9.0, z: 9.0 };
        *a.get_rw(1, 1).unwrap() = Position { x: 1.0, y: 1.0, z: 1.0 };
        let chunk = a.chunk_of(0);
        let mut liveness = vec![false; a.cap_per_chunk()];
        liveness[1] = true;
        a.sanitize_chunk(chunk, &liveness);
        let mut buf_a = vec![0u8; CHUNK_BYTES];
        a.copy_chunk_to(chunk, &mut buf_a);

        let mut b = ChunkedTable::<Position>::reserve(1024);
        *b.get_rw(0, 1).unwrap() = Position { x: -4.0, y: -4.0, z: -4.0 };
        *b.get_rw(1, 1).unwrap() = Position { x: 1.0, y: 1.0, z: 1.0 };
        b.sanitize_chunk(chunk, &liveness);
        let mut buf_b = vec![0u8; CHUNK_BYTES];
        b.copy_chunk_to(chunk, &mut buf_b);

        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn decommit_requires_zero_population() {
        let mut table = ChunkedTable::<Position>::reserve(1024);
        table.ensure_chunk(0);
        table.mark_populated(0);
        assert!(table.try_decommit(0).is_err());
        table.mark_unpopulated(0);
        assert!(table.try_decommit(0).is_ok());
        assert_eq!(table.version(0), 0);
        assert_eq!(table.population(0), 0);
        assert!(!table.is_committed(0));
    }

    #[test]
    fn sync_dirty_from_copies_newer_chunks_and_decommits_missing_ones() {
        let mut src = ChunkedTable::<Position>::reserve(1024);
        *src.get_rw(0, 5).unwrap() = Position { x: 1.0, y: 1.0, z: 1.0 };
        src.mark_populated(0);

        let mut dst = ChunkedTable::<Position>::reserve(1024);
        dst.sync_dirty_from(&src);
        assert_eq!(*dst.get_ro(0).unwrap(), Position { x: 1.0, y: 1.0, z: 1.0 });
        assert_eq!(dst.version(0), 5);
        assert_eq!(dst.population(0), 1);

        // Source chunk goes back to uncommitted (population dropped to 0 and
        // decommitted); destination should decommit on the next sync.
        src.mark_unpopulated(0);
        src.try_decommit(0).unwrap();
        dst.sync_dirty_from(&src);
        assert!(!dst.is_committed(0));
    }

    #[test]
    fn chunk_capacity_matches_element_size() {
        let table = ChunkedTable::<Position>::reserve(10);
        assert_eq!(table.cap_per_chunk(), CHUNK_BYTES / std::mem::size_of::<Position>());
    }
}
