//! Type-erased dispatch over the two storage tiers.
//!
//! Per Design Notes §9, the source this core replaces bridges plain-data and
//! reference component access through reflection-built delegates; here that
//! becomes a pair of small vtable traits populated once at registration time
//! by a generic `impl` block, with `std::any::Any` used only to recover the
//! concrete type on the *other* side of a same-ordinal sync (never to probe
//! an unknown type) — no runtime reflection walks a type's fields.
//!
//! The repository facade (`ecs-runtime`) stores one `Box<dyn ErasedPlainStore>`
//! or `Box<dyn ErasedRefStore>` per registered ordinal; the query engine's
//! chunk-skip optimization and `sync_from`'s type-set diffing both go
//! through these traits instead of a generic `T`.

use crate::error::Result;
use std::any::Any;

/// Byte-level view of one plain-data component table, with no knowledge of
/// its element type. Every method here is already expressible in terms of
/// raw bytes in `ChunkedTable<T>`, so the blanket impl below is a thin
/// forwarding layer, not a reimplementation.
pub trait ErasedPlainStore: Send + Sync {
    fn chunk_count(&self) -> usize;
    fn cap_per_chunk(&self) -> usize;
    fn elem_size(&self) -> usize;
    fn version(&self, chunk: usize) -> u32;
    fn population(&self, chunk: usize) -> i32;
    fn is_committed(&self, chunk: usize) -> bool;
    /// Sum of `population` over every underlying chunk touching `[start, end)`.
    /// Used by the query engine to skip index ranges with no live elements
    /// of this type; see `query::chunk_skip`.
    fn population_in_range(&self, start: u32, end: u32) -> i32;
    fn copy_chunk_to(&self, chunk: usize, out: &mut [u8]);
    fn restore_chunk_from(&mut self, chunk: usize, data: &[u8], version: u32, population: i32);
    fn sanitize_chunk(&mut self, chunk: usize, liveness: &[bool]);
    fn try_decommit(&mut self, chunk: usize) -> Result<()>;
    fn mark_populated(&mut self, index: u32);
    fn mark_unpopulated(&mut self, index: u32);
    fn get_raw(&mut self, index: u32) -> &[u8];
    fn get_raw_mut(&mut self, index: u32, current_tick: u32) -> &mut [u8];
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// A freshly reserved, empty table of the same concrete type and
    /// capacity as `self`. Used by `Repository::new_like` to build a
    /// replica's storage without knowing the concrete element type.
    fn empty_like(&self) -> Box<dyn ErasedPlainStore>;

    /// For each chunk whose version differs, copy from `other` or decommit
    /// to match it. Implemented once here against the trait's own byte
    /// primitives so concrete `ChunkedTable<T>` does not need to re-derive
    /// it for the heterogeneous (type-erased) case.
    fn sync_dirty_from_erased(&mut self, other: &dyn ErasedPlainStore) {
        debug_assert_eq!(self.chunk_count(), other.chunk_count());
        let mut buf = vec![0u8; self.elem_size() * self.cap_per_chunk()];
        buf.resize(crate::config::CHUNK_BYTES, 0);
        for c in 0..self.chunk_count() {
            let other_version = other.version(c);
            if other_version == 0 || other_version == self.version(c) {
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

impl<T: Copy + Send + Sync + 'static> ErasedPlainStore for super::chunk_table::ChunkedTable<T> {
    fn chunk_count(&self) -> usize {
        self.chunk_count()
    }
    fn cap_per_chunk(&self) -> usize {
        self.cap_per_chunk()
    }
    fn elem_size(&self) -> usize {
        std::mem::size_of::<T>()
    }
    fn version(&self, chunk: usize) -> u32 {
        self.version(chunk)
    }
    fn population(&self, chunk: usize) -> i32 {
        self.population(chunk)
    }
    fn is_committed(&self, chunk: usize) -> bool {
        self.is_committed(chunk)
    }
    fn population_in_range(&self, start: u32, end: u32) -> i32 {
        self.population_in_range(start, end)
    }
    fn copy_chunk_to(&self, chunk: usize, out: &mut [u8]) {
        self.copy_chunk_to(chunk, out)
    }
    fn restore_chunk_from(&mut self, chunk: usize, data: &[u8], version: u32, population: i32) {
        self.restore_chunk_from(chunk, data, version, population)
    }
    fn sanitize_chunk(&mut self, chunk: usize, liveness: &[bool]) {
        self.sanitize_chunk(chunk, liveness)
    }
    fn try_decommit(&mut self, chunk: usize) -> Result<()> {
        self.try_decommit(chunk)
    }
    fn mark_populated(&mut self, index: u32) {
        self.mark_populated(index)
    }
    fn mark_unpopulated(&mut self, index: u32) {
        self.mark_unpopulated(index)
    }
    fn get_raw(&mut self, index: u32) -> &[u8] {
        self.get_raw(index)
    }
    fn get_raw_mut(&mut self, index: u32, current_tick: u32) -> &mut [u8] {
        self.get_raw_mut(index, current_tick)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn empty_like(&self) -> Box<dyn ErasedPlainStore> {
        Box::new(super::chunk_table::ChunkedTable::<T>::reserve(self.max_entities()))
    }
}

/// Byte-level view of one reference component table. Unlike plain storage,
/// a reference table has no per-chunk version, so `sync_from_erased` always
/// walks the whole sparse set; the `clone_on_snapshot` flag picks between
/// sharing the existing `Arc` (cheap) and deep-cloning the pointee, per the
/// owning type's `SnapshotPolicy`.
pub trait ErasedRefStore: Send + Sync + Any {
    fn contains(&self, index: u32) -> bool;
    fn remove_erased(&mut self, index: u32);
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn sync_from_erased(&mut self, other: &dyn ErasedRefStore, clone_on_snapshot: bool);
    /// A freshly constructed, empty table of the same concrete type as
    /// `self`. Reference tables carry no fixed capacity, unlike plain
    /// tables, so this never needs `max_entities`.
    fn empty_like(&self) -> Box<dyn ErasedRefStore>;
}

impl<T: Clone + Send + Sync + 'static> ErasedRefStore for super::sparse_table::SparseTable<T> {
    fn contains(&self, index: u32) -> bool {
        self.contains(index)
    }
    fn remove_erased(&mut self, index: u32) {
        self.remove(index);
    }
    fn len(&self) -> usize {
        self.len()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn sync_from_erased(&mut self, other: &dyn ErasedRefStore, clone_on_snapshot: bool) {
        let other = other
            .as_any()
            .downcast_ref::<super::sparse_table::SparseTable<T>>()
            .expect("sync_from_erased called across mismatched component types");
        if clone_on_snapshot {
            self.sync_clone_from(other);
        } else {
            self.sync_share_from(other);
        }
    }
    fn empty_like(&self) -> Box<dyn ErasedRefStore> {
        Box::new(super::sparse_table::SparseTable::<T>::new())
    }
}
