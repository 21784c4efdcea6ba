//! The entity index: one header per entity slot, stored in the same
//! lazily-committed chunked arrays as component data so that a freshly
//! reserved repository costs no physical memory until entities actually
//! land in it, and so `sync_from` can reuse the chunk-version diffing the
//! storage layer already provides instead of a bespoke path.
//!
//! Grounded in the teacher's `EntityRegistry`/`ArchetypeRegistry`
//! (freelist-based, generation-tagged allocation over a dense `Vec`); the
//! freelist and monotonic cursor here do the same job, just fronting
//! `ChunkedTable<EntityHeader>` rather than a plain `Vec`.

use crate::entity::{Entity, Lifecycle};
use crate::error::{Error, Result};
use crate::mask::BitMask256;
use crate::storage::chunk_table::ChunkedTable;

/// Per-slot entity metadata. Zero-initialized bytes decode as a never-used
/// slot: generation 0, inactive, empty masks, `Lifecycle::Destroyed`.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct EntityHeader {
    pub generation: u16,
    pub is_active: bool,
    pub component_mask: BitMask256,
    /// Components promised at `create_staged` time but not yet populated
    /// into a chunk slot. Bits here are cleared one at a time as the
    /// matching component is actually written (see `acknowledge`); until
    /// then they must never appear in `component_mask`, which only ever
    /// reports components a chunk slot actually holds (P1).
    pub required_mask: BitMask256,
    pub authority_mask: BitMask256,
    pub lifecycle: Lifecycle,
    pub last_change_tick: u32,
}

/// Owns the header storage, the freelist of reusable slots, and the
/// high-water mark for slots that have never been allocated.
pub struct EntityIndex {
    headers: ChunkedTable<EntityHeader>,
    max_entities: u32,
    next_fresh: u32,
    free_list: Vec<u32>,
}

impl EntityIndex {
    pub fn reserve(max_entities: u32) -> Self {
        Self {
            headers: ChunkedTable::reserve(max_entities),
            max_entities,
            next_fresh: 0,
            free_list: Vec::new(),
        }
    }

    fn allocate_slot(&mut self) -> Result<u32> {
        if let Some(index) = self.free_list.pop() {
            return Ok(index);
        }
        if self.next_fresh >= self.max_entities {
            return Err(Error::IndexOutOfRange {
                index: self.next_fresh,
                capacity: self.max_entities,
            });
        }
        let index = self.next_fresh;
        self.next_fresh += 1;
        Ok(index)
    }

    /// Allocates a slot with empty masks in the `Constructing` state. The
    /// generation is whatever the slot already holds: `destroy` bumps it
    /// ahead of time so a freed slot already carries the generation its
    /// next occupant will use, and a never-touched slot starts at 1 (0 is
    /// reserved for `Entity::NULL`).
    pub fn create(&mut self, tick: u32) -> Result<Entity> {
        let index = self.allocate_slot()?;
        let header = self.headers.get_rw(index, tick)?;
        let generation = if header.generation == 0 { 1 } else { header.generation };
        *header = EntityHeader {
            generation,
            is_active: true,
            component_mask: BitMask256::zero(),
            required_mask: BitMask256::zero(),
            authority_mask: BitMask256::zero(),
            lifecycle: Lifecycle::Constructing,
            last_change_tick: tick,
        };
        Ok(Entity::new(index, generation))
    }

    /// Allocates a slot whose `component_mask` starts empty -- no chunk
    /// slot has been populated yet -- but whose `required_mask` records
    /// the full module set the caller has committed to filling in, for
    /// callers that know their whole component set up front (e.g. network
    /// spawn messages that name every required component in one packet).
    /// Each bit moves from `required_mask` to `component_mask` only once
    /// `acknowledge` reports that component as actually written.
    pub fn create_staged(&mut self, required_modules: BitMask256, authority: BitMask256, tick: u32) -> Result<Entity> {
        let index = self.allocate_slot()?;
        let header = self.headers.get_rw(index, tick)?;
        let generation = if header.generation == 0 { 1 } else { header.generation };
        *header = EntityHeader {
            generation,
            is_active: true,
            component_mask: BitMask256::zero(),
            required_mask: required_modules,
            authority_mask: authority,
            lifecycle: Lifecycle::Constructing,
            last_change_tick: tick,
        };
        Ok(Entity::new(index, generation))
    }

    /// Installs a specific `(index, generation)` pair directly, bypassing
    /// the freelist. Used by recorder playback and view restoration, where
    /// the handle identity must match a previously recorded one exactly
    /// rather than whatever the allocator would hand out next.
    pub fn hydrate(&mut self, index: u32, generation: u16, tick: u32) -> Result<Entity> {
        if index >= self.max_entities {
            return Err(Error::IndexOutOfRange {
                index,
                capacity: self.max_entities,
            });
        }
        self.free_list.retain(|&slot| slot != index);
        if index >= self.next_fresh {
            self.next_fresh = index + 1;
        }
        let header = self.headers.get_rw(index, tick)?;
        *header = EntityHeader {
            generation,
            is_active: true,
            component_mask: BitMask256::zero(),
            required_mask: BitMask256::zero(),
            authority_mask: BitMask256::zero(),
            lifecycle: Lifecycle::Active,
            last_change_tick: tick,
        };
        Ok(Entity::new(index, generation))
    }

    /// Reserves `n` contiguous fresh indices (none of them taken from the
    /// freelist) and returns the first one, for bulk pre-allocation ahead
    /// of a batch spawn.
    pub fn reserve_id_range(&mut self, n: u32) -> Result<u32> {
        if self.next_fresh.saturating_add(n) > self.max_entities {
            return Err(Error::IndexOutOfRange {
                index: self.next_fresh + n,
                capacity: self.max_entities,
            });
        }
        let start = self.next_fresh;
        self.next_fresh += n;
        Ok(start)
    }

    /// Promotes a component from staged-but-absent to actually present:
    /// moves `ordinal` out of `required_mask` and into `component_mask`.
    /// Called at the point a chunk slot for that ordinal is genuinely
    /// populated, never before, so `component_mask` always matches real
    /// storage (P1). A no-op for components not created via
    /// `create_staged` -- `ordinal` simply isn't set in `required_mask`.
    pub fn acknowledge(&mut self, index: u32, ordinal: u16, tick: u32) -> Result<()> {
        let header = self.headers.get_rw(index, tick)?;
        header.required_mask.clear_bit(ordinal);
        header.component_mask.set_bit(ordinal);
        Ok(())
    }

    /// Whether every component named at `create_staged` time has since
    /// been acknowledged. Always `true` for entities created via plain
    /// `create`/`hydrate`, which never populate `required_mask`.
    pub fn is_fully_staged(&mut self, index: u32) -> Result<bool> {
        Ok(self.headers.get_ro(index)?.required_mask.is_zero())
    }

    /// Advances lifecycle, validating the transition is monotonic.
    pub fn set_lifecycle(&mut self, entity: Entity, next: Lifecycle, tick: u32) -> Result<()> {
        self.check_generation(entity)?;
        let header = self.headers.get_rw(entity.index, tick)?;
        if !header.lifecycle.can_transition_to(next) {
            return Err(Error::InvalidLifecycleTransition {
                from: header.lifecycle,
                to: next,
            });
        }
        header.lifecycle = next;
        header.last_change_tick = tick;
        if next == Lifecycle::Destroyed {
            header.is_active = false;
        }
        Ok(())
    }

    /// Walks an entity to `Destroyed` (through `TearDown` first if it
    /// hasn't passed through that state yet) and returns its slot to the
    /// freelist. The generation is not incremented here: reuse happens on
    /// the next `create`/`create_staged`, which bumps it, so a handle
    /// captured before destruction never matches a post-reuse one even if
    /// read between `destroy` and the next allocation.
    pub fn destroy(&mut self, entity: Entity, tick: u32) -> Result<()> {
        self.check_generation(entity)?;
        let current = self.headers.get_ro(entity.index)?.lifecycle;
        if current != Lifecycle::TearDown {
            self.set_lifecycle(entity, Lifecycle::TearDown, tick)?;
        }
        self.set_lifecycle(entity, Lifecycle::Destroyed, tick)?;
        let header = self.headers.get_rw(entity.index, tick)?;
        header.generation = next_generation(header.generation);
        self.free_list.push(entity.index);
        Ok(())
    }

    fn check_generation(&mut self, entity: Entity) -> Result<()> {
        if entity.index >= self.max_entities {
            return Err(Error::BadHandle {
                index: entity.index,
                generation: entity.generation,
            });
        }
        let header = self.headers.get_ro(entity.index)?;
        if header.generation != entity.generation || !header.is_active {
            return Err(Error::BadHandle {
                index: entity.index,
                generation: entity.generation,
            });
        }
        Ok(())
    }

    pub fn is_alive(&mut self, entity: Entity) -> bool {
        if entity.index >= self.max_entities {
            return false;
        }
        match self.headers.get_ro(entity.index) {
            Ok(header) => {
                header.generation == entity.generation
                    && header.is_active
                    && header.lifecycle != Lifecycle::Destroyed
            }
            Err(_) => false,
        }
    }

    pub fn is_valid(&mut self, entity: Entity) -> bool {
        !entity.is_null() && self.is_alive(entity)
    }

    pub fn get_header(&mut self, index: u32) -> Result<&EntityHeader> {
        self.headers.get_ro(index)
    }

    pub fn get_header_mut(&mut self, index: u32, tick: u32) -> Result<&mut EntityHeader> {
        self.headers.get_rw(index, tick)
    }

    pub fn max_entities(&self) -> u32 {
        self.max_entities
    }

    /// High-water mark of indices ever handed out by `create`/`create_staged`/
    /// `hydrate`/`reserve_id_range`: the upper bound a query enumerator needs
    /// to scan to, since nothing past this point has ever been written.
    pub fn max_issued(&self) -> u32 {
        self.next_fresh
    }

    pub fn chunk_table(&self) -> &ChunkedTable<EntityHeader> {
        &self.headers
    }

    pub fn chunk_table_mut(&mut self) -> &mut ChunkedTable<EntityHeader> {
        &mut self.headers
    }

    /// Copies every header chunk whose version differs from `other`'s, the
    /// same way a component table does, then adopts `other`'s allocator
    /// bookkeeping wholesale: a replica's freelist and cursor only make
    /// sense as a unit with the header bytes they describe.
    pub fn sync_from(&mut self, other: &EntityIndex) {
        self.headers.sync_dirty_from(&other.headers);
        self.next_fresh = other.next_fresh;
        self.free_list.clone_from(&other.free_list);
    }

    /// Rebuilds `next_fresh` and the freelist by scanning every committed
    /// header chunk directly, rather than tracking them incrementally.
    /// Used after a caller restores header chunks out-of-band (the
    /// recorder's playback, which writes header bytes straight into the
    /// chunk table rather than going through `create`/`destroy`), so the
    /// allocator's bookkeeping matches whatever the restored bytes say
    /// instead of whatever it held before the restore.
    pub fn recompute_allocator_state(&mut self) {
        let mut max_seen: Option<u32> = None;
        let mut free = Vec::new();
        let cap = self.headers.cap_per_chunk() as u32;
        for chunk in 0..self.headers.chunk_count() {
            if !self.headers.is_committed(chunk) {
                continue;
            }
            let start = chunk as u32 * cap;
            let end = (start + cap).min(self.max_entities);
            for index in start..end {
                let Some(header) = self.headers.peek(index) else { continue };
                if header.generation == 0 {
                    continue;
                }
                max_seen = Some(max_seen.map_or(index, |m| m.max(index)));
                if !header.is_active {
                    free.push(index);
                }
            }
        }
        self.next_fresh = max_seen.map_or(0, |m| m + 1);
        self.free_list = free;
    }
}

fn next_generation(current: u16) -> u16 {
    let bumped = current.wrapping_add(1);
    if bumped == 0 {
        1
    } else {
        bumped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_assigns_nonzero_generation_and_active_lifecycle() {
        let mut idx = EntityIndex::reserve(16);
        let e = idx.create(1).unwrap();
        assert!(!e.is_null());
        assert!(idx.is_alive(e));
        assert_eq!(idx.get_header(e.index).unwrap().lifecycle, Lifecycle::Constructing);
    }

    #[test]
    fn destroy_then_recreate_bumps_generation_and_invalidates_old_handle() {
        let mut idx = EntityIndex::reserve(16);
        let e1 = idx.create(1).unwrap();
        idx.set_lifecycle(e1, Lifecycle::Active, 1).unwrap();
        idx.destroy(e1, 2).unwrap();
        assert!(!idx.is_alive(e1));

        let e2 = idx.create(3).unwrap();
        assert_eq!(e2.index, e1.index);
        assert_ne!(e2.generation, e1.generation);
        assert!(idx.is_alive(e2));
        assert!(!idx.is_alive(e1));
    }

    #[test]
    fn invalid_lifecycle_transition_is_rejected() {
        let mut idx = EntityIndex::reserve(16);
        let e = idx.create(1).unwrap();
        let err = idx.set_lifecycle(e, Lifecycle::Destroyed, 2);
        assert!(matches!(err, Err(Error::InvalidLifecycleTransition { .. })));
    }

    #[test]
    fn bad_handle_rejected_after_destroy() {
        let mut idx = EntityIndex::reserve(16);
        let e = idx.create(1).unwrap();
        idx.destroy(e, 2).unwrap();
        let err = idx.set_lifecycle(e, Lifecycle::Active, 3);
        assert!(matches!(err, Err(Error::BadHandle { .. })));
    }

    #[test]
    fn reserve_id_range_is_contiguous_and_disjoint_from_freelist() {
        let mut idx = EntityIndex::reserve(16);
        let start = idx.reserve_id_range(4).unwrap();
        assert_eq!(start, 0);
        let e = idx.create(1).unwrap();
        assert_eq!(e.index, 4);
    }

    #[test]
    fn create_staged_reports_no_components_until_acknowledged() {
        let mut idx = EntityIndex::reserve(16);
        let required = BitMask256::zero().with_bit(3).with_bit(200);
        let e = idx.create_staged(required, BitMask256::zero(), 1).unwrap();

        let header = idx.get_header(e.index).unwrap();
        assert!(header.component_mask.is_zero());
        assert!(!header.required_mask.is_zero());
        assert!(!idx.is_fully_staged(e.index).unwrap());

        idx.acknowledge(e.index, 3, 1).unwrap();
        assert!(idx.get_header(e.index).unwrap().component_mask.test_bit(3));
        assert!(!idx.is_fully_staged(e.index).unwrap());

        idx.acknowledge(e.index, 200, 1).unwrap();
        assert!(idx.get_header(e.index).unwrap().component_mask.test_bit(200));
        assert!(idx.is_fully_staged(e.index).unwrap());
    }

    #[test]
    fn hydrate_installs_exact_handle_and_removes_it_from_freelist() {
        let mut idx = EntityIndex::reserve(16);
        let e = idx.create(1).unwrap();
        idx.destroy(e, 2).unwrap();
        assert!(idx.free_list.contains(&e.index));
        let rehydrated = idx.hydrate(e.index, 7, 3).unwrap();
        assert_eq!(rehydrated.generation, 7);
        assert!(!idx.free_list.contains(&e.index));
        assert!(idx.is_alive(rehydrated));
    }

    #[test]
    fn sync_from_mirrors_header_bytes_and_allocator_state() {
        let mut src = EntityIndex::reserve(16);
        let e = src.create(1).unwrap();
        src.set_lifecycle(e, Lifecycle::Active, 1).unwrap();

        let mut replica = EntityIndex::reserve(16);
        replica.sync_from(&src);
        assert!(replica.is_alive(e));
        assert_eq!(replica.next_fresh, src.next_fresh);
    }

    #[test]
    fn recompute_allocator_state_rebuilds_freelist_and_cursor_from_header_bytes() {
        let mut idx = EntityIndex::reserve(16);
        let a = idx.create(1).unwrap();
        let b = idx.create(1).unwrap();
        idx.destroy(a, 2).unwrap();

        // Simulate an out-of-band header restore by clearing the fields a
        // normal `create`/`destroy` sequence would have kept in sync.
        idx.next_fresh = 0;
        idx.free_list.clear();

        idx.recompute_allocator_state();
        assert_eq!(idx.next_fresh, 2);
        assert!(idx.free_list.contains(&a.index));
        assert!(!idx.free_list.contains(&b.index));
        assert!(idx.is_alive(b));
    }

    #[test]
    fn out_of_capacity_allocation_errors() {
        let mut idx = EntityIndex::reserve(1);
        idx.create(1).unwrap();
        let err = idx.create(2);
        assert!(matches!(err, Err(Error::IndexOutOfRange { .. })));
    }
}
