//! Immutable query definitions and the value-type enumerators that walk the
//! entity index against them.
//!
//! An enumerator never allocates: it is a handful of `u32`/`usize` cursors
//! plus borrows, advanced by `Iterator::next`. The chunk-skip optimization
//! reads directly off a committed-or-not flag and, when a caller supplies a
//! `ComponentChunkOracle`, off each required type's per-chunk population —
//! so a sparse region of the entity space costs one check per skipped
//! range rather than one check per entity.

use crate::entity::{Entity, EntityHeader, Lifecycle};
use crate::mask::BitMask256;
use crate::storage::chunk_table::ChunkedTable;

/// Gives the query engine read access to a component type's per-chunk
/// population and version without depending on its concrete element type.
/// Implemented by the repository facade (`ecs-runtime`), which owns the
/// type-erased stores behind each registered ordinal.
pub trait ComponentChunkOracle {
    /// Sum of population across every chunk of `ordinal` overlapping
    /// entity indices `[start, end)`. A caller that has no store for
    /// `ordinal` (not yet registered) should return 0: matching nothing
    /// until the type is first used is the documented edge case.
    fn population_in_range(&self, ordinal: u16, start: u32, end: u32) -> i32;
    /// Version of the chunk of `ordinal` containing `index`.
    fn version_at(&self, ordinal: u16, index: u32) -> u32;
}

/// An immutable, pre-built query: include/exclude masks over component and
/// authority bits, plus an optional lifecycle filter. Built once via
/// `QueryBuilder` and reused across frames.
#[derive(Debug, Clone)]
pub struct QueryDef {
    include: BitMask256,
    exclude: BitMask256,
    authority_include: Option<BitMask256>,
    authority_exclude: Option<BitMask256>,
    lifecycle_filter: Option<[bool; 4]>,
}

impl QueryDef {
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    pub fn include(&self) -> &BitMask256 {
        &self.include
    }

    fn matches_header(&self, header: &EntityHeader) -> bool {
        if !header.is_active || header.lifecycle == Lifecycle::Destroyed {
            return false;
        }
        if let Some(allowed) = &self.lifecycle_filter {
            if !allowed[header.lifecycle as usize] {
                return false;
            }
        }
        if !BitMask256::matches(&header.component_mask, &self.include, &self.exclude) {
            return false;
        }
        if let Some(ai) = &self.authority_include {
            let ae = self.authority_exclude.as_ref().unwrap_or(&BitMask256::ZERO);
            if !BitMask256::matches(&header.authority_mask, ai, ae) {
                return false;
            }
        }
        true
    }

    /// Enumerates every entity `R` currently contains that matches this
    /// query, in strictly increasing index order.
    pub fn enumerate<'a>(&'a self, headers: &'a ChunkedTable<EntityHeader>, max_issued: u32) -> Enumerate<'a> {
        Enumerate {
            query: self,
            headers,
            max_issued,
            cursor: 0,
            since_tick: None,
            oracle: None,
        }
    }

    /// Same shape as `enumerate`, plus `since_tick`: an entity is yielded
    /// only if its header changed after `since_tick`, or any included
    /// component's chunk version exceeds `since_tick` for the chunk
    /// containing that entity. `oracle` supplies the per-type chunk
    /// versions; without one, only the header's own `last_change_tick` is
    /// consulted (a conservative under-approximation, never a false yield).
    pub fn enumerate_delta<'a>(
        &'a self,
        headers: &'a ChunkedTable<EntityHeader>,
        max_issued: u32,
        since_tick: u32,
        oracle: &'a dyn ComponentChunkOracle,
    ) -> Enumerate<'a> {
        Enumerate {
            query: self,
            headers,
            max_issued,
            cursor: 0,
            since_tick: Some(since_tick),
            oracle: Some(oracle),
        }
    }
}

#[derive(Default)]
pub struct QueryBuilder {
    include: BitMask256,
    exclude: BitMask256,
    authority_include: Option<BitMask256>,
    authority_exclude: Option<BitMask256>,
    lifecycle_filter: Option<[bool; 4]>,
}

impl QueryBuilder {
    pub fn with_include(mut self, mask: BitMask256) -> Self {
        self.include = mask;
        self
    }

    pub fn with_exclude(mut self, mask: BitMask256) -> Self {
        self.exclude = mask;
        self
    }

    pub fn with_authority_include(mut self, mask: BitMask256) -> Self {
        self.authority_include = Some(mask);
        self
    }

    pub fn with_authority_exclude(mut self, mask: BitMask256) -> Self {
        self.authority_exclude = Some(mask);
        self
    }

    /// Restricts matches to the given subset of {Constructing, Active,
    /// TearDown}. `Destroyed` can never be selected: a destroyed slot is
    /// never active, so it is already filtered upstream of this check.
    pub fn with_lifecycle(mut self, allowed: &[Lifecycle]) -> Self {
        let mut table = [false; 4];
        for &l in allowed {
            table[l as usize] = true;
        }
        self.lifecycle_filter = Some(table);
        self
    }

    pub fn build(self) -> QueryDef {
        QueryDef {
            include: self.include,
            exclude: self.exclude,
            authority_include: self.authority_include,
            authority_exclude: self.authority_exclude,
            lifecycle_filter: self.lifecycle_filter,
        }
    }
}

/// Value-type, stack-allocated enumerator. Holds only borrows and cursors;
/// `next()` performs no heap allocation.
pub struct Enumerate<'a> {
    query: &'a QueryDef,
    headers: &'a ChunkedTable<EntityHeader>,
    max_issued: u32,
    cursor: u32,
    since_tick: Option<u32>,
    oracle: Option<&'a dyn ComponentChunkOracle>,
}

impl<'a> Enumerate<'a> {
    /// Whether the header chunk containing `index` can be skipped wholesale:
    /// either it was never committed (so every header in it reads as an
    /// unused, inactive slot), or every required include-mask type has zero
    /// population across the whole chunk's index range.
    fn chunk_is_dead(&self, index: u32) -> bool {
        let chunk = self.headers.chunk_of(index);
        if !self.headers.is_committed(chunk) {
            return true;
        }
        let Some(oracle) = self.oracle_for_population_check() else {
            return false;
        };
        let cap = self.headers.cap_per_chunk() as u32;
        let start = chunk as u32 * cap;
        let end = (start + cap).min(self.max_issued.max(start));
        for ordinal in self.query.include().set_ordinals() {
            if oracle.population_in_range(ordinal, start, end) == 0 {
                return true;
            }
        }
        false
    }

    fn oracle_for_population_check(&self) -> Option<&'a dyn ComponentChunkOracle> {
        self.oracle
    }

    fn delta_matches(&self, header: &EntityHeader, index: u32) -> bool {
        let Some(since) = self.since_tick else {
            return true;
        };
        if header.last_change_tick > since {
            return true;
        }
        let Some(oracle) = self.oracle else {
            return false;
        };
        self.query
            .include()
            .set_ordinals()
            .any(|ordinal| oracle.version_at(ordinal, index) > since)
    }
}

#[cfg(feature = "parallel")]
impl QueryDef {
    /// Same matches as `enumerate`, computed with one `rayon` task per
    /// chunk instead of a single cursor walk. Chunks are disjoint,
    /// non-overlapping index ranges (`ChunkedTable` is `Sync` precisely so
    /// this is sound), so each task only ever reads its own chunk's headers
    /// through `peek`; results are collected back in chunk order, so the
    /// output matches `enumerate`'s order exactly regardless of how the
    /// chunks were scheduled across threads.
    pub fn enumerate_par(&self, headers: &ChunkedTable<EntityHeader>, max_issued: u32) -> Vec<Entity> {
        use rayon::prelude::*;

        let cap = headers.cap_per_chunk() as u32;
        (0..headers.chunk_count())
            .into_par_iter()
            .flat_map_iter(|chunk| {
                let start = chunk as u32 * cap;
                let mut matches = Vec::new();
                if start >= max_issued || !headers.is_committed(chunk) {
                    return matches.into_iter();
                }
                let end = (start + cap).min(max_issued);
                for index in start..end {
                    let Some(header) = headers.peek(index) else { continue };
                    if self.matches_header(header) {
                        matches.push(Entity::new(index, header.generation));
                    }
                }
                matches.into_iter()
            })
            .collect()
    }
}

impl<'a> Iterator for Enumerate<'a> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        while self.cursor < self.max_issued {
            let index = self.cursor;
            if index % self.headers.cap_per_chunk() as u32 == 0 && self.chunk_is_dead(index) {
                let cap = self.headers.cap_per_chunk() as u32;
                self.cursor = index + cap;
                continue;
            }
            self.cursor += 1;
            let Some(header) = self.headers.peek(index) else {
                continue;
            };
            if !self.query.matches_header(header) {
                continue;
            }
            if !self.delta_matches(header, index) {
                continue;
            }
            return Some(Entity::new(index, header.generation));
        }
        None
    }
}

impl BitMask256 {
    /// Iterates the set bit ordinals of this mask, low lane first. Used by
    /// the query engine to walk a query's `include` bits; not on any
    /// per-entity hot path (those go through `matches`).
    pub fn set_ordinals(&self) -> impl Iterator<Item = u16> + '_ {
        let lanes = self.lanes();
        (0u16..crate::mask::BITS as u16).filter(move |&ord| {
            let (lane, bit) = ((ord as usize) / 64, (ord as u32) % 64);
            (lanes[lane] >> bit) & 1 == 1
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityIndex;

    fn mask_with(bits: &[u16]) -> BitMask256 {
        let mut m = BitMask256::zero();
        for &b in bits {
            m.set_bit(b);
        }
        m
    }

    #[test]
    fn enumerate_yields_only_active_matching_entities_in_order() {
        let mut idx = EntityIndex::reserve(64);
        let e0 = idx.create(1).unwrap();
        idx.set_lifecycle(e0, Lifecycle::Active, 1).unwrap();
        let e1 = idx.create(1).unwrap();
        idx.set_lifecycle(e1, Lifecycle::Active, 1).unwrap();
        idx.get_header_mut(e1.index, 1).unwrap().component_mask.set_bit(3);
        let e2 = idx.create(1).unwrap();
        idx.set_lifecycle(e2, Lifecycle::Active, 1).unwrap();
        idx.get_header_mut(e2.index, 1).unwrap().component_mask.set_bit(3);

        let q = QueryDef::builder().with_include(mask_with(&[3])).build();
        let got: Vec<Entity> = q.enumerate(idx.chunk_table(), 3).collect();
        assert_eq!(got, vec![e1, e2]);
    }

    #[test]
    fn empty_include_nonempty_exclude_matches_everything_not_excluded() {
        let mut idx = EntityIndex::reserve(64);
        let e0 = idx.create(1).unwrap();
        idx.set_lifecycle(e0, Lifecycle::Active, 1).unwrap();
        let e1 = idx.create(1).unwrap();
        idx.set_lifecycle(e1, Lifecycle::Active, 1).unwrap();
        idx.get_header_mut(e1.index, 1).unwrap().component_mask.set_bit(9);

        let q = QueryDef::builder().with_exclude(mask_with(&[9])).build();
        let got: Vec<Entity> = q.enumerate(idx.chunk_table(), 2).collect();
        assert_eq!(got, vec![e0]);
    }

    #[test]
    fn destroyed_entity_is_never_yielded() {
        let mut idx = EntityIndex::reserve(64);
        let e0 = idx.create(1).unwrap();
        idx.set_lifecycle(e0, Lifecycle::Active, 1).unwrap();
        idx.destroy(e0, 2).unwrap();
        let q = QueryDef::builder().build();
        let got: Vec<Entity> = q.enumerate(idx.chunk_table(), 1).collect();
        assert!(got.is_empty());
    }

    #[test]
    #[cfg(feature = "parallel")]
    fn enumerate_par_matches_sequential_enumerate_in_order() {
        let mut idx = EntityIndex::reserve(512);
        for i in 0..300 {
            let e = idx.create(1).unwrap();
            idx.set_lifecycle(e, Lifecycle::Active, 1).unwrap();
            if i % 3 == 0 {
                idx.get_header_mut(e.index, 1).unwrap().component_mask.set_bit(5);
            }
        }

        let q = QueryDef::builder().with_include(mask_with(&[5])).build();
        let sequential: Vec<Entity> = q.enumerate(idx.chunk_table(), 300).collect();
        let parallel = q.enumerate_par(idx.chunk_table(), 300);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn query_built_before_type_first_used_matches_nothing_for_that_bit() {
        let mut idx = EntityIndex::reserve(64);
        let e0 = idx.create(1).unwrap();
        idx.set_lifecycle(e0, Lifecycle::Active, 1).unwrap();
        let q = QueryDef::builder().with_include(mask_with(&[200])).build();
        let got: Vec<Entity> = q.enumerate(idx.chunk_table(), 1).collect();
        assert!(got.is_empty());
    }
}
