//! Snapshot Provider Surface.
//!
//! The live repository is main-thread-owned; every other thread observes
//! the world through a *view* a provider builds and refreshes. This module
//! offers the two provider shapes the design notes call for: a single
//! long-lived [`PersistentReplica`] and a [`SnapshotPool`] of short-lived
//! [`PooledSnapshot`]s, both of which do nothing more than drive
//! `Repository::sync_from` plus an event-buffer carry-over on a schedule
//! the caller controls.
//!
//! Grounded in the teacher's `Runtime` tick-phase loop
//! (`packages/in-mem-db-runtime/src/runtime.rs`): a pool of reusable
//! work items drained and refilled by the owning thread, here specialized
//! to pooled snapshot acquisition instead of request queues.

use std::sync::Arc;

use arc_swap::ArcSwap;
use ecs_core::BitMask256;

use crate::error::{Error, Result};
use crate::repository::Repository;

/// A lock-free published snapshot: the owning thread periodically
/// `publish`es a freshly synced replica, and any number of other threads
/// `load` it without contending with a mutex or with the live repository
/// the replica was synced from.
///
/// Grounded in the teacher's `AtomicBuffer` (`ArcSwap<BufferStorage>`):
/// readers hold an `Arc` that keeps their snapshot alive even after a
/// newer one has been published, so a read in progress never observes a
/// torn or partially-updated view.
pub struct PublishedView {
    inner: ArcSwap<Repository>,
}

impl PublishedView {
    /// Publishes `initial` as the first readable snapshot.
    pub fn new(initial: Repository) -> Self {
        Self {
            inner: ArcSwap::new(Arc::new(initial)),
        }
    }

    /// Atomically replaces the published snapshot. Readers already holding
    /// an `Arc` from a prior `load` keep observing the old one until they
    /// drop it; there is no reader-blocks-writer or writer-blocks-reader
    /// contention either way.
    pub fn publish(&self, view: Repository) {
        self.inner.store(Arc::new(view));
    }

    /// Zero-copy, non-blocking read access to the latest published
    /// snapshot.
    pub fn load(&self) -> Arc<Repository> {
        self.inner.load_full()
    }
}

/// A long-lived replica of a source repository, refreshed on demand by
/// the thread that owns it (typically once per tick, outside the
/// `Simulation` phase so the source is quiescent).
pub struct PersistentReplica {
    replica: Repository,
    mask: Option<BitMask256>,
}

impl PersistentReplica {
    /// Builds an empty replica sharing `source`'s registered types.
    pub fn new(source: &Repository, mask: Option<BitMask256>) -> Self {
        Self {
            replica: source.new_like(),
            mask,
        }
    }

    /// `sync_from(source, mask)` plus the event-buffer carry described in
    /// §4.8: `clear_current` then `inject_into_current` per event type,
    /// so the replica's readers see exactly the source's not-yet-consumed
    /// events without the replica itself becoming a second producer.
    pub fn update(&mut self, source: &Repository) {
        self.replica.sync_from(source, self.mask, false, &[]);
        let source_events = source.events();
        self.replica.events_mut().sync_plain_current_from(source_events);
        tracing::trace!(tick = source.current_tick(), "persistent replica updated");
    }

    /// Returns the replica. `release_view` is a no-op for this provider:
    /// the replica is not pooled, so there is nothing to return.
    pub fn acquire_view(&self) -> &Repository {
        &self.replica
    }

    pub fn acquire_view_mut(&mut self) -> &mut Repository {
        &mut self.replica
    }

    pub fn release_view(&self) {}
}

/// One pooled replica plus the tick at which it was last synced, so
/// `acquire_view` can flush only the event history the consumer has not
/// already observed.
struct PoolSlot {
    repo: Repository,
    last_synced_tick: u32,
}

/// A guard over a popped pooled replica. Dropping it without calling
/// [`SnapshotPool::release_view`] is the documented "abandon mid-execution"
/// case: the slot is simply not returned to the pool and the pool shrinks,
/// which is safe but wastes the allocation; callers should always release.
pub struct PooledSnapshot {
    slot: Option<PoolSlot>,
}

impl PooledSnapshot {
    pub fn view(&self) -> &Repository {
        &self.slot.as_ref().expect("pooled snapshot used after release").repo
    }

    pub fn view_mut(&mut self) -> &mut Repository {
        &mut self.slot.as_mut().expect("pooled snapshot used after release").repo
    }
}

/// Maintains a bounded pool of short-lived replica repositories, built
/// once up front (`warmup` of them eagerly, the rest lazily up to
/// `pool_size`) and recycled between acquirers.
pub struct SnapshotPool {
    name: &'static str,
    free: Vec<PoolSlot>,
    mask: Option<BitMask256>,
    pool_size: usize,
    outstanding: usize,
}

impl SnapshotPool {
    pub fn new(source: &Repository, mask: Option<BitMask256>, pool_size: usize, warmup: usize) -> Self {
        let warmup = warmup.min(pool_size);
        let free = (0..warmup)
            .map(|_| PoolSlot {
                repo: source.new_like(),
                last_synced_tick: 0,
            })
            .collect();
        Self {
            name: "snapshot_pool",
            free,
            mask,
            pool_size,
            outstanding: 0,
        }
    }

    /// Pops a replica (building one lazily if the pool has room left and
    /// is currently empty), syncs it against `source`, flushes event
    /// history since the slot's last sync, and hands it to the caller.
    pub fn acquire_view(&mut self, source: &Repository) -> Result<PooledSnapshot> {
        let mut slot = match self.free.pop() {
            Some(slot) => slot,
            None if self.outstanding < self.pool_size => PoolSlot {
                repo: source.new_like(),
                last_synced_tick: 0,
            },
            None => return Err(Error::PoolExhausted(self.name)),
        };

        slot.repo.sync_from(source, self.mask, false, &[]);
        slot.repo.events_mut().sync_plain_current_from(source.events());
        slot.last_synced_tick = source.current_tick();
        self.outstanding += 1;

        tracing::trace!(
            pool = self.name,
            tick = slot.last_synced_tick,
            outstanding = self.outstanding,
            "pooled snapshot acquired"
        );
        Ok(PooledSnapshot { slot: Some(slot) })
    }

    /// Soft-clears the view's not-yet-consumed events and returns it to
    /// the free list. The replica's component data is left as-is; the
    /// next `acquire_view` will re-sync it from scratch.
    pub fn release_view(&mut self, mut view: PooledSnapshot) {
        if let Some(mut slot) = view.slot.take() {
            slot.repo.clear_current_events();
            self.free.push(slot);
            self.outstanding = self.outstanding.saturating_sub(1);
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use ecs_core::SnapshotPolicy;

    #[derive(Copy, Clone, Debug, PartialEq)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }

    fn make_source() -> Repository {
        let mut repo = Repository::new(RuntimeConfig::default());
        repo.register_plain::<Position>("Position", SnapshotPolicy::Persistent).unwrap();
        repo
    }

    #[test]
    fn persistent_replica_reflects_source_after_update() {
        let mut source = make_source();
        let e = source.create().unwrap();
        source.add(e, Position { x: 1.0, y: 2.0 }).unwrap();

        let mut replica = PersistentReplica::new(&source, None);
        replica.update(&source);

        let view = replica.acquire_view_mut();
        assert_eq!(*view.get_ro::<Position>(e).unwrap(), Position { x: 1.0, y: 2.0 });
        replica.release_view();
    }

    #[test]
    fn pooled_snapshot_round_trips_through_release() {
        let mut source = make_source();
        let e = source.create().unwrap();
        source.add(e, Position { x: 3.0, y: 4.0 }).unwrap();

        let mut pool = SnapshotPool::new(&source, None, 2, 1);
        let mut view = pool.acquire_view(&source).unwrap();
        assert_eq!(*view.view_mut().get_ro::<Position>(e).unwrap(), Position { x: 3.0, y: 4.0 });
        assert_eq!(pool.outstanding(), 1);

        pool.release_view(view);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.free_len(), 1);
    }

    #[test]
    fn pool_exhaustion_returns_error_once_capacity_is_outstanding() {
        let source = make_source();
        let mut pool = SnapshotPool::new(&source, None, 1, 1);
        let _first = pool.acquire_view(&source).unwrap();
        let second = pool.acquire_view(&source);
        assert!(matches!(second, Err(Error::PoolExhausted(_))));
    }

    #[test]
    fn published_view_readers_observe_the_most_recently_published_snapshot() {
        let mut source = make_source();
        let e = source.create().unwrap();
        source.add(e, Position { x: 1.0, y: 2.0 }).unwrap();

        let mut first = source.new_like();
        first.sync_from(&source, None, false, &[]);
        let published = PublishedView::new(first);
        assert_eq!(published.load().stats().entity_high_water, 1);

        source.create().unwrap();
        let mut second = source.new_like();
        second.sync_from(&source, None, false, &[]);
        published.publish(second);
        assert_eq!(published.load().stats().entity_high_water, 2);
    }

    #[test]
    fn published_view_reader_keeps_its_snapshot_alive_across_a_republish() {
        let source = make_source();
        let mut first = source.new_like();
        first.sync_from(&source, None, false, &[]);
        let published = PublishedView::new(first);

        let held = published.load();
        published.publish(source.new_like());
        assert_eq!(held.stats().tick, source.current_tick());
    }
}
