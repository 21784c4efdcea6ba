//! The repository facade: the single entry point that unifies entity
//! storage, component tables, the query engine, the event bus and the
//! phase/permission model into the object every module, provider and the
//! recorder actually hold a reference to.
//!
//! Grounded in the teacher's `Database` (`ecsdb/src/db.rs`): one struct that
//! owns every table behind a type-indexed map and exposes typed
//! `add`/`get`/`set` wrappers over erased storage, plus a `sync_from`-style
//! operation used to build replicas. The difference from the teacher is
//! that this facade's tables are reached through `ecs_core`'s
//! `ErasedPlainStore`/`ErasedRefStore` vtables rather than a
//! `dyn TableHandle`, and permission checking is layered on top via
//! `PhaseState` rather than folded into each table.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use ecs_core::storage::{ErasedPlainStore, ErasedRefStore};
use ecs_core::{
    BitMask256, ChunkedTable, ComponentChunkOracle, Entity, EntityHeader, EntityIndex, Enumerate,
    Lifecycle, QueryDef, SnapshotPolicy, SparseTable, StorageKind, TypeRegistry,
};

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::event_registry::{EventKind, EventTypeRegistry};
use crate::phase::{Permission, Phase, PhaseState};
use crate::singleton_registry::SingletonRegistry;

/// One plain-data event published this frame, addressed by the event type
/// registry's ordinal rather than a generic parameter -- the shape the
/// recorder and the ambient HTTP surface both consume.
pub struct PlainEventView<'a> {
    pub ordinal: i32,
    pub name: &'a str,
    pub bytes: &'a [u8],
}

/// Borrowed view over every event type's current buffer, adequate for
/// recording a frame without cloning payloads. Reference-typed events are
/// included only for types registered with `register_ref_event_codec`,
/// matching the documented scope decision in DESIGN.md.
pub struct FrameEventData<'a> {
    pub plain: Vec<PlainEventView<'a>>,
    pub encoded_refs: Vec<(i32, String, Vec<u8>)>,
}

/// Entity created/destroyed lifecycle notification, published on the event
/// bus so observers don't need to poll `is_alive` every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEventKind {
    Created,
    Destroyed,
}

#[derive(Debug, Clone, Copy)]
pub struct EntityLifecycleEvent {
    pub entity: Entity,
    pub kind: LifecycleEventKind,
}

type EncodeFn = Box<dyn Fn(&(dyn Any + Send + Sync)) -> Vec<u8> + Send + Sync>;
type DecodeFn = Box<dyn Fn(&[u8]) -> Box<dyn Any + Send + Sync> + Send + Sync>;

struct RefEventCodec {
    name: String,
    encode: EncodeFn,
    decode: DecodeFn,
}

/// The live (or replica) repository: entity index, every registered
/// component table, the event bus, and the phase/tick state that gates
/// writes against it.
pub struct Repository {
    config: RuntimeConfig,
    registry: TypeRegistry,
    entities: EntityIndex,
    plain: HashMap<u16, Box<dyn ErasedPlainStore>>,
    refs: HashMap<u16, Box<dyn ErasedRefStore>>,
    singleton_plain: HashMap<TypeId, (String, Vec<u8>, u32)>,
    singleton_ref: HashMap<TypeId, (String, Arc<dyn Any + Send + Sync>)>,
    singleton_registry: SingletonRegistry,
    events: ecs_core::EventBus,
    event_registry: EventTypeRegistry,
    ref_event_codecs: HashMap<TypeId, RefEventCodec>,
    phase: PhaseState,
    tick: u32,
    global_version: u64,
    disposed: bool,
    destroyed_this_tick: Vec<Entity>,
}

impl Repository {
    pub fn new(config: RuntimeConfig) -> Self {
        let max_entities = config.core.max_entities;
        Self {
            config,
            registry: TypeRegistry::new(),
            entities: EntityIndex::reserve(max_entities),
            plain: HashMap::new(),
            refs: HashMap::new(),
            singleton_plain: HashMap::new(),
            singleton_ref: HashMap::new(),
            singleton_registry: SingletonRegistry::new(),
            events: ecs_core::EventBus::new(),
            event_registry: EventTypeRegistry::new(),
            ref_event_codecs: HashMap::new(),
            phase: PhaseState::default(),
            tick: 0,
            global_version: 0,
            disposed: false,
            destroyed_this_tick: Vec::new(),
        }
    }

    /// A repository sharing this one's registered types but with empty
    /// storage, for use by snapshot providers constructing a fresh replica.
    /// `sync_from` is the only supported way to populate it afterwards.
    pub fn new_like(&self) -> Self {
        let mut fresh = Self::new(self.config.clone());
        fresh.registry = self.registry.clone();
        for (&ordinal, store) in &self.plain {
            fresh.plain.insert(ordinal, store.empty_like());
        }
        for (&ordinal, store) in &self.refs {
            fresh.refs.insert(ordinal, store.empty_like());
        }
        fresh
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.registry
    }

    // ---- Tick / Phase --------------------------------------------------

    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    pub fn global_version(&self) -> u64 {
        self.global_version
    }

    /// Advances the repository's tick. Fails only if the repository has
    /// already been disposed.
    pub fn tick(&mut self) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        self.tick = self.tick.wrapping_add(1);
        self.global_version = self.global_version.wrapping_add(1);
        self.phase.reset_for_tick();
        self.destroyed_this_tick.clear();
        tracing::debug!(tick = self.tick, "repository tick advanced");
        Ok(())
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    /// Forces the tick (and, transitively, `global_version`) to an exact
    /// value, bypassing the usual `wrapping_add(1)` advance. Playback is the
    /// only caller: restoring a recorded frame must land the repository on
    /// that frame's tick exactly, including jumping far ahead of whatever
    /// tick it held before (a cold replica seeking straight to a keyframe)
    /// or resetting it backward (re-seeking to an earlier point).
    pub fn set_tick(&mut self, tick: u32) {
        self.tick = tick;
        self.global_version = tick as u64;
        self.phase.reset_for_tick();
        self.destroyed_this_tick.clear();
    }

    pub fn set_phase(&mut self, phase: Phase, permission: Option<Permission>) -> Result<()> {
        self.phase.set_phase(phase, permission)?;
        tracing::trace!(?phase, "repository phase advanced");
        Ok(())
    }

    pub fn current_phase(&self) -> Phase {
        self.phase.current()
    }

    fn check_write(&self, entity: Entity, ordinal: u16) -> Result<()> {
        let header = self
            .entities_chunk_table_ro(entity.index)
            .ok_or(ecs_core::Error::BadHandle {
                index: entity.index,
                generation: entity.generation,
            })?;
        let is_owned = header.authority_mask.test_bit(ordinal);
        self.phase.check_write(is_owned)?;
        Ok(())
    }

    fn entities_chunk_table_ro(&self, index: u32) -> Option<EntityHeader> {
        self.entities.chunk_table().peek(index).copied()
    }

    // ---- Entities -------------------------------------------------------

    pub fn create(&mut self) -> Result<Entity> {
        let e = self.entities.create(self.tick)?;
        self.events.publish_plain(EntityLifecycleEvent { entity: e, kind: LifecycleEventKind::Created });
        Ok(e)
    }

    pub fn create_staged(&mut self, required_modules: BitMask256, authority: BitMask256) -> Result<Entity> {
        let e = self.entities.create_staged(required_modules, authority, self.tick)?;
        self.events.publish_plain(EntityLifecycleEvent { entity: e, kind: LifecycleEventKind::Created });
        Ok(e)
    }

    /// Whether a `create_staged` entity has had every named component
    /// actually written. Always `true` for entities from plain `create`.
    pub fn is_fully_constructed(&mut self, entity: Entity) -> Result<bool> {
        Ok(self.entities.is_fully_staged(entity.index)?)
    }

    pub fn hydrate(&mut self, index: u32, generation: u16) -> Result<Entity> {
        Ok(self.entities.hydrate(index, generation, self.tick)?)
    }

    pub fn reserve_id_range(&mut self, n: u32) -> Result<u32> {
        Ok(self.entities.reserve_id_range(n)?)
    }

    pub fn destroy(&mut self, entity: Entity) -> Result<()> {
        self.entities.destroy(entity, self.tick)?;
        self.destroyed_this_tick.push(entity);
        self.events.publish_plain(EntityLifecycleEvent { entity, kind: LifecycleEventKind::Destroyed });
        Ok(())
    }

    /// Entities destroyed since the start of the current tick, in
    /// destruction order. The recorder's Destruction section is built from
    /// this list when it closes out a frame.
    pub fn destroyed_this_tick(&self) -> &[Entity] {
        &self.destroyed_this_tick
    }

    pub fn is_alive(&mut self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn is_valid(&mut self, entity: Entity) -> bool {
        self.entities.is_valid(entity)
    }

    pub fn set_lifecycle(&mut self, entity: Entity, state: Lifecycle) -> Result<()> {
        Ok(self.entities.set_lifecycle(entity, state, self.tick)?)
    }

    pub fn set_authority(&mut self, entity: Entity, authority: BitMask256) -> Result<()> {
        let tick = self.tick;
        let header = self.entities.get_header_mut(entity.index, tick)?;
        header.authority_mask = authority;
        header.last_change_tick = tick;
        Ok(())
    }

    pub fn get_header(&mut self, index: u32) -> Result<&EntityHeader> {
        Ok(self.entities.get_header(index)?)
    }

    pub fn entities(&self) -> &EntityIndex {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityIndex {
        &mut self.entities
    }

    // ---- Plain components ------------------------------------------------

    fn ordinal_of<T: 'static>(&self) -> Result<u16> {
        self.registry
            .ordinal_of::<T>()
            .ok_or_else(|| ecs_core::Error::TypeNotRegistered(std::any::type_name::<T>().to_string()).into())
    }

    pub fn register_plain<T: Copy + Send + Sync + 'static>(&mut self, name: &str, policy: SnapshotPolicy) -> Result<u16> {
        let max_entities = self.config.core.max_entities;
        let ordinal = self
            .registry
            .register::<T>(name, std::mem::size_of::<T>(), StorageKind::Plain, policy)?;
        self.plain
            .entry(ordinal)
            .or_insert_with(|| Box::new(ChunkedTable::<T>::reserve(max_entities)));
        Ok(ordinal)
    }

    fn plain_store<T: Copy + Send + Sync + 'static>(&self, ordinal: u16) -> Result<&ChunkedTable<T>> {
        let store = self.plain.get(&ordinal).ok_or_else(|| ecs_core::Error::TypeNotRegistered(std::any::type_name::<T>().to_string()))?;
        Ok(store
            .as_any()
            .downcast_ref::<ChunkedTable<T>>()
            .expect("component ordinal registered under a mismatched concrete type"))
    }

    fn plain_store_mut<T: Copy + Send + Sync + 'static>(&mut self, ordinal: u16) -> Result<&mut ChunkedTable<T>> {
        let store = self
            .plain
            .get_mut(&ordinal)
            .ok_or_else(|| ecs_core::Error::TypeNotRegistered(std::any::type_name::<T>().to_string()))?;
        Ok(store
            .as_any_mut()
            .downcast_mut::<ChunkedTable<T>>()
            .expect("component ordinal registered under a mismatched concrete type"))
    }

    pub fn add<T: Copy + Send + Sync + 'static>(&mut self, entity: Entity, value: T) -> Result<()> {
        let ordinal = self.ordinal_of::<T>()?;
        if !self.entities.is_alive(entity) {
            return Err(ecs_core::Error::BadHandle { index: entity.index, generation: entity.generation }.into());
        }
        self.check_write(entity, ordinal)?;
        let tick = self.tick;
        {
            let store = self.plain_store_mut::<T>(ordinal)?;
            *store.get_rw(entity.index, tick)? = value;
            store.mark_populated(entity.index);
        }
        self.entities.acknowledge(entity.index, ordinal, tick)?;
        self.entities.get_header_mut(entity.index, tick)?.last_change_tick = tick;
        Ok(())
    }

    pub fn remove<T: Copy + Send + Sync + 'static>(&mut self, entity: Entity) -> Result<()> {
        let ordinal = self.ordinal_of::<T>()?;
        self.check_write(entity, ordinal)?;
        let tick = self.tick;
        let header = self.entities.get_header_mut(entity.index, tick)?;
        let was_present = header.component_mask.test_bit(ordinal);
        header.component_mask.clear_bit(ordinal);
        header.last_change_tick = tick;
        if was_present {
            self.plain_store_mut::<T>(ordinal)?.mark_unpopulated(entity.index);
        }
        Ok(())
    }

    pub fn has<T: Copy + Send + Sync + 'static>(&mut self, entity: Entity) -> Result<bool> {
        let ordinal = self.ordinal_of::<T>()?;
        let header = self.entities.get_header(entity.index)?;
        Ok(header.component_mask.test_bit(ordinal))
    }

    pub fn get_ro<T: Copy + Send + Sync + 'static>(&mut self, entity: Entity) -> Result<&T> {
        let ordinal = self.ordinal_of::<T>()?;
        Ok(self.plain_store_mut::<T>(ordinal)?.get_ro(entity.index)?)
    }

    pub fn get_rw<T: Copy + Send + Sync + 'static>(&mut self, entity: Entity) -> Result<&mut T> {
        let ordinal = self.ordinal_of::<T>()?;
        self.check_write(entity, ordinal)?;
        let tick = self.tick;
        Ok(self.plain_store_mut::<T>(ordinal)?.get_rw(entity.index, tick)?)
    }

    pub fn set<T: Copy + Send + Sync + 'static>(&mut self, entity: Entity, value: T) -> Result<()> {
        *self.get_rw::<T>(entity)? = value;
        Ok(())
    }

    /// Every registered plain-component ordinal, for a caller (the
    /// recorder) that must walk every table by ordinal rather than a
    /// generic `T`.
    pub fn plain_ordinals(&self) -> Vec<u16> {
        self.plain.keys().copied().collect()
    }

    pub fn plain_erased(&self, ordinal: u16) -> Option<&dyn ErasedPlainStore> {
        self.plain.get(&ordinal).map(|b| b.as_ref())
    }

    pub fn plain_erased_mut(&mut self, ordinal: u16) -> Option<&mut dyn ErasedPlainStore> {
        self.plain.get_mut(&ordinal).map(|b| b.as_mut())
    }

    // ---- Reference components -------------------------------------------

    pub fn register_ref<T: Clone + Send + Sync + 'static>(&mut self, name: &str, policy: SnapshotPolicy) -> Result<u16> {
        let ordinal = self
            .registry
            .register::<T>(name, std::mem::size_of::<T>(), StorageKind::Reference, policy)?;
        self.refs
            .entry(ordinal)
            .or_insert_with(|| Box::new(SparseTable::<T>::new()));
        Ok(ordinal)
    }

    fn ref_store_mut<T: Clone + Send + Sync + 'static>(&mut self, ordinal: u16) -> Result<&mut SparseTable<T>> {
        let store = self
            .refs
            .get_mut(&ordinal)
            .ok_or_else(|| ecs_core::Error::TypeNotRegistered(std::any::type_name::<T>().to_string()))?;
        Ok(store
            .as_any_mut()
            .downcast_mut::<SparseTable<T>>()
            .expect("reference component ordinal registered under a mismatched concrete type"))
    }

    pub fn add_ref<T: Clone + Send + Sync + 'static>(&mut self, entity: Entity, value: T) -> Result<()> {
        let ordinal = self.ordinal_of::<T>()?;
        if !self.entities.is_alive(entity) {
            return Err(ecs_core::Error::BadHandle { index: entity.index, generation: entity.generation }.into());
        }
        self.check_write(entity, ordinal)?;
        self.ref_store_mut::<T>(ordinal)?.insert(entity.index, value);
        let tick = self.tick;
        self.entities.acknowledge(entity.index, ordinal, tick)?;
        self.entities.get_header_mut(entity.index, tick)?.last_change_tick = tick;
        Ok(())
    }

    pub fn remove_ref<T: Clone + Send + Sync + 'static>(&mut self, entity: Entity) -> Result<()> {
        let ordinal = self.ordinal_of::<T>()?;
        self.check_write(entity, ordinal)?;
        self.ref_store_mut::<T>(ordinal)?.remove(entity.index);
        let tick = self.tick;
        let header = self.entities.get_header_mut(entity.index, tick)?;
        header.component_mask.clear_bit(ordinal);
        header.last_change_tick = tick;
        Ok(())
    }

    pub fn has_ref<T: Clone + Send + Sync + 'static>(&mut self, entity: Entity) -> Result<bool> {
        let ordinal = self.ordinal_of::<T>()?;
        Ok(self.entities.get_header(entity.index)?.component_mask.test_bit(ordinal))
    }

    pub fn get_ref<T: Clone + Send + Sync + 'static>(&mut self, entity: Entity) -> Result<T> {
        let ordinal = self.ordinal_of::<T>()?;
        self.ref_store_mut::<T>(ordinal)?
            .get(entity.index)
            .cloned()
            .ok_or_else(|| ecs_core::Error::BadHandle { index: entity.index, generation: entity.generation }.into())
    }

    pub fn set_ref<T: Clone + Send + Sync + 'static>(&mut self, entity: Entity, value: T) -> Result<()> {
        let ordinal = self.ordinal_of::<T>()?;
        self.check_write(entity, ordinal)?;
        self.ref_store_mut::<T>(ordinal)?.insert(entity.index, value);
        Ok(())
    }

    /// Every registered reference-component ordinal, mirroring
    /// [`Repository::plain_ordinals`].
    pub fn ref_ordinals(&self) -> Vec<u16> {
        self.refs.keys().copied().collect()
    }

    pub fn ref_erased(&self, ordinal: u16) -> Option<&dyn ErasedRefStore> {
        self.refs.get(&ordinal).map(|b| b.as_ref())
    }

    // ---- Singletons -------------------------------------------------------

    pub fn set_singleton_plain<T: Copy + Send + Sync + 'static>(&mut self, value: T) {
        let bytes = unsafe {
            std::slice::from_raw_parts(&value as *const T as *const u8, std::mem::size_of::<T>()).to_vec()
        };
        let name = std::any::type_name::<T>();
        self.singleton_registry.ordinal_of::<T>(name);
        self.singleton_plain.insert(TypeId::of::<T>(), (name.to_string(), bytes, self.tick));
    }

    pub fn get_singleton_plain<T: Copy + Send + Sync + 'static>(&self) -> Result<T> {
        let (_, bytes, _) = self
            .singleton_plain
            .get(&TypeId::of::<T>())
            .ok_or_else(|| Error::SingletonNotSet(std::any::type_name::<T>().to_string()))?;
        debug_assert_eq!(bytes.len(), std::mem::size_of::<T>());
        Ok(unsafe { std::ptr::read(bytes.as_ptr() as *const T) })
    }

    pub fn has_singleton_plain<T: 'static>(&self) -> bool {
        self.singleton_plain.contains_key(&TypeId::of::<T>())
    }

    /// Every registered plain singleton's wire ordinal, name and current
    /// bytes -- the recorder's keyframe Singleton section dumps all of
    /// these; a delta section dumps only the ones whose `tick` equals the
    /// frame being closed (i.e. set during that frame).
    pub fn singleton_plain_entries(&self) -> Vec<(i32, &[u8], u32)> {
        self.singleton_plain
            .iter()
            .filter_map(|(type_id, (_, bytes, tick))| {
                self.singleton_ordinal_of_type_id(*type_id).map(|ord| (ord, bytes.as_slice(), *tick))
            })
            .collect()
    }

    fn singleton_ordinal_of_type_id(&self, type_id: TypeId) -> Option<i32> {
        self.singleton_plain.get(&type_id)?;
        // The registry assigns ordinals in `set_singleton_plain`; walk it to
        // find the one matching this TypeId (registry is small and append-only).
        (0..).map(|o| (o, self.singleton_registry.type_id_of_ordinal(o))).take_while(|(_, t)| t.is_some()).find_map(
            |(o, t)| if t == Some(type_id) { Some(o) } else { None },
        )
    }

    /// Restores one singleton by its recorded wire ordinal, used by
    /// playback. Silently no-ops if the ordinal is unknown to this
    /// repository's singleton registry (schema mismatch tolerance mirrors
    /// the command buffer's entity tolerance).
    pub fn restore_singleton_plain_by_ordinal(&mut self, ordinal: i32, bytes: &[u8]) {
        if let Some(type_id) = self.singleton_registry.type_id_of_ordinal(ordinal) {
            if let Some(meta) = self.singleton_registry.meta(ordinal) {
                let name = meta.name.clone();
                self.singleton_plain.insert(type_id, (name, bytes.to_vec(), self.tick));
            }
        }
    }

    pub fn set_singleton_ref<T: Send + Sync + 'static>(&mut self, value: T) {
        self.singleton_ref
            .insert(TypeId::of::<T>(), (std::any::type_name::<T>().to_string(), Arc::new(value)));
    }

    pub fn get_singleton_ref<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let (_, value) = self
            .singleton_ref
            .get(&TypeId::of::<T>())
            .ok_or_else(|| Error::SingletonNotSet(std::any::type_name::<T>().to_string()))?;
        value
            .clone()
            .downcast::<T>()
            .map_err(|_| Error::SingletonNotSet(std::any::type_name::<T>().to_string()))
    }

    pub fn has_singleton_ref<T: 'static>(&self) -> bool {
        self.singleton_ref.contains_key(&TypeId::of::<T>())
    }

    // ---- Query ------------------------------------------------------------

    pub fn enumerate<'a>(&'a self, query: &'a QueryDef) -> Enumerate<'a> {
        query.enumerate(self.entities.chunk_table(), self.entities.max_issued())
    }

    pub fn enumerate_delta<'a>(&'a self, query: &'a QueryDef, since_tick: u32) -> Enumerate<'a> {
        query.enumerate_delta(self.entities.chunk_table(), self.entities.max_issued(), since_tick, self)
    }

    /// Same matches as `enumerate`, walked with one `rayon` task per entity
    /// chunk. Useful for a query whose per-entity work is heavy enough to
    /// amortize the fan-out (the matching pass itself is already cheap);
    /// the result is the same `Vec<Entity>` content and order `enumerate`
    /// would have produced, just built across threads instead of one cursor.
    #[cfg(feature = "parallel")]
    pub fn enumerate_par(&self, query: &QueryDef) -> Vec<Entity> {
        query.enumerate_par(self.entities.chunk_table(), self.entities.max_issued())
    }

    // ---- Sync ---------------------------------------------------------

    /// Applies the §4.6 `sync_from` rules: entity index first, then every
    /// plain/reference table in the effective type set.
    pub fn sync_from(&mut self, source: &Repository, mask: Option<BitMask256>, include_transient: bool, exclude_types: &[u16]) {
        self.entities.sync_from(&source.entities);

        let mut effective = mask.unwrap_or_else(|| source.registry.default_sync_mask(exclude_types));
        if !include_transient {
            for meta in source.registry.iter() {
                if meta.policy == SnapshotPolicy::Transient {
                    effective.clear_bit(meta.ordinal);
                }
            }
        }

        for ordinal in effective.set_ordinals() {
            if let (Some(dst), Some(src)) = (self.plain.get_mut(&ordinal), source.plain.get(&ordinal)) {
                dst.sync_dirty_from_erased(src.as_ref());
            }
            if let (Some(dst), Some(src)) = (self.refs.get_mut(&ordinal), source.refs.get(&ordinal)) {
                let clone_on_snapshot = source
                    .registry
                    .meta(ordinal)
                    .map(|m| m.policy == SnapshotPolicy::SnapshotViaClone)
                    .unwrap_or(false);
                dst.sync_from_erased(src.as_ref(), clone_on_snapshot);
            }
        }

        self.global_version = source.global_version;
        tracing::debug!(global_version = self.global_version, "repository synced from source");
    }

    // ---- Event bus ----------------------------------------------------

    pub fn publish_plain<T: Copy + Send + Sync + 'static>(&mut self, event: T) {
        self.event_registry.ordinal_of::<T>(std::any::type_name::<T>(), EventKind::Plain);
        self.events.publish_plain(event);
    }

    pub fn publish_ref<T: Send + Sync + 'static>(&mut self, event: T) {
        self.event_registry.ordinal_of::<T>(std::any::type_name::<T>(), EventKind::Reference);
        self.events.publish_ref(event);
    }

    pub fn consume_plain<T: Copy + Send + Sync + 'static>(&self) -> &[T] {
        self.events.consume_plain::<T>()
    }

    pub fn consume_ref<T: Send + Sync + 'static>(&self) -> &[Arc<T>] {
        self.events.consume_ref::<T>()
    }

    /// Must run on the main thread exactly once per frame, between frame
    /// N's write phase and frame N+1's consume.
    pub fn swap_events(&mut self) {
        self.events.swap();
    }

    pub fn clear_current_events(&mut self) {
        self.events.clear_current();
    }

    /// Type-erased access to the event bus, for a caller (snapshot
    /// providers) that walks every registered event type by `TypeId`
    /// rather than a generic `T`.
    pub fn events(&self) -> &ecs_core::EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut ecs_core::EventBus {
        &mut self.events
    }

    pub fn inject_plain_bytes<T: Copy + Send + Sync + 'static>(&mut self, bytes: &[u8]) {
        self.event_registry.ordinal_of::<T>(std::any::type_name::<T>(), EventKind::Plain);
        self.events.inject_plain_bytes::<T>(bytes);
    }

    /// Registers a bincode codec for a reference event type so the
    /// recorder can include it in the Event section and restore it on
    /// playback. Types never registered here are simply omitted from
    /// recordings (documented scope decision, see DESIGN.md).
    pub fn register_ref_event_codec<T>(&mut self, name: &str)
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + Clone + 'static,
    {
        let ordinal = self.event_registry.ordinal_of::<T>(name, EventKind::Reference);
        let _ = ordinal;
        self.ref_event_codecs.entry(TypeId::of::<T>()).or_insert_with(|| RefEventCodec {
            name: name.to_string(),
            encode: Box::new(|value| {
                let value = value.downcast_ref::<T>().expect("ref event codec type mismatch");
                bincode::serialize(value).expect("ref event bincode encode")
            }),
            decode: Box::new(|bytes| {
                let value: T = bincode::deserialize(bytes).expect("ref event bincode decode");
                Box::new(value)
            }),
        });
    }

    /// Borrowed snapshot of every event type's current buffer, used by the
    /// recorder when closing out a frame and by `pooled_snapshot`/
    /// `persistent_replica` providers when flushing event history into a view.
    pub fn snapshot_current_events(&self) -> FrameEventData<'_> {
        let mut plain = Vec::new();
        for type_id in self.events.plain_type_ids() {
            let Some(meta) = self.event_registry.meta_by_type(type_id) else { continue };
            plain.push(PlainEventView {
                ordinal: meta.ordinal,
                name: &meta.name,
                bytes: self.events.current_bytes_by_type(type_id),
            });
        }
        let mut encoded_refs = Vec::new();
        for (&type_id, codec) in &self.ref_event_codecs {
            if let Some(meta) = self.event_registry.meta_by_type(type_id) {
                for value in self.events.current_ref_as_any(type_id) {
                    encoded_refs.push((meta.ordinal, codec.name.clone(), (codec.encode)(value.as_ref())));
                }
            }
        }
        FrameEventData { plain, encoded_refs }
    }

    pub fn inject_into_current_by_ordinal(&mut self, ordinal: i32, bytes: &[u8]) {
        if let Some(meta) = self.event_registry.meta(ordinal) {
            if meta.kind == EventKind::Plain {
                if let Some(type_id) = self.event_registry.type_id_of_ordinal(ordinal) {
                    self.events.inject_plain_bytes_by_type(type_id, bytes);
                }
            }
        }
    }

    /// Decodes one recorded reference event instance by its wire ordinal
    /// and routes it into the current buffer, the reference-event
    /// counterpart to `inject_into_current_by_ordinal`. Requires a codec
    /// registered via `register_ref_event_codec`; an unknown ordinal or a
    /// type with no codec is silently dropped, the same tolerance playback
    /// already applies to stale component ordinals.
    pub fn inject_ref_event_encoded_by_ordinal(&mut self, ordinal: i32, bytes: &[u8]) {
        let Some(type_id) = self.event_registry.type_id_of_ordinal(ordinal) else { return };
        let Some(codec) = self.ref_event_codecs.get(&type_id) else { return };
        let value = (codec.decode)(bytes);
        self.events.inject_ref_boxed(type_id, value);
    }

    pub fn event_registry(&self) -> &EventTypeRegistry {
        &self.event_registry
    }

    // ---- Command buffer playback ---------------------------------------

    /// Applies a drained command buffer against this repository in
    /// recorded order. Commands referring to a destroyed entity are
    /// silently dropped, per §4.8's documented tolerance.
    pub fn playback(&mut self, buffer: &mut ecs_core::CommandBuffer) {
        for command in buffer.drain() {
            match command {
                ecs_core::Command::CreateEntity { required_modules, authority } => {
                    let _ = self.create_staged(required_modules, authority);
                }
                ecs_core::Command::DestroyEntity { entity } => {
                    let _ = self.destroy(entity);
                }
                ecs_core::Command::AddComponent { entity, ordinal, bytes } => {
                    self.apply_raw_component_write(entity, ordinal, &bytes, true);
                }
                ecs_core::Command::SetComponent { entity, ordinal, bytes } => {
                    self.apply_raw_component_write(entity, ordinal, &bytes, false);
                }
                ecs_core::Command::RemoveComponent { entity, ordinal } => {
                    if self.entities.is_alive(entity) {
                        let tick = self.tick;
                        if let Ok(header) = self.entities.get_header_mut(entity.index, tick) {
                            header.component_mask.clear_bit(ordinal);
                            header.last_change_tick = tick;
                        }
                        if let Some(store) = self.plain.get_mut(&ordinal) {
                            store.mark_unpopulated(entity.index);
                        }
                    }
                }
                ecs_core::Command::PublishEventPlain { type_id, bytes } => {
                    self.events.inject_plain_bytes_by_type(type_id, &bytes);
                }
                ecs_core::Command::PublishEventRef { type_id, value } => {
                    self.inject_ref_command(type_id, value);
                }
            }
        }
    }

    fn inject_ref_command(&mut self, type_id: TypeId, value: Box<dyn Any + Send + Sync>) {
        self.events.inject_ref_boxed(type_id, value);
    }

    fn apply_raw_component_write(&mut self, entity: Entity, ordinal: u16, bytes: &[u8], structural: bool) {
        if !self.entities.is_alive(entity) {
            return;
        }
        let tick = self.tick;
        if let Some(store) = self.plain.get_mut(&ordinal) {
            let slot = store.get_raw_mut(entity.index, tick);
            if slot.len() == bytes.len() {
                slot.copy_from_slice(bytes);
            }
            if structural {
                store.mark_populated(entity.index);
            }
        }
        if structural {
            let _ = self.entities.acknowledge(entity.index, ordinal, tick);
            if let Ok(header) = self.entities.get_header_mut(entity.index, tick) {
                header.last_change_tick = tick;
            }
        }
    }

    // ---- Ambient: stats & tracing ---------------------------------------

    pub fn stats(&self) -> RepositoryStats {
        let mut per_type = Vec::new();
        for meta in self.registry.iter() {
            let population = self
                .plain
                .get(&meta.ordinal)
                .map(|s| (0..s.chunk_count()).map(|c| s.population(c)).sum())
                .or_else(|| self.refs.get(&meta.ordinal).map(|s| s.len() as i32))
                .unwrap_or(0);
            per_type.push(TypeStats {
                ordinal: meta.ordinal,
                name: meta.name.clone(),
                population,
            });
        }
        let chunk_commit_ratio = {
            let (committed, total): (usize, usize) = self
                .plain
                .values()
                .map(|s| ((0..s.chunk_count()).filter(|&c| s.is_committed(c)).count(), s.chunk_count()))
                .fold((0, 0), |(ca, ta), (c, t)| (ca + c, ta + t));
            if total == 0 { 0.0 } else { committed as f64 / total as f64 }
        };
        RepositoryStats {
            entity_high_water: self.entities.max_issued(),
            tick: self.tick,
            per_type,
            chunk_commit_ratio,
        }
    }

    pub fn subscribe_tracing_span(&self, tick: u32) -> tracing::Span {
        tracing::span!(tracing::Level::INFO, "repository_tick", tick)
    }
}

#[derive(Debug, Clone)]
pub struct TypeStats {
    pub ordinal: u16,
    pub name: String,
    pub population: i32,
}

#[derive(Debug, Clone)]
pub struct RepositoryStats {
    pub entity_high_water: u32,
    pub tick: u32,
    pub per_type: Vec<TypeStats>,
    pub chunk_commit_ratio: f64,
}

impl ComponentChunkOracle for Repository {
    fn population_in_range(&self, ordinal: u16, start: u32, end: u32) -> i32 {
        self.plain.get(&ordinal).map(|s| s.population_in_range(start, end)).unwrap_or(0)
    }

    fn version_at(&self, ordinal: u16, index: u32) -> u32 {
        self.plain
            .get(&ordinal)
            .map(|s| {
                let cap = s.cap_per_chunk() as u32;
                s.version((index / cap) as usize)
            })
            .unwrap_or(0)
    }
}
