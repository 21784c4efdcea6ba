//! Double-buffered event bus: one current/previous pair of arenas per
//! registered event type.
//!
//! Grounded in Design Notes §9 ("implement as two arenas per type; swap is
//! a pointer flip"): `swap` is `mem::swap` plus a clear of the new current
//! arena, never a copy of event payloads. `publish` always appends to
//! current; `consume` always reads previous. The bus itself is agnostic to
//! *which* ordinal a `TypeId` corresponds to — that labeling is the event
//! type registry's job, one layer up in the repository facade — so this
//! module keys everything by `TypeId` directly.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// One plain-data event type's double buffer.
pub struct PlainEventChannel<T: Copy> {
    current: Vec<T>,
    previous: Vec<T>,
}

impl<T: Copy> Default for PlainEventChannel<T> {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            previous: Vec::new(),
        }
    }
}

impl<T: Copy> PlainEventChannel<T> {
    pub fn publish(&mut self, event: T) {
        self.current.push(event);
    }

    pub fn consume(&self) -> &[T] {
        &self.previous
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
    }

    pub fn clear_current(&mut self) {
        self.current.clear();
    }
}

/// One reference-typed event type's double buffer. Events are held behind
/// `Arc` so a borrowed `snapshot_current` view (consumed by the recorder)
/// can outlive the next `publish` without cloning payloads.
pub struct RefEventChannel<T> {
    current: Vec<Arc<T>>,
    previous: Vec<Arc<T>>,
}

impl<T> Default for RefEventChannel<T> {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            previous: Vec::new(),
        }
    }
}

impl<T> RefEventChannel<T> {
    pub fn publish(&mut self, event: T) {
        self.current.push(Arc::new(event));
    }

    pub fn consume(&self) -> &[Arc<T>] {
        &self.previous
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
    }

    pub fn clear_current(&mut self) {
        self.current.clear();
    }
}

trait ErasedPlainChannel: Send + Sync {
    fn swap(&mut self);
    fn clear_current(&mut self);
    fn current_len(&self) -> usize;
    fn previous_len(&self) -> usize;
    fn current_bytes(&self) -> &[u8];
    fn previous_bytes(&self) -> &[u8];
    fn inject_into_current(&mut self, bytes: &[u8]);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Copy + Send + Sync + 'static> ErasedPlainChannel for PlainEventChannel<T> {
    fn swap(&mut self) {
        PlainEventChannel::swap(self)
    }
    fn clear_current(&mut self) {
        PlainEventChannel::clear_current(self)
    }
    fn current_len(&self) -> usize {
        self.current.len()
    }
    fn previous_len(&self) -> usize {
        self.previous.len()
    }
    fn current_bytes(&self) -> &[u8] {
        bytes_of(&self.current)
    }
    fn previous_bytes(&self) -> &[u8] {
        bytes_of(&self.previous)
    }
    fn inject_into_current(&mut self, bytes: &[u8]) {
        let elem = std::mem::size_of::<T>();
        debug_assert_eq!(bytes.len() % elem, 0, "event payload size mismatch");
        let count = bytes.len() / elem;
        let slice = unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const T, count) };
        self.current.extend_from_slice(slice);
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn bytes_of<T: Copy>(slice: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, std::mem::size_of_val(slice)) }
}

trait ErasedRefChannel: Send + Sync {
    fn swap(&mut self);
    fn clear_current(&mut self);
    fn current_len(&self) -> usize;
    fn previous_len(&self) -> usize;
    /// Injects a decoded event into the current buffer. `value`'s concrete
    /// type must match this channel's `T`; a mismatch is a caller bug
    /// (wrong ordinal routing) and is silently dropped rather than panicking,
    /// consistent with the "late write after destroy" tolerance elsewhere.
    fn inject_any(&mut self, value: Box<dyn Any + Send + Sync>);
    /// Current buffer as type-erased `Arc`s, for a caller (the recorder, via
    /// the repository facade) that holds a registered codec keyed by
    /// `TypeId` rather than a generic `T`.
    fn current_as_any(&self) -> Vec<Arc<dyn Any + Send + Sync>>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + Sync + 'static> ErasedRefChannel for RefEventChannel<T> {
    fn swap(&mut self) {
        RefEventChannel::swap(self)
    }
    fn clear_current(&mut self) {
        RefEventChannel::clear_current(self)
    }
    fn current_len(&self) -> usize {
        self.current.len()
    }
    fn previous_len(&self) -> usize {
        self.previous.len()
    }
    fn inject_any(&mut self, value: Box<dyn Any + Send + Sync>) {
        if let Ok(v) = value.downcast::<T>() {
            self.current.push(Arc::from(v));
        }
    }
    fn current_as_any(&self) -> Vec<Arc<dyn Any + Send + Sync>> {
        self.current
            .iter()
            .map(|a| a.clone() as Arc<dyn Any + Send + Sync>)
            .collect()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owns every registered event type's double buffer. `swap` is the only
/// operation that must run on the main thread exactly once per frame;
/// `publish` is safe from any producer since each type's channel is
/// reached independently (no cross-type lock).
#[derive(Default)]
pub struct EventBus {
    plain: HashMap<TypeId, Box<dyn ErasedPlainChannel>>,
    refs: HashMap<TypeId, Box<dyn ErasedRefChannel>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_plain<T: Copy + Send + Sync + 'static>(&mut self) {
        self.plain
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(PlainEventChannel::<T>::default()));
    }

    pub fn register_ref<T: Send + Sync + 'static>(&mut self) {
        self.refs
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(RefEventChannel::<T>::default()));
    }

    fn plain_channel<T: Copy + Send + Sync + 'static>(&self) -> Option<&PlainEventChannel<T>> {
        self.plain
            .get(&TypeId::of::<T>())
            .map(|c| c.as_any().downcast_ref().expect("event channel type mismatch"))
    }

    fn plain_channel_mut<T: Copy + Send + Sync + 'static>(&mut self) -> Option<&mut PlainEventChannel<T>> {
        self.plain
            .get_mut(&TypeId::of::<T>())
            .map(|c| c.as_any_mut().downcast_mut().expect("event channel type mismatch"))
    }

    fn ref_channel<T: Send + Sync + 'static>(&self) -> Option<&RefEventChannel<T>> {
        self.refs
            .get(&TypeId::of::<T>())
            .map(|c| c.as_any().downcast_ref().expect("event channel type mismatch"))
    }

    fn ref_channel_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut RefEventChannel<T>> {
        self.refs
            .get_mut(&TypeId::of::<T>())
            .map(|c| c.as_any_mut().downcast_mut().expect("event channel type mismatch"))
    }

    /// Appends to the current buffer. Registers the type on first use so
    /// callers don't need a separate up-front registration step for event
    /// types (unlike components, event types carry no snapshot policy).
    pub fn publish_plain<T: Copy + Send + Sync + 'static>(&mut self, event: T) {
        self.register_plain::<T>();
        self.plain_channel_mut::<T>().unwrap().publish(event);
    }

    pub fn publish_ref<T: Send + Sync + 'static>(&mut self, event: T) {
        self.register_ref::<T>();
        self.ref_channel_mut::<T>().unwrap().publish(event);
    }

    /// Read-only slice over the previous buffer; allocates nothing.
    pub fn consume_plain<T: Copy + Send + Sync + 'static>(&self) -> &[T] {
        self.plain_channel::<T>().map(|c| c.consume()).unwrap_or(&[])
    }

    pub fn consume_ref<T: Send + Sync + 'static>(&self) -> &[Arc<T>] {
        self.ref_channel::<T>().map(|c| c.consume()).unwrap_or(&[])
    }

    /// Swaps current<->previous for every registered type and truncates
    /// the new current to zero. Must run on the main thread exactly once
    /// per frame, between frame N's write phase and frame N+1's consume.
    pub fn swap(&mut self) {
        for channel in self.plain.values_mut() {
            channel.swap();
        }
        for channel in self.refs.values_mut() {
            channel.swap();
        }
    }

    pub fn clear_current(&mut self) {
        for channel in self.plain.values_mut() {
            channel.clear_current();
        }
        for channel in self.refs.values_mut() {
            channel.clear_current();
        }
    }

    pub fn inject_plain_bytes<T: Copy + Send + Sync + 'static>(&mut self, bytes: &[u8]) {
        self.register_plain::<T>();
        self.plain_channel_mut::<T>().unwrap().inject_into_current(bytes);
    }

    pub fn inject_ref_any<T: Send + Sync + 'static>(&mut self, value: T) {
        self.register_ref::<T>();
        self.ref_channel_mut::<T>()
            .unwrap()
            .inject_any(Box::new(value));
    }

    pub fn plain_current_bytes<T: Copy + Send + Sync + 'static>(&self) -> &[u8] {
        self.plain.get(&TypeId::of::<T>()).map(|c| c.current_bytes()).unwrap_or(&[])
    }

    pub fn plain_previous_bytes<T: Copy + Send + Sync + 'static>(&self) -> &[u8] {
        self.plain.get(&TypeId::of::<T>()).map(|c| c.previous_bytes()).unwrap_or(&[])
    }

    /// Every registered plain event type's `TypeId`, for a caller (the
    /// repository facade) that keeps its own ordinal labeling per
    /// `TypeId` and needs to walk all of them, e.g. to write the
    /// recording format's event section.
    pub fn plain_type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.plain.keys().copied()
    }

    pub fn ref_type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.refs.keys().copied()
    }

    /// Byte view of one plain event type's current buffer, addressed by
    /// `TypeId` rather than a generic parameter.
    pub fn current_bytes_by_type(&self, id: TypeId) -> &[u8] {
        self.plain.get(&id).map(|c| c.current_bytes()).unwrap_or(&[])
    }

    pub fn previous_bytes_by_type(&self, id: TypeId) -> &[u8] {
        self.plain.get(&id).map(|c| c.previous_bytes()).unwrap_or(&[])
    }

    /// Injects raw bytes into a plain event type's current buffer,
    /// addressed by `TypeId`. Used by playback, which only knows the
    /// ordinal-to-`TypeId` mapping the facade built at registration time,
    /// not the concrete `T`.
    pub fn inject_plain_bytes_by_type(&mut self, id: TypeId, bytes: &[u8]) {
        if let Some(channel) = self.plain.get_mut(&id) {
            channel.inject_into_current(bytes);
        }
    }

    /// Routes an already-boxed reference event into its `TypeId`'s channel.
    /// A mismatch between `id` and the channel's concrete type (or a
    /// channel that was never registered) silently drops the event, the
    /// same tolerance as the rest of the erased injection paths.
    pub fn inject_ref_boxed(&mut self, id: TypeId, value: Box<dyn Any + Send + Sync>) {
        if let Some(channel) = self.refs.get_mut(&id) {
            channel.inject_any(value);
        }
    }

    /// Current buffer of a reference event type, addressed by `TypeId` and
    /// erased to `Arc<dyn Any + Send + Sync>`. Used by a caller holding a
    /// registered per-type codec (the recorder, via the repository facade)
    /// rather than a generic `T`.
    pub fn current_ref_as_any(&self, id: TypeId) -> Vec<Arc<dyn Any + Send + Sync>> {
        self.refs.get(&id).map(|c| c.current_as_any()).unwrap_or_default()
    }

    /// For every plain event type already registered on `self`, replace its
    /// current buffer with `other`'s current buffer. Used by snapshot
    /// providers to carry the live repository's not-yet-consumed events
    /// into a view without a generic `T`; reference event types are
    /// deliberately not covered here (a type-erased `Arc` cannot be
    /// rewrapped as the owned `Box` `inject_any` requires) -- a view only
    /// observes reference events for types it has itself published or
    /// consumed through the typed API at least once.
    pub fn sync_plain_current_from(&mut self, other: &EventBus) {
        for (id, channel) in self.plain.iter_mut() {
            channel.clear_current();
            if let Some(src) = other.plain.get(id) {
                channel.inject_into_current(src.current_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct DamageEvent {
        target: u32,
        amount: u32,
    }

    #[test]
    fn publish_not_visible_until_swap() {
        let mut bus = EventBus::new();
        bus.publish_plain(DamageEvent { target: 1, amount: 25 });
        bus.publish_plain(DamageEvent { target: 1, amount: 25 });
        assert!(bus.consume_plain::<DamageEvent>().is_empty());
        bus.swap();
        assert_eq!(
            bus.consume_plain::<DamageEvent>(),
            &[
                DamageEvent { target: 1, amount: 25 },
                DamageEvent { target: 1, amount: 25 },
            ]
        );
        bus.swap();
        assert!(bus.consume_plain::<DamageEvent>().is_empty());
    }

    #[test]
    fn publication_order_preserved_per_producer() {
        let mut bus = EventBus::new();
        for i in 0..5u32 {
            bus.publish_plain(DamageEvent { target: i, amount: i });
        }
        bus.swap();
        let got: Vec<u32> = bus.consume_plain::<DamageEvent>().iter().map(|e| e.target).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn ref_events_round_trip_through_swap() {
        let mut bus = EventBus::new();
        bus.publish_ref::<String>("hello".to_string());
        bus.swap();
        let got = bus.consume_ref::<String>();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].as_str(), "hello");
    }

    #[test]
    fn inject_into_current_then_swap_is_visible_to_consume() {
        let mut bus = EventBus::new();
        let bytes = unsafe {
            std::slice::from_raw_parts(
                &DamageEvent { target: 7, amount: 3 } as *const DamageEvent as *const u8,
                std::mem::size_of::<DamageEvent>(),
            )
        };
        bus.inject_plain_bytes::<DamageEvent>(bytes);
        bus.swap();
        assert_eq!(bus.consume_plain::<DamageEvent>(), &[DamageEvent { target: 7, amount: 3 }]);
    }
}
