//! Dense ordinal assignment for event types, mirroring `ecs_core::registry`
//! but kept one layer up: per the event bus's own doc comment, "the bus
//! itself is agnostic to which ordinal a `TypeId` corresponds to -- that
//! labeling is the event type registry's job, one layer up in the
//! repository facade". This is that registry.
//!
//! The recorder (`ecs-recorder`) needs a stable `type_ordinal` per event
//! type to write the Event section of a frame (§6.1); this assigns one on
//! first publish, append-only for the life of the repository, same as the
//! component type registry.

use std::any::TypeId;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Plain,
    Reference,
}

#[derive(Debug, Clone)]
pub struct EventTypeMeta {
    pub ordinal: i32,
    pub name: String,
    pub kind: EventKind,
    pub type_id: TypeId,
}

#[derive(Debug, Default)]
pub struct EventTypeRegistry {
    by_type_id: HashMap<TypeId, i32>,
    metas: Vec<EventTypeMeta>,
}

impl EventTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordinal_of<T: 'static>(&mut self, name: &str, kind: EventKind) -> i32 {
        let type_id = TypeId::of::<T>();
        if let Some(&ordinal) = self.by_type_id.get(&type_id) {
            return ordinal;
        }
        let ordinal = self.metas.len() as i32;
        self.by_type_id.insert(type_id, ordinal);
        self.metas.push(EventTypeMeta {
            ordinal,
            name: name.to_string(),
            kind,
            type_id,
        });
        ordinal
    }

    pub fn meta(&self, ordinal: i32) -> Option<&EventTypeMeta> {
        self.metas.get(ordinal as usize)
    }

    pub fn meta_by_type(&self, type_id: TypeId) -> Option<&EventTypeMeta> {
        let ordinal = *self.by_type_id.get(&type_id)?;
        self.meta(ordinal)
    }

    pub fn type_id_of_ordinal(&self, ordinal: i32) -> Option<TypeId> {
        self.meta(ordinal).map(|m| m.type_id)
    }

    pub fn ordinal_of_type_id(&self, type_id: TypeId) -> Option<i32> {
        self.by_type_id.get(&type_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventTypeMeta> {
        self.metas.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_assignment_is_stable_and_dense() {
        let mut reg = EventTypeRegistry::new();
        let a = reg.ordinal_of::<u32>("DamageEvent", EventKind::Plain);
        let b = reg.ordinal_of::<u64>("SpawnEvent", EventKind::Plain);
        let a2 = reg.ordinal_of::<u32>("DamageEvent", EventKind::Plain);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(a, a2);
    }
}
