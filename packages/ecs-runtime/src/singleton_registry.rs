//! Dense ordinal assignment for singleton types, mirroring
//! [`crate::event_registry::EventTypeRegistry`] exactly: the recorder needs a
//! stable `type_ordinal` per singleton to write the Singleton section of a
//! frame (§6.1), so this assigns one on first `set_singleton_plain` call,
//! append-only for the life of the repository.

use std::any::TypeId;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SingletonTypeMeta {
    pub ordinal: i32,
    pub name: String,
    pub type_id: TypeId,
}

#[derive(Debug, Default)]
pub struct SingletonRegistry {
    by_type_id: HashMap<TypeId, i32>,
    metas: Vec<SingletonTypeMeta>,
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordinal_of<T: 'static>(&mut self, name: &str) -> i32 {
        let type_id = TypeId::of::<T>();
        if let Some(&ordinal) = self.by_type_id.get(&type_id) {
            return ordinal;
        }
        let ordinal = self.metas.len() as i32;
        self.by_type_id.insert(type_id, ordinal);
        self.metas.push(SingletonTypeMeta { ordinal, name: name.to_string(), type_id });
        ordinal
    }

    pub fn meta(&self, ordinal: i32) -> Option<&SingletonTypeMeta> {
        self.metas.get(ordinal as usize)
    }

    pub fn type_id_of_ordinal(&self, ordinal: i32) -> Option<TypeId> {
        self.meta(ordinal).map(|m| m.type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_assignment_is_stable_and_dense() {
        let mut reg = SingletonRegistry::new();
        let a = reg.ordinal_of::<u32>("MatchClock");
        let b = reg.ordinal_of::<u64>("RngSeed");
        let a2 = reg.ordinal_of::<u32>("MatchClock");
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(a, a2);
    }
}
