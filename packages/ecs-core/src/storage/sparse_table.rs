//! Sparse storage for reference component types.
//!
//! Reference components (per Design Notes §9: anything that isn't a
//! plain-old-data record — handles to external resources, owned
//! collections, anything that would need a destructor) are not worth
//! chunking: they are heap objects already, so this is a plain sparse map
//! keyed by entity index. Grounded in the teacher's `SparseSet` used for
//! optional/rare components, simplified here to a `HashMap` since the
//! chunk-population-skip optimization the query engine relies on lives in
//! the plain-data tables, not here.
//!
//! Values are held behind `Arc` so the two `sync_from` flavors required by
//! §4.3/§4.6 are both representable: `sync_share_from` is a cheap pointer
//! clone (the default, used for most reference types), `sync_clone_from`
//! deep-clones the pointee for types registered with
//! `SnapshotPolicy::SnapshotViaClone`.

use std::collections::HashMap;
use std::sync::Arc;

/// Sparse `entity index -> Arc<T>` map for one reference component type.
pub struct SparseTable<T> {
    entries: HashMap<u32, Arc<T>>,
}

impl<T> Default for SparseTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> SparseTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u32, value: T) -> Option<Arc<T>> {
        self.entries.insert(index, Arc::new(value))
    }

    pub fn insert_shared(&mut self, index: u32, value: Arc<T>) -> Option<Arc<T>> {
        self.entries.insert(index, value)
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.entries.get(&index).map(|v| v.as_ref())
    }

    pub fn get_shared(&self, index: u32) -> Option<Arc<T>> {
        self.entries.get(&index).cloned()
    }

    pub fn remove(&mut self, index: u32) -> Option<Arc<T>> {
        self.entries.remove(&index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.entries.iter().map(|(&k, v)| (k, v.as_ref()))
    }
}

impl<T> SparseTable<T> {
    /// Shares `other`'s `Arc`s directly: the default sync mode for
    /// reference types, matching the "reference copy (default)" wording in
    /// §4.3. Cheap regardless of `T`'s size.
    pub fn sync_share_from(&mut self, other: &SparseTable<T>) {
        self.entries.clone_from(&other.entries);
    }
}

impl<T: Clone> SparseTable<T> {
    /// Deep-clones every pointee into a fresh `Arc`, for types tagged
    /// `SnapshotPolicy::SnapshotViaClone`. Required so a clone-tagged
    /// type's snapshot is value-equivalent to, but independent of, the
    /// source (§4.3: "snapshot round-trip must be value-equivalent").
    pub fn sync_clone_from(&mut self, other: &SparseTable<T>) {
        self.entries.clear();
        for (&index, value) in &other.entries {
            self.entries.insert(index, Arc::new((**value).clone()));
        }
    }
}
