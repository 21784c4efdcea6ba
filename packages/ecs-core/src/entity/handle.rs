//! A generation-tagged entity handle.
//!
//! Grounded in the teacher's `EntityId`/`EntityVersion` pairing in
//! `entity/registry.rs`, widened to carry the generation inline (a packed
//! value type rather than a separate version lookup) since the data model
//! calls for a self-contained, value-copyable handle with no ownership.

use serde::{Deserialize, Serialize};

/// `(index, generation)`. Null iff `generation == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub index: u32,
    pub generation: u16,
}

impl Entity {
    pub const NULL: Entity = Entity {
        index: 0,
        generation: 0,
    };

    #[inline]
    pub fn new(index: u32, generation: u16) -> Self {
        Self { index, generation }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.generation == 0
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

/// Four-state classification used by staged construction and destruction.
/// Transitions are monotonic: Constructing -> Active -> TearDown -> Destroyed.
///
/// `Destroyed` is discriminant 0 so that a zero-initialized header (an
/// entity-index slot that has never been touched, or one just decommitted)
/// reads as not-alive without needing an explicit sentinel field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Lifecycle {
    Destroyed = 0,
    Constructing = 1,
    Active = 2,
    TearDown = 3,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle::Destroyed
    }
}

impl Lifecycle {
    /// Whether moving from `self` to `next` is a legal, forward-only step.
    pub fn can_transition_to(self, next: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (Constructing, Active)
                | (Constructing, TearDown)
                | (Active, TearDown)
                | (TearDown, Destroyed)
        )
    }
}
