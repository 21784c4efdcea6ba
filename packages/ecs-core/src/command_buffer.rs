//! Append-only, thread-local command buffers.
//!
//! Systems running off the main thread (or any system that must not mutate
//! the repository directly mid-phase) record intent here instead. A
//! `CommandBuffer` is a flat `Vec<Command>` — appending is the only mutation
//! it supports — and worker threads each get their own via `with_local`,
//! merged back onto the main thread at the next sync point with `append`.
//! Playback (applying recorded commands against a live repository) is the
//! repository facade's job, one layer up, since applying `AddComponent`
//! requires the type registry and concrete component stores this crate
//! deliberately doesn't have visibility into.

use std::any::{Any, TypeId};
use std::cell::RefCell;

use crate::entity::Entity;
use crate::mask::BitMask256;

/// One recorded mutation. Byte payloads carry a plain component's raw
/// representation (already validated against its registered `element_size`
/// by the caller); reference payloads are boxed for later downcast by the
/// repository, mirroring `event_bus`'s `inject_any`.
pub enum Command {
    CreateEntity {
        required_modules: BitMask256,
        authority: BitMask256,
    },
    DestroyEntity {
        entity: Entity,
    },
    AddComponent {
        entity: Entity,
        ordinal: u16,
        bytes: Vec<u8>,
    },
    SetComponent {
        entity: Entity,
        ordinal: u16,
        bytes: Vec<u8>,
    },
    RemoveComponent {
        entity: Entity,
        ordinal: u16,
    },
    PublishEventPlain {
        type_id: TypeId,
        bytes: Vec<u8>,
    },
    PublishEventRef {
        type_id: TypeId,
        value: Box<dyn Any + Send + Sync>,
    },
}

/// A flat, append-only log of commands. Recording never touches the entity
/// index or any component store; it only grows this `Vec`, so it is safe
/// to record from any thread that owns its own buffer.
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_entity(&mut self, required_modules: BitMask256, authority: BitMask256) {
        self.commands.push(Command::CreateEntity {
            required_modules,
            authority,
        });
    }

    pub fn destroy_entity(&mut self, entity: Entity) {
        self.commands.push(Command::DestroyEntity { entity });
    }

    pub fn add_component(&mut self, entity: Entity, ordinal: u16, bytes: Vec<u8>) {
        self.commands.push(Command::AddComponent { entity, ordinal, bytes });
    }

    pub fn set_component(&mut self, entity: Entity, ordinal: u16, bytes: Vec<u8>) {
        self.commands.push(Command::SetComponent { entity, ordinal, bytes });
    }

    pub fn remove_component(&mut self, entity: Entity, ordinal: u16) {
        self.commands.push(Command::RemoveComponent { entity, ordinal });
    }

    pub fn publish_event_plain(&mut self, type_id: TypeId, bytes: Vec<u8>) {
        self.commands.push(Command::PublishEventPlain { type_id, bytes });
    }

    pub fn publish_event_ref(&mut self, type_id: TypeId, value: Box<dyn Any + Send + Sync>) {
        self.commands.push(Command::PublishEventRef { type_id, value });
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Moves every command out in recorded order, leaving this buffer empty.
    /// Used by playback, which must apply commands in the order they were
    /// issued on a given thread.
    pub fn drain(&mut self) -> std::vec::Drain<'_, Command> {
        self.commands.drain(..)
    }

    /// Appends `other`'s commands after this buffer's, in order, and empties
    /// `other`. Used to merge worker-thread buffers onto the main thread at
    /// a sync point; merge order across distinct source threads is
    /// unspecified, matching the "no cross-thread ordering guarantee" note
    /// in the concurrency model.
    pub fn append(&mut self, other: &mut CommandBuffer) {
        self.commands.append(&mut other.commands);
    }
}

thread_local! {
    static LOCAL: RefCell<CommandBuffer> = RefCell::new(CommandBuffer::new());
}

/// Runs `f` against the calling thread's local command buffer. Systems call
/// this instead of holding a `&mut CommandBuffer` across an `await` or a
/// `rayon` closure boundary.
pub fn with_local<R>(f: impl FnOnce(&mut CommandBuffer) -> R) -> R {
    LOCAL.with(|cell| f(&mut cell.borrow_mut()))
}

/// Takes ownership of the calling thread's buffer, leaving an empty one in
/// its place. Called once per thread at each sync point.
pub fn take_local() -> CommandBuffer {
    LOCAL.with(|cell| std::mem::take(&mut *cell.borrow_mut()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_drain_in_recorded_order() {
        let mut buf = CommandBuffer::new();
        let e = Entity::new(1, 0);
        buf.add_component(e, 3, vec![1, 2]);
        buf.set_component(e, 3, vec![3, 4]);
        buf.destroy_entity(e);
        let drained: Vec<Command> = buf.drain().collect();
        assert_eq!(drained.len(), 3);
        assert!(matches!(drained[0], Command::AddComponent { ordinal: 3, .. }));
        assert!(matches!(drained[1], Command::SetComponent { ordinal: 3, .. }));
        assert!(matches!(drained[2], Command::DestroyEntity { entity } if entity == e));
        assert!(buf.is_empty());
    }

    #[test]
    fn append_merges_and_empties_source() {
        let mut a = CommandBuffer::new();
        let mut b = CommandBuffer::new();
        a.destroy_entity(Entity::new(1, 0));
        b.destroy_entity(Entity::new(2, 0));
        a.append(&mut b);
        assert_eq!(a.len(), 2);
        assert!(b.is_empty());
    }

    #[test]
    fn thread_local_buffer_is_isolated_per_thread() {
        with_local(|buf| buf.destroy_entity(Entity::new(9, 0)));
        assert_eq!(with_local(|buf| buf.len()), 1);
        let handle = std::thread::spawn(|| with_local(|buf| buf.len()));
        assert_eq!(handle.join().unwrap(), 0);
        let taken = take_local();
        assert_eq!(taken.len(), 1);
        assert_eq!(with_local(|buf| buf.len()), 0);
    }
}
