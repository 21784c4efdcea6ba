//! Error kinds surfaced by storage, masks, the query engine, the event bus
//! and the command buffer. Diagnostic builds (`debug_assertions`) surface
//! every variant; several are documented as release-mode no-ops at their
//! call sites rather than folded away here, matching the propagation policy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("handle {index}#{generation} does not refer to a live entity")]
    BadHandle { index: u32, generation: u16 },

    #[error("entity index {index} exceeds configured capacity {capacity}")]
    IndexOutOfRange { index: u32, capacity: u32 },

    #[error("invalid lifecycle transition from {from:?} to {to:?}")]
    InvalidLifecycleTransition {
        from: crate::entity::Lifecycle,
        to: crate::entity::Lifecycle,
    },

    #[error("write violates phase permission {permission:?} during phase {phase:?}")]
    PermissionViolation {
        phase: String,
        permission: String,
    },

    #[error("component type '{0}' was accessed before registration")]
    TypeNotRegistered(String),

    #[error("cannot register a 257th plain-data component type")]
    RegistryFull,

    #[error("recording ordinal layout does not match the destination repository's registry")]
    SchemaMismatch,

    #[error("cannot decommit chunk {0}: population is not zero")]
    DecommitRefused(u32),

    #[error("serialized size {got} does not match the registered element size {expected} for '{type_name}'")]
    SizeMismatch {
        type_name: String,
        expected: usize,
        got: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),
}
