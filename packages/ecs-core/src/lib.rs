//! Deterministic entity-component-system storage core.
//!
//! This crate owns the pieces of the runtime that must stay free of any
//! notion of phases, systems, or networking: entity handles and lifecycle,
//! chunked component storage backed by lazily-committed OS memory, the
//! 256-bit component/authority bitmask and the SIMD query engine built on
//! top of it, the double-buffered event bus, and the thread-local command
//! buffer. Everything that orchestrates these into a running simulation —
//! the repository facade, the phase scheduler, snapshot providers — lives
//! one layer up in `ecs-runtime`, which depends on this crate rather than
//! the other way around.
//!
//! Modules are intentionally narrow and mirror the data model described in
//! the design notes: `entity` is the index and lifecycle state machine,
//! `storage` is the chunked/sparse backing stores plus their type-erased
//! dispatch objects, `query` is the read-side SIMD enumerator, `mask` is the
//! bitmask primitive both depend on.

pub mod command_buffer;
pub mod config;
pub mod entity;
pub mod error;
pub mod event_bus;
pub mod mask;
pub mod query;
pub mod registry;
pub mod storage;

pub use command_buffer::{Command, CommandBuffer};
pub use config::CoreConfig;
pub use entity::{Entity, EntityHeader, EntityIndex, Lifecycle};
pub use error::{Error, Result};
pub use event_bus::EventBus;
pub use mask::BitMask256;
pub use query::{ComponentChunkOracle, Enumerate, QueryBuilder, QueryDef};
pub use registry::{SnapshotPolicy, StorageKind, TypeMeta, TypeRegistry};
pub use storage::{ChunkedTable, ErasedPlainStore, ErasedRefStore, SparseTable};
