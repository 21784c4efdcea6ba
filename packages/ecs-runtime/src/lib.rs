//! Phase scheduler, repository facade and snapshot provider surface built
//! on top of `ecs-core`'s storage primitives.
//!
//! `ecs-core` has no notion of a running simulation: no phases, no
//! permissions, no concept of "the live world" versus "a replica of it".
//! This crate adds exactly that layer. `Repository` is the facade every
//! system, provider and the recorder actually hold a reference to;
//! `PhaseState` gates writes against it according to the simulation's
//! current phase; `provider` builds and maintains the read-only replicas
//! (persistent and pooled) that other threads observe the world through
//! without ever touching the live repository.

pub mod config;
pub mod error;
pub mod event_registry;
pub mod phase;
pub mod provider;
pub mod repository;
pub mod singleton_registry;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use event_registry::{EventKind, EventTypeMeta, EventTypeRegistry};
pub use phase::{Permission, Phase, PhaseState};
pub use provider::{PersistentReplica, PooledSnapshot, PublishedView, SnapshotPool};
pub use repository::{EntityLifecycleEvent, FrameEventData, LifecycleEventKind, PlainEventView, Repository, RepositoryStats, TypeStats};
pub use singleton_registry::{SingletonRegistry, SingletonTypeMeta};
