//! Runtime-wide tunables, mirroring the teacher's `DbConfig`: one small
//! struct with a `Default` impl, passed down into every subsystem that
//! needs a capacity or policy knob rather than hard-coding one.

/// Bytes per storage chunk. Fixed by the data model; not user-configurable,
/// kept as a named constant so call sites read intent instead of a literal.
pub const CHUNK_BYTES: usize = 65_536;

/// Maximum number of registrable plain-data component types (§7 `RegistryFull`).
pub const MAX_COMPONENT_TYPES: usize = 256;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Maximum number of live entity indices. Entity capacity is fixed at
    /// startup; creation fails cleanly once exhausted.
    pub max_entities: u32,
    /// Default pool size handed to `pooled_snapshot` providers layered on
    /// top of this core (ecs-runtime owns the provider, this is just the
    /// default it is constructed with).
    pub default_snapshot_pool_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_entities: 1 << 20,
            default_snapshot_pool_size: 4,
        }
    }
}
