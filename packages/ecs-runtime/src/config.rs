//! Runtime-layer tunables, mirroring the teacher's `DbConfig` one layer up
//! from `ecs_core::CoreConfig`: knobs that matter once a repository is
//! wired into a scheduler and snapshot providers, rather than ones the
//! storage layer itself needs.

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Inherited storage-layer tunables (entity capacity, default pool size).
    pub core: ecs_core::CoreConfig,
    /// Default pool size for `pooled_snapshot` providers constructed without
    /// an explicit override.
    pub default_pool_size: usize,
    /// Number of pooled-snapshot replicas to pre-sync during provider
    /// construction so the first `acquire_view` call never blocks on a cold
    /// replica.
    pub default_pool_warmup: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let core = ecs_core::CoreConfig::default();
        Self {
            default_pool_size: core.default_snapshot_pool_size,
            default_pool_warmup: core.default_snapshot_pool_size.min(2),
            core,
        }
    }
}
