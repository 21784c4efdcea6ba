//! JSON response shapes. None of these are the wire format used anywhere
//! else in the workspace -- they exist purely for this inspection surface,
//! so they're free to be as verbose as a human reading `curl` output wants.

use ecs_core::Entity;
use ecs_runtime::RepositoryStats;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatsDto {
    pub entity_high_water: u32,
    pub tick: u32,
    pub chunk_commit_ratio: f64,
    pub per_type: Vec<TypeStatsDto>,
}

#[derive(Debug, Serialize)]
pub struct TypeStatsDto {
    pub ordinal: u16,
    pub name: String,
    pub population: i32,
}

impl From<RepositoryStats> for StatsDto {
    fn from(stats: RepositoryStats) -> Self {
        Self {
            entity_high_water: stats.entity_high_water,
            tick: stats.tick,
            chunk_commit_ratio: stats.chunk_commit_ratio,
            per_type: stats
                .per_type
                .into_iter()
                .map(|t| TypeStatsDto { ordinal: t.ordinal, name: t.name, population: t.population })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TypeMetaDto {
    pub ordinal: u16,
    pub name: String,
    pub element_size: usize,
    pub storage_kind: &'static str,
    pub policy: &'static str,
}

#[derive(Debug, Serialize)]
pub struct QueryResultDto {
    pub matched: usize,
    pub truncated: bool,
    pub entities: Vec<Entity>,
}

#[derive(Debug, Serialize)]
pub struct SeekResultDto {
    pub path: String,
    pub tick: u64,
    pub stats: StatsDto,
}
