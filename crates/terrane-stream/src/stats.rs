use terrane_runtime::{BackendKind, PoolStats};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub total: usize,
    pub pending: usize,
    pub generating: usize,
    pub ready: usize,
    pub rendered: usize,
    pub removing: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerrainStats {
    pub pool: PoolStats,
    pub states: StateCounts,
    pub backend: BackendKind,
    pub meshes: usize,
    pub water_surfaces: usize,
    pub ticks: u64,
}
