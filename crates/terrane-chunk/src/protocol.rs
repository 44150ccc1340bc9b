use std::fmt;

use terrane_world::{ChunkCoord, GeneratorSettings};

/// Identifies one dispatch of a chunk; a newer id for the same coordinate
/// makes every older result stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenerationId(pub u64);

impl GenerationId {
    #[inline]
    pub fn next(self) -> Self {
        GenerationId(self.0.wrapping_add(1))
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub id: GenerationId,
    pub chunk_x: i32,
    pub chunk_z: i32,
    /// World-unit edge length of the chunk square.
    pub chunk_size: f32,
    /// Cells per edge; the grid has `resolution + 1` vertices per edge.
    pub resolution: u32,
    pub settings: GeneratorSettings,
}

impl GenerationRequest {
    pub fn new(
        id: GenerationId,
        coord: ChunkCoord,
        chunk_size: f32,
        resolution: u32,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            id,
            chunk_x: coord.x,
            chunk_z: coord.z,
            chunk_size,
            resolution,
            settings,
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.chunk_x, self.chunk_z)
    }

    #[inline]
    pub fn side(&self) -> usize {
        self.resolution as usize + 1
    }

    /// World-space corner of the chunk at local `(0, 0)`.
    #[inline]
    pub fn origin(&self) -> (f32, f32) {
        (
            self.chunk_x as f32 * self.chunk_size,
            self.chunk_z as f32 * self.chunk_size,
        )
    }

    #[inline]
    pub fn step(&self) -> f32 {
        self.chunk_size / self.resolution.max(1) as f32
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationResult {
    pub id: GenerationId,
    pub chunk_x: i32,
    pub chunk_z: i32,
    /// Chunk-local xyz triples.
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Linear rgb triples, one per vertex.
    pub colors: Vec<f32>,
    pub biome_tags: Vec<u8>,
    pub min_height: f32,
    pub max_height: f32,
    pub water_level: f32,
    pub success: bool,
    pub error: Option<String>,
}

impl GenerationResult {
    pub fn failed(req: &GenerationRequest, error: impl Into<String>) -> Self {
        Self {
            id: req.id,
            chunk_x: req.chunk_x,
            chunk_z: req.chunk_z,
            water_level: req.settings.biomes.water_level,
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.chunk_x, self.chunk_z)
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// True when some part of the surface dips below the water plane.
    pub fn has_water(&self) -> bool {
        self.success && self.vertex_count() > 0 && self.min_height < self.water_level
    }
}
