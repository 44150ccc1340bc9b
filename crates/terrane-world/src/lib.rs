//! Seeded terrain sampling: height field, biome classification, and worldgen parameters.
#![forbid(unsafe_code)]

pub mod biome;
mod coord;
mod height;
mod tile;
pub mod worldgen;

pub use biome::{BiomePalette, BiomeTag, classify};
pub use coord::{ChunkCoord, ParseChunkKeyError};
pub use height::{AuxChannel, HeightField};
pub use tile::{SampleError, TileSampler};
pub use worldgen::{BiomeRules, GeneratorConfig, GeneratorSettings, TerrainShape};

/// World-space position of grid line `i` for a grid starting at `origin` with spacing `step`.
///
/// Every height sampling path goes through this so the batch sampler and the
/// per-vertex path feed identical inputs to the height function.
#[inline]
pub fn grid_point(origin: f32, step: f32, i: usize) -> f32 {
    origin + i as f32 * step
}
