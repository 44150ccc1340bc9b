//! Chunk generation protocol and CPU geometry building.
#![forbid(unsafe_code)]

mod build;
mod mesh;
mod protocol;

pub use build::{
    GeneratorCache, MAX_RESOLUTION, build_chunk_geometry, generate_chunk_geometry,
    generate_with_sampler,
};
pub use mesh::ChunkMesh;
pub use protocol::{GenerationId, GenerationRequest, GenerationResult};
