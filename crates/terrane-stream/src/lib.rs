//! Chunk streaming: lifecycle tracking, scheduling, and the render boundary.
#![forbid(unsafe_code)]

mod config;
mod manager;
mod sink;
mod state;
mod stats;
mod water;

pub use config::StreamConfig;
pub use manager::{TerrainError, TerrainManager};
pub use sink::{MaterialMode, MeshHandle, RecordedMesh, RecordingSink, RenderSink};
pub use state::{ChunkInfo, ChunkState, ChunkStateManager, DEFAULT_STALE_AFTER, Eviction, Transition};
pub use stats::{StateCounts, TerrainStats};
pub use water::WaterPolicy;
