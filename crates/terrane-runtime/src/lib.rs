//! Chunk generation backends: the worker pool and the inline fallback.
#![forbid(unsafe_code)]

mod handle;
mod inline;
mod pool;

pub use handle::{Reply, TaskError, TaskHandle};
pub use inline::InlineGenerator;
pub use pool::{GenerateFn, PoolConfig, PoolError, WorkerPool, default_generate};

use terrane_chunk::GenerationRequest;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total_workers: usize,
    pub available_workers: usize,
    pub busy_workers: usize,
    pub queued_tasks: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Workers,
    Inline,
}

/// Where chunk requests go. Driven from a single thread; results surface
/// through the returned handles.
pub trait GenerationBackend {
    fn kind(&self) -> BackendKind;

    /// Never blocks on generation for the pool; the inline backend builds
    /// before returning.
    fn submit(&mut self, request: GenerationRequest) -> TaskHandle;

    /// Handles crash reports; workers pick up queued work on their own.
    fn pump(&mut self) {}

    /// Rejects queued requests farther than `max_distance` chunks from the center.
    fn cancel_out_of_range(&mut self, center_x: i32, center_z: i32, max_distance: f32) -> usize;

    fn stats(&self) -> PoolStats;

    fn dispose(&mut self);
}
