use terrane_chunk::{GenerationRequest, GeneratorCache, generate_with_sampler};
use terrane_world::TileSampler;

use crate::handle::{TaskError, TaskHandle};
use crate::{BackendKind, GenerationBackend, PoolStats};

/// Builds on the calling thread. Same output as the pool, without the concurrency.
pub struct InlineGenerator {
    cache: GeneratorCache,
    sampler: Option<TileSampler>,
    built: u64,
    disposed: bool,
}

impl InlineGenerator {
    pub fn new(sampler: Option<TileSampler>) -> Self {
        Self {
            cache: GeneratorCache::new(),
            sampler,
            built: 0,
            disposed: false,
        }
    }

    pub fn has_sampler(&self) -> bool {
        self.sampler.is_some()
    }

    pub fn built(&self) -> u64 {
        self.built
    }
}

impl Default for InlineGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl GenerationBackend for InlineGenerator {
    fn kind(&self) -> BackendKind {
        BackendKind::Inline
    }

    fn submit(&mut self, request: GenerationRequest) -> TaskHandle {
        let (id, coord) = (request.id, request.coord());
        if self.disposed {
            return TaskHandle::from_reply(id, coord, Err(TaskError::Disposed));
        }
        let field = self.cache.field_for(&request.settings);
        let result = generate_with_sampler(&request, field, self.sampler.as_ref());
        self.built += 1;
        TaskHandle::from_reply(id, coord, Ok(result))
    }

    fn cancel_out_of_range(&mut self, _center_x: i32, _center_z: i32, _max_distance: f32) -> usize {
        0
    }

    fn stats(&self) -> PoolStats {
        PoolStats::default()
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.sampler = None;
    }
}
