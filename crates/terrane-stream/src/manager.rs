use std::fmt;
use std::time::Instant;

use hashbrown::HashMap;
use terrane_chunk::{ChunkMesh, GenerationId, GenerationRequest};
use terrane_runtime::{
    BackendKind, GenerationBackend, InlineGenerator, PoolConfig, Reply, TaskHandle, WorkerPool,
};
use terrane_world::{ChunkCoord, GeneratorSettings, TileSampler};

use crate::config::StreamConfig;
use crate::sink::{MaterialMode, MeshHandle, RenderSink};
use crate::state::{ChunkState, ChunkStateManager, Eviction, Transition};
use crate::stats::TerrainStats;
use crate::water::WaterPolicy;

#[derive(Debug)]
pub enum TerrainError {
    /// The worker pool failed and inline generation is disabled.
    NoGenerationBackend(String),
}

impl fmt::Display for TerrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerrainError::NoGenerationBackend(why) => {
                write!(f, "no chunk generation backend available: {}", why)
            }
        }
    }
}

impl std::error::Error for TerrainError {}

struct RenderedChunk {
    mesh: MeshHandle,
    below_water: bool,
    water: bool,
}

#[derive(Default)]
struct CameraThrottle {
    latest: Option<(f32, f32)>,
    last_applied: Option<Instant>,
}

fn make_backend(cfg: &StreamConfig) -> Result<Box<dyn GenerationBackend>, TerrainError> {
    let inline = || {
        let sampler = if cfg.accelerated_sampling {
            TileSampler::try_new(cfg.workers.unwrap_or(0))
        } else {
            None
        };
        Box::new(InlineGenerator::new(sampler)) as Box<dyn GenerationBackend>
    };
    if cfg.sync {
        log::info!(target: "stream", "generating chunks on the calling thread");
        return Ok(inline());
    }
    let pool_cfg = match cfg.workers {
        Some(n) => PoolConfig::with_workers(n),
        None => PoolConfig::default(),
    };
    match WorkerPool::new(pool_cfg) {
        Ok(pool) => Ok(Box::new(pool)),
        Err(e) if cfg.inline_fallback => {
            log::warn!(target: "stream", "{}; falling back to inline generation", e);
            Ok(inline())
        }
        Err(e) => Err(TerrainError::NoGenerationBackend(e.to_string())),
    }
}

/// Streams chunks around a moving viewpoint into a [`RenderSink`].
///
/// Drive it from one thread: call [`update`](Self::update) every frame and
/// feed camera moves through [`update_camera_position`](Self::update_camera_position).
pub struct TerrainManager<S: RenderSink> {
    cfg: StreamConfig,
    settings: GeneratorSettings,
    backend: Box<dyn GenerationBackend>,
    states: ChunkStateManager,
    sink: S,
    handles: Vec<TaskHandle>,
    rendered: HashMap<ChunkCoord, RenderedChunk>,
    water: WaterPolicy,
    next_id: GenerationId,
    camera: CameraThrottle,
    wireframe: bool,
    last_tick: Option<Instant>,
    ticks: u64,
    started: bool,
    disposed: bool,
}

impl<S: RenderSink> TerrainManager<S> {
    pub fn new(cfg: StreamConfig, settings: GeneratorSettings, sink: S) -> Result<Self, TerrainError> {
        let backend = make_backend(&cfg)?;
        Ok(Self::with_backend(cfg, settings, sink, backend))
    }

    pub fn with_backend(
        cfg: StreamConfig,
        settings: GeneratorSettings,
        sink: S,
        backend: Box<dyn GenerationBackend>,
    ) -> Self {
        let states = ChunkStateManager::new(cfg.render_radius).with_stale_after(cfg.stale_after());
        let water = WaterPolicy {
            continuity: cfg.water_continuity,
        };
        Self {
            cfg,
            settings,
            backend,
            states,
            sink,
            handles: Vec::new(),
            rendered: HashMap::new(),
            water,
            next_id: GenerationId::default(),
            camera: CameraThrottle::default(),
            wireframe: false,
            last_tick: None,
            ticks: 0,
            started: false,
            disposed: false,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.cfg
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn states(&self) -> &ChunkStateManager {
        &self.states
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn center(&self) -> ChunkCoord {
        self.states.center()
    }

    pub fn render_radius(&self) -> u32 {
        self.states.render_radius()
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn is_rendered(&self, coord: ChunkCoord) -> bool {
        self.rendered.contains_key(&coord)
    }

    pub fn rendered_coords(&self) -> Vec<ChunkCoord> {
        let mut out: Vec<ChunkCoord> = self.rendered.keys().copied().collect();
        out.sort();
        out
    }

    /// Initial burst: registers the full radius and runs one tick now.
    pub fn start(&mut self) {
        if self.disposed || self.started {
            return;
        }
        self.started = true;
        let now = Instant::now();
        if let Some((x, z)) = self.camera.latest.take() {
            self.camera.last_applied = Some(now);
            let coord = ChunkCoord::from_world(x, z, self.cfg.chunk_size);
            let evicted = self.states.update_center(coord);
            self.apply_evictions(evicted);
        }
        let added = self.register_desired();
        log::info!(
            target: "stream",
            "initial burst: {} chunks around {} (radius {})",
            added,
            self.center(),
            self.render_radius()
        );
        self.last_tick = Some(now);
        self.tick(now);
    }

    /// Call once per frame. Ticks at the configured interval.
    pub fn update(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        if !self.started {
            self.start();
        }
        self.apply_camera(now);
        let due = match self.last_tick {
            Some(t) => now.saturating_duration_since(t) >= self.cfg.tick_interval(),
            None => true,
        };
        if due {
            self.last_tick = Some(now);
            self.tick(now);
        }
    }

    /// World-space viewpoint. Applied at most once per camera interval; the
    /// latest position wins.
    pub fn update_camera_position(&mut self, x: f32, z: f32) {
        self.camera.latest = Some((x, z));
    }

    fn apply_camera(&mut self, now: Instant) {
        let Some((x, z)) = self.camera.latest else {
            return;
        };
        if let Some(t) = self.camera.last_applied {
            if now.saturating_duration_since(t) < self.cfg.camera_update_interval() {
                return;
            }
        }
        self.camera.latest = None;
        self.camera.last_applied = Some(now);
        let coord = ChunkCoord::from_world(x, z, self.cfg.chunk_size);
        if coord != self.center() {
            self.recenter(coord);
        }
    }

    fn recenter(&mut self, coord: ChunkCoord) {
        let evicted = self.states.update_center(coord);
        self.apply_evictions(evicted);
        let limit = self.states.eviction_distance();
        self.backend.cancel_out_of_range(coord.x, coord.z, limit);
        let added = self.register_desired();
        log::debug!(target: "stream", "center -> {} ({} new chunks)", coord, added);
    }

    pub fn set_render_radius(&mut self, radius: u32) {
        if self.disposed || radius == self.render_radius() {
            return;
        }
        let evicted = self.states.set_render_radius(radius);
        self.apply_evictions(evicted);
        let c = self.center();
        self.backend.cancel_out_of_range(c.x, c.z, self.states.eviction_distance());
        let added = self.register_desired();
        log::info!(target: "stream", "render radius {} ({} new chunks)", radius, added);
    }

    pub fn generate_chunk(&mut self, coord: ChunkCoord) -> bool {
        !self.disposed && self.states.add_chunk(coord)
    }

    pub fn generate_chunks(&mut self, coords: &[ChunkCoord]) -> usize {
        coords.iter().filter(|c| self.generate_chunk(**c)).count()
    }

    /// Drops a chunk by its `"x,z"` key. Unknown or malformed keys are ignored.
    pub fn remove_chunk(&mut self, key: &str) {
        let Ok(coord) = key.parse::<ChunkCoord>() else {
            log::debug!(target: "stream", "remove_chunk: bad key {:?}", key);
            return;
        };
        if let Some(ev) = self.states.remove_chunk(coord) {
            self.apply_evictions(vec![ev]);
        } else if self.rendered.contains_key(&coord) {
            self.remove_rendered(coord);
        }
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        if self.wireframe == wireframe {
            return;
        }
        self.wireframe = wireframe;
        let mode = MaterialMode::from_wireframe(wireframe);
        for r in self.rendered.values() {
            self.sink.set_material(r.mesh, mode);
        }
    }

    pub fn stats(&self) -> TerrainStats {
        TerrainStats {
            pool: self.backend.stats(),
            states: self.states.counts(),
            backend: self.backend.kind(),
            meshes: self.rendered.len(),
            water_surfaces: self.rendered.values().filter(|r| r.water).count(),
            ticks: self.ticks,
        }
    }

    /// Throws away every chunk and regenerates with new generator settings.
    pub fn reset(&mut self, settings: GeneratorSettings) {
        if self.disposed {
            return;
        }
        self.settings = settings;
        let evicted = self.states.clear();
        self.apply_evictions(evicted);
        let c = self.center();
        self.backend.cancel_out_of_range(c.x, c.z, -1.0);
        self.handles.clear();
        let added = self.register_desired();
        log::info!(
            target: "stream",
            "terrain reset (seed {}), {} chunks queued",
            self.settings.generator.seed,
            added
        );
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.backend.dispose();
        self.handles.clear();
        let evicted = self.states.clear();
        self.apply_evictions(evicted);
        let leftover: Vec<ChunkCoord> = self.rendered.keys().copied().collect();
        for c in leftover {
            self.remove_rendered(c);
        }
        self.disposed = true;
        log::info!(target: "stream", "terrain disposed after {} ticks", self.ticks);
    }

    fn register_desired(&mut self) -> usize {
        let desired = self.states.desired();
        desired.into_iter().filter(|c| self.states.add_chunk(*c)).count()
    }

    fn tick(&mut self, now: Instant) {
        self.ticks += 1;
        self.collect_results();
        self.render_ready();
        self.dispatch_pending();
        let every = self.cfg.cleanup_every_ticks;
        if every > 0 && self.ticks % every == 0 {
            let evicted = self.states.cleanup_stale(now);
            if !evicted.is_empty() {
                self.apply_evictions(evicted);
                self.register_desired();
            }
        }
        log::trace!(target: "stream", "tick {}: {:?}", self.ticks, self.states.counts());
    }

    fn collect_results(&mut self) {
        self.backend.pump();
        let handles = std::mem::take(&mut self.handles);
        for mut h in handles {
            match h.try_resolve() {
                Some(reply) => self.apply_reply(h.coord(), h.id(), reply),
                None => self.handles.push(h),
            }
        }
    }

    fn apply_reply(&mut self, coord: ChunkCoord, id: GenerationId, reply: Reply) {
        let current = self
            .states
            .get(coord)
            .filter(|i| i.state() == ChunkState::Generating)
            .and_then(|i| i.generation_id());
        if current != Some(id) {
            log::debug!(target: "stream", "discarding stale result {} for chunk {}", id, coord);
            return;
        }
        match reply {
            Ok(result) if result.success => {
                self.states.set_chunk_state(coord, Transition::Ready { result });
            }
            Ok(result) => {
                log::warn!(
                    target: "stream",
                    "chunk {} failed to build: {}",
                    coord,
                    result.error.as_deref().unwrap_or("unknown error")
                );
                self.states.set_chunk_state(coord, Transition::Pending);
            }
            Err(e) => {
                log::debug!(target: "stream", "chunk {} {} rejected: {}", coord, id, e);
                self.states.set_chunk_state(coord, Transition::Pending);
            }
        }
    }

    fn render_ready(&mut self) {
        let ready = self.states.ready();
        for coord in ready.into_iter().take(self.cfg.ready_per_tick) {
            let Some(result) = self.states.take_ready_result(coord) else {
                self.states.set_chunk_state(coord, Transition::Pending);
                continue;
            };
            let below_water = result.has_water();
            let Some(mesh) = ChunkMesh::from_result(result, self.cfg.chunk_size) else {
                self.states.set_chunk_state(coord, Transition::Pending);
                continue;
            };
            if let Some(old) = self.rendered.remove(&coord) {
                self.sink.destroy_mesh(old.mesh);
            }
            let mode = MaterialMode::from_wireframe(self.wireframe);
            let handle = self.sink.create_mesh(coord, &mesh, mode);
            self.rendered.insert(
                coord,
                RenderedChunk {
                    mesh: handle,
                    below_water,
                    water: false,
                },
            );
            self.states.set_chunk_state(coord, Transition::Rendered);
            self.refresh_water(coord);
        }
    }

    fn dispatch_pending(&mut self) {
        let generating = self.states.counts().generating;
        let free = self.cfg.max_concurrent.saturating_sub(generating);
        if free == 0 {
            return;
        }
        for coord in self.states.pending().into_iter().take(free) {
            self.next_id = self.next_id.next();
            let id = self.next_id;
            if !self
                .states
                .set_chunk_state(coord, Transition::Generating { generation_id: id })
            {
                continue;
            }
            let req = GenerationRequest::new(
                id,
                coord,
                self.cfg.chunk_size,
                self.cfg.resolution,
                self.settings.clone(),
            );
            self.handles.push(self.backend.submit(req));
        }
    }

    fn apply_evictions(&mut self, evicted: Vec<Eviction>) {
        for ev in evicted {
            if let Some(id) = ev.generation_id {
                log::trace!(target: "stream", "chunk {} evicted mid-generation {}", ev.coord, id);
            }
            if self.rendered.contains_key(&ev.coord) {
                self.remove_rendered(ev.coord);
            }
        }
    }

    fn remove_rendered(&mut self, coord: ChunkCoord) {
        let Some(r) = self.rendered.remove(&coord) else {
            return;
        };
        self.sink.destroy_mesh(r.mesh);
        if r.water {
            self.sink.remove_water_surface(&coord.key());
        }
        for n in self.water.affected(coord).into_iter().skip(1) {
            self.update_water(n);
        }
    }

    fn refresh_water(&mut self, coord: ChunkCoord) {
        for c in self.water.affected(coord) {
            self.update_water(c);
        }
    }

    fn update_water(&mut self, coord: ChunkCoord) {
        let wants = {
            let rendered = &self.rendered;
            self.water
                .carries_water(coord, |c| rendered.get(&c).map(|r| r.below_water))
        };
        let Some(r) = self.rendered.get_mut(&coord) else {
            return;
        };
        if wants == r.water {
            return;
        }
        r.water = wants;
        if wants {
            self.sink
                .add_or_refresh_water_surface(coord.x, coord.z, self.cfg.chunk_size);
        } else {
            self.sink.remove_water_surface(&coord.key());
        }
    }
}
