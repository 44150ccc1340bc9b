use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use terrane_chunk::{GenerationRequest, GeneratorCache};
use terrane_runtime::{
    BackendKind, GenerateFn, GenerationBackend, PoolConfig, PoolStats, TaskError, TaskHandle,
    WorkerPool,
};
use terrane_stream::{
    ChunkState, MaterialMode, RecordingSink, StreamConfig, TerrainError, TerrainManager,
};
use terrane_world::{ChunkCoord, GeneratorSettings};

const SIZE: f32 = 32.0;

fn cfg(radius: u32) -> StreamConfig {
    StreamConfig {
        chunk_size: SIZE,
        resolution: 2,
        render_radius: radius,
        max_concurrent: 64,
        ready_per_tick: 64,
        cleanup_every_ticks: 0,
        accelerated_sampling: false,
        sync: true,
        ..StreamConfig::default()
    }
}

fn world_center(c: ChunkCoord) -> (f32, f32) {
    (c.x as f32 * SIZE + SIZE * 0.5, c.z as f32 * SIZE + SIZE * 0.5)
}

/// Advances a synthetic clock past both throttles per step until `done` holds.
fn drive(
    m: &mut TerrainManager<RecordingSink>,
    clock: &mut Instant,
    done: impl Fn(&TerrainManager<RecordingSink>) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(20);
    while !done(m) {
        assert!(Instant::now() < deadline, "streaming did not settle: {:?}", m.stats());
        *clock += Duration::from_millis(300);
        m.update(*clock);
        thread::sleep(Duration::from_millis(1));
    }
}

fn sorted(mut v: Vec<ChunkCoord>) -> Vec<ChunkCoord> {
    v.sort();
    v
}

#[test]
fn renders_exactly_the_circle_for_each_radius() {
    for radius in [0u32, 1, 2, 6] {
        let mut m =
            TerrainManager::new(cfg(radius), GeneratorSettings::with_seed(42), RecordingSink::new())
                .unwrap();
        assert_eq!(m.backend_kind(), BackendKind::Inline);
        let want = sorted(ChunkCoord::new(0, 0).within_radius(radius as i32));
        let mut clock = Instant::now();
        m.start();
        drive(&mut m, &mut clock, |m| m.stats().states.rendered == want.len());
        assert_eq!(m.rendered_coords(), want, "radius {radius}");
        assert_eq!(m.sink().mesh_coords(), want, "radius {radius}");
        let s = m.stats();
        assert_eq!(s.states.total, want.len());
        assert_eq!(s.states.pending + s.states.generating + s.states.ready, 0);
    }
}

#[test]
fn camera_moves_within_one_interval_collapse_to_the_latest() {
    let mut c = cfg(1);
    c.camera_update_ms = 250;
    let mut m =
        TerrainManager::new(c, GeneratorSettings::with_seed(42), RecordingSink::new()).unwrap();
    let (x, z) = world_center(ChunkCoord::new(0, 0));
    m.update_camera_position(x, z);
    m.start();
    let clock = Instant::now();
    assert_eq!(m.center(), ChunkCoord::new(0, 0));

    for cx in [2, 3, 4, 5] {
        let (x, z) = world_center(ChunkCoord::new(cx, 0));
        m.update_camera_position(x, z);
    }
    m.update(clock + Duration::from_millis(100));
    assert_eq!(m.center(), ChunkCoord::new(0, 0));

    m.update(clock + Duration::from_millis(300));
    assert_eq!(m.center(), ChunkCoord::new(5, 0));
    // Only the final position was ever applied, so nothing around the
    // skipped positions was tracked.
    let states = m.states();
    assert_eq!(states.len(), 5);
    assert!(!states.contains(ChunkCoord::new(3, 0)));
    assert!(!states.contains(ChunkCoord::new(2, 0)));

    let mut clock = clock + Duration::from_millis(300);
    drive(&mut m, &mut clock, |m| m.stats().states.rendered == 5);
    assert_eq!(m.center(), ChunkCoord::new(5, 0));
    assert_eq!(m.rendered_coords(), sorted(ChunkCoord::new(5, 0).within_radius(1)));
}

#[test]
fn moving_away_never_renders_evicted_chunks() {
    let mut c = cfg(2);
    c.sync = false;
    c.workers = Some(2);
    c.max_concurrent = 4;
    c.ready_per_tick = 1;
    let mut m =
        TerrainManager::new(c, GeneratorSettings::with_seed(3), RecordingSink::new()).unwrap();
    assert_eq!(m.backend_kind(), BackendKind::Workers);
    let mut clock = Instant::now();
    m.start();
    drive(&mut m, &mut clock, |m| m.stats().states.rendered >= 3);

    let target = ChunkCoord::new(25, -4);
    let (x, z) = world_center(target);
    m.update_camera_position(x, z);
    clock += Duration::from_millis(300);
    m.update(clock);
    assert_eq!(m.center(), target);
    let moved_at = m.sink().history.len();

    let want = sorted(target.within_radius(2));
    drive(&mut m, &mut clock, |m| m.rendered_coords() == want);
    for coord in &m.sink().history[moved_at..] {
        assert!(coord.distance(target) <= 3.0, "mesh built for evicted {coord}");
    }
    assert_eq!(m.sink().mesh_coords(), want);
    assert_eq!(m.sink().mesh_count(), m.stats().meshes);
}

#[test]
fn late_results_for_reissued_chunks_are_discarded() {
    let (gate, gate_rx) = unbounded::<()>();
    let f: GenerateFn = Arc::new(move |cache: &mut GeneratorCache, r: &GenerationRequest| {
        let _ = gate_rx.recv();
        cache.generate(r)
    });
    let pool = WorkerPool::with_generator(PoolConfig::with_workers(1), f).unwrap();
    let mut c = cfg(0);
    c.sync = false;
    let mut m = TerrainManager::with_backend(
        c,
        GeneratorSettings::with_seed(8),
        RecordingSink::new(),
        Box::new(pool),
    );
    let origin = ChunkCoord::new(0, 0);
    let mut clock = Instant::now();
    m.start();
    assert_eq!(m.states().state_of(origin), Some(ChunkState::Generating));
    let first = m.states().get(origin).unwrap().generation_id().unwrap();

    // Away and back again while the first build is still blocked.
    let (x, z) = world_center(ChunkCoord::new(10, 0));
    m.update_camera_position(x, z);
    clock += Duration::from_millis(300);
    m.update(clock);
    assert!(!m.states().contains(origin));
    let (x, z) = world_center(origin);
    m.update_camera_position(x, z);
    clock += Duration::from_millis(300);
    m.update(clock);
    let second = m.states().get(origin).unwrap().generation_id().unwrap();
    assert!(second > first);

    drop(gate);
    drive(&mut m, &mut clock, |m| m.is_rendered(origin));
    assert_eq!(m.sink().history, vec![origin]);
    assert_eq!(m.stats().states.total, 1);
}

struct RejectingBackend {
    submitted: Arc<AtomicUsize>,
}

impl GenerationBackend for RejectingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Workers
    }

    fn submit(&mut self, request: GenerationRequest) -> TaskHandle {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        TaskHandle::from_reply(
            request.id,
            request.coord(),
            Err(TaskError::WorkerCrashed("injected".into())),
        )
    }

    fn cancel_out_of_range(&mut self, _: i32, _: i32, _: f32) -> usize {
        0
    }

    fn stats(&self) -> PoolStats {
        PoolStats::default()
    }

    fn dispose(&mut self) {}
}

#[test]
fn rejected_tasks_return_to_pending_and_retry() {
    let submitted = Arc::new(AtomicUsize::new(0));
    let backend = RejectingBackend {
        submitted: Arc::clone(&submitted),
    };
    let mut m = TerrainManager::with_backend(
        cfg(1),
        GeneratorSettings::default(),
        RecordingSink::new(),
        Box::new(backend),
    );
    let mut clock = Instant::now();
    m.start();
    for _ in 0..4 {
        clock += Duration::from_millis(300);
        m.update(clock);
    }
    let s = m.stats();
    assert_eq!(s.states.total, 5);
    assert_eq!(s.states.ready + s.states.rendered, 0);
    assert_eq!(m.sink().created, 0);
    assert!(submitted.load(Ordering::Relaxed) >= 5 * 4);
}

#[test]
fn pool_failure_falls_back_or_errors() {
    let mut c = cfg(1);
    c.sync = false;
    c.workers = Some(0);
    let m = TerrainManager::new(c.clone(), GeneratorSettings::default(), RecordingSink::new())
        .unwrap();
    assert_eq!(m.backend_kind(), BackendKind::Inline);

    c.inline_fallback = false;
    let r = TerrainManager::new(c, GeneratorSettings::default(), RecordingSink::new());
    assert!(matches!(r, Err(TerrainError::NoGenerationBackend(_))));
}

#[test]
fn remove_wireframe_reset_and_dispose() {
    let mut m =
        TerrainManager::new(cfg(1), GeneratorSettings::with_seed(1), RecordingSink::new()).unwrap();
    let mut clock = Instant::now();
    m.start();
    drive(&mut m, &mut clock, |m| m.stats().states.rendered == 5);

    m.remove_chunk("1,0");
    assert!(!m.is_rendered(ChunkCoord::new(1, 0)));
    assert!(!m.states().contains(ChunkCoord::new(1, 0)));
    assert_eq!(m.sink().mesh_count(), 4);
    m.remove_chunk("9,9");
    m.remove_chunk("nonsense");
    assert_eq!(m.sink().mesh_count(), 4);

    m.set_wireframe(true);
    assert!(m.sink().meshes().all(|r| r.mode == MaterialMode::Wireframe));
    assert!(m.generate_chunk(ChunkCoord::new(1, 0)));
    assert!(!m.generate_chunk(ChunkCoord::new(1, 0)));
    drive(&mut m, &mut clock, |m| m.is_rendered(ChunkCoord::new(1, 0)));
    assert!(m.sink().meshes().all(|r| r.mode == MaterialMode::Wireframe));

    let before = m.sink().created;
    m.reset(GeneratorSettings::with_seed(2));
    assert_eq!(m.sink().mesh_count(), 0);
    assert_eq!(m.stats().states.pending, 5);
    drive(&mut m, &mut clock, |m| m.stats().states.rendered == 5);
    assert_eq!(m.sink().created, before + 5);

    m.dispose();
    assert_eq!(m.sink().mesh_count(), 0);
    assert_eq!(m.sink().water_count(), 0);
    assert_eq!(m.stats().states.total, 0);
    clock += Duration::from_millis(300);
    m.update(clock);
    assert_eq!(m.sink().mesh_count(), 0);
}

#[test]
fn water_follows_the_water_plane() {
    let mut flooded = GeneratorSettings::with_seed(4);
    flooded.biomes.water_level = 10_000.0;
    let mut m = TerrainManager::new(cfg(1), flooded, RecordingSink::new()).unwrap();
    let mut clock = Instant::now();
    m.start();
    drive(&mut m, &mut clock, |m| m.stats().states.rendered == 5);
    assert_eq!(m.sink().water_count(), 5);
    assert_eq!(m.stats().water_surfaces, 5);

    let mut dry = GeneratorSettings::with_seed(4);
    dry.biomes.water_level = -10_000.0;
    m.reset(dry);
    drive(&mut m, &mut clock, |m| m.stats().states.rendered == 5);
    assert_eq!(m.sink().water_count(), 0);
}

#[test]
fn stale_cleanup_runs_on_its_tick() {
    let mut c = cfg(1);
    c.cleanup_every_ticks = 1;
    c.stale_secs = 0;
    let backend = RejectingBackend {
        submitted: Arc::new(AtomicUsize::new(0)),
    };
    let mut m = TerrainManager::with_backend(
        c,
        GeneratorSettings::default(),
        RecordingSink::new(),
        Box::new(backend),
    );
    let mut clock = Instant::now();
    m.start();
    clock += Duration::from_secs(10);
    m.update(clock);
    // Everything is stale immediately, then re-registered for the same center.
    assert_eq!(m.stats().states.total, 5);
    assert_eq!(m.stats().states.pending, 5);
}
