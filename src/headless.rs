use std::thread;
use std::time::{Duration, Instant};

use terrane_stream::{RecordingSink, TerrainError, TerrainManager, TerrainStats};

use crate::config::TerrainConfig;
use crate::day_cycle::DayCycle;
use crate::watch::ConfigWatch;

pub struct FlightPlan {
    pub frames: u64,
    /// World units per second along +x.
    pub speed: f32,
    pub frame: Duration,
    /// Sleep between frames so workers keep pace with the clock.
    pub realtime: bool,
    pub log_every: u64,
    pub day_length: f32,
}

impl Default for FlightPlan {
    fn default() -> Self {
        Self {
            frames: 600,
            speed: 40.0,
            frame: Duration::from_millis(16),
            realtime: true,
            log_every: 60,
            day_length: 120.0,
        }
    }
}

#[derive(Debug)]
pub struct FlightReport {
    pub stats: TerrainStats,
    pub meshes_created: u64,
    pub meshes_destroyed: u64,
    pub distance: f32,
}

/// Flies a straight line over the terrain, streaming into a recording sink.
pub fn run_headless(
    cfg: &TerrainConfig,
    plan: &FlightPlan,
    watch: Option<&ConfigWatch>,
) -> Result<FlightReport, TerrainError> {
    let mut manager = TerrainManager::new(cfg.stream.clone(), cfg.settings(), RecordingSink::new())?;
    log::info!(
        target: "host",
        "headless flight: {} frames at {} u/s, radius {}, backend {:?}",
        plan.frames,
        plan.speed,
        manager.render_radius(),
        manager.backend_kind()
    );
    let mut day = DayCycle::new(plan.day_length);
    let dt = plan.frame.as_secs_f32();
    let half = cfg.stream.chunk_size * 0.5;
    let (mut x, z) = (half, half);
    let start_x = x;
    let mut clock = Instant::now();
    manager.update_camera_position(x, z);
    manager.start();
    for frame in 1..=plan.frames {
        if let Some(next) = watch.and_then(|w| w.poll()) {
            if next.stream.render_radius != manager.render_radius() {
                manager.set_render_radius(next.stream.render_radius);
            }
            let settings = next.settings();
            if &settings != manager.settings() {
                manager.reset(settings);
            }
        }
        x += plan.speed * dt;
        manager.update_camera_position(x, z);
        clock += plan.frame;
        manager.update(clock);
        let light = day.advance(dt);
        if plan.log_every > 0 && frame % plan.log_every == 0 {
            let s = manager.stats();
            log::info!(
                target: "host",
                "frame {} {:02.0}h center {} chunks {} (pending {} generating {} ready {} rendered {}) meshes {} water {} workers {}/{} queued {}",
                frame,
                light.hour(),
                manager.center(),
                s.states.total,
                s.states.pending,
                s.states.generating,
                s.states.ready,
                s.states.rendered,
                s.meshes,
                s.water_surfaces,
                s.pool.busy_workers,
                s.pool.total_workers,
                s.pool.queued_tasks
            );
        }
        if plan.realtime {
            thread::sleep(plan.frame);
        }
    }
    let report = FlightReport {
        stats: manager.stats(),
        meshes_created: manager.sink().created,
        meshes_destroyed: manager.sink().destroyed,
        distance: x - start_x,
    };
    manager.dispose();
    log::info!(
        target: "host",
        "flew {:.0} units: {} meshes created, {} destroyed",
        report.distance,
        report.meshes_created,
        report.meshes_destroyed
    );
    Ok(report)
}
