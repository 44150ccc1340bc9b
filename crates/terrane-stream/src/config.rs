use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `[stream]` table: chunk grid, scheduling, and fallback knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: f32,
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    #[serde(default = "default_render_radius")]
    pub render_radius: u32,
    /// Upper bound on chunks in `Generating` at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Worker thread count; unset picks one from the available cores.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_ready_per_tick")]
    pub ready_per_tick: usize,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_camera_update_ms")]
    pub camera_update_ms: u64,
    #[serde(default = "default_stale_secs")]
    pub stale_secs: u64,
    /// 0 disables stale cleanup.
    #[serde(default = "default_cleanup_every_ticks")]
    pub cleanup_every_ticks: u64,
    #[serde(default = "default_true")]
    pub water_continuity: bool,
    #[serde(default = "default_true")]
    pub inline_fallback: bool,
    #[serde(default = "default_true")]
    pub accelerated_sampling: bool,
    /// Skip the worker pool and build on the calling thread.
    #[serde(default)]
    pub sync: bool,
}

fn default_chunk_size() -> f32 {
    100.0
}
fn default_resolution() -> u32 {
    32
}
fn default_render_radius() -> u32 {
    6
}
fn default_max_concurrent() -> usize {
    8
}
fn default_ready_per_tick() -> usize {
    1
}
fn default_tick_ms() -> u64 {
    100
}
fn default_camera_update_ms() -> u64 {
    250
}
fn default_stale_secs() -> u64 {
    300
}
fn default_cleanup_every_ticks() -> u64 {
    50
}
fn default_true() -> bool {
    true
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            resolution: default_resolution(),
            render_radius: default_render_radius(),
            max_concurrent: default_max_concurrent(),
            workers: None,
            ready_per_tick: default_ready_per_tick(),
            tick_ms: default_tick_ms(),
            camera_update_ms: default_camera_update_ms(),
            stale_secs: default_stale_secs(),
            cleanup_every_ticks: default_cleanup_every_ticks(),
            water_continuity: true,
            inline_fallback: true,
            accelerated_sampling: true,
            sync: false,
        }
    }
}

impl StreamConfig {
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    #[inline]
    pub fn camera_update_interval(&self) -> Duration {
        Duration::from_millis(self.camera_update_ms)
    }

    #[inline]
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }
}
