use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

mod config;
mod day_cycle;
mod headless;
#[cfg(feature = "viewer")]
mod viewer;
mod watch;

use config::{Overrides, TerrainConfig, load_config_from_path};
use headless::{FlightPlan, run_headless};
use watch::ConfigWatch;

#[derive(Parser, Debug)]
#[command(name = "terrane", version, about = "Streams procedurally generated chunk terrain")]
struct Args {
    /// TOML file with [generator], [shape], [biomes] and [stream] tables
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<i32>,
    /// Render radius in chunks
    #[arg(long)]
    radius: Option<u32>,
    /// Grid cells per chunk side
    #[arg(long)]
    resolution: Option<u32>,
    /// Worker threads (0 forces the inline fallback)
    #[arg(long)]
    workers: Option<usize>,
    /// Build chunks on the main thread
    #[arg(long)]
    sync: bool,
    /// Frames to fly in headless mode
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Headless flight speed in world units per second
    #[arg(long, default_value_t = 40.0)]
    speed: f32,
    /// Reload the config file when it changes
    #[arg(long)]
    watch_config: bool,
    /// Open a raylib window instead of flying headless
    #[arg(long)]
    viewer: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None => TerrainConfig::default(),
    };
    Overrides {
        seed: args.seed,
        radius: args.radius,
        resolution: args.resolution,
        workers: args.workers,
        sync: args.sync,
    }
    .apply(&mut cfg);
    cfg.validate()?;
    log::info!(
        target: "host",
        "seed {} chunk size {} resolution {} radius {}",
        cfg.generator.seed,
        cfg.stream.chunk_size,
        cfg.stream.resolution,
        cfg.stream.render_radius
    );

    let watch = match (&args.config, args.watch_config) {
        (Some(path), true) => match ConfigWatch::new(path) {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!(target: "config", "config watch unavailable: {}", e);
                None
            }
        },
        (None, true) => {
            log::warn!(target: "config", "--watch-config needs --config; ignoring");
            None
        }
        _ => None,
    };

    if args.viewer {
        #[cfg(feature = "viewer")]
        {
            viewer::run(&cfg, watch.as_ref())?;
            return Ok(());
        }
        #[cfg(not(feature = "viewer"))]
        {
            log::warn!(target: "host", "built without the `viewer` feature; flying headless");
        }
    }

    let plan = FlightPlan {
        frames: args.ticks,
        speed: args.speed,
        frame: Duration::from_millis(16),
        ..FlightPlan::default()
    };
    let report = run_headless(&cfg, &plan, watch.as_ref())?;
    log::info!(target: "host", "final stats: {:?}", report.stats);
    Ok(())
}
