// Unsafe is required for raylib mesh upload.
use std::error::Error;
use std::time::Instant;

use hashbrown::HashMap;
use raylib::prelude::*;
use terrane_chunk::ChunkMesh;
use terrane_stream::{MaterialMode, MeshHandle, RenderSink, TerrainManager};
use terrane_world::ChunkCoord;

use crate::config::TerrainConfig;
use crate::day_cycle::DayCycle;
use crate::watch::ConfigWatch;

const MAX_MESH_VERTICES: usize = u16::MAX as usize;

struct GpuChunk {
    model: Model,
    origin: Vector3,
    mode: MaterialMode,
}

struct Upload {
    handle: MeshHandle,
    mesh: ChunkMesh,
    mode: MaterialMode,
}

/// Render sink that defers GPU uploads to the frame loop, where the raylib handle lives.
pub struct ViewerSink {
    next: u64,
    pending: Vec<Upload>,
    chunks: HashMap<MeshHandle, GpuChunk>,
    water: HashMap<String, (i32, i32, f32)>,
    water_level: f32,
}

impl ViewerSink {
    fn new(water_level: f32) -> Self {
        Self {
            next: 0,
            pending: Vec::new(),
            chunks: HashMap::new(),
            water: HashMap::new(),
            water_level,
        }
    }

    fn flush(&mut self, rl: &mut RaylibHandle, thread: &RaylibThread) {
        for up in self.pending.drain(..) {
            match upload_mesh(rl, thread, &up.mesh) {
                Some(model) => {
                    let [ox, oy, oz] = up.mesh.origin;
                    self.chunks.insert(
                        up.handle,
                        GpuChunk {
                            model,
                            origin: Vector3::new(ox, oy, oz),
                            mode: up.mode,
                        },
                    );
                }
                None => log::warn!(target: "viewer", "upload failed for chunk {}", up.mesh.coord),
            }
        }
    }

    fn draw<D: RaylibDraw3D>(&self, d3: &mut D, tint: Color) {
        for c in self.chunks.values() {
            match c.mode {
                MaterialMode::Shaded => d3.draw_model(&c.model, c.origin, 1.0, tint),
                MaterialMode::Wireframe => d3.draw_model_wires(&c.model, c.origin, 1.0, tint),
            }
        }
        let water = Color::new(40, 110, 190, 150);
        for &(x, z, size) in self.water.values() {
            let center = Vector3::new(
                x as f32 * size + size * 0.5,
                self.water_level,
                z as f32 * size + size * 0.5,
            );
            d3.draw_plane(center, Vector2::new(size, size), water);
        }
    }
}

impl RenderSink for ViewerSink {
    fn create_mesh(&mut self, coord: ChunkCoord, mesh: &ChunkMesh, mode: MaterialMode) -> MeshHandle {
        self.next += 1;
        let handle = MeshHandle(self.next);
        if mesh.vertex_count() > MAX_MESH_VERTICES {
            log::warn!(
                target: "viewer",
                "chunk {} has {} vertices; raylib meshes take at most {}",
                coord,
                mesh.vertex_count(),
                MAX_MESH_VERTICES
            );
            return handle;
        }
        self.pending.push(Upload {
            handle,
            mesh: mesh.clone(),
            mode,
        });
        handle
    }

    fn destroy_mesh(&mut self, handle: MeshHandle) {
        self.pending.retain(|u| u.handle != handle);
        // Dropping the model unloads it from the GPU.
        self.chunks.remove(&handle);
    }

    fn set_material(&mut self, handle: MeshHandle, mode: MaterialMode) {
        if let Some(c) = self.chunks.get_mut(&handle) {
            c.mode = mode;
        } else if let Some(u) = self.pending.iter_mut().find(|u| u.handle == handle) {
            u.mode = mode;
        }
    }

    fn add_or_refresh_water_surface(&mut self, chunk_x: i32, chunk_z: i32, size: f32) {
        self.water
            .insert(ChunkCoord::new(chunk_x, chunk_z).key(), (chunk_x, chunk_z, size));
    }

    fn remove_water_surface(&mut self, key: &str) {
        self.water.remove(key);
    }
}

fn upload_mesh(rl: &mut RaylibHandle, thread: &RaylibThread, cpu: &ChunkMesh) -> Option<Model> {
    let verts = cpu.vertex_count();
    if verts == 0 || cpu.indices.is_empty() {
        return None;
    }
    let colors = cpu.colors_rgba8();
    let indices: Vec<u16> = cpu.indices.iter().map(|&i| i as u16).collect();
    let mut raw: raylib::ffi::Mesh = unsafe { std::mem::zeroed() };
    raw.vertexCount = verts as i32;
    raw.triangleCount = (indices.len() / 3) as i32;
    unsafe {
        let vbytes = (verts * 3 * std::mem::size_of::<f32>()) as u32;
        let tbytes = (verts * 2 * std::mem::size_of::<f32>()) as u32;
        let cbytes = (verts * 4) as u32;
        let ibytes = (indices.len() * std::mem::size_of::<u16>()) as u32;
        raw.vertices = raylib::ffi::MemAlloc(vbytes) as *mut f32;
        raw.normals = raylib::ffi::MemAlloc(vbytes) as *mut f32;
        raw.texcoords = raylib::ffi::MemAlloc(tbytes) as *mut f32;
        raw.colors = raylib::ffi::MemAlloc(cbytes) as *mut u8;
        raw.indices = raylib::ffi::MemAlloc(ibytes) as *mut u16;
        std::ptr::copy_nonoverlapping(cpu.positions.as_ptr(), raw.vertices, verts * 3);
        std::ptr::copy_nonoverlapping(cpu.normals.as_ptr(), raw.normals, verts * 3);
        std::ptr::copy_nonoverlapping(colors.as_ptr(), raw.colors, verts * 4);
        std::ptr::copy_nonoverlapping(indices.as_ptr(), raw.indices, indices.len());
    }
    let mut mesh = unsafe { raylib::core::models::Mesh::from_raw(raw) };
    unsafe {
        mesh.upload(false);
    }
    rl.load_model_from_mesh(thread, unsafe { mesh.make_weak() }).ok()
}

struct FlyCamera {
    position: Vector3,
    yaw: f32,
    pitch: f32,
    speed: f32,
}

impl FlyCamera {
    fn forward(&self) -> Vector3 {
        let (y, p) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vector3::new(y.cos() * p.cos(), p.sin(), y.sin() * p.cos()).normalized()
    }

    fn camera(&self) -> Camera3D {
        Camera3D::perspective(
            self.position,
            self.position + self.forward(),
            Vector3::up(),
            70.0,
        )
    }

    fn update(&mut self, rl: &RaylibHandle, dt: f32) {
        let md = rl.get_mouse_delta();
        self.yaw += md.x * 0.1;
        self.pitch = (self.pitch - md.y * 0.1).clamp(-89.0, 89.0);
        let f = self.forward();
        let r = f.cross(Vector3::up()).normalized();
        let mut wish = Vector3::zero();
        let keys = [
            (KeyboardKey::KEY_W, f),
            (KeyboardKey::KEY_S, f * -1.0),
            (KeyboardKey::KEY_D, r),
            (KeyboardKey::KEY_A, r * -1.0),
            (KeyboardKey::KEY_E, Vector3::up()),
            (KeyboardKey::KEY_Q, Vector3::up() * -1.0),
        ];
        for (key, dir) in keys {
            if rl.is_key_down(key) {
                wish += dir;
            }
        }
        if wish.length() > 0.0 {
            let boost = if rl.is_key_down(KeyboardKey::KEY_LEFT_SHIFT) { 4.0 } else { 1.0 };
            self.position += wish.normalized() * self.speed * boost * dt;
        }
    }
}

pub fn run(cfg: &TerrainConfig, watch: Option<&ConfigWatch>) -> Result<(), Box<dyn Error>> {
    let (mut rl, thread) = raylib::init()
        .size(1280, 720)
        .title("terrane")
        .resizable()
        .build();
    rl.set_target_fps(60);
    rl.disable_cursor();

    let sink = ViewerSink::new(cfg.biomes.water_level);
    let mut manager = TerrainManager::new(cfg.stream.clone(), cfg.settings(), sink)?;
    let size = cfg.stream.chunk_size;
    let mut cam = FlyCamera {
        position: Vector3::new(size * 0.5, cfg.generator.height_scale * 1.5, size * 0.5),
        yaw: -45.0,
        pitch: -20.0,
        speed: size * 0.5,
    };
    let mut day = DayCycle::new(240.0);
    manager.update_camera_position(cam.position.x, cam.position.z);
    manager.start();

    while !rl.window_should_close() {
        let dt = rl.get_frame_time();
        if let Some(next) = watch.and_then(|w| w.poll()) {
            manager.sink_mut().water_level = next.biomes.water_level;
            manager.set_render_radius(next.stream.render_radius);
            let settings = next.settings();
            if &settings != manager.settings() {
                manager.reset(settings);
            }
        }
        cam.update(&rl, dt);
        if rl.is_key_pressed(KeyboardKey::KEY_F) {
            let w = !manager.wireframe();
            manager.set_wireframe(w);
        }
        if rl.is_key_pressed(KeyboardKey::KEY_EQUAL) {
            let r = manager.render_radius() + 1;
            manager.set_render_radius(r);
        }
        if rl.is_key_pressed(KeyboardKey::KEY_MINUS) {
            let r = manager.render_radius().saturating_sub(1);
            manager.set_render_radius(r);
        }
        let light = if rl.is_key_down(KeyboardKey::KEY_RIGHT_BRACKET) {
            day.scrub(0.25 * dt)
        } else if rl.is_key_down(KeyboardKey::KEY_LEFT_BRACKET) {
            day.scrub(-0.25 * dt)
        } else {
            day.advance(dt)
        };

        manager.update_camera_position(cam.position.x, cam.position.z);
        manager.update(Instant::now());
        manager.sink_mut().flush(&mut rl, &thread);

        let stats = manager.stats();
        let [sr, sg, sb] = light.sky_rgb8();
        let g = light.terrain_tint();
        let mut d = rl.begin_drawing(&thread);
        d.clear_background(Color::new(sr, sg, sb, 255));
        {
            let mut d3 = d.begin_mode3D(cam.camera());
            manager.sink().draw(&mut d3, Color::new(g, g, g, 255));
        }
        let hud = format!(
            "{:02.0}h  center {}  radius {}  chunks {} rendered {} generating {}  workers {}/{} queued {}",
            light.hour(),
            manager.center(),
            manager.render_radius(),
            stats.states.total,
            stats.states.rendered,
            stats.states.generating,
            stats.pool.busy_workers,
            stats.pool.total_workers,
            stats.pool.queued_tasks
        );
        d.draw_text(&hud, 12, 12, 18, Color::DARKGRAY);
        d.draw_text("WASDQE move  F wireframe  +/- radius  [ ] time", 12, 36, 16, Color::DARKGRAY);
        d.draw_fps(12, 60);
    }
    log::info!(target: "viewer", "closing: {:?}", manager.stats());
    manager.dispose();
    Ok(())
}
