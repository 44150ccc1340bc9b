use hashbrown::{HashMap, HashSet};
use terrane_chunk::ChunkMesh;
use terrane_world::ChunkCoord;

/// Opaque token for a mesh owned by the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaterialMode {
    #[default]
    Shaded,
    Wireframe,
}

impl MaterialMode {
    #[inline]
    pub fn from_wireframe(wireframe: bool) -> Self {
        if wireframe {
            MaterialMode::Wireframe
        } else {
            MaterialMode::Shaded
        }
    }
}

/// Host side of streaming: owns meshes and water surfaces.
pub trait RenderSink {
    fn create_mesh(&mut self, coord: ChunkCoord, mesh: &ChunkMesh, mode: MaterialMode)
    -> MeshHandle;

    fn destroy_mesh(&mut self, handle: MeshHandle);

    /// Switches an existing mesh's material.
    fn set_material(&mut self, _handle: MeshHandle, _mode: MaterialMode) {}

    fn add_or_refresh_water_surface(&mut self, chunk_x: i32, chunk_z: i32, size: f32);

    fn remove_water_surface(&mut self, key: &str);
}

#[derive(Clone, Debug)]
pub struct RecordedMesh {
    pub coord: ChunkCoord,
    pub mode: MaterialMode,
    pub vertices: usize,
    pub triangles: usize,
}

/// Bookkeeping-only sink for headless runs and tests.
#[derive(Default)]
pub struct RecordingSink {
    next: u64,
    meshes: HashMap<MeshHandle, RecordedMesh>,
    water: HashSet<String>,
    pub created: u64,
    pub destroyed: u64,
    /// Every coordinate a mesh was ever created for, in order.
    pub history: Vec<ChunkCoord>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn meshes(&self) -> impl Iterator<Item = &RecordedMesh> {
        self.meshes.values()
    }

    pub fn mesh_coords(&self) -> Vec<ChunkCoord> {
        let mut out: Vec<ChunkCoord> = self.meshes.values().map(|m| m.coord).collect();
        out.sort();
        out
    }

    pub fn water_count(&self) -> usize {
        self.water.len()
    }

    pub fn has_water(&self, coord: ChunkCoord) -> bool {
        self.water.contains(&coord.key())
    }

    pub fn triangles(&self) -> usize {
        self.meshes.values().map(|m| m.triangles).sum()
    }
}

impl RenderSink for RecordingSink {
    fn create_mesh(
        &mut self,
        coord: ChunkCoord,
        mesh: &ChunkMesh,
        mode: MaterialMode,
    ) -> MeshHandle {
        self.next += 1;
        let handle = MeshHandle(self.next);
        self.meshes.insert(
            handle,
            RecordedMesh {
                coord,
                mode,
                vertices: mesh.vertex_count(),
                triangles: mesh.triangle_count(),
            },
        );
        self.created += 1;
        self.history.push(coord);
        handle
    }

    fn destroy_mesh(&mut self, handle: MeshHandle) {
        if self.meshes.remove(&handle).is_some() {
            self.destroyed += 1;
        }
    }

    fn set_material(&mut self, handle: MeshHandle, mode: MaterialMode) {
        if let Some(m) = self.meshes.get_mut(&handle) {
            m.mode = mode;
        }
    }

    fn add_or_refresh_water_surface(&mut self, chunk_x: i32, chunk_z: i32, _size: f32) {
        self.water.insert(ChunkCoord::new(chunk_x, chunk_z).key());
    }

    fn remove_water_surface(&mut self, key: &str) {
        self.water.remove(key);
    }
}
