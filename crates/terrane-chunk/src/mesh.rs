use terrane_world::ChunkCoord;

use crate::protocol::GenerationResult;

/// Render-ready surface for one chunk: chunk-local geometry plus the world
/// offset a sink places it at.
#[derive(Clone, Debug, Default)]
pub struct ChunkMesh {
    pub coord: ChunkCoord,
    pub origin: [f32; 3],
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub colors: Vec<f32>,
    pub indices: Vec<u32>,
    pub biome_tags: Vec<u8>,
    pub min_height: f32,
    pub max_height: f32,
}

impl ChunkMesh {
    /// `None` for failed results; the caller treats those as retryable.
    pub fn from_result(result: GenerationResult, chunk_size: f32) -> Option<Self> {
        if !result.success {
            return None;
        }
        let coord = result.coord();
        let normals = vertex_normals(&result.vertices, &result.indices);
        Some(Self {
            coord,
            origin: [
                coord.x as f32 * chunk_size,
                0.0,
                coord.z as f32 * chunk_size,
            ],
            positions: result.vertices,
            normals,
            colors: result.colors,
            indices: result.indices,
            biome_tags: result.biome_tags,
            min_height: result.min_height,
            max_height: result.max_height,
        })
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Colors packed as RGBA8 for upload.
    pub fn colors_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.vertex_count() * 4);
        for c in self.colors.chunks_exact(3) {
            for &v in c {
                out.push((v.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
            out.push(255);
        }
        out
    }
}

// Area-weighted smooth normals; edges see only this chunk's triangles.
fn vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let mut acc = vec![0.0f32; positions.len()];
    let p = |i: usize| [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let (pa, pb, pc) = (p(a), p(b), p(c));
        let e1 = [pb[0] - pa[0], pb[1] - pa[1], pb[2] - pa[2]];
        let e2 = [pc[0] - pa[0], pc[1] - pa[1], pc[2] - pa[2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        for v in [a, b, c] {
            for k in 0..3 {
                acc[v * 3 + k] += n[k];
            }
        }
    }
    for n in acc.chunks_exact_mut(3) {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len > 1e-12 {
            n.iter_mut().for_each(|c| *c /= len);
        } else {
            n.copy_from_slice(&[0.0, 1.0, 0.0]);
        }
    }
    acc
}
