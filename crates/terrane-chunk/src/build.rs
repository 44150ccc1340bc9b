use std::time::Instant;

use terrane_world::{BiomePalette, GeneratorSettings, HeightField, TileSampler, classify, grid_point};

use crate::protocol::{GenerationRequest, GenerationResult};

/// Largest accepted cells-per-edge; keeps index buffers well inside `u32`.
pub const MAX_RESOLUTION: u32 = 1024;

fn validate(req: &GenerationRequest) -> Result<(), String> {
    if req.resolution == 0 {
        return Err("resolution must be at least 1".to_string());
    }
    if req.resolution > MAX_RESOLUTION {
        return Err(format!(
            "resolution {} exceeds maximum {}",
            req.resolution, MAX_RESOLUTION
        ));
    }
    if !(req.chunk_size.is_finite() && req.chunk_size > 0.0) {
        return Err(format!("chunk size {} must be positive", req.chunk_size));
    }
    Ok(())
}

/// Builds the surface grid for one chunk.
///
/// `heights`, when given, must hold `(r+1)^2` samples row-major by z then x
/// taken at the same grid points; anything else is ignored and the height field
/// is sampled per vertex.
pub fn build_chunk_geometry(
    req: &GenerationRequest,
    field: &HeightField,
    heights: Option<&[f32]>,
) -> GenerationResult {
    if let Err(e) = validate(req) {
        return GenerationResult::failed(req, e);
    }
    let r = req.resolution as usize;
    let side = r + 1;
    let count = side * side;
    let step = req.step();
    let (ox, oz) = req.origin();

    let heights = match heights {
        Some(h) if h.len() == count => Some(h),
        Some(h) => {
            log::debug!(
                target: "worldgen",
                "chunk {} ignoring {} presampled heights (want {})",
                req.coord(),
                h.len(),
                count
            );
            None
        }
        None => None,
    };

    let palette = BiomePalette::for_field(field);
    let mut vertices = Vec::with_capacity(count * 3);
    let mut colors = Vec::with_capacity(count * 3);
    let mut biome_tags = Vec::with_capacity(count);
    let mut min_height = f32::INFINITY;
    let mut max_height = f32::NEG_INFINITY;

    for row in 0..side {
        let wz = grid_point(oz, step, row);
        for col in 0..side {
            let wx = grid_point(ox, step, col);
            let h = match heights {
                Some(hs) => hs[row * side + col],
                None => field.height(wx, wz),
            };
            min_height = min_height.min(h);
            max_height = max_height.max(h);

            vertices.extend_from_slice(&[col as f32 * step, h, row as f32 * step]);
            let biome = classify(field, wx, wz, h);
            colors.extend_from_slice(&palette.color(biome, h));
            biome_tags.push(biome.as_byte());
        }
    }

    // Two triangles per cell, counter-clockwise seen from +y.
    let mut indices = Vec::with_capacity(r * r * 6);
    let stride = side as u32;
    for row in 0..r as u32 {
        for col in 0..r as u32 {
            let i0 = row * stride + col;
            let i1 = i0 + 1;
            let i2 = i0 + stride;
            let i3 = i2 + 1;
            indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
        }
    }

    GenerationResult {
        id: req.id,
        chunk_x: req.chunk_x,
        chunk_z: req.chunk_z,
        vertices,
        indices,
        colors,
        biome_tags,
        min_height,
        max_height,
        water_level: field.water_level(),
        success: true,
        error: None,
    }
}

/// Stand-alone build that constructs its own height field from the request.
pub fn generate_chunk_geometry(req: &GenerationRequest) -> GenerationResult {
    let field = HeightField::new(&req.settings);
    build_chunk_geometry(req, &field, None)
}

/// Builds through the batch sampler when one is available, falling back to
/// per-vertex sampling on any sampler error.
pub fn generate_with_sampler(
    req: &GenerationRequest,
    field: &HeightField,
    sampler: Option<&TileSampler>,
) -> GenerationResult {
    let Some(sampler) = sampler else {
        return build_chunk_geometry(req, field, None);
    };
    if validate(req).is_err() {
        return build_chunk_geometry(req, field, None);
    }
    let (ox, oz) = req.origin();
    match sampler.sample_grid(field, ox, oz, req.step(), req.side()) {
        Ok(heights) => build_chunk_geometry(req, field, Some(&heights)),
        Err(e) => {
            log::debug!(target: "worldgen", "chunk {}: {}; sampling per vertex", req.coord(), e);
            build_chunk_geometry(req, field, None)
        }
    }
}

/// Per-worker height field cache keyed by the generator settings.
#[derive(Default)]
pub struct GeneratorCache {
    current: Option<(GeneratorSettings, HeightField)>,
    rebuilds: u64,
}

impl GeneratorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_for(&mut self, settings: &GeneratorSettings) -> &HeightField {
        if matches!(&self.current, Some((s, _)) if s != settings) {
            self.current = None;
        }
        let rebuilds = &mut self.rebuilds;
        let (_, field) = self.current.get_or_insert_with(|| {
            *rebuilds += 1;
            log::debug!(
                target: "worldgen",
                "height field rebuilt for seed {}",
                settings.generator.seed
            );
            (settings.clone(), HeightField::new(settings))
        });
        field
    }

    /// Number of times a height field was constructed.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn generate(&mut self, req: &GenerationRequest) -> GenerationResult {
        let t0 = Instant::now();
        let out = build_chunk_geometry(req, self.field_for(&req.settings), None);
        log::trace!(
            target: "worldgen",
            "chunk {} built in {}us ({} verts)",
            req.coord(),
            t0.elapsed().as_micros().min(u128::from(u32::MAX)),
            out.vertex_count()
        );
        out
    }
}
