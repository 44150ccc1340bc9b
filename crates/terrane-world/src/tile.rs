//! Batch height sampling for whole chunk grids.
//!
//! The sampler fans one grid out over a dedicated thread pool. It only ever
//! accelerates raw height reads; callers keep the per-vertex path as fallback.

use std::fmt;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::grid_point;
use crate::height::HeightField;

#[derive(Debug, Clone, PartialEq)]
pub enum SampleError {
    Setup(String),
    EmptyGrid,
    LengthMismatch { expected: usize, got: usize },
    NonFinite { index: usize },
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::Setup(msg) => write!(f, "tile sampler setup failed: {}", msg),
            SampleError::EmptyGrid => write!(f, "tile sampler asked for an empty grid"),
            SampleError::LengthMismatch { expected, got } => {
                write!(f, "tile readback length {} != expected {}", got, expected)
            }
            SampleError::NonFinite { index } => {
                write!(f, "tile readback has non-finite sample at {}", index)
            }
        }
    }
}

impl std::error::Error for SampleError {}

pub struct TileSampler {
    pool: ThreadPool,
}

impl TileSampler {
    pub fn new(threads: usize) -> Result<Self, SampleError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("terrane-tile-{i}"))
            .build()
            .map_err(|e| SampleError::Setup(e.to_string()))?;
        Ok(Self { pool })
    }

    /// One-time setup; a failure is logged and the caller keeps the CPU path.
    pub fn try_new(threads: usize) -> Option<Self> {
        match Self::new(threads) {
            Ok(s) => {
                log::debug!(target: "worldgen", "tile sampler ready ({} threads)", s.threads());
                Some(s)
            }
            Err(e) => {
                log::warn!(target: "worldgen", "{}; using per-vertex sampling", e);
                None
            }
        }
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Heights for a `side x side` grid, row-major by z then x.
    pub fn sample_grid(
        &self,
        field: &HeightField,
        origin_x: f32,
        origin_z: f32,
        step: f32,
        side: usize,
    ) -> Result<Vec<f32>, SampleError> {
        if side == 0 {
            return Err(SampleError::EmptyGrid);
        }
        let mut out = vec![0.0f32; side * side];
        self.pool.install(|| {
            out.par_chunks_mut(side).enumerate().for_each(|(row, slots)| {
                let wz = grid_point(origin_z, step, row);
                for (col, h) in slots.iter_mut().enumerate() {
                    *h = field.height(grid_point(origin_x, step, col), wz);
                }
            });
        });
        validate_grid(&out, side)?;
        Ok(out)
    }
}

/// Checks a readback before it replaces per-vertex sampling.
pub(crate) fn validate_grid(heights: &[f32], side: usize) -> Result<(), SampleError> {
    let expected = side * side;
    if heights.len() != expected {
        return Err(SampleError::LengthMismatch {
            expected,
            got: heights.len(),
        });
    }
    if let Some(index) = heights.iter().position(|h| !h.is_finite()) {
        return Err(SampleError::NonFinite { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worldgen::GeneratorSettings;

    #[test]
    fn batch_matches_per_vertex_bits() {
        let field = HeightField::new(&GeneratorSettings::with_seed(42));
        let sampler = TileSampler::new(2).unwrap();
        let side = 9;
        let step = 12.5;
        let heights = sampler.sample_grid(&field, -100.0, 300.0, step, side).unwrap();
        for row in 0..side {
            for col in 0..side {
                let cpu = field.height(grid_point(-100.0, step, col), grid_point(300.0, step, row));
                assert_eq!(heights[row * side + col].to_bits(), cpu.to_bits());
            }
        }
    }

    #[test]
    fn validation_rejects_bad_readbacks() {
        assert_eq!(
            validate_grid(&[0.0; 3], 2),
            Err(SampleError::LengthMismatch { expected: 4, got: 3 })
        );
        assert_eq!(
            validate_grid(&[0.0, f32::NAN, 0.0, 0.0], 2),
            Err(SampleError::NonFinite { index: 1 })
        );
        assert!(validate_grid(&[1.0; 4], 2).is_ok());
    }

    #[test]
    fn empty_grid_is_an_error() {
        let field = HeightField::new(&GeneratorSettings::default());
        let sampler = TileSampler::new(1).unwrap();
        assert_eq!(
            sampler.sample_grid(&field, 0.0, 0.0, 1.0, 0),
            Err(SampleError::EmptyGrid)
        );
    }
}
