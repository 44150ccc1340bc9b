use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the world-space point `(wx, wz)`.
    #[inline]
    pub fn from_world(wx: f32, wz: f32, chunk_size: f32) -> Self {
        Self {
            x: (wx / chunk_size).floor() as i32,
            z: (wz / chunk_size).floor() as i32,
        }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dz = i64::from(self.z - other.z);
        dx * dx + dz * dz
    }

    /// Euclidean distance in chunk units.
    #[inline]
    pub fn distance(self, other: ChunkCoord) -> f32 {
        (self.distance_sq(other) as f64).sqrt() as f32
    }

    pub fn neighbors8(self) -> [ChunkCoord; 8] {
        [
            self.offset(-1, -1),
            self.offset(0, -1),
            self.offset(1, -1),
            self.offset(-1, 0),
            self.offset(1, 0),
            self.offset(-1, 1),
            self.offset(0, 1),
            self.offset(1, 1),
        ]
    }

    /// All coordinates within `radius` chunks of `self` (inclusive, circular test).
    pub fn within_radius(self, radius: i32) -> Vec<ChunkCoord> {
        let r = radius.max(0);
        let limit = i64::from(r) * i64::from(r);
        let mut out = Vec::new();
        for dz in -r..=r {
            for dx in -r..=r {
                let c = self.offset(dx, dz);
                if self.distance_sq(c) <= limit {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Canonical `"x,z"` key shared with the render boundary.
    pub fn key(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseChunkKeyError(pub String);

impl fmt::Display for ParseChunkKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid chunk key: {:?}", self.0)
    }
}

impl std::error::Error for ParseChunkKeyError {}

impl FromStr for ChunkCoord {
    type Err = ParseChunkKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseChunkKeyError(s.to_string());
        let (x, z) = s.split_once(',').ok_or_else(err)?;
        let x = x.trim().parse::<i32>().map_err(|_| err())?;
        let z = z.trim().parse::<i32>().map_err(|_| err())?;
        Ok(Self { x, z })
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<ChunkCoord> for (i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.x, value.z)
    }
}
