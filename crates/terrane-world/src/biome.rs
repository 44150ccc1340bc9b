//! Biome classification and vertex coloring.

use crate::height::{AuxChannel, HeightField};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BiomeTag {
    Water = 0,
    Sand = 1,
    Rocks = 2,
    Forest = 3,
    Fields = 4,
}

impl BiomeTag {
    pub const ALL: [BiomeTag; 5] = [
        BiomeTag::Water,
        BiomeTag::Sand,
        BiomeTag::Rocks,
        BiomeTag::Forest,
        BiomeTag::Fields,
    ];

    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.get(b as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BiomeTag::Water => "water",
            BiomeTag::Sand => "sand",
            BiomeTag::Rocks => "rocks",
            BiomeTag::Forest => "forest",
            BiomeTag::Fields => "fields",
        }
    }
}

/// First matching rule wins; see `BiomeRules` for the thresholds.
pub fn classify(field: &HeightField, wx: f32, wz: f32, height: f32) -> BiomeTag {
    let r = field.rules();
    if height < r.water_level {
        return BiomeTag::Water;
    }
    let moisture = field.aux_noise(AuxChannel::Moisture, wx, wz);
    let temperature = field.aux_noise(AuxChannel::Temperature, wx, wz);
    if height < r.sand_level
        || (moisture > r.dune_moisture
            && temperature > r.dune_temperature
            && height < r.dune_max_height)
    {
        return BiomeTag::Sand;
    }
    if height > r.rock_level {
        return BiomeTag::Rocks;
    }
    if moisture >= r.forest_moisture
        && temperature >= r.forest_temperature
        && height >= r.forest_min_height
        && height <= r.forest_max_height
    {
        return BiomeTag::Forest;
    }
    BiomeTag::Fields
}

type Rgb = [f32; 3];

struct Swatch {
    base: Rgb,
    variations: &'static [Rgb],
}

const WATER: Swatch = Swatch {
    base: [0.18, 0.36, 0.62],
    variations: &[[0.10, 0.24, 0.48], [0.22, 0.44, 0.70]],
};
const SAND: Swatch = Swatch {
    base: [0.86, 0.80, 0.58],
    variations: &[[0.78, 0.71, 0.50], [0.93, 0.88, 0.68]],
};
const ROCKS: Swatch = Swatch {
    base: [0.50, 0.48, 0.46],
    variations: &[[0.42, 0.40, 0.38], [0.62, 0.60, 0.58], [0.92, 0.93, 0.95]],
};
const FOREST: Swatch = Swatch {
    base: [0.16, 0.42, 0.14],
    variations: &[[0.10, 0.32, 0.10], [0.24, 0.50, 0.20]],
};
const FIELDS: Swatch = Swatch {
    base: [0.45, 0.65, 0.28],
    variations: &[[0.55, 0.72, 0.33], [0.62, 0.60, 0.30]],
};

/// Maximum pull of a vertex color from its base toward the selected variation.
pub const VARIATION_BLEND: f32 = 0.5;

#[derive(Clone, Copy, Debug)]
pub struct BiomePalette {
    min_height: f32,
    max_height: f32,
}

impl BiomePalette {
    pub fn new(min_height: f32, max_height: f32) -> Self {
        Self {
            min_height,
            max_height,
        }
    }

    pub fn for_field(field: &HeightField) -> Self {
        let r = field.rules();
        Self::new(r.color_min_height, r.color_max_height)
    }

    fn swatch(biome: BiomeTag) -> &'static Swatch {
        match biome {
            BiomeTag::Water => &WATER,
            BiomeTag::Sand => &SAND,
            BiomeTag::Rocks => &ROCKS,
            BiomeTag::Forest => &FOREST,
            BiomeTag::Fields => &FIELDS,
        }
    }

    pub fn base_color(biome: BiomeTag) -> Rgb {
        Self::swatch(biome).base
    }

    /// Per-channel `(min, max)` over the base color and all of its variations.
    pub fn color_bounds(biome: BiomeTag) -> (Rgb, Rgb) {
        let sw = Self::swatch(biome);
        let mut lo = sw.base;
        let mut hi = sw.base;
        for v in sw.variations {
            for c in 0..3 {
                lo[c] = lo[c].min(v[c]);
                hi[c] = hi[c].max(v[c]);
            }
        }
        (lo, hi)
    }

    pub fn color(&self, biome: BiomeTag, height: f32) -> Rgb {
        let sw = Self::swatch(biome);
        let span = (self.max_height - self.min_height).max(1e-3);
        let frac = ((height - self.min_height) / span).clamp(0.0, 1.0);
        let n = sw.variations.len();
        if n == 0 {
            return sw.base;
        }
        let scaled = frac * n as f32;
        let idx = (scaled as usize).min(n - 1);
        let t = (scaled - idx as f32).clamp(0.0, 1.0) * VARIATION_BLEND;
        let v = sw.variations[idx];
        [
            sw.base[0] + (v[0] - sw.base[0]) * t,
            sw.base[1] + (v[1] - sw.base[1]) * t,
            sw.base[2] + (v[2] - sw.base[2]) * t,
        ]
    }
}
