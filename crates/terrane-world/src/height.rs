use fastnoise_lite::{FastNoiseLite, NoiseType};

use crate::worldgen::{BiomeRules, GeneratorConfig, GeneratorSettings, TerrainShape};

// Seed offsets keep every layer decorrelated from the base octaves and from each other.
const SEED_HILL: i32 = 0x2F1B;
const SEED_MOUNTAIN: i32 = 0x51C3;
const SEED_LAKE: i32 = 0x7A09;
const SEED_VALLEY: i32 = 0x1D6E;
const SEED_MOISTURE: i32 = 0x0C47_3A21;
const SEED_TEMPERATURE: i32 = 0x3E8B_15F7;
const SEED_FEATURE: i32 = 0x6B0D_2259;

// Climate samples are also shifted in space so coincident seeds never line up.
const MOISTURE_SHIFT: (f32, f32) = (1_013.0, -2_027.0);
const TEMPERATURE_SHIFT: (f32, f32) = (-3_061.0, 1_499.0);
const FEATURE_SHIFT: (f32, f32) = (577.0, 4_211.0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuxChannel {
    Moisture,
    Temperature,
    Feature,
}

/// Deterministic height function for one generator configuration.
///
/// Holds no mutable state; a single instance may be sampled from any number of
/// threads and always yields bit-identical output for identical inputs.
pub struct HeightField {
    octaves: Vec<(FastNoiseLite, f32)>,
    amplitude_sum: f32,
    height_scale: f32,
    shape: TerrainShape,
    hill: FastNoiseLite,
    mountain: FastNoiseLite,
    lake: FastNoiseLite,
    valley: FastNoiseLite,
    moisture: FastNoiseLite,
    temperature: FastNoiseLite,
    feature: FastNoiseLite,
    rules: BiomeRules,
}

fn layer(seed: i32, noise_type: NoiseType, frequency: f32) -> FastNoiseLite {
    let mut n = FastNoiseLite::with_seed(seed);
    n.set_noise_type(Some(noise_type));
    n.set_frequency(Some(frequency));
    n
}

#[inline]
fn unit(v: f32) -> f32 {
    (v * 0.5 + 0.5).clamp(0.0, 1.0)
}

impl HeightField {
    pub fn new(settings: &GeneratorSettings) -> Self {
        let g: &GeneratorConfig = &settings.generator;
        let seed = g.seed;
        let shape = settings.shape.clone();
        let rules = settings.biomes.clone();

        let mut layers = Vec::with_capacity(g.octaves as usize);
        let mut frequency = g.scale;
        let mut amplitude = 1.0f32;
        let mut amplitude_sum = 0.0f32;
        for i in 0..g.octaves.max(1) {
            let n = layer(seed.wrapping_add(i as i32), NoiseType::Perlin, frequency);
            layers.push((n, amplitude));
            amplitude_sum += amplitude;
            frequency *= g.lacunarity;
            amplitude *= g.persistence;
        }

        Self {
            octaves: layers,
            amplitude_sum: if amplitude_sum > 0.0 { amplitude_sum } else { 1.0 },
            height_scale: g.height_scale,
            hill: layer(seed ^ SEED_HILL, NoiseType::OpenSimplex2, shape.hill_frequency),
            mountain: layer(
                seed ^ SEED_MOUNTAIN,
                NoiseType::OpenSimplex2,
                shape.mountain_frequency,
            ),
            lake: layer(seed ^ SEED_LAKE, NoiseType::OpenSimplex2, shape.lake_frequency),
            valley: layer(seed ^ SEED_VALLEY, NoiseType::OpenSimplex2, shape.valley_frequency),
            moisture: layer(
                seed ^ SEED_MOISTURE,
                NoiseType::OpenSimplex2,
                rules.climate_frequency,
            ),
            temperature: layer(
                seed ^ SEED_TEMPERATURE,
                NoiseType::OpenSimplex2,
                rules.climate_frequency,
            ),
            feature: layer(
                seed ^ SEED_FEATURE,
                NoiseType::OpenSimplex2,
                rules.climate_frequency * 8.0,
            ),
            shape,
            rules,
        }
    }

    #[inline]
    pub fn rules(&self) -> &BiomeRules {
        &self.rules
    }

    #[inline]
    pub fn water_level(&self) -> f32 {
        self.rules.water_level
    }

    /// Normalized fractal sum of the base octaves, roughly `[-1, 1]`.
    fn base(&self, wx: f32, wz: f32) -> f32 {
        let mut sum = 0.0f32;
        for (n, amp) in &self.octaves {
            sum += n.get_noise_2d(wx, wz) * amp;
        }
        sum / self.amplitude_sum
    }

    pub fn height(&self, wx: f32, wz: f32) -> f32 {
        let s = &self.shape;
        let hs = self.height_scale;

        let mut h = self.base(wx, wz) * hs;
        h += self.hill.get_noise_2d(wx, wz) * s.hill_weight * hs;

        let m = unit(self.mountain.get_noise_2d(wx, wz));
        if m > s.mountain_threshold {
            let excess = (m - s.mountain_threshold) / (1.0 - s.mountain_threshold).max(1e-6);
            h += excess.powf(s.mountain_power) * s.mountain_height * hs;
        }

        let la = unit(self.lake.get_noise_2d(wx, wz));
        let lb = unit(
            self.lake
                .get_noise_2d(wx + s.lake_offset, wz - s.lake_offset * 0.5),
        );
        let lake = la.max(lb);
        if lake > s.lake_threshold {
            let excess = (lake - s.lake_threshold) / (1.0 - s.lake_threshold).max(1e-6);
            h -= excess.powf(s.lake_power) * s.lake_depth * hs;
        }

        let v = self.valley.get_noise_2d(wx, wz);
        if v < s.valley_threshold {
            let t = ((s.valley_threshold - v) / (1.0 + s.valley_threshold).max(1e-6)).clamp(0.0, 1.0);
            h *= 1.0 - t * s.valley_strength;
        }

        h + s.vertical_offset
    }

    pub fn aux_noise(&self, channel: AuxChannel, wx: f32, wz: f32) -> f32 {
        let (n, (ox, oz)) = match channel {
            AuxChannel::Moisture => (&self.moisture, MOISTURE_SHIFT),
            AuxChannel::Temperature => (&self.temperature, TEMPERATURE_SHIFT),
            AuxChannel::Feature => (&self.feature, FEATURE_SHIFT),
        };
        n.get_noise_2d(wx + ox, wz + oz).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_heights() {
        let a = HeightField::new(&GeneratorSettings::with_seed(42));
        let b = HeightField::new(&GeneratorSettings::with_seed(42));
        for i in 0..64 {
            let x = i as f32 * 37.25 - 900.0;
            let z = i as f32 * -11.5 + 120.0;
            assert_eq!(a.height(x, z).to_bits(), b.height(x, z).to_bits());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let a = HeightField::new(&GeneratorSettings::with_seed(1));
        let b = HeightField::new(&GeneratorSettings::with_seed(2));
        let differs = (0..32).any(|i| {
            let x = i as f32 * 53.0;
            a.height(x, -x) != b.height(x, -x)
        });
        assert!(differs);
    }

    #[test]
    fn aux_noise_is_bounded() {
        let f = HeightField::new(&GeneratorSettings::default());
        for i in 0..200 {
            let x = (i as f32 - 100.0) * 211.0;
            let z = (i as f32 * 7.0) - 3_000.0;
            for ch in [AuxChannel::Moisture, AuxChannel::Temperature, AuxChannel::Feature] {
                let v = f.aux_noise(ch, x, z);
                assert!((-1.0..=1.0).contains(&v), "{ch:?} = {v}");
            }
        }
    }

    #[test]
    fn zero_octaves_still_samples() {
        let mut s = GeneratorSettings::default();
        s.generator.octaves = 0;
        let f = HeightField::new(&s);
        assert!(f.height(10.0, 10.0).is_finite());
    }
}
