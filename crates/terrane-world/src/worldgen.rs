use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;

/// Everything a worker needs to rebuild the terrain function from a request alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub shape: TerrainShape,
    #[serde(default)]
    pub biomes: BiomeRules,
}

impl GeneratorSettings {
    pub fn with_seed(seed: i32) -> Self {
        Self {
            generator: GeneratorConfig {
                seed,
                ..GeneratorConfig::default()
            },
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_seed")]
    pub seed: i32,
    /// Base frequency of the first octave, in cycles per world unit.
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// World units of vertical relief for a unit noise sample.
    #[serde(default = "default_height_scale")]
    pub height_scale: f32,
    #[serde(default = "default_octaves")]
    pub octaves: u32,
    #[serde(default = "default_persistence")]
    pub persistence: f32,
    #[serde(default = "default_lacunarity")]
    pub lacunarity: f32,
}
fn default_seed() -> i32 {
    42
}
fn default_scale() -> f32 {
    0.004
}
fn default_height_scale() -> f32 {
    40.0
}
fn default_octaves() -> u32 {
    6
}
fn default_persistence() -> f32 {
    0.5
}
fn default_lacunarity() -> f32 {
    2.0
}
impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            scale: default_scale(),
            height_scale: default_height_scale(),
            octaves: default_octaves(),
            persistence: default_persistence(),
            lacunarity: default_lacunarity(),
        }
    }
}

/// Low-frequency masks layered over the base octaves.
///
/// Weights and depths are in units of `height_scale`; thresholds are in the
/// `[0, 1]` remapped noise space except `valley_threshold`, which is raw `[-1, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainShape {
    /// Lifts mean terrain above the water plane (world units).
    #[serde(default = "default_vertical_offset")]
    pub vertical_offset: f32,
    #[serde(default = "default_hill_frequency")]
    pub hill_frequency: f32,
    #[serde(default = "default_hill_weight")]
    pub hill_weight: f32,
    #[serde(default = "default_mountain_frequency")]
    pub mountain_frequency: f32,
    #[serde(default = "default_mountain_threshold")]
    pub mountain_threshold: f32,
    #[serde(default = "default_mountain_power")]
    pub mountain_power: f32,
    #[serde(default = "default_mountain_height")]
    pub mountain_height: f32,
    #[serde(default = "default_lake_frequency")]
    pub lake_frequency: f32,
    /// World-space shift of the second, correlated lake sample.
    #[serde(default = "default_lake_offset")]
    pub lake_offset: f32,
    #[serde(default = "default_lake_threshold")]
    pub lake_threshold: f32,
    #[serde(default = "default_lake_power")]
    pub lake_power: f32,
    #[serde(default = "default_lake_depth")]
    pub lake_depth: f32,
    #[serde(default = "default_valley_frequency")]
    pub valley_frequency: f32,
    #[serde(default = "default_valley_threshold")]
    pub valley_threshold: f32,
    /// Fraction of height removed at the bottom of a valley.
    #[serde(default = "default_valley_strength")]
    pub valley_strength: f32,
}
fn default_vertical_offset() -> f32 {
    6.0
}
fn default_hill_frequency() -> f32 {
    0.0025
}
fn default_hill_weight() -> f32 {
    0.35
}
fn default_mountain_frequency() -> f32 {
    0.0012
}
fn default_mountain_threshold() -> f32 {
    0.62
}
fn default_mountain_power() -> f32 {
    1.8
}
fn default_mountain_height() -> f32 {
    2.2
}
fn default_lake_frequency() -> f32 {
    0.0018
}
fn default_lake_offset() -> f32 {
    137.0
}
fn default_lake_threshold() -> f32 {
    0.72
}
fn default_lake_power() -> f32 {
    1.5
}
fn default_lake_depth() -> f32 {
    1.1
}
fn default_valley_frequency() -> f32 {
    0.0015
}
fn default_valley_threshold() -> f32 {
    -0.55
}
fn default_valley_strength() -> f32 {
    0.7
}
impl Default for TerrainShape {
    fn default() -> Self {
        Self {
            vertical_offset: default_vertical_offset(),
            hill_frequency: default_hill_frequency(),
            hill_weight: default_hill_weight(),
            mountain_frequency: default_mountain_frequency(),
            mountain_threshold: default_mountain_threshold(),
            mountain_power: default_mountain_power(),
            mountain_height: default_mountain_height(),
            lake_frequency: default_lake_frequency(),
            lake_offset: default_lake_offset(),
            lake_threshold: default_lake_threshold(),
            lake_power: default_lake_power(),
            lake_depth: default_lake_depth(),
            valley_frequency: default_valley_frequency(),
            valley_threshold: default_valley_threshold(),
            valley_strength: default_valley_strength(),
        }
    }
}

/// Biome thresholds. Heights are world units; climate values are raw `[-1, 1]` noise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiomeRules {
    #[serde(default = "default_water_level")]
    pub water_level: f32,
    #[serde(default = "default_sand_level")]
    pub sand_level: f32,
    /// Warm, wet ground below this height turns to sand (dunes and beaches).
    #[serde(default = "default_dune_max_height")]
    pub dune_max_height: f32,
    #[serde(default = "default_dune_moisture")]
    pub dune_moisture: f32,
    #[serde(default = "default_dune_temperature")]
    pub dune_temperature: f32,
    #[serde(default = "default_rock_level")]
    pub rock_level: f32,
    #[serde(default = "default_forest_min_height")]
    pub forest_min_height: f32,
    #[serde(default = "default_forest_max_height")]
    pub forest_max_height: f32,
    #[serde(default = "default_forest_moisture")]
    pub forest_moisture: f32,
    #[serde(default = "default_forest_temperature")]
    pub forest_temperature: f32,
    #[serde(default = "default_climate_frequency")]
    pub climate_frequency: f32,
    /// Height range mapped onto the palette's variation fraction.
    #[serde(default = "default_color_min_height")]
    pub color_min_height: f32,
    #[serde(default = "default_color_max_height")]
    pub color_max_height: f32,
}
fn default_water_level() -> f32 {
    0.0
}
fn default_sand_level() -> f32 {
    1.5
}
fn default_dune_max_height() -> f32 {
    8.0
}
fn default_dune_moisture() -> f32 {
    0.45
}
fn default_dune_temperature() -> f32 {
    0.45
}
fn default_rock_level() -> f32 {
    30.0
}
fn default_forest_min_height() -> f32 {
    4.0
}
fn default_forest_max_height() -> f32 {
    24.0
}
fn default_forest_moisture() -> f32 {
    -0.05
}
fn default_forest_temperature() -> f32 {
    -0.25
}
fn default_climate_frequency() -> f32 {
    0.0009
}
fn default_color_min_height() -> f32 {
    -20.0
}
fn default_color_max_height() -> f32 {
    60.0
}
impl Default for BiomeRules {
    fn default() -> Self {
        Self {
            water_level: default_water_level(),
            sand_level: default_sand_level(),
            dune_max_height: default_dune_max_height(),
            dune_moisture: default_dune_moisture(),
            dune_temperature: default_dune_temperature(),
            rock_level: default_rock_level(),
            forest_min_height: default_forest_min_height(),
            forest_max_height: default_forest_max_height(),
            forest_moisture: default_forest_moisture(),
            forest_temperature: default_forest_temperature(),
            climate_frequency: default_climate_frequency(),
            color_min_height: default_color_min_height(),
            color_max_height: default_color_max_height(),
        }
    }
}

pub fn load_settings_from_path(path: &Path) -> Result<GeneratorSettings, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let settings: GeneratorSettings = toml::from_str(&s)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tables_fill_defaults() {
        let s: GeneratorSettings = toml::from_str(
            r#"
            [generator]
            seed = 7
            octaves = 4

            [biomes]
            water_level = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(s.generator.seed, 7);
        assert_eq!(s.generator.octaves, 4);
        assert_eq!(s.generator.lacunarity, default_lacunarity());
        assert_eq!(s.shape, TerrainShape::default());
        assert_eq!(s.biomes.water_level, 2.5);
        assert_eq!(s.biomes.rock_level, default_rock_level());
    }

    #[test]
    fn empty_document_is_default() {
        let s: GeneratorSettings = toml::from_str("").unwrap();
        assert_eq!(s, GeneratorSettings::default());
    }
}
