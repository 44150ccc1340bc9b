use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use terrane_stream::StreamConfig;
use terrane_world::{BiomeRules, GeneratorConfig, GeneratorSettings, TerrainShape};

/// Octaves past this add detail far below one grid cell.
pub const MAX_OCTAVES: u32 = 16;

/// Whole `terrane.toml`: generator tables plus the `[stream]` table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub shape: TerrainShape,
    #[serde(default)]
    pub biomes: BiomeRules,
    #[serde(default)]
    pub stream: StreamConfig,
}

impl TerrainConfig {
    pub fn settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            generator: self.generator.clone(),
            shape: self.shape.clone(),
            biomes: self.biomes.clone(),
        }
    }

    /// Rejects values the generator cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.stream;
        if !(s.chunk_size.is_finite() && s.chunk_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "stream.chunk_size must be positive, got {}",
                s.chunk_size
            )));
        }
        if s.resolution == 0 || s.resolution > terrane_chunk::MAX_RESOLUTION {
            return Err(ConfigError::Invalid(format!(
                "stream.resolution must be in 1..={}, got {}",
                terrane_chunk::MAX_RESOLUTION,
                s.resolution
            )));
        }
        if s.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "stream.max_concurrent must be at least 1".into(),
            ));
        }
        if s.ready_per_tick == 0 {
            return Err(ConfigError::Invalid(
                "stream.ready_per_tick must be at least 1".into(),
            ));
        }
        let octaves = self.generator.octaves;
        if octaves == 0 || octaves > MAX_OCTAVES {
            return Err(ConfigError::Invalid(format!(
                "generator.octaves must be in 1..={}, got {}",
                MAX_OCTAVES, octaves
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl Error for ConfigError {}

pub fn load_config_from_path(path: &Path) -> Result<TerrainConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: TerrainConfig = toml::from_str(&s)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Command-line values that win over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub seed: Option<i32>,
    pub radius: Option<u32>,
    pub resolution: Option<u32>,
    pub workers: Option<usize>,
    pub sync: bool,
}

impl Overrides {
    pub fn apply(&self, cfg: &mut TerrainConfig) {
        if let Some(seed) = self.seed {
            cfg.generator.seed = seed;
        }
        if let Some(r) = self.radius {
            cfg.stream.render_radius = r;
        }
        if let Some(r) = self.resolution {
            cfg.stream.resolution = r;
        }
        if let Some(w) = self.workers {
            cfg.stream.workers = Some(w);
        }
        if self.sync {
            cfg.stream.sync = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: TerrainConfig = toml::from_str(
            r#"
            [generator]
            seed = 99

            [stream]
            render_radius = 3
            workers = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.generator.seed, 99);
        assert_eq!(cfg.stream.render_radius, 3);
        assert_eq!(cfg.stream.workers, Some(2));
        assert_eq!(cfg.stream.chunk_size, StreamConfig::default().chunk_size);
        assert_eq!(cfg.biomes, BiomeRules::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn overrides_win() {
        let mut cfg = TerrainConfig::default();
        Overrides {
            seed: Some(5),
            radius: Some(1),
            resolution: Some(8),
            workers: None,
            sync: true,
        }
        .apply(&mut cfg);
        assert_eq!(cfg.settings().generator.seed, 5);
        assert_eq!(cfg.stream.render_radius, 1);
        assert_eq!(cfg.stream.resolution, 8);
        assert_eq!(cfg.stream.workers, None);
        assert!(cfg.stream.sync);
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut cfg = TerrainConfig::default();
        cfg.stream.resolution = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        let mut cfg = TerrainConfig::default();
        cfg.stream.chunk_size = f32::NAN;
        assert!(cfg.validate().is_err());
        let mut cfg = TerrainConfig::default();
        cfg.stream.max_concurrent = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stalled_apply_budget_is_rejected() {
        let mut cfg = TerrainConfig::default();
        cfg.stream.ready_per_tick = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("ready_per_tick"), "{err}");
        cfg.stream.ready_per_tick = 1;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn octaves_are_capped() {
        let mut cfg = TerrainConfig::default();
        cfg.generator.octaves = MAX_OCTAVES;
        assert!(cfg.validate().is_ok());
        cfg.generator.octaves = MAX_OCTAVES + 1;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        cfg.generator.octaves = u32::MAX;
        assert!(cfg.validate().is_err());
        cfg.generator.octaves = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("terrane.toml");
        let cfg = load_config_from_path(&path).unwrap();
        assert!(cfg.stream.render_radius > 0);
    }
}
