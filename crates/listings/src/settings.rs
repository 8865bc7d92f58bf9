use std::path::Path;

use listings_core::config::{DetectionConfig, PresetName};

use crate::prelude::*;

/// Locator preset as named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    Coarse,
    LineNumberAware,
}

impl From<Preset> for PresetName {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Coarse => PresetName::Coarse,
            Preset::LineNumberAware => PresetName::LineNumberAware,
        }
    }
}

/// Load detection tuning, falling back to the built-in defaults.
pub fn load(path: Option<&Path>) -> Result<DetectionConfig> {
    let Some(path) = path else {
        return Ok(DetectionConfig::default());
    };

    let source = std::fs::read_to_string(path)
        .wrap_err_with(|| f!("Cannot read config file {}", path.display()))?;
    let config = DetectionConfig::from_toml_str(&source)
        .wrap_err_with(|| f!("Invalid config file {}", path.display()))?;
    log::info!("loaded detection config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        assert_eq!(load(None).unwrap(), DetectionConfig::default());
    }

    #[test]
    fn test_loads_overrides_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("listings.toml");
        std::fs::write(&path, "[render]\nresolution = 300\n").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.render.resolution, 300);
        assert_eq!(config.merger.max_chain_length, 2);
    }

    #[test]
    fn test_preset_names() {
        assert_eq!(PresetName::from(Preset::Coarse), PresetName::Coarse);
        assert_eq!(
            PresetName::from(Preset::LineNumberAware),
            PresetName::LineNumberAware
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Cannot read config file"));
    }
}
