//! Detection tuning.
//!
//! Every threshold the detectors use lives here so that it can be tuned from a
//! TOML file without touching detection logic. All fields have defaults; a
//! file only needs to name what it overrides:
//!
//! ```toml
//! [merger]
//! max_chain_length = 3
//!
//! [locator.coarse]
//! min_width = 280
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    Parse(String),
    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub classifier: ClassifierConfig,
    pub segmenter: SegmenterConfig,
    pub locator: LocatorConfig,
    pub merger: MergerConfig,
    pub validator: ValidatorConfig,
    pub tasks: TaskNaming,
    pub render: RenderConfig,
}

impl DetectionConfig {
    /// Parse a (possibly partial) TOML document on top of the defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: DetectionConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.locator.coarse.validate("coarse")?;
        self.locator.line_number_aware.validate("line_number_aware")?;

        if !(0.0..=1.0).contains(&self.locator.continuation_band) {
            return Err(ConfigError::Invalid(format!(
                "locator.continuation_band must be within 0..=1, got {}",
                self.locator.continuation_band
            )));
        }
        if !(0.0..=1.0).contains(&self.locator.overlap_ratio) {
            return Err(ConfigError::Invalid(format!(
                "locator.overlap_ratio must be within 0..=1, got {}",
                self.locator.overlap_ratio
            )));
        }
        if self.merger.max_chain_length < 1 {
            return Err(ConfigError::Invalid(
                "merger.max_chain_length must be at least 1".into(),
            ));
        }
        if self.classifier.min_numbered_lines == 0 {
            return Err(ConfigError::Invalid(
                "classifier.min_numbered_lines must be at least 1".into(),
            ));
        }
        if self.render.resolution == 0 {
            return Err(ConfigError::Invalid("render.resolution must be positive".into()));
        }
        if self.tasks.prefix.is_empty() {
            return Err(ConfigError::Invalid("tasks.prefix must not be empty".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Page classifier
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum number of lines that must start with a line number.
    pub min_numbered_lines: usize,
    pub keywords: Vec<String>,
    /// Section markers that introduce the per-line explanation of a listing.
    pub description_markers: Vec<String>,
    /// Tokens that only appear on pages discussing the scripting framework.
    pub framework_tokens: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            min_numbered_lines: 3,
            keywords: to_strings(&[
                "import", "for", "if", "def", "class", "print", "return", "while", "try", "except",
            ]),
            description_markers: to_strings(&["Line Description", "說明"]),
            framework_tokens: to_strings(&[
                "rhinoscriptsyntax",
                "Rhino.Geometry",
                "GhPython",
                "Grasshopper",
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// Line-block segmenter
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SegmenterConfig {
    /// A block whose last code line sits within this many lines of the page
    /// end is flagged as continued.
    pub bottom_window: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        SegmenterConfig { bottom_window: 5 }
    }
}

// ---------------------------------------------------------------------------
// Image region locator
// ---------------------------------------------------------------------------

/// Named threshold preset for the region locator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PresetName {
    /// Whole-page scan for large shaded boxes.
    #[default]
    Coarse,
    /// Smaller boxes, corroborated by line numbers in their left strip.
    LineNumberAware,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LocatorPreset {
    /// Inclusive intensity band of the code-block background shade.
    pub band_low: u8,
    pub band_high: u8,
    /// Side length of the square structuring element. Odd, at least 3, so
    /// the element is centred on the pixel.
    pub kernel_size: u8,
    /// Also apply a morphological opening after the closing.
    pub open: bool,
    /// Boxes must be strictly wider and taller than these.
    pub min_width: u32,
    pub min_height: u32,
    pub max_regions: usize,
    /// Confirm candidates by reading numbers from their left strip.
    pub require_line_numbers: bool,
    /// Left strip is `min(strip_max_width, width / 10)` pixels wide.
    pub strip_max_width: u32,
    pub min_numeric_tokens: usize,
}

impl LocatorPreset {
    pub fn coarse() -> Self {
        LocatorPreset {
            band_low: 230,
            band_high: 245,
            kernel_size: 11,
            open: false,
            min_width: 300,
            min_height: 100,
            max_regions: 3,
            require_line_numbers: false,
            strip_max_width: 50,
            min_numeric_tokens: 3,
        }
    }

    pub fn line_number_aware() -> Self {
        LocatorPreset {
            band_low: 230,
            band_high: 245,
            kernel_size: 5,
            open: true,
            min_width: 200,
            min_height: 50,
            max_regions: 3,
            require_line_numbers: true,
            strip_max_width: 50,
            min_numeric_tokens: 3,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.band_low > self.band_high {
            return Err(ConfigError::Invalid(format!(
                "locator.{name}: band_low ({}) is above band_high ({})",
                self.band_low, self.band_high
            )));
        }
        if self.kernel_size < 3 || self.kernel_size % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "locator.{name}: kernel_size ({}) must be odd and at least 3",
                self.kernel_size
            )));
        }
        if self.max_regions == 0 {
            return Err(ConfigError::Invalid(format!(
                "locator.{name}: max_regions must be positive"
            )));
        }
        Ok(())
    }
}

impl Default for LocatorPreset {
    fn default() -> Self {
        LocatorPreset::coarse()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LocatorConfig {
    pub preset: PresetName,
    pub coarse: LocatorPreset,
    pub line_number_aware: LocatorPreset,
    /// Fraction of the page height at the bottom; a region reaching into it is
    /// treated as continued on the next page.
    pub continuation_band: f32,
    /// Two regions overlapping by more than this share of the smaller one are
    /// treated as the same block.
    pub overlap_ratio: f32,
}

impl LocatorConfig {
    pub fn active(&self) -> &LocatorPreset {
        self.preset(self.preset)
    }

    pub fn preset(&self, name: PresetName) -> &LocatorPreset {
        match name {
            PresetName::Coarse => &self.coarse,
            PresetName::LineNumberAware => &self.line_number_aware,
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig {
            preset: PresetName::Coarse,
            coarse: LocatorPreset::coarse(),
            line_number_aware: LocatorPreset::line_number_aware(),
            continuation_band: 0.05,
            overlap_ratio: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Merger, validator, tasks, rendering
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MergerConfig {
    /// Maximum number of pages one merged block may span. `2` merges exactly
    /// one page boundary; a third continued page stays separate.
    pub max_chain_length: usize,
}

impl Default for MergerConfig {
    fn default() -> Self {
        MergerConfig {
            max_chain_length: 2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ValidatorConfig {
    pub comment_marker: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            comment_marker: "#".to_string(),
        }
    }
}

/// Output file naming: `{prefix}_{id:03}_p{first_page}.{extension}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TaskNaming {
    pub prefix: String,
    pub extension: String,
}

impl Default for TaskNaming {
    fn default() -> Self {
        TaskNaming {
            prefix: "code".to_string(),
            extension: "py".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Rendering resolution in DPI (144 is twice the 72 DPI page space).
    pub resolution: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig { resolution: 144 }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DetectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_presets() {
        let config = LocatorConfig::default();
        assert_eq!(config.coarse.min_width, 300);
        assert_eq!(config.coarse.min_height, 100);
        assert_eq!(config.line_number_aware.min_width, 200);
        assert_eq!(config.line_number_aware.min_height, 50);
        assert!(config.line_number_aware.open);
        assert_eq!(config.active(), &config.coarse);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = DetectionConfig::from_toml_str("").unwrap();
        assert_eq!(config, DetectionConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let source = r#"
            [merger]
            max_chain_length = 3

            [locator]
            preset = "line_number_aware"

            [locator.coarse]
            min_width = 280
        "#;
        let config = DetectionConfig::from_toml_str(source).unwrap();
        assert_eq!(config.merger.max_chain_length, 3);
        assert_eq!(config.locator.preset, PresetName::LineNumberAware);
        assert_eq!(config.locator.coarse.min_width, 280);
        // Untouched fields keep their defaults.
        assert_eq!(config.locator.coarse.min_height, 100);
        assert_eq!(config.segmenter.bottom_window, 5);
    }

    #[test]
    fn test_invalid_band_rejected() {
        let source = r#"
            [locator.coarse]
            band_low = 250
            band_high = 240
        "#;
        let err = DetectionConfig::from_toml_str(source).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_even_kernel_rejected() {
        for size in [0, 1, 10] {
            let source = format!("[locator.line_number_aware]\nkernel_size = {size}");
            let err = DetectionConfig::from_toml_str(&source).unwrap_err();
            assert!(err.to_string().contains("kernel_size"), "size {size}");
        }
        let config = DetectionConfig::from_toml_str("[locator.coarse]\nkernel_size = 9").unwrap();
        assert_eq!(config.locator.coarse.kernel_size, 9);
    }

    #[test]
    fn test_zero_chain_length_rejected() {
        let err = DetectionConfig::from_toml_str("[merger]\nmax_chain_length = 0").unwrap_err();
        assert!(err.to_string().contains("max_chain_length"));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = DetectionConfig::from_toml_str("[merger\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
