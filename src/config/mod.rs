//! Configuration types for the acceleration conversion pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for event directory processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Extension of the per-sensor text files in an event directory
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Run sensor pipelines on the rayon thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_file_extension() -> String {
    "txt".to_string()
}

fn default_parallel() -> bool {
    true
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            file_extension: default_file_extension(),
            parallel: default_parallel(),
        }
    }
}

/// Configuration for result output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Multiplier applied to a column maximum to size plot y-axis ranges
    #[serde(default = "default_plot_headroom")]
    pub plot_headroom: f64,

    /// Write one CSV of derived series per sensor channel
    #[serde(default = "default_write_series")]
    pub write_series: bool,
}

fn default_plot_headroom() -> f64 {
    1.15
}

fn default_write_series() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plot_headroom: default_plot_headroom(),
            write_series: default_write_series(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
///
/// The instrument constants of the conversion are not part of it; a file that
/// tries to set them (or any other unknown key) is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.processing.file_extension, "txt");
        assert!(config.processing.parallel);
        assert_eq!(config.output.plot_headroom, 1.15);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: PipelineConfig =
            serde_yaml::from_str("processing:\n  parallel: false\n").unwrap();
        assert!(!config.processing.parallel);
        assert_eq!(config.processing.file_extension, "txt");
        assert!(config.output.write_series);
    }

    #[test]
    fn test_instrument_constants_not_configurable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "conversion:\n  lowcut_hz: 1.0\noutput:\n  write_series: false\n")
            .unwrap();

        let err = PipelineConfig::from_yaml(&path).unwrap_err();
        assert!(err.to_string().contains("conversion"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");

        let mut config = PipelineConfig::default();
        config.output.write_series = false;
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert!(!loaded.output.write_series);
        assert_eq!(loaded.output.plot_headroom, 1.15);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("lowcut"));
    }
}
