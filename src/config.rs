use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::SegmentationMode;
use crate::store::BuildStore;

/// Configuration file structure for StageView.
///
/// Configuration files are loaded from the current directory or a specified
/// path. Command-line flags override the values found here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Build snapshot storage
    #[serde(default)]
    pub store: StoreConfig,

    /// Stage reconstruction parameters
    #[serde(default)]
    pub view: ViewConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Directory of build snapshots
    pub path: Option<PathBuf>,

    /// Serve recorded stage analysis as delegated segmentation
    #[serde(default)]
    pub analysis: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ViewConfig {
    /// Stage segmentation strategy
    #[serde(default)]
    pub segmentation: SegmentationMode,

    /// Upper bound on a single stage's log, newest output kept
    pub max_stage_log_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,

    /// Print stage logs below the summary table
    #[serde(default)]
    pub show_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Yaml,
}

impl StoreConfig {
    /// Configured snapshot directory, or the platform default.
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => BuildStore::default_root().context("Failed to locate build store"),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./stageview.toml
    /// 3. ./stageview.json
    /// 4. ./stageview.yaml
    /// 5. ./stageview.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Ok(Self::default());
            }
            return Self::load_from_path(path);
        }

        let candidates = [
            "stageview.toml",
            "stageview.json",
            "stageview.yaml",
            "stageview.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.store.path.is_none());
        assert!(!config.store.analysis);
        assert_eq!(config.view.segmentation, SegmentationMode::Auto);
        assert!(config.view.max_stage_log_bytes.is_none());
        assert_eq!(config.output.format, OutputFormat::Summary);
        assert!(!config.output.show_logs);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[store]
path = "/var/lib/stageview"
analysis = true

[view]
segmentation = "walk"
max-stage-log-bytes = 65536

[output]
format = "yaml"
show-logs = true
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.store.path, Some(PathBuf::from("/var/lib/stageview")));
        assert!(config.store.analysis);
        assert_eq!(config.view.segmentation, SegmentationMode::Walk);
        assert_eq!(config.view.max_stage_log_bytes, Some(65536));
        assert_eq!(config.output.format, OutputFormat::Yaml);
        assert!(config.output.show_logs);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "view": {
    "segmentation": "delegated"
  },
  "output": {
    "format": "json",
    "pretty": true
  }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.view.segmentation, SegmentationMode::Delegated);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_rejects_unknown_segmentation() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[view]\nsegmentation = \"guess\"\n").unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load(Some(Path::new("nonexistent.toml"))).unwrap();
        assert_eq!(config.output.format, OutputFormat::Summary);
    }

    #[test]
    fn test_load_yaml_config_by_explicit_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("stageview.yml");
        std::fs::write(
            &path,
            "store:\n  path: /srv/builds\nview:\n  max-stage-log-bytes: 1024\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.store.path, Some(PathBuf::from("/srv/builds")));
        assert_eq!(config.view.max_stage_log_bytes, Some(1024));
    }

    #[test]
    fn test_store_path_prefers_configured_directory() {
        let config = StoreConfig {
            path: Some(PathBuf::from("/tmp/builds")),
            analysis: false,
        };
        assert_eq!(config.resolve_path().unwrap(), PathBuf::from("/tmp/builds"));
    }
}
