use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::downloader::{ArchiveExtractor, InProcessTarExtractor, TarCommandExtractor};
use crate::error::ArtifactPullError;

/// Name of the directory created below the system temp dir when no target
/// directory is configured.
pub const DEFAULT_TARGET_DIR_NAME: &str = "_artifact_pull";

/// Tuning file for artifact pulls.
///
/// Loaded from the current directory or an explicit path; every section is
/// optional and falls back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Bitrise API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout of a single catalog request
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConcurrencyConfig {
    /// Builds listed at once
    #[serde(default = "default_list_concurrency")]
    pub list: usize,

    /// Detail requests in flight per build
    #[serde(default = "default_show_concurrency")]
    pub show: usize,

    /// Parallel downloads
    #[serde(default = "default_download_concurrency")]
    pub download: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DownloadConfig {
    /// Timeout of a single download, directories included
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,

    pub target_dir: Option<PathBuf>,

    /// Directory artifacts are gzip-compressed tarballs
    #[serde(default)]
    pub compressed_archives: bool,

    #[serde(default)]
    pub extractor: ExtractorKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorKind {
    /// `tar -xPf -`, keeps absolute member paths as they are.
    #[default]
    Command,
    /// Bundled tar reader. Strips the leading `/` from absolute member paths,
    /// so everything is unpacked below the artifact directory.
    InProcess,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            list: default_list_concurrency(),
            show: default_show_concurrency(),
            download: default_download_concurrency(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_download_timeout_secs(),
            target_dir: None,
            compressed_archives: false,
            extractor: ExtractorKind::default(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.bitrise.io".to_string()
}

fn default_api_timeout_secs() -> u64 {
    crate::api::DEFAULT_API_TIMEOUT.as_secs()
}

fn default_list_concurrency() -> usize {
    crate::fetcher::DEFAULT_LIST_CONCURRENCY
}

fn default_show_concurrency() -> usize {
    crate::fetcher::DEFAULT_SHOW_CONCURRENCY
}

fn default_download_concurrency() -> usize {
    crate::downloader::DEFAULT_DOWNLOAD_CONCURRENCY
}

fn default_download_timeout_secs() -> u64 {
    crate::downloader::DEFAULT_DOWNLOAD_TIMEOUT.as_secs()
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./artifact-pull.toml
    /// 3. ./artifact-pull.json
    /// 4. ./artifact-pull.yaml
    /// 5. ./artifact-pull.yml
    ///
    /// Returns default configuration if no candidate file exists. An explicit
    /// path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load_from_dir(Path::new("."))?,
        };

        config.validate()?;
        Ok(config)
    }

    fn load_from_dir(dir: &Path) -> Result<Self> {
        let candidates = [
            "artifact-pull.toml",
            "artifact-pull.json",
            "artifact-pull.yaml",
            "artifact-pull.yml",
        ];

        for candidate in &candidates {
            let path = dir.join(candidate);
            if path.exists() {
                return Self::load_from_path(&path);
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

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let limits = [
            ("concurrency.list", self.concurrency.list as u64),
            ("concurrency.show", self.concurrency.show as u64),
            ("concurrency.download", self.concurrency.download as u64),
            ("api.timeout-secs", self.api.timeout_secs),
            ("download.timeout-secs", self.download.timeout_secs),
        ];

        for (key, value) in limits {
            if value == 0 {
                return Err(ArtifactPullError::Config(format!(
                    "{key} must be greater than zero"
                )));
            }
        }

        Ok(())
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download.timeout_secs)
    }

    pub fn target_dir(&self) -> PathBuf {
        self.download
            .target_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_TARGET_DIR_NAME))
    }

    /// Builds the extractor used for directory artifacts.
    pub fn extractor(&self) -> crate::error::Result<Arc<dyn ArchiveExtractor>> {
        let compressed = self.download.compressed_archives;

        match self.download.extractor {
            ExtractorKind::Command => TarCommandExtractor::from_path(compressed)
                .map(|e| Arc::new(e) as Arc<dyn ArchiveExtractor>)
                .ok_or_else(|| {
                    ArtifactPullError::Config(
                        "tar not found in PATH, set download.extractor = \"in-process\"".to_string(),
                    )
                }),
            ExtractorKind::InProcess => {
                warn!("In-process extraction strips the leading '/' from absolute archive paths");
                Ok(Arc::new(InProcessTarExtractor::new(compressed)))
            }
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
        assert_eq!(config.api.base_url, "https://api.bitrise.io");
        assert_eq!(config.api_timeout(), Duration::from_secs(30));
        assert_eq!(config.concurrency.list, 3);
        assert_eq!(config.concurrency.show, 3);
        assert_eq!(config.concurrency.download, 10);
        assert_eq!(config.download_timeout(), Duration::from_secs(300));
        assert_eq!(config.download.extractor, ExtractorKind::Command);
        assert_eq!(
            config.target_dir(),
            std::env::temp_dir().join("_artifact_pull")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[api]
base-url = "https://bitrise.example.com"
timeout-secs = 10

[concurrency]
list = 2
download = 4

[download]
target-dir = "/tmp/pulled"
compressed-archives = true
extractor = "in-process"

[output]
format = "json"
pretty = true
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.api.base_url, "https://bitrise.example.com");
        assert_eq!(config.api_timeout(), Duration::from_secs(10));
        assert_eq!(config.concurrency.list, 2);
        assert_eq!(config.concurrency.show, 3);
        assert_eq!(config.concurrency.download, 4);
        assert_eq!(config.target_dir(), PathBuf::from("/tmp/pulled"));
        assert!(config.download.compressed_archives);
        assert_eq!(config.download.extractor, ExtractorKind::InProcess);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "concurrency": { "show": 7 },
  "output": { "format": "summary" }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.concurrency.show, 7);
        assert_eq!(config.api.base_url, "https://api.bitrise.io");
        assert_eq!(config.output.format, OutputFormat::Summary);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yml").unwrap();
        write!(temp_file, "download:\n  timeout-secs: 60\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.download_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/artifact-pull.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_from_dir_without_candidates_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.concurrency.download, 10);
    }

    #[test]
    fn test_load_from_dir_picks_candidate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("artifact-pull.yaml"),
            "concurrency:\n  list: 5\n",
        )
        .unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.concurrency.list, 5);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[concurrency]\nshow = 0\n").unwrap();

        let err = Config::load(Some(temp_file.path())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: concurrency.show must be greater than zero"
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact-pull.json");

        let mut config = Config::default();
        config.concurrency.download = 2;
        config.download.extractor = ExtractorKind::InProcess;
        config.save(&path).unwrap();

        let reloaded = Config::load_from_path(&path).unwrap();
        assert_eq!(reloaded.concurrency.download, 2);
        assert_eq!(reloaded.download.extractor, ExtractorKind::InProcess);
    }

    #[test]
    fn test_in_process_extractor_is_always_available() {
        let mut config = Config::default();
        config.download.extractor = ExtractorKind::InProcess;

        assert_eq!(config.extractor().unwrap().name(), "in-process");
    }
}
