use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::downloader::DownloadResult;
use crate::error::{ArtifactPullError, Result};

/// Separator of the combined artifact path list.
pub const PATH_SEPARATOR: &str = "|";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullReport {
    pub app_slug: String,
    pub collected_at: DateTime<Utc>,
    pub target_dir: PathBuf,
    pub build_ids: Vec<String>,
    pub artifacts: Vec<ArtifactLocation>,
    /// Env key → downloaded path, ready to be exported by the caller.
    pub intermediate_files: IndexMap<String, PathBuf>,
    /// Every downloaded path joined with [`PATH_SEPARATOR`].
    pub artifact_paths: String,
    pub failures: Vec<DownloadFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactLocation {
    pub path: PathBuf,
    pub env_key: String,
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadFailure {
    pub download_url: String,
    pub error: String,
}

impl PullReport {
    pub fn new(
        app_slug: &str,
        build_ids: Vec<String>,
        target_dir: PathBuf,
        results: &[DownloadResult],
    ) -> Self {
        let mut artifacts = Vec::new();
        let mut failures = Vec::new();

        for result in results {
            if let Some(path) = result.download_path() {
                artifacts.push(ArtifactLocation {
                    path: path.to_path_buf(),
                    env_key: result.env_key.clone(),
                    download_url: result.download_url.clone(),
                });
            } else if let Some(err) = result.error() {
                failures.push(DownloadFailure {
                    download_url: result.download_url.clone(),
                    error: err.to_string(),
                });
            }
        }

        let intermediate_files = artifacts
            .iter()
            .filter(|a| !a.env_key.is_empty())
            .map(|a| (a.env_key.clone(), a.path.clone()))
            .collect();

        let artifact_paths = artifacts
            .iter()
            .map(|a| a.path.display().to_string())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR);

        Self {
            app_slug: app_slug.to_string(),
            collected_at: Utc::now(),
            target_dir,
            build_ids,
            artifacts,
            intermediate_files,
            artifact_paths,
            failures,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fails when any artifact could not be downloaded, naming every failed URL.
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }

        Err(ArtifactPullError::DownloadsFailed(
            self.failures
                .iter()
                .map(|f| f.download_url.clone())
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(path: &str, env_key: &str) -> DownloadResult {
        DownloadResult {
            download_url: format!("https://storage/{env_key}"),
            env_key: env_key.to_string(),
            outcome: Ok(PathBuf::from(path)),
        }
    }

    fn failed(url: &str) -> DownloadResult {
        DownloadResult {
            download_url: url.to_string(),
            env_key: "BROKEN".to_string(),
            outcome: Err(ArtifactPullError::HttpStatus {
                url: url.to_string(),
                status: 403,
            }),
        }
    }

    #[test]
    fn test_report_from_successful_results() {
        let results = vec![ok("/tmp/pull/app.apk", "APK"), ok("/tmp/pull/logs", "LOGS")];

        let report = PullReport::new(
            "app",
            vec!["b1".to_string()],
            PathBuf::from("/tmp/pull"),
            &results,
        );

        assert!(report.is_success());
        assert!(report.ensure_success().is_ok());
        assert_eq!(report.artifacts.len(), 2);
        assert_eq!(report.artifact_paths, "/tmp/pull/app.apk|/tmp/pull/logs");
        assert_eq!(
            report.intermediate_files.get("LOGS"),
            Some(&PathBuf::from("/tmp/pull/logs"))
        );
    }

    #[test]
    fn test_report_names_every_failed_url() {
        let results = vec![
            failed("https://storage/a"),
            ok("/tmp/pull/b.txt", "B"),
            failed("https://storage/c"),
        ];

        let report = PullReport::new("app", vec![], PathBuf::from("/tmp/pull"), &results);

        assert!(!report.is_success());
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert!(!report.intermediate_files.contains_key("BROKEN"));

        let err = report.ensure_success().unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to download artifact(s) from: https://storage/a, https://storage/c"
        );
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = PullReport::new(
            "app",
            vec!["b1".to_string()],
            PathBuf::from("/tmp/pull"),
            &[ok("/tmp/pull/app.apk", "APK")],
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["app_slug"], "app");
        assert_eq!(json["intermediate_files"]["APK"], "/tmp/pull/app.apk");
        assert_eq!(json["failures"].as_array().unwrap().len(), 0);
    }
}
