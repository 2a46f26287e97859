use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactPullError {
    #[error("Invalid target pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("request to {url} failed - status code should be 2XX ({status})")]
    HttpStatus { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pagination of {url} stalled: cursor '{cursor}' was already visited")]
    PaginationLoop { url: String, cursor: String },

    #[error("failed to list artifacts of build {build_id}: {source}")]
    CatalogList {
        build_id: String,
        #[source]
        source: Box<ArtifactPullError>,
    },

    #[error("failed to get details of artifact {artifact_slug} of build {build_id}: {source}")]
    CatalogShow {
        build_id: String,
        artifact_slug: String,
        #[source]
        source: Box<ArtifactPullError>,
    },

    #[error("failed to get artifact download links for build(s): {}", join_failed_builds(.0))]
    CatalogFetch(Vec<ArtifactPullError>),

    #[error("download of {url} timed out after {timeout:?}")]
    DownloadTimeout { url: String, timeout: Duration },

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("{command} failed: {message}")]
    Extraction { command: String, message: String },

    #[error("failed to download artifact(s) from: {}", .0.join(", "))]
    DownloadsFailed(Vec<String>),

    #[error("Worker task failed: {0}")]
    WorkerPool(String),
}

impl ArtifactPullError {
    /// Build ID a per-build catalog failure belongs to.
    pub fn build_id(&self) -> Option<&str> {
        match self {
            Self::CatalogList { build_id, .. } | Self::CatalogShow { build_id, .. } => {
                Some(build_id)
            }
            _ => None,
        }
    }
}

fn join_failed_builds(failures: &[ArtifactPullError]) -> String {
    failures
        .iter()
        .filter_map(ArtifactPullError::build_id)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ArtifactPullError>;
