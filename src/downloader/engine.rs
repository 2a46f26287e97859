use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::{StreamExt, TryStreamExt};
use log::{debug, info, warn};
use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use super::archive::ArchiveExtractor;
use crate::api::ArtifactDetail;
use crate::error::{ArtifactPullError, Result};

pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 10;
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of downloading one artifact.
#[derive(Debug)]
pub struct DownloadResult {
    pub download_url: String,
    pub env_key: String,
    /// Saved file, or extracted directory for directory artifacts.
    pub outcome: Result<PathBuf>,
}

impl DownloadResult {
    pub fn download_path(&self) -> Option<&Path> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&ArtifactPullError> {
        self.outcome.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Downloads artifacts with a bounded number of parallel jobs.
///
/// Every artifact yields exactly one [`DownloadResult`]. A failing job never
/// cancels the others.
pub struct ConcurrentArtifactDownloader {
    client: Client,
    extractor: Arc<dyn ArchiveExtractor>,
    concurrency: usize,
    timeout: Duration,
}

impl ConcurrentArtifactDownloader {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(extractor: Arc<dyn ArchiveExtractor>) -> Result<Self> {
        // Download URLs are pre-signed, so no API token is attached here.
        let client = Client::builder()
            .user_agent(concat!("artifact-pull/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ArtifactPullError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            extractor,
            concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Upper bound for a single artifact, extraction included.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Downloads every artifact below `target_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Only fails when `target_dir` cannot be created. Per-artifact failures
    /// are reported through [`DownloadResult::outcome`].
    pub async fn download_and_save(
        &self,
        artifacts: Vec<ArtifactDetail>,
        target_dir: &Path,
    ) -> Result<Vec<DownloadResult>> {
        tokio::fs::create_dir_all(target_dir).await?;

        info!(
            "Downloading {} artifact(s) to {} ({} at a time, extractor: {})...",
            artifacts.len(),
            target_dir.display(),
            self.concurrency,
            self.extractor.name()
        );

        let permits = Arc::new(Semaphore::new(self.concurrency));

        let handles: Vec<_> = artifacts
            .iter()
            .map(|artifact| {
                let job = DownloadJob {
                    client: self.client.clone(),
                    extractor: Arc::clone(&self.extractor),
                    artifact: artifact.clone(),
                    target_dir: target_dir.to_path_buf(),
                    timeout: self.timeout,
                };
                let permits = Arc::clone(&permits);

                tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| ArtifactPullError::WorkerPool(e.to_string()))?;
                    job.run().await
                })
            })
            .collect();

        let outcomes = join_all(handles).await;

        let results: Vec<DownloadResult> = artifacts
            .into_iter()
            .zip(outcomes)
            .map(|(artifact, outcome)| {
                let outcome = outcome
                    .map_err(|e| ArtifactPullError::WorkerPool(e.to_string()))
                    .and_then(|inner| inner);

                match &outcome {
                    Ok(path) => debug!("Artifact downloaded: {}", path.display()),
                    Err(err) => warn!(
                        "Failed to download artifact from {}: {err}",
                        artifact.download_url
                    ),
                }

                DownloadResult {
                    download_url: artifact.download_url,
                    env_key: artifact.intermediate_file_info.env_key,
                    outcome,
                }
            })
            .collect();

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(
            "Downloaded {} of {} artifact(s)",
            results.len() - failed,
            results.len()
        );

        Ok(results)
    }
}

struct DownloadJob {
    client: Client,
    extractor: Arc<dyn ArchiveExtractor>,
    artifact: ArtifactDetail,
    target_dir: PathBuf,
    timeout: Duration,
}

impl DownloadJob {
    async fn run(self) -> Result<PathBuf> {
        let deadline = Instant::now() + self.timeout;

        if self.artifact.intermediate_file_info.is_dir {
            self.download_directory(deadline).await
        } else {
            self.download_file(deadline).await
        }
    }

    fn timed_out(&self) -> ArtifactPullError {
        ArtifactPullError::DownloadTimeout {
            url: self.artifact.download_url.clone(),
            timeout: self.timeout,
        }
    }

    fn file_name(&self) -> Result<&Path> {
        Path::new(&self.artifact.title)
            .file_name()
            .map(Path::new)
            .ok_or_else(|| {
                ArtifactPullError::InvalidArtifact(format!(
                    "artifact {} has no usable title ('{}')",
                    self.artifact.slug, self.artifact.title
                ))
            })
    }

    async fn fetch(&self, deadline: Instant) -> Result<Response> {
        let url = &self.artifact.download_url;
        let response = timeout_at(deadline, self.client.get(url.as_str()).send())
            .await
            .map_err(|_| self.timed_out())??;

        let status = response.status();
        if !status.is_success() {
            return Err(ArtifactPullError::HttpStatus {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn download_file(&self, deadline: Instant) -> Result<PathBuf> {
        let path = self.target_dir.join(self.file_name()?);
        let response = self.fetch(deadline).await?;

        let written = match timeout_at(deadline, write_body(response, &path)).await {
            Ok(written) => written,
            Err(_) => Err(self.timed_out()),
        };

        if let Err(err) = written {
            remove_partial(&path, tokio::fs::remove_file(&path).await);
            return Err(err);
        }

        Ok(path)
    }

    /// Streams a tar archive into `<target>/<title without extension>`.
    ///
    /// On timeout the body is cut off and the extractor is awaited, so
    /// nothing is written below the target once the job has returned.
    async fn download_directory(&self, deadline: Instant) -> Result<PathBuf> {
        let dir_name = self.file_name()?.file_stem().map(PathBuf::from).ok_or_else(|| {
            ArtifactPullError::InvalidArtifact(format!(
                "artifact {} has no usable directory name",
                self.artifact.slug
            ))
        })?;
        let dir_path = self.target_dir.join(dir_name);

        let response = self.fetch(deadline).await?;

        tokio::fs::create_dir_all(&dir_path).await?;

        let cancel = CancellationToken::new();
        let body = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .take_until(cancel.clone().cancelled_owned());

        let extracted = {
            let mut extraction = self
                .extractor
                .extract(Box::pin(StreamReader::new(body)), &dir_path);

            match timeout_at(deadline, &mut extraction).await {
                Ok(extracted) => extracted,
                Err(_) => {
                    cancel.cancel();
                    if let Err(err) = extraction.await {
                        debug!("Extraction stopped after timeout: {err}");
                    }
                    Err(self.timed_out())
                }
            }
        };

        if let Err(err) = extracted {
            remove_partial(&dir_path, tokio::fs::remove_dir_all(&dir_path).await);
            return Err(err);
        }

        Ok(dir_path)
    }
}

async fn write_body(response: Response, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;

    Ok(())
}

fn remove_partial(path: &Path, removed: std::io::Result<()>) {
    match removed {
        Ok(()) => debug!("Removed partial download {}", path.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!("Failed to remove partial download {}: {err}", path.display()),
    }
}
