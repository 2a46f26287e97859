use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};

use crate::api::BitriseClient;
use crate::auth::Token;
use crate::config::Config;
use crate::downloader::ConcurrentArtifactDownloader;
use crate::error::Result;
use crate::fetcher::ArtifactFetcher;
use crate::output::PhaseProgress;
use crate::report::PullReport;
use crate::resolver::resolve_build_ids;
use crate::stages::Stage;

/// What to pull: the app, its finished stages and the target selection.
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub app_slug: String,
    pub stages: Vec<Stage>,
    /// Target patterns; empty selects every finished workflow.
    pub sources: Vec<String>,
    pub target_dir: PathBuf,
}

/// Resolves builds, fetches their intermediate files and downloads them.
pub struct ArtifactPull {
    fetcher: ArtifactFetcher,
    downloader: ConcurrentArtifactDownloader,
}

impl ArtifactPull {
    pub fn new(fetcher: ArtifactFetcher, downloader: ConcurrentArtifactDownloader) -> Self {
        Self {
            fetcher,
            downloader,
        }
    }

    /// Wires the Bitrise client, fetcher and downloader from `config`.
    pub fn from_config(config: &Config, token: Token) -> Result<Self> {
        let client = BitriseClient::new(&config.api.base_url, token, config.api_timeout())?;

        let fetcher = ArtifactFetcher::new(Arc::new(client))
            .with_concurrency(config.concurrency.list, config.concurrency.show);

        let downloader = ConcurrentArtifactDownloader::new(config.extractor()?)?
            .with_concurrency(config.concurrency.download)
            .with_timeout(config.download_timeout());

        Ok(Self::new(fetcher, downloader))
    }

    /// Runs the pull.
    ///
    /// # Errors
    ///
    /// Fails on a malformed target pattern, on any catalog failure, or when
    /// the target directory cannot be created. Individual download failures
    /// are recorded in the returned report instead.
    pub async fn run(&self, request: &PullRequest) -> Result<PullReport> {
        let progress = PhaseProgress::start_resolving();

        let build_ids = match resolve_build_ids(&request.stages, &request.sources) {
            Ok(ids) => ids.into_iter().collect::<Vec<_>>(),
            Err(err) => {
                progress.abandon();
                return Err(err);
            }
        };

        info!(
            "Resolved {} build(s) from {} stage(s)",
            build_ids.len(),
            request.stages.len()
        );
        debug!("Build IDs: {build_ids:?}");

        let progress = progress.finish_resolving_start_listing(build_ids.len());

        let artifacts = match self
            .fetcher
            .fetch_intermediate_files(&request.app_slug, &build_ids)
            .await
        {
            Ok(artifacts) => artifacts,
            Err(err) => {
                progress.abandon();
                return Err(err);
            }
        };

        let progress = progress.finish_listing_start_downloading(artifacts.len());

        let results = match self
            .downloader
            .download_and_save(artifacts, &request.target_dir)
            .await
        {
            Ok(results) => results,
            Err(err) => {
                progress.abandon();
                return Err(err);
            }
        };

        let report = PullReport::new(
            &request.app_slug,
            build_ids,
            request.target_dir.clone(),
            &results,
        );

        progress.finish_downloading(report.failures.len());
        info!(
            "Pulled {} artifact(s), {} failed",
            report.artifacts.len(),
            report.failures.len()
        );

        Ok(report)
    }
}
