use std::collections::HashSet;

use async_trait::async_trait;
use log::debug;

use super::client::BitriseClient;
use super::types::{ArtifactDetail, ArtifactSummary, ListArtifactsResponse, ShowArtifactResponse};
use crate::error::{ArtifactPullError, Result};

/// Remote catalog of the artifacts a build produced.
#[async_trait]
pub trait ArtifactCatalog: Send + Sync {
    /// Lists every artifact of a build, following pagination to the last page.
    async fn list_artifacts(&self, app_slug: &str, build_slug: &str)
        -> Result<Vec<ArtifactSummary>>;

    /// Fetches the full data of a single artifact.
    async fn show_artifact(
        &self,
        app_slug: &str,
        build_slug: &str,
        artifact_slug: &str,
    ) -> Result<ArtifactDetail>;
}

#[async_trait]
impl ArtifactCatalog for BitriseClient {
    async fn list_artifacts(
        &self,
        app_slug: &str,
        build_slug: &str,
    ) -> Result<Vec<ArtifactSummary>> {
        let url = self.endpoint(&["apps", app_slug, "builds", build_slug, "artifacts"])?;

        let mut artifacts = Vec::new();
        let mut cursor: Option<String> = None;
        let mut visited = HashSet::new();

        loop {
            let page: ListArtifactsResponse = self.get(url.clone(), cursor.as_deref()).await?;

            debug!(
                "Build {build_slug}: received {} artifact(s) ({} total)",
                page.data.len(),
                page.paging.total_item_count
            );
            artifacts.extend(page.data);

            match page.paging.next_cursor() {
                Some(next) if !visited.insert(next.clone()) => {
                    return Err(ArtifactPullError::PaginationLoop {
                        url: url.to_string(),
                        cursor: next,
                    });
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(artifacts)
    }

    async fn show_artifact(
        &self,
        app_slug: &str,
        build_slug: &str,
        artifact_slug: &str,
    ) -> Result<ArtifactDetail> {
        let url = self.endpoint(&[
            "apps",
            app_slug,
            "builds",
            build_slug,
            "artifacts",
            artifact_slug,
        ])?;

        let response: ShowArtifactResponse = self.get(url, None).await?;
        Ok(response.data)
    }
}
