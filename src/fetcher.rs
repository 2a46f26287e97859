use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use crate::api::{ArtifactCatalog, ArtifactDetail};
use crate::error::{ArtifactPullError, Result};

pub const DEFAULT_LIST_CONCURRENCY: usize = 3;
/// Per build being listed, so at most `list * show` API calls run at once.
pub const DEFAULT_SHOW_CONCURRENCY: usize = 3;

/// Collects the intermediate file details of a set of builds.
///
/// Builds are listed by a pool of `list_concurrency` jobs. Each build with
/// artifacts then gets its own pool of `show_concurrency` detail requests,
/// which drains before the list job moves on.
///
/// Failure handling differs per level:
/// - a failing list call fails only that build, the other builds are still
///   fetched
/// - a failing show call fails the whole build it belongs to
/// - once every build has been attempted, any failure turns the whole fetch
///   into [`ArtifactPullError::CatalogFetch`] and no artifact is returned
pub struct ArtifactFetcher {
    catalog: Arc<dyn ArtifactCatalog>,
    list_concurrency: usize,
    show_concurrency: usize,
}

impl ArtifactFetcher {
    pub fn new(catalog: Arc<dyn ArtifactCatalog>) -> Self {
        Self {
            catalog,
            list_concurrency: DEFAULT_LIST_CONCURRENCY,
            show_concurrency: DEFAULT_SHOW_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, list_concurrency: usize, show_concurrency: usize) -> Self {
        self.list_concurrency = list_concurrency.max(1);
        self.show_concurrency = show_concurrency.max(1);
        self
    }

    /// Fetches the details of every intermediate file produced by `build_ids`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactPullError::CatalogFetch`] naming every failed build,
    /// in the order of `build_ids`, if any build could not be fetched.
    pub async fn fetch_intermediate_files(
        &self,
        app_slug: &str,
        build_ids: &[String],
    ) -> Result<Vec<ArtifactDetail>> {
        info!(
            "Listing artifacts of {} build(s) ({} at a time)...",
            build_ids.len(),
            self.list_concurrency
        );

        let list_permits = Arc::new(Semaphore::new(self.list_concurrency));

        let handles: Vec<_> = build_ids
            .iter()
            .map(|build_id| {
                let catalog = Arc::clone(&self.catalog);
                let permits = Arc::clone(&list_permits);
                let app_slug = app_slug.to_string();
                let build_id = build_id.clone();
                let show_concurrency = self.show_concurrency;

                tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| ArtifactPullError::WorkerPool(e.to_string()))?;
                    fetch_build(catalog, &app_slug, &build_id, show_concurrency).await
                })
            })
            .collect();

        let outcomes = join_all(handles).await;

        let mut artifacts = Vec::new();
        let mut failures = Vec::new();

        for (build_id, outcome) in build_ids.iter().zip(outcomes) {
            match joined(outcome) {
                Ok(details) => {
                    debug!("Build {build_id}: {} intermediate file(s)", details.len());
                    artifacts.extend(details);
                }
                Err(err) => {
                    let err = attribute_to_build(build_id, err);
                    warn!("{err}");
                    failures.push(err);
                }
            }
        }

        if !failures.is_empty() {
            return Err(ArtifactPullError::CatalogFetch(failures));
        }

        info!("Found {} intermediate file(s)", artifacts.len());

        Ok(artifacts)
    }
}

async fn fetch_build(
    catalog: Arc<dyn ArtifactCatalog>,
    app_slug: &str,
    build_id: &str,
    show_concurrency: usize,
) -> Result<Vec<ArtifactDetail>> {
    debug!("Listing artifacts for build {build_id}");

    let summaries = catalog
        .list_artifacts(app_slug, build_id)
        .await
        .map_err(|e| ArtifactPullError::CatalogList {
            build_id: build_id.to_string(),
            source: Box::new(e),
        })?;

    if summaries.is_empty() {
        debug!("Build {build_id} has no artifacts");
        return Ok(Vec::new());
    }

    let show_permits = Arc::new(Semaphore::new(show_concurrency));
    let slugs: Vec<String> = summaries.into_iter().map(|s| s.slug).collect();

    let handles: Vec<_> = slugs
        .iter()
        .map(|slug| {
            let catalog = Arc::clone(&catalog);
            let permits = Arc::clone(&show_permits);
            let app_slug = app_slug.to_string();
            let build_id = build_id.to_string();
            let slug = slug.clone();

            tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| ArtifactPullError::WorkerPool(e.to_string()))?;

                debug!("Getting artifact details for artifact {slug}");
                catalog
                    .show_artifact(&app_slug, &build_id, &slug)
                    .await
                    .map_err(|e| ArtifactPullError::CatalogShow {
                        build_id,
                        artifact_slug: slug,
                        source: Box::new(e),
                    })
            })
        })
        .collect();

    // Every show call finishes before the build is judged.
    let outcomes = join_all(handles).await;

    let mut details = Vec::with_capacity(outcomes.len());
    for (slug, outcome) in slugs.iter().zip(outcomes) {
        let detail = joined(outcome).map_err(|e| match e {
            ArtifactPullError::CatalogShow { .. } => e,
            other => ArtifactPullError::CatalogShow {
                build_id: build_id.to_string(),
                artifact_slug: slug.clone(),
                source: Box::new(other),
            },
        })?;
        details.push(detail);
    }

    Ok(details
        .into_iter()
        .filter(|detail| {
            let keep = detail.is_intermediate_file();
            if !keep {
                debug!("Skipping {} ({}): not an intermediate file", detail.title, detail.slug);
            }
            keep
        })
        .collect())
}

fn joined<T>(outcome: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    outcome.map_err(|e| ArtifactPullError::WorkerPool(e.to_string()))?
}

fn attribute_to_build(build_id: &str, err: ArtifactPullError) -> ArtifactPullError {
    if err.build_id().is_some() {
        return err;
    }

    ArtifactPullError::CatalogList {
        build_id: build_id.to_string(),
        source: Box::new(err),
    }
}
