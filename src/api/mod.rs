mod artifacts;
mod client;
mod types;

pub use artifacts::ArtifactCatalog;
pub use client::{BitriseClient, DEFAULT_API_TIMEOUT};
pub use types::{ArtifactDetail, ArtifactSummary, IntermediateFileInfo};
