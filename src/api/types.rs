use serde::{Deserialize, Deserializer, Serialize};

/// Lightweight entry of the artifact list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub slug: String,
}

/// Full artifact data from the show endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub slug: String,
    #[serde(
        rename = "expiring_download_url",
        default,
        deserialize_with = "null_as_default"
    )]
    pub download_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub intermediate_file_info: IntermediateFileInfo,
}

/// Marks an artifact as an intermediate file exported under `env_key`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntermediateFileInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub env_key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_dir: bool,
}

impl ArtifactDetail {
    pub fn is_intermediate_file(&self) -> bool {
        !self.intermediate_file_info.env_key.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ListArtifactsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<ArtifactSummary>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub paging: Paging,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ShowArtifactResponse {
    pub data: ArtifactDetail,
}

/// Pagination block of list responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct Paging {
    /// Item count across all pages.
    #[serde(default)]
    pub total_item_count: i64,
    /// Maximum item count of a single page.
    #[serde(default)]
    pub page_item_limit: u32,
    /// Cursor of the next page. Missing or empty on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl Paging {
    pub fn next_cursor(self) -> Option<String> {
        self.next.filter(|next| !next.is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
