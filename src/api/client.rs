use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{ArtifactPullError, Result};

const API_VERSION: &str = "v0.2/";
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated client of the Bitrise REST API.
#[derive(Clone)]
pub struct BitriseClient {
    client: Client,
    api_url: Url,
    token: Token,
}

impl BitriseClient {
    pub fn new(base_url: &str, token: Token, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("artifact-pull/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ArtifactPullError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Without a trailing slash `join` would replace the last path segment.
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        let api_url = Url::parse(&base)
            .map_err(|e| ArtifactPullError::Config(format!("Invalid base URL: {e}")))?
            .join(API_VERSION)
            .map_err(|e| ArtifactPullError::Config(format!("Invalid API base URL: {e}")))?;

        if api_url.cannot_be_a_base() {
            return Err(ArtifactPullError::Config(format!(
                "Invalid base URL: {base_url}"
            )));
        }

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    /// Builds an endpoint URL below the versioned API root, percent-encoding
    /// every segment.
    pub(super) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| ArtifactPullError::Config(format!("Invalid API URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Performs an authenticated GET and decodes the JSON body.
    ///
    /// `next` is appended as the `next` query parameter when present. Any
    /// status outside 2XX is returned as [`ArtifactPullError::HttpStatus`].
    pub(super) async fn get<T>(&self, mut url: Url, next: Option<&str>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if let Some(next) = next {
            url.query_pairs_mut().append_pair("next", next);
        }

        debug!("GET {url}");

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(self.token.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArtifactPullError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_below_versioned_root() {
        let client = BitriseClient::new(
            "https://api.bitrise.io",
            Token::from("t"),
            DEFAULT_API_TIMEOUT,
        )
        .unwrap();

        let url = client
            .endpoint(&["apps", "app-slug", "builds", "build-slug", "artifacts"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.bitrise.io/v0.2/apps/app-slug/builds/build-slug/artifacts"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_segments() {
        let client = BitriseClient::new(
            "http://localhost:8080/proxy",
            Token::from("t"),
            DEFAULT_API_TIMEOUT,
        )
        .unwrap();

        let url = client.endpoint(&["apps", "a b", "builds", "x/y"]).unwrap();

        assert_eq!(
            url.as_str(),
            "http://localhost:8080/proxy/v0.2/apps/a%20b/builds/x%2Fy"
        );
    }

    #[test]
    fn test_invalid_base_url_is_a_config_error() {
        let result = BitriseClient::new("not a url", Token::from("t"), DEFAULT_API_TIMEOUT);
        assert!(matches!(result, Err(ArtifactPullError::Config(_))));
    }
}
