//! Metadata lookup collaborators.

use async_trait::async_trait;
use reqwest::Url;

use super::model::PageMetadata;
use crate::error::LookupError;

/// Fetches title/description metadata for a website.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    async fn lookup(&self, url: &str) -> Result<PageMetadata, LookupError>;
}

/// Calls a `GET {endpoint}?url=<encoded>` metadata service.
pub struct HttpMetadataProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMetadataProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn lookup(&self, url: &str) -> Result<PageMetadata, LookupError> {
        let request_url = Url::parse_with_params(&self.endpoint, &[("url", url)])
            .map_err(|e| LookupError::MalformedInput(format!("bad endpoint: {e}")))?;

        let response = self
            .client
            .get(request_url)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::InvalidResponse(format!(
                "metadata service returned {status}"
            )));
        }

        response
            .json::<PageMetadata>()
            .await
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))
    }
}

/// Offline provider that derives metadata from the URL itself.
pub struct SimulatedMetadataProvider;

impl SimulatedMetadataProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimulatedMetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for SimulatedMetadataProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn lookup(&self, url: &str) -> Result<PageMetadata, LookupError> {
        let parsed = Url::parse(url).map_err(|e| LookupError::MalformedInput(e.to_string()))?;
        let host = parsed
            .host_str()
            .map(|h| h.trim_start_matches("www."))
            .ok_or_else(|| LookupError::MalformedInput(format!("{url} has no host")))?;

        Ok(PageMetadata {
            title: Some(format!("{host} | Home")),
            description: Some(format!(
                "This is an auto-fetched meta description for {url}"
            )),
            error: None,
        })
    }
}
