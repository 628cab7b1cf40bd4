//! Deezer API client.

use crate::models::config::{ProviderConfig, RetryConfig};
use crate::models::media::{ContentType, MediaType, Query};
use crate::services::http::ApiClient;
use crate::services::rate_limit::RateLimiter;
use crate::services::MetadataProvider;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const NAME: &str = "deezer";

const DEEZER_BASE_URL: &str = "https://api.deezer.com";
const SEARCH_LIMIT: usize = 10;

/// Deezer API client. No credentials are needed for search and lookups.
#[derive(Debug)]
pub struct DeezerClient {
    api: ApiClient,
    base_url: String,
    timeout: Duration,
}

impl DeezerClient {
    pub fn new(config: &ProviderConfig, retry: RetryConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(NAME, config, retry)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEEZER_BASE_URL.to_string()),
            timeout: config.call_budget(&retry),
        })
    }
}

fn endpoint(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Track => "track",
        ContentType::Artist => "artist",
        _ => "album",
    }
}

#[async_trait]
impl MetadataProvider for DeezerClient {
    fn name(&self) -> &str {
        NAME
    }

    fn media_types(&self) -> &[MediaType] {
        &[MediaType::Music]
    }

    async fn search(&self, query: &Query) -> Result<Vec<Value>> {
        let url = format!(
            "{}/search/{}?q={}&limit={}",
            self.base_url,
            endpoint(query.effective_content_type()),
            urlencoding::encode(&query.text),
            SEARCH_LIMIT
        );
        let payload = self.api.get_json(&url, &[]).await?;

        // Deezer reports errors inside a 200 response.
        if let Some(error) = payload.get("error") {
            return Err(self.api.malformed(error.to_string()));
        }
        self.api.items(payload, "data")
    }

    async fn details(&self, id: &str, content_type: ContentType) -> Result<Value> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            endpoint(content_type),
            urlencoding::encode(id)
        );
        let payload = self.api.get_json(&url, &[]).await?;
        if payload.get("error").is_some() {
            return Err(crate::Error::NotFound(format!("{}:{}", NAME, id)));
        }
        Ok(payload)
    }

    fn rate_limiter(&self) -> Option<&RateLimiter> {
        Some(self.api.limiter())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
