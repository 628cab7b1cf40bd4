//! MusicBrainz API client.
//!
//! MusicBrainz allows one request per second and requires an identifying
//! user agent; both are handled by the shared HTTP client.

use crate::models::config::{ProviderConfig, RetryConfig};
use crate::models::media::{ContentType, MediaType, Query};
use crate::services::http::ApiClient;
use crate::services::rate_limit::RateLimiter;
use crate::services::MetadataProvider;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const NAME: &str = "musicbrainz";

const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const SEARCH_LIMIT: usize = 10;

/// MusicBrainz API client.
#[derive(Debug)]
pub struct MusicBrainzClient {
    api: ApiClient,
    base_url: String,
    timeout: Duration,
}

/// Entity endpoint, result key and `inc` parameter for a content type.
fn entity(content_type: ContentType) -> (&'static str, &'static str, &'static str) {
    match content_type {
        ContentType::Track => ("recording", "recordings", "artist-credits+releases"),
        ContentType::Artist => ("artist", "artists", "release-groups"),
        _ => ("release", "releases", "artist-credits+recordings+release-groups"),
    }
}

impl MusicBrainzClient {
    pub fn new(config: &ProviderConfig, retry: RetryConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(NAME, config, retry)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| MUSICBRAINZ_BASE_URL.to_string()),
            timeout: config.call_budget(&retry),
        })
    }
}

#[async_trait]
impl MetadataProvider for MusicBrainzClient {
    fn name(&self) -> &str {
        NAME
    }

    fn media_types(&self) -> &[MediaType] {
        &[MediaType::Music]
    }

    async fn search(&self, query: &Query) -> Result<Vec<Value>> {
        let (endpoint, key, _) = entity(query.effective_content_type());
        let url = format!(
            "{}/{}?query={}&limit={}&fmt=json",
            self.base_url,
            endpoint,
            urlencoding::encode(&query.text),
            SEARCH_LIMIT
        );
        let payload = self.api.get_json(&url, &[]).await?;
        self.api.items(payload, key)
    }

    async fn details(&self, id: &str, content_type: ContentType) -> Result<Value> {
        let (endpoint, _, inc) = entity(content_type);
        let url = format!(
            "{}/{}/{}?inc={}&fmt=json",
            self.base_url,
            endpoint,
            urlencoding::encode(id),
            inc
        );
        self.api.get_json(&url, &[]).await
    }

    fn rate_limiter(&self) -> Option<&RateLimiter> {
        Some(self.api.limiter())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
