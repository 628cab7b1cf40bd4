//! TMDB API client.

use crate::models::config::{ProviderConfig, RetryConfig};
use crate::models::media::{ContentType, MediaType, Query};
use crate::services::http::ApiClient;
use crate::services::rate_limit::RateLimiter;
use crate::services::MetadataProvider;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const NAME: &str = "tmdb";

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// TMDB API client.
#[derive(Debug)]
pub struct TmdbClient {
    api: ApiClient,
    base_url: String,
    /// API key or Bearer token (JWT)
    api_key: String,
    language: Option<String>,
    /// Whether to use Bearer token authentication (API v4 style)
    use_bearer: bool,
    timeout: Duration,
}

impl TmdbClient {
    /// Create a new TMDB client.
    /// Supports both API key (v3) and Bearer token (v4) formats.
    pub fn new(config: &ProviderConfig, retry: RetryConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| crate::Error::MissingApiKey(NAME.to_string()))?;

        // Bearer tokens start with "eyJ" (base64 encoded JWT header)
        let use_bearer = api_key.starts_with("eyJ");

        Ok(Self {
            api: ApiClient::new(NAME, config, retry)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| TMDB_BASE_URL.to_string()),
            api_key,
            language: config.language.clone(),
            use_bearer,
            timeout: config.call_budget(&retry),
        })
    }

    /// Build URL with optional api_key parameter (only for v3 style).
    fn build_url(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut query: Vec<String> = Vec::new();
        if !self.use_bearer {
            query.push(format!("api_key={}", urlencoding::encode(&self.api_key)));
        }
        if let Some(language) = &self.language {
            query.push(format!("language={}", urlencoding::encode(language)));
        }
        for (key, value) in params {
            query.push(format!("{}={}", key, urlencoding::encode(value)));
        }

        if query.is_empty() {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/{}?{}", self.base_url, path, query.join("&"))
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        if self.use_bearer {
            vec![("Authorization", format!("Bearer {}", self.api_key))]
        } else {
            vec![]
        }
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self.build_url(path, params);
        self.api.get_json(&url, &self.headers()).await
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    fn name(&self) -> &str {
        NAME
    }

    fn media_types(&self) -> &[MediaType] {
        &[MediaType::Video]
    }

    async fn search(&self, query: &Query) -> Result<Vec<Value>> {
        let mut params = vec![("query", query.text.clone())];
        let path = match query.effective_content_type() {
            ContentType::Series | ContentType::Episode => {
                if let Some(year) = query.year {
                    params.push(("first_air_date_year", year.to_string()));
                }
                "search/tv"
            }
            _ => {
                if let Some(year) = query.year {
                    params.push(("year", year.to_string()));
                }
                "search/movie"
            }
        };

        let payload = self.get(path, &params).await?;
        self.api.items(payload, "results")
    }

    async fn details(&self, id: &str, content_type: ContentType) -> Result<Value> {
        let path = match content_type {
            ContentType::Series | ContentType::Episode => format!("tv/{}", id),
            _ => format!("movie/{}", id),
        };
        self.get(&path, &[]).await
    }

    async fn episodes(&self, series_id: &str, season: u32) -> Result<Vec<Value>> {
        let payload = self
            .get(&format!("tv/{}/season/{}", series_id, season), &[])
            .await?;
        self.api.items(payload, "episodes")
    }

    fn supports_episodes(&self) -> bool {
        true
    }

    fn rate_limiter(&self) -> Option<&RateLimiter> {
        Some(self.api.limiter())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
