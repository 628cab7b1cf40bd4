//! RAWG video game database client.

use crate::models::config::{ProviderConfig, RetryConfig};
use crate::models::media::{ContentType, MediaType, Query};
use crate::services::http::ApiClient;
use crate::services::rate_limit::RateLimiter;
use crate::services::MetadataProvider;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const NAME: &str = "rawg";

const RAWG_BASE_URL: &str = "https://api.rawg.io/api";
const SEARCH_LIMIT: usize = 10;

/// RAWG API client.
#[derive(Debug)]
pub struct RawgClient {
    api: ApiClient,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl RawgClient {
    pub fn new(config: &ProviderConfig, retry: RetryConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| crate::Error::MissingApiKey(NAME.to_string()))?;

        Ok(Self {
            api: ApiClient::new(NAME, config, retry)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| RAWG_BASE_URL.to_string()),
            api_key,
            timeout: config.call_budget(&retry),
        })
    }
}

#[async_trait]
impl MetadataProvider for RawgClient {
    fn name(&self) -> &str {
        NAME
    }

    fn media_types(&self) -> &[MediaType] {
        &[MediaType::Game]
    }

    async fn search(&self, query: &Query) -> Result<Vec<Value>> {
        let url = format!(
            "{}/games?key={}&search={}&page_size={}",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&query.text),
            SEARCH_LIMIT
        );

        let payload = self.api.get_json(&url, &[]).await?;
        self.api.items(payload, "results")
    }

    async fn details(&self, id: &str, _content_type: ContentType) -> Result<Value> {
        let url = format!(
            "{}/games/{}?key={}",
            self.base_url,
            urlencoding::encode(id),
            urlencoding::encode(&self.api_key)
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_sends_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/games"))
            .and(query_param("key", "abc"))
            .and(query_param("search", "portal 2"))
            .and(query_param("page_size", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 1,
                "results": [{"id": 4200, "name": "Portal 2", "released": "2011-04-18"}]
            })))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            api_key: Some("abc".to_string()),
            base_url: Some(server.uri()),
            ..Default::default()
        };
        let client = RawgClient::new(&config, RetryConfig::default()).unwrap();
        let query = Query::new("portal 2", MediaType::Game).with_year(2011);
        let items = client.search(&query).await.unwrap();
        assert_eq!(items[0]["name"], "Portal 2");
    }
}
