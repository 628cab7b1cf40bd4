//! Open Library API client.

use crate::models::config::{ProviderConfig, RetryConfig};
use crate::models::media::{ContentType, MediaType, Query};
use crate::services::http::ApiClient;
use crate::services::rate_limit::RateLimiter;
use crate::services::MetadataProvider;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const NAME: &str = "openlibrary";

const OPENLIBRARY_BASE_URL: &str = "https://openlibrary.org";
const SEARCH_LIMIT: usize = 10;

/// Open Library API client.
#[derive(Debug)]
pub struct OpenLibraryClient {
    api: ApiClient,
    base_url: String,
    timeout: Duration,
}

impl OpenLibraryClient {
    pub fn new(config: &ProviderConfig, retry: RetryConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(NAME, config, retry)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENLIBRARY_BASE_URL.to_string()),
            timeout: config.call_budget(&retry),
        })
    }
}

#[async_trait]
impl MetadataProvider for OpenLibraryClient {
    fn name(&self) -> &str {
        NAME
    }

    fn media_types(&self) -> &[MediaType] {
        &[MediaType::Book]
    }

    async fn search(&self, query: &Query) -> Result<Vec<Value>> {
        let url = format!(
            "{}/search.json?q={}&limit={}",
            self.base_url,
            urlencoding::encode(&query.text),
            SEARCH_LIMIT
        );

        let payload = self.api.get_json(&url, &[]).await?;
        self.api.items(payload, "docs")
    }

    /// Work ids are the bare `OL...W` part of `/works/OL...W`.
    async fn details(&self, id: &str, _content_type: ContentType) -> Result<Value> {
        let id = id.trim_start_matches("/works/");
        let url = format!("{}/works/{}.json", self.base_url, urlencoding::encode(id));
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

    fn client(server: &MockServer) -> OpenLibraryClient {
        let config = ProviderConfig {
            base_url: Some(server.uri()),
            ..Default::default()
        };
        OpenLibraryClient::new(&config, RetryConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_search_returns_docs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("q", "dune"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "numFound": 1,
                "docs": [{
                    "key": "/works/OL893415W",
                    "title": "Dune",
                    "author_name": ["Frank Herbert"],
                    "first_publish_year": 1965
                }]
            })))
            .mount(&server)
            .await;

        let items = client(&server)
            .search(&Query::new("dune", MediaType::Book))
            .await
            .unwrap();
        assert_eq!(items[0]["first_publish_year"], 1965);
    }

    #[tokio::test]
    async fn test_details_accepts_full_work_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works/OL893415W.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "key": "/works/OL893415W",
                "title": "Dune"
            })))
            .mount(&server)
            .await;

        let value = client(&server)
            .details("/works/OL893415W", ContentType::Book)
            .await
            .unwrap();
        assert_eq!(value["title"], "Dune");
    }
}
