//! External metadata services.
//!
//! Each provider client implements [`MetadataProvider`] and returns the
//! provider's own JSON items; the adapters in [`crate::adapters`] turn them
//! into canonical candidates and records.

pub mod deezer;
pub mod http;
pub mod musicbrainz;
pub mod openlibrary;
pub mod rate_limit;
pub mod rawg;
pub mod tmdb;

use crate::models::config::Config;
use crate::models::media::{ContentType, MediaType, Query};
use crate::Result;
use async_trait::async_trait;
use rate_limit::RateLimiter;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default per-call timeout when a provider does not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Capability interface of a metadata provider.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Provider name, used for priorities, adapters and provider ids.
    fn name(&self) -> &str;

    /// Media types this provider can search.
    fn media_types(&self) -> &[MediaType];

    fn supports(&self, media_type: MediaType) -> bool {
        self.media_types().contains(&media_type)
    }

    /// Search and return raw result items.
    async fn search(&self, query: &Query) -> Result<Vec<Value>>;

    /// Fetch the detail payload for one item.
    async fn details(&self, id: &str, content_type: ContentType) -> Result<Value>;

    /// Episode listing for one season of a series.
    ///
    /// Default implementation returns an empty list (not all providers
    /// know about episodes).
    async fn episodes(&self, _series_id: &str, _season: u32) -> Result<Vec<Value>> {
        Ok(vec![])
    }

    /// Whether [`MetadataProvider::episodes`] returns anything.
    fn supports_episodes(&self) -> bool {
        false
    }

    /// Limiter every call to this provider must pass through.
    fn rate_limiter(&self) -> Option<&RateLimiter> {
        None
    }

    /// Upper bound for one call, retries included.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }
}

/// Lookup table of registered providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn MetadataProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the shipped provider clients named anywhere in the priority lists.
    ///
    /// Providers that cannot be built (for example a missing API key) are
    /// skipped with a warning.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        let mut wanted: Vec<&String> = config.priorities.values().flatten().collect();
        wanted.sort();
        wanted.dedup();

        for name in wanted {
            let provider_config = config.provider(name);
            let built: Result<Arc<dyn MetadataProvider>> = match name.as_str() {
                tmdb::NAME => tmdb::TmdbClient::new(&provider_config, config.retry)
                    .map(|c| Arc::new(c) as Arc<dyn MetadataProvider>),
                musicbrainz::NAME => musicbrainz::MusicBrainzClient::new(&provider_config, config.retry)
                    .map(|c| Arc::new(c) as Arc<dyn MetadataProvider>),
                deezer::NAME => deezer::DeezerClient::new(&provider_config, config.retry)
                    .map(|c| Arc::new(c) as Arc<dyn MetadataProvider>),
                openlibrary::NAME => openlibrary::OpenLibraryClient::new(&provider_config, config.retry)
                    .map(|c| Arc::new(c) as Arc<dyn MetadataProvider>),
                rawg::NAME => rawg::RawgClient::new(&provider_config, config.retry)
                    .map(|c| Arc::new(c) as Arc<dyn MetadataProvider>),
                other => Err(crate::Error::UnknownProvider(other.to_string())),
            };

            match built {
                Ok(provider) => registry.register(provider),
                Err(e) => tracing::warn!("Provider {} not available: {}", name, e),
            }
        }

        registry
    }

    /// Add or replace a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn MetadataProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers from `priority` that are registered and support `media_type`,
    /// in priority order.
    pub fn ordered_for(
        &self,
        media_type: MediaType,
        priority: &[String],
    ) -> Vec<Arc<dyn MetadataProvider>> {
        let mut seen = Vec::new();
        priority
            .iter()
            .filter(|name| {
                if seen.contains(name) {
                    return false;
                }
                seen.push(*name);
                true
            })
            .filter_map(|name| self.get(name))
            .filter(|provider| provider.supports(media_type))
            .collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
