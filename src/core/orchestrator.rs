//! Identification orchestrator.
//!
//! Fans a query out to every configured provider for its media type, maps
//! the raw results through the adapter table, merges and ranks them, and
//! either resolves the query to one record or hands back a short list for
//! the caller to choose from.

use crate::adapters::{Adapter, AdapterTable};
use crate::core::cache::{CacheKey, Lookup, LookupOutcome, QueryCache};
use crate::core::ranking::{self, RankingContext, RankingPolicy};
use crate::error::{FailureKind, ProviderFailure};
use crate::events::{Event, EventBus, SearchOutcome};
use crate::models::config::Config;
use crate::models::media::{
    Candidate, CandidateId, ContentType, EpisodeRange, MediaRecord, MediaType, Position, Query,
};
use crate::services::{MetadataProvider, ProviderRegistry};
use crate::{Error, Result};
use futures::future::{join_all, FutureExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of an identification.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// One unambiguous match.
    Resolved(MediaRecord),
    /// Several plausible matches, best first.
    Ambiguous(Vec<Candidate>),
    /// No provider returned anything usable.
    NotFound,
}

/// Run one provider call under its rate limiter and timeout.
async fn guarded<T, F>(provider: &dyn MetadataProvider, call: F) -> std::result::Result<T, ProviderFailure>
where
    F: Future<Output = Result<T>>,
{
    let timeout = provider.timeout();
    let limited = async {
        if let Some(limiter) = provider.rate_limiter() {
            limiter.acquire().await?;
        }
        call.await
    };

    match tokio::time::timeout(timeout, limited).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.into_failure(provider.name())),
        Err(_) => Err(ProviderFailure {
            provider: provider.name().to_string(),
            kind: FailureKind::Timeout,
            message: format!("no response within {:?}", timeout),
        }),
    }
}

/// Everything a lookup needs, owned so the lookup can outlive the caller
/// that started it.
struct SearchJob {
    providers: Vec<Arc<dyn MetadataProvider>>,
    adapters: AdapterTable,
    events: EventBus,
    policy: RankingPolicy,
    query: Query,
    normalized: String,
}

impl SearchJob {
    async fn run(self) -> LookupOutcome {
        let content_type = self.query.effective_content_type();
        let searches = self.providers.iter().enumerate().map(|(priority, provider)| {
            let query = &self.query;
            async move {
                let result = guarded(provider.as_ref(), provider.search(query)).await;
                (priority, provider, result)
            }
        });
        let results = join_all(searches).await;

        let mut failures = Vec::new();
        let mut found = Vec::new();

        for (priority, provider, result) in results {
            let name = provider.name().to_string();
            let items = match result {
                Ok(items) => items,
                Err(failure) => {
                    tracing::warn!("Search failed: {}", failure);
                    let outcome = match failure.kind {
                        FailureKind::Timeout => SearchOutcome::Timeout,
                        _ => SearchOutcome::Error {
                            message: failure.to_string(),
                        },
                    };
                    self.events.emit(Event::ProviderSearch {
                        provider: name,
                        query: self.normalized.clone(),
                        outcome,
                    });
                    failures.push(failure);
                    continue;
                }
            };

            let Some(adapter) = self.adapters.get(&name) else {
                let failure = ProviderFailure {
                    provider: name.clone(),
                    kind: FailureKind::Malformed,
                    message: "no adapter registered".to_string(),
                };
                tracing::warn!("Search failed: {}", failure);
                self.events.emit(Event::ProviderSearch {
                    provider: name,
                    query: self.normalized.clone(),
                    outcome: SearchOutcome::Error {
                        message: failure.to_string(),
                    },
                });
                failures.push(failure);
                continue;
            };

            let candidates: Vec<Candidate> = items
                .iter()
                .filter_map(|item| (adapter.candidate)(item, content_type))
                .collect();
            if candidates.len() < items.len() {
                tracing::debug!(
                    "{}: skipped {} of {} unusable items",
                    name,
                    items.len() - candidates.len(),
                    items.len()
                );
            }
            tracing::debug!("{}: {} candidates for '{}'", name, candidates.len(), self.normalized);

            self.events.emit(Event::ProviderSearch {
                provider: name,
                query: self.normalized.clone(),
                outcome: SearchOutcome::Success {
                    count: candidates.len(),
                },
            });
            found.extend(candidates.into_iter().map(|c| (priority, c)));
        }

        if failures.len() == self.providers.len() {
            return Err(Arc::new(failures));
        }

        let ctx = RankingContext {
            normalized_query: &self.normalized,
            year: self.query.year,
        };
        let ranked = self.policy.rank(ranking::merge(found), &ctx);
        Ok(Arc::new(ranked))
    }
}

/// Identification orchestrator.
///
/// Owns its cache; nothing is shared between orchestrator instances.
pub struct Orchestrator {
    registry: ProviderRegistry,
    adapters: AdapterTable,
    priorities: BTreeMap<MediaType, Vec<String>>,
    policy: RankingPolicy,
    cache: QueryCache,
    events: EventBus,
    max_candidates: usize,
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry, config: &Config, events: EventBus) -> Self {
        Self {
            registry,
            adapters: AdapterTable::default(),
            priorities: config.priorities.clone(),
            policy: RankingPolicy::default(),
            cache: QueryCache::new(config.cache_ttl()),
            events,
            max_candidates: config.max_candidates.max(1),
        }
    }

    /// Replace the adapter table.
    pub fn with_adapters(mut self, adapters: AdapterTable) -> Self {
        self.adapters = adapters;
        self
    }

    /// Replace the ranking policy.
    pub fn with_policy(mut self, policy: RankingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn priority_for(&self, media_type: MediaType) -> &[String] {
        self.priorities
            .get(&media_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn cache_key(&self, query: &Query, providers: &[Arc<dyn MetadataProvider>]) -> CacheKey {
        CacheKey {
            providers: providers.iter().map(|p| p.name().to_string()).collect(),
            media_type: query.media_type,
            text: ranking::normalize(&query.text, query.media_type),
            content_type: query.content_type,
            year: query.year,
        }
    }

    /// Identify `query`.
    pub async fn identify(&self, query: &Query) -> Result<Resolution> {
        self.identify_with_cancel(query, &CancellationToken::new()).await
    }

    /// Identify `query`, giving up when `cancel` fires.
    ///
    /// A cancelled caller leaves the shared lookup; if it was the last one
    /// waiting, the provider calls are dropped and nothing is cached.
    pub async fn identify_with_cancel(&self, query: &Query, cancel: &CancellationToken) -> Result<Resolution> {
        let providers = self
            .registry
            .ordered_for(query.media_type, self.priority_for(query.media_type));
        if providers.is_empty() {
            tracing::warn!("No provider configured for {}", query.media_type);
            return Err(Error::ProviderUnavailable {
                query: query.text.clone(),
                failures: vec![],
            });
        }

        let key = self.cache_key(query, &providers);
        let normalized = key.text.clone();

        let lookup = self.cache.lookup(key, || {
            SearchJob {
                providers,
                adapters: self.adapters.clone(),
                events: self.events.clone(),
                policy: self.policy.clone(),
                query: query.clone(),
                normalized: normalized.clone(),
            }
            .run()
            .boxed()
        });

        let candidates = match lookup {
            Lookup::Hit(candidates) => {
                tracing::debug!("Cache hit for '{}'", normalized);
                self.events.emit(Event::CacheHit {
                    query: normalized.clone(),
                });
                candidates
            }
            Lookup::Pending(waiter) => {
                tracing::debug!(
                    "Cache miss for '{}' ({})",
                    normalized,
                    if waiter.started { "searching" } else { "joining running search" }
                );
                self.events.emit(Event::CacheMiss {
                    query: normalized.clone(),
                });
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!("Identification of '{}' cancelled", query.text);
                        return Err(Error::Cancelled);
                    }
                    outcome = waiter.wait() => outcome,
                };
                outcome.map_err(|failures| Error::ProviderUnavailable {
                    query: query.text.clone(),
                    failures: failures.as_ref().clone(),
                })?
            }
        };

        Ok(self.resolve(query, &normalized, &candidates))
    }

    fn resolve(&self, query: &Query, normalized: &str, candidates: &[Candidate]) -> Resolution {
        let Some(top) = candidates.first() else {
            tracing::info!("No match for '{}'", query.text);
            return Resolution::NotFound;
        };

        let exact = |c: &Candidate| {
            ranking::normalize(&c.title, c.media_type) == normalized
                && ranking::years_compatible(c.year, query.year)
        };

        if exact(top) && candidates.iter().skip(1).all(|c| !exact(c)) {
            tracing::info!("Resolved '{}' to {} ({})", query.text, top.title, top.id);
            return Resolution::Resolved(top.to_record());
        }

        let shortlist: Vec<Candidate> = candidates.iter().take(self.max_candidates).cloned().collect();
        tracing::info!("'{}' is ambiguous: {} candidates", query.text, shortlist.len());
        Resolution::Ambiguous(shortlist)
    }

    fn provider_and_adapter(&self, provider: &str) -> Result<(Arc<dyn MetadataProvider>, Adapter)> {
        let client = self
            .registry
            .get(provider)
            .ok_or_else(|| Error::UnknownProvider(provider.to_string()))?;
        let adapter = *self
            .adapters
            .get(provider)
            .ok_or_else(|| Error::UnknownProvider(provider.to_string()))?;
        Ok((client, adapter))
    }

    /// Fetch the full record for a candidate the caller picked.
    pub async fn disambiguate(&self, id: &CandidateId) -> Result<MediaRecord> {
        let (provider, adapter) = self.provider_and_adapter(&id.provider)?;

        let payload: Value = guarded(provider.as_ref(), provider.details(&id.id, id.content_type))
            .await
            .map_err(|failure| match failure.kind {
                FailureKind::Status(404) => Error::UnknownCandidate(id.to_string()),
                _ => Error::from_failure(failure),
            })?;

        let record = (adapter.record)(&payload, id.content_type).ok_or_else(|| Error::Provider {
            provider: id.provider.clone(),
            kind: FailureKind::Malformed,
            message: format!("details for {} lack required fields", id),
        })?;

        let record = match self.cache.find_candidate(id) {
            Some(candidate) => enrich(record, &candidate),
            None => record,
        };
        tracing::info!("Disambiguated {} to {}", id, record.title);
        Ok(record)
    }

    /// Position a series record at an episode.
    ///
    /// The episode title comes from the first provider in the record's
    /// provider ids that lists episodes. Provider failures degrade to an
    /// untitled episode. Records that are not series come back unchanged.
    pub async fn locate_episode(
        &self,
        record: &MediaRecord,
        season: Option<u32>,
        episodes: EpisodeRange,
    ) -> Result<MediaRecord> {
        if !matches!(record.content_type, ContentType::Series | ContentType::Episode) {
            return Ok(record.clone());
        }

        let Some(season_number) = season else {
            return Ok(record.at_episode(None, episodes, None));
        };

        let mut title = None;
        for (provider_name, series_id) in self.episode_sources(record) {
            let Ok((provider, adapter)) = self.provider_and_adapter(&provider_name) else {
                continue;
            };
            if !provider.supports_episodes() {
                continue;
            }

            match guarded(provider.as_ref(), provider.episodes(&series_id, season_number)).await {
                Ok(items) => {
                    title = items
                        .iter()
                        .filter_map(adapter.episode)
                        .find(|info| info.episode == episodes.first)
                        .and_then(|info| info.title);
                    break;
                }
                Err(failure) => {
                    tracing::warn!("Episode listing failed: {}", failure);
                }
            }
        }

        Ok(record.at_episode(Some(season_number), episodes, title))
    }

    /// Providers of `record`, in video priority order first.
    fn episode_sources(&self, record: &MediaRecord) -> Vec<(String, String)> {
        let mut sources: Vec<(String, String)> = self
            .priority_for(MediaType::Video)
            .iter()
            .filter_map(|name| record.provider_ids.get(name).map(|id| (name.clone(), id.clone())))
            .collect();
        for (name, id) in &record.provider_ids {
            if !sources.iter().any(|(n, _)| n == name) {
                sources.push((name.clone(), id.clone()));
            }
        }
        sources
    }

    /// Drop cached results for this query text, whatever the hints.
    pub fn invalidate(&self, query: &Query) -> usize {
        let text = ranking::normalize(&query.text, query.media_type);
        let removed = self
            .cache
            .invalidate(|key| key.media_type == query.media_type && key.text == text);
        tracing::debug!("Invalidated {} cache entries for '{}'", removed, text);
        removed
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Fill what the details payload lacks from the search candidate.
fn enrich(mut record: MediaRecord, candidate: &Candidate) -> MediaRecord {
    for (provider, id) in &candidate.provider_ids {
        record
            .provider_ids
            .entry(provider.clone())
            .or_insert_with(|| id.clone());
    }
    if record.year.is_none() {
        record.year = candidate.year;
    }
    match &mut record.position {
        Position::Book { author } if author.is_none() => *author = candidate.creator.clone(),
        Position::Track { artist, .. } if artist.is_none() => *artist = candidate.creator.clone(),
        Position::Game { platform } if platform.is_none() => *platform = candidate.creator.clone(),
        _ => {}
    }
    record
}
