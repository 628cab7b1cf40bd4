//! Scripted in-process providers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use media_librarian::core::orchestrator::Orchestrator;
use media_librarian::error::FailureKind;
use media_librarian::events::{Event, EventBus};
use media_librarian::models::config::{Config, RateLimitConfig};
use media_librarian::models::media::{ContentType, MediaType, Query};
use media_librarian::services::rate_limit::RateLimiter;
use media_librarian::services::{MetadataProvider, ProviderRegistry};
use media_librarian::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Provider answering from canned JSON, counting every call.
pub struct ScriptedProvider {
    name: String,
    media_types: Vec<MediaType>,
    results: Vec<Value>,
    failure: Option<FailureKind>,
    delay: Duration,
    timeout: Duration,
    details: HashMap<String, Value>,
    episodes: HashMap<u32, Vec<Value>>,
    episodes_fail: bool,
    limiter: Option<RateLimiter>,
    searches: AtomicUsize,
    detail_calls: AtomicUsize,
    episode_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &str, media_types: &[MediaType]) -> Self {
        Self {
            name: name.to_string(),
            media_types: media_types.to_vec(),
            results: vec![],
            failure: None,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(10),
            details: HashMap::new(),
            episodes: HashMap::new(),
            episodes_fail: false,
            limiter: None,
            searches: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
            episode_calls: AtomicUsize::new(0),
        }
    }

    pub fn returning(mut self, results: Vec<Value>) -> Self {
        self.results = results;
        self
    }

    pub fn failing(mut self, kind: FailureKind) -> Self {
        self.failure = Some(kind);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_details(mut self, id: &str, payload: Value) -> Self {
        self.details.insert(id.to_string(), payload);
        self
    }

    pub fn with_episodes(mut self, season: u32, items: Vec<Value>) -> Self {
        self.episodes.insert(season, items);
        self
    }

    pub fn with_failing_episodes(mut self) -> Self {
        self.episodes_fail = true;
        self
    }

    pub fn with_limiter(mut self, config: RateLimitConfig) -> Self {
        self.limiter = Some(RateLimiter::new(self.name.clone(), config));
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn episode_calls(&self) -> usize {
        self.episode_calls.load(Ordering::SeqCst)
    }

    fn error(&self, kind: FailureKind) -> Error {
        Error::Provider {
            provider: self.name.clone(),
            kind,
            message: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl MetadataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    async fn search(&self, _query: &Query) -> Result<Vec<Value>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.failure {
            Some(kind) => Err(self.error(kind)),
            None => Ok(self.results.clone()),
        }
    }

    async fn details(&self, id: &str, _content_type: ContentType) -> Result<Value> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details
            .get(id)
            .cloned()
            .ok_or_else(|| self.error(FailureKind::Status(404)))
    }

    async fn episodes(&self, _series_id: &str, season: u32) -> Result<Vec<Value>> {
        self.episode_calls.fetch_add(1, Ordering::SeqCst);
        if self.episodes_fail {
            return Err(self.error(FailureKind::Status(503)));
        }
        Ok(self.episodes.get(&season).cloned().unwrap_or_default())
    }

    fn supports_episodes(&self) -> bool {
        !self.episodes.is_empty() || self.episodes_fail
    }

    fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.limiter.as_ref()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Registry holding the given providers.
pub fn registry(providers: &[Arc<ScriptedProvider>]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider.clone() as Arc<dyn MetadataProvider>);
    }
    registry
}

/// Orchestrator over scripted providers with default priorities.
pub fn orchestrator(providers: &[Arc<ScriptedProvider>]) -> Orchestrator {
    orchestrator_with(providers, &Config::default())
}

pub fn orchestrator_with(providers: &[Arc<ScriptedProvider>], config: &Config) -> Orchestrator {
    Orchestrator::new(registry(providers), config, EventBus::default())
}

/// Everything received so far.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
