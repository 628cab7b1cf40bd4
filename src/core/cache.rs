//! Query result cache with single-flight lookups.
//!
//! Finished lookups are kept for a fixed TTL. A lookup that is still running
//! is shared: identical queries arriving meanwhile wait on the same future
//! instead of starting their own provider calls. When the last waiter gives
//! up on an unfinished lookup, the lookup is dropped and nothing is cached.

use crate::error::ProviderFailure;
use crate::models::media::{Candidate, CandidateId, ContentType, MediaType};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Result of one shared lookup. Failures are not cached.
pub type LookupOutcome = std::result::Result<Arc<Vec<Candidate>>, Arc<Vec<ProviderFailure>>>;

type SharedLookup = Shared<BoxFuture<'static, LookupOutcome>>;

/// Identity of a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Providers consulted, in priority order.
    pub providers: Vec<String>,
    pub media_type: MediaType,
    /// Normalized query text.
    pub text: String,
    pub content_type: Option<ContentType>,
    pub year: Option<u16>,
}

struct CacheEntry {
    candidates: Arc<Vec<Candidate>>,
    inserted_at: Instant,
}

struct InFlight {
    future: SharedLookup,
    waiters: usize,
    generation: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlight>,
    next_generation: u64,
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of [`QueryCache::lookup`].
pub enum Lookup {
    /// A live cache entry.
    Hit(Arc<Vec<Candidate>>),
    /// A running lookup, either just started or joined.
    Pending(Waiter),
}

/// Handle on a running lookup. Dropping it before completion leaves the
/// lookup; the last one to leave cancels it.
pub struct Waiter {
    state: Arc<Mutex<CacheState>>,
    key: CacheKey,
    generation: u64,
    future: SharedLookup,
    /// Whether this waiter started the lookup.
    pub started: bool,
}

impl Waiter {
    pub async fn wait(self) -> LookupOutcome {
        self.future.clone().await
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        let abandoned = match state.in_flight.get_mut(&self.key) {
            Some(flight) if flight.generation == self.generation => {
                flight.waiters = flight.waiters.saturating_sub(1);
                flight.waiters == 0
            }
            _ => false,
        };
        if abandoned {
            tracing::debug!("Last waiter left lookup for '{}', dropping it", self.key.text);
            state.in_flight.remove(&self.key);
        }
    }
}

/// Per-orchestrator query cache.
#[derive(Clone)]
pub struct QueryCache {
    state: Arc<Mutex<CacheState>>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live entry for `key`, removing it when expired.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Candidate>>> {
        let mut state = lock(&self.state);
        Self::live_entry(&mut state, key, self.ttl)
    }

    fn live_entry(state: &mut CacheState, key: &CacheKey, ttl: Duration) -> Option<Arc<Vec<Candidate>>> {
        let expired = match state.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < ttl => {
                return Some(Arc::clone(&entry.candidates));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(key);
        }
        None
    }

    /// Return the cached candidates for `key`, join the running lookup, or
    /// start a new one with `start`.
    ///
    /// The started future writes its successful result into the cache before
    /// it stops being shared, so a later caller finds one or the other.
    pub fn lookup<F>(&self, key: CacheKey, start: F) -> Lookup
    where
        F: FnOnce() -> BoxFuture<'static, LookupOutcome>,
    {
        let mut state = lock(&self.state);

        if let Some(candidates) = Self::live_entry(&mut state, &key, self.ttl) {
            return Lookup::Hit(candidates);
        }

        if let Some(flight) = state.in_flight.get_mut(&key) {
            flight.waiters += 1;
            return Lookup::Pending(Waiter {
                state: Arc::clone(&self.state),
                key,
                generation: flight.generation,
                future: flight.future.clone(),
                started: false,
            });
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let inner = start();
        let shared_state = Arc::clone(&self.state);
        let flight_key = key.clone();
        let future = async move {
            let outcome = inner.await;
            let mut state = lock(&shared_state);
            if let Ok(candidates) = &outcome {
                state.entries.insert(
                    flight_key.clone(),
                    CacheEntry {
                        candidates: Arc::clone(candidates),
                        inserted_at: Instant::now(),
                    },
                );
            }
            if state
                .in_flight
                .get(&flight_key)
                .map_or(false, |f| f.generation == generation)
            {
                state.in_flight.remove(&flight_key);
            }
            outcome
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                future: future.clone(),
                waiters: 1,
                generation,
            },
        );

        Lookup::Pending(Waiter {
            state: Arc::clone(&self.state),
            key,
            generation,
            future,
            started: true,
        })
    }

    /// Find a cached candidate by id in any live entry.
    pub fn find_candidate(&self, id: &CandidateId) -> Option<Candidate> {
        let state = lock(&self.state);
        state
            .entries
            .values()
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .flat_map(|entry| entry.candidates.iter())
            .find(|candidate| &candidate.id == id || candidate.provider_ids.get(&id.provider) == Some(&id.id))
            .cloned()
    }

    /// Remove every entry whose key matches `predicate`.
    pub fn invalidate<P>(&self, predicate: P) -> usize
    where
        P: Fn(&CacheKey) -> bool,
    {
        let mut state = lock(&self.state);
        let before = state.entries.len();
        state.entries.retain(|key, _| !predicate(key));
        before - state.entries.len()
    }

    pub fn clear(&self) {
        lock(&self.state).entries.clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookups currently running.
    pub fn in_flight(&self) -> usize {
        lock(&self.state).in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(text: &str) -> CacheKey {
        CacheKey {
            providers: vec!["tmdb".to_string()],
            media_type: MediaType::Video,
            text: text.to_string(),
            content_type: None,
            year: None,
        }
    }

    fn found(title: &str) -> LookupOutcome {
        Ok(Arc::new(vec![Candidate::new("tmdb", "1", ContentType::Movie, title)]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_is_cached_until_ttl() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let Lookup::Pending(waiter) = cache.lookup(key("matrix"), || async { found("The Matrix") }.boxed()) else {
            panic!("expected a new lookup");
        };
        assert!(waiter.started);
        assert!(waiter.wait().await.is_ok());

        assert!(matches!(
            cache.lookup(key("matrix"), || async { found("other") }.boxed()),
            Lookup::Hit(_)
        ));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get(&key("matrix")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_lookups_share_one_future() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let starts = Arc::new(AtomicUsize::new(0));

        let start = |starts: Arc<AtomicUsize>| {
            move || {
                starts.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    found("The Matrix")
                }
                .boxed()
            }
        };

        let Lookup::Pending(first) = cache.lookup(key("matrix"), start(starts.clone())) else {
            panic!("expected a new lookup");
        };
        let Lookup::Pending(second) = cache.lookup(key("matrix"), start(starts.clone())) else {
            panic!("expected to join the running lookup");
        };
        assert!(!second.started);

        let (a, b) = tokio::join!(first.wait(), second.wait());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let Lookup::Pending(waiter) = cache.lookup(key("x"), || {
            async {
                let outcome: LookupOutcome = Err(Arc::new(vec![]));
                outcome
            }
            .boxed()
        }) else {
            panic!("expected a new lookup");
        };
        assert!(waiter.wait().await.is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_last_waiter_leaving_drops_lookup() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let lookup = cache.lookup(key("slow"), || futures::future::pending::<LookupOutcome>().boxed());
        assert_eq!(cache.in_flight(), 1);
        drop(lookup);
        assert_eq!(cache.in_flight(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = QueryCache::new(Duration::from_secs(60));
        {
            let mut state = lock(&cache.state);
            for text in ["a", "b"] {
                state.entries.insert(
                    key(text),
                    CacheEntry {
                        candidates: Arc::new(vec![]),
                        inserted_at: Instant::now(),
                    },
                );
            }
        }
        assert_eq!(cache.invalidate(|k| k.text == "a"), 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
