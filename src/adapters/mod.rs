//! Response adapters.
//!
//! Pure functions that map one provider's raw JSON items into canonical
//! [`Candidate`]s and [`MediaRecord`]s, registered in a table keyed by
//! provider name. An item that lacks the fields an adapter needs maps to
//! `None` and is skipped by the caller.

pub mod deezer;
pub mod musicbrainz;
pub mod openlibrary;
pub mod rawg;
pub mod tmdb;

use crate::models::media::{Candidate, ContentType, MediaRecord};
use serde_json::Value;
use std::collections::HashMap;

/// Map a search item to a candidate. The content type is the one searched.
pub type CandidateFn = fn(&Value, ContentType) -> Option<Candidate>;

/// Map a detail payload to a record.
pub type RecordFn = fn(&Value, ContentType) -> Option<MediaRecord>;

/// Map an episode listing item.
pub type EpisodeFn = fn(&Value) -> Option<EpisodeInfo>;

/// One entry of an episode listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub season: Option<u32>,
    pub episode: u32,
    pub title: Option<String>,
}

/// The mapping functions for one provider.
#[derive(Debug, Clone, Copy)]
pub struct Adapter {
    pub candidate: CandidateFn,
    pub record: RecordFn,
    pub episode: EpisodeFn,
}

/// Adapter lookup table.
#[derive(Debug, Clone)]
pub struct AdapterTable {
    adapters: HashMap<String, Adapter>,
}

impl AdapterTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register (or replace) the adapter used for `provider`.
    pub fn register(&mut self, provider: impl Into<String>, adapter: Adapter) {
        self.adapters.insert(provider.into(), adapter);
    }

    pub fn get(&self, provider: &str) -> Option<&Adapter> {
        self.adapters.get(provider)
    }
}

impl Default for AdapterTable {
    /// Table with the adapters of every shipped provider.
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(crate::services::tmdb::NAME, tmdb::adapter());
        table.register(crate::services::musicbrainz::NAME, musicbrainz::adapter());
        table.register(crate::services::deezer::NAME, deezer::adapter());
        table.register(crate::services::openlibrary::NAME, openlibrary::adapter());
        table.register(crate::services::rawg::NAME, rawg::adapter());
        table
    }
}

/// Episode mapper for providers without episode listings.
pub fn no_episode(_item: &Value) -> Option<EpisodeInfo> {
    None
}

/// Non-empty string field.
pub(crate) fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Identifier that may be sent as a number or a string.
pub(crate) fn id(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Year from a date such as `1999-03-30`, `August 1965` or `1965`.
pub(crate) fn year_of(date: &str) -> Option<u16> {
    date.split(|c: char| !c.is_ascii_digit())
        .find(|token| token.len() == 4)
        .and_then(|token| token.parse().ok())
}

/// Year stored either as a number or a date string.
pub(crate) fn year_field(value: &Value, key: &str) -> Option<u16> {
    match value.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|y| u16::try_from(y).ok()),
        Value::String(s) => year_of(s),
        _ => None,
    }
}

pub(crate) fn number(value: &Value, key: &str) -> Option<f32> {
    value.get(key).and_then(Value::as_f64).map(|n| n as f32)
}

pub(crate) fn unsigned(value: &Value, key: &str) -> Option<u32> {
    match value.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
