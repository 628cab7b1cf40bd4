//! Open Library payloads.

use super::{no_episode, text, year_field, Adapter};
use crate::models::media::{Candidate, ContentType, MediaRecord};
use crate::services::openlibrary::NAME;
use serde_json::Value;

pub fn adapter() -> Adapter {
    Adapter {
        candidate,
        record,
        episode: no_episode,
    }
}

/// `/works/OL893415W` -> `OL893415W`
fn work_id(item: &Value) -> Option<String> {
    let key = text(item, "key")?;
    let id = key.rsplit('/').next().unwrap_or(&key).to_string();
    (!id.is_empty()).then_some(id)
}

pub fn candidate(item: &Value, _content_type: ContentType) -> Option<Candidate> {
    let author = item
        .get("author_name")
        .and_then(Value::as_array)
        .and_then(|names| names.first())
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(
        Candidate::new(NAME, work_id(item)?, ContentType::Book, text(item, "title")?)
            .with_year(year_field(item, "first_publish_year"))
            .with_creator(author),
    )
}

/// Work details carry no author names, only author keys; the orchestrator
/// fills the author from the search candidate.
pub fn record(details: &Value, _content_type: ContentType) -> Option<MediaRecord> {
    let record = MediaRecord::new(text(details, "title")?, ContentType::Book)
        .with_year(year_field(details, "first_publish_date"))
        .with_provider_id(NAME, work_id(details)?);
    Some(record.with_position(crate::models::media::Position::Book { author: None }))
}
