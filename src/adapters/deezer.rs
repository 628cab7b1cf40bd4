//! Deezer payloads.

use super::{id, no_episode, number, text, year_field, Adapter};
use crate::models::media::{Candidate, ContentType, MediaRecord, Position};
use crate::services::deezer::NAME;
use serde_json::Value;

pub fn adapter() -> Adapter {
    Adapter {
        candidate,
        record,
        episode: no_episode,
    }
}

fn nested_name(item: &Value, key: &str, field: &str) -> Option<String> {
    item.get(key).and_then(|inner| text(inner, field))
}

pub fn candidate(item: &Value, content_type: ContentType) -> Option<Candidate> {
    let deezer_id = id(item, "id")?;
    let candidate = match content_type {
        ContentType::Artist => Candidate::new(NAME, deezer_id, ContentType::Artist, text(item, "name")?)
            .with_score(number(item, "nb_fan")),
        ContentType::Track => Candidate::new(NAME, deezer_id, ContentType::Track, text(item, "title")?)
            .with_creator(nested_name(item, "artist", "name"))
            .with_score(number(item, "rank")),
        _ => Candidate::new(NAME, deezer_id, ContentType::Album, text(item, "title")?)
            .with_creator(nested_name(item, "artist", "name")),
    };
    // Search results have no dates; album details do.
    Some(candidate.with_year(year_field(item, "release_date")))
}

pub fn record(details: &Value, content_type: ContentType) -> Option<MediaRecord> {
    let mut record = candidate(details, content_type)?.to_record();
    if content_type == ContentType::Track {
        if let Position::Track { album, track, disc, .. } = &mut record.position {
            *album = nested_name(details, "album", "title");
            *track = super::unsigned(details, "track_position");
            *disc = super::unsigned(details, "disk_number");
        }
    }
    Some(record)
}
