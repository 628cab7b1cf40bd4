//! MusicBrainz payloads.

use super::{id, no_episode, number, text, year_field, Adapter};
use crate::models::media::{Candidate, ContentType, MediaRecord, Position};
use crate::services::musicbrainz::NAME;
use serde_json::Value;

pub fn adapter() -> Adapter {
    Adapter {
        candidate,
        record,
        episode: no_episode,
    }
}

/// First credited artist.
fn artist(item: &Value) -> Option<String> {
    item.get("artist-credit")
        .and_then(Value::as_array)
        .and_then(|credits| credits.first())
        .and_then(|credit| text(credit, "name"))
}

/// Title of the first release a recording appears on.
fn first_release(item: &Value) -> Option<String> {
    item.get("releases")
        .and_then(Value::as_array)
        .and_then(|releases| releases.first())
        .and_then(|release| text(release, "title"))
}

pub fn candidate(item: &Value, content_type: ContentType) -> Option<Candidate> {
    let mbid = id(item, "id")?;
    let candidate = match content_type {
        ContentType::Artist => {
            let begin = item.get("life-span").and_then(|span| year_field(span, "begin"));
            Candidate::new(NAME, mbid, ContentType::Artist, text(item, "name")?).with_year(begin)
        }
        ContentType::Track => Candidate::new(NAME, mbid, ContentType::Track, text(item, "title")?)
            .with_year(year_field(item, "first-release-date"))
            .with_creator(artist(item)),
        _ => Candidate::new(NAME, mbid, ContentType::Album, text(item, "title")?)
            .with_year(year_field(item, "date"))
            .with_creator(artist(item)),
    };
    Some(candidate.with_score(number(item, "score")))
}

pub fn record(details: &Value, content_type: ContentType) -> Option<MediaRecord> {
    let mut record = candidate(details, content_type)?.to_record();
    if content_type == ContentType::Track {
        if let Position::Track { album, .. } = &mut record.position {
            *album = first_release(details);
        }
    }
    Some(record)
}
