//! TMDB payloads.

use super::{id, number, text, unsigned, year_field, Adapter, EpisodeInfo};
use crate::models::media::{Candidate, ContentType, MediaRecord};
use crate::services::tmdb::NAME;
use serde_json::Value;

pub fn adapter() -> Adapter {
    Adapter {
        candidate,
        record,
        episode,
    }
}

fn is_series(content_type: ContentType) -> bool {
    matches!(content_type, ContentType::Series | ContentType::Episode)
}

/// Movie results carry `title`/`release_date`, TV results `name`/`first_air_date`.
pub fn candidate(item: &Value, content_type: ContentType) -> Option<Candidate> {
    let tmdb_id = id(item, "id")?;
    let (content_type, title, year) = if is_series(content_type) {
        (
            ContentType::Series,
            text(item, "name").or_else(|| text(item, "original_name"))?,
            year_field(item, "first_air_date"),
        )
    } else {
        (
            ContentType::Movie,
            text(item, "title").or_else(|| text(item, "original_title"))?,
            year_field(item, "release_date"),
        )
    };

    Some(
        Candidate::new(NAME, tmdb_id, content_type, title)
            .with_year(year)
            .with_score(number(item, "popularity")),
    )
}

pub fn record(details: &Value, content_type: ContentType) -> Option<MediaRecord> {
    let candidate = candidate(details, content_type)?;
    let mut record = candidate.to_record();

    let imdb = text(details, "imdb_id").or_else(|| {
        details
            .get("external_ids")
            .and_then(|ids| text(ids, "imdb_id"))
    });
    if let Some(imdb) = imdb {
        record = record.with_provider_id("imdb", imdb);
    }
    Some(record)
}

pub fn episode(item: &Value) -> Option<EpisodeInfo> {
    Some(EpisodeInfo {
        season: unsigned(item, "season_number"),
        episode: unsigned(item, "episode_number")?,
        title: text(item, "name"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::MediaType;
    use serde_json::json;

    #[test]
    fn test_movie_candidate() {
        let item = json!({
            "id": 603,
            "title": "The Matrix",
            "original_title": "The Matrix",
            "release_date": "1999-03-30",
            "popularity": 83.5
        });
        let candidate = candidate(&item, ContentType::Movie).unwrap();
        assert_eq!(candidate.id.id, "603");
        assert_eq!(candidate.title, "The Matrix");
        assert_eq!(candidate.year, Some(1999));
        assert_eq!(candidate.media_type, MediaType::Video);
        assert_eq!(candidate.score, Some(83.5));
    }

    #[test]
    fn test_episode_query_maps_to_series_candidate() {
        let item = json!({"id": 1396, "name": "Breaking Bad", "first_air_date": "2008-01-20"});
        let candidate = candidate(&item, ContentType::Episode).unwrap();
        assert_eq!(candidate.content_type(), ContentType::Series);
        assert_eq!(candidate.year, Some(2008));
    }

    #[test]
    fn test_missing_title_is_skipped() {
        assert!(candidate(&json!({"id": 1}), ContentType::Movie).is_none());
        assert!(candidate(&json!({"title": "x"}), ContentType::Movie).is_none());
    }

    #[test]
    fn test_details_record_keeps_imdb_id() {
        let details = json!({
            "id": 603,
            "imdb_id": "tt0133093",
            "title": "The Matrix",
            "release_date": "1999-03-30"
        });
        let record = record(&details, ContentType::Movie).unwrap();
        assert_eq!(record.provider_ids.get("tmdb").map(String::as_str), Some("603"));
        assert_eq!(record.provider_ids.get("imdb").map(String::as_str), Some("tt0133093"));
    }

    #[test]
    fn test_episode_entry() {
        let info = episode(&json!({"episode_number": 3, "season_number": 1, "name": "...And the Bag's in the River"})).unwrap();
        assert_eq!(info.episode, 3);
        assert_eq!(info.season, Some(1));
    }
}
