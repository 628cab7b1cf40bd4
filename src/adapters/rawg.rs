//! RAWG payloads.

use super::{id, no_episode, number, text, year_field, Adapter};
use crate::models::media::{Candidate, ContentType, MediaRecord};
use crate::services::rawg::NAME;
use serde_json::Value;

pub fn adapter() -> Adapter {
    Adapter {
        candidate,
        record,
        episode: no_episode,
    }
}

/// First listed platform, e.g. `PC`.
fn platform(item: &Value) -> Option<String> {
    item.get("platforms")
        .and_then(Value::as_array)
        .and_then(|platforms| platforms.first())
        .and_then(|entry| entry.get("platform"))
        .and_then(|platform| text(platform, "name"))
}

pub fn candidate(item: &Value, content_type: ContentType) -> Option<Candidate> {
    let content_type = match content_type {
        ContentType::Dlc => ContentType::Dlc,
        _ => ContentType::Game,
    };
    Some(
        Candidate::new(NAME, id(item, "id")?, content_type, text(item, "name")?)
            .with_year(year_field(item, "released"))
            .with_score(number(item, "rating"))
            .with_creator(platform(item)),
    )
}

pub fn record(details: &Value, content_type: ContentType) -> Option<MediaRecord> {
    Some(candidate(details, content_type)?.to_record())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::Position;
    use serde_json::json;

    #[test]
    fn test_game_candidate() {
        let item = json!({
            "id": 4200,
            "name": "Portal 2",
            "released": "2011-04-18",
            "rating": 4.61,
            "platforms": [{"platform": {"id": 4, "name": "PC"}}, {"platform": {"id": 1, "name": "Xbox One"}}]
        });
        let record = record(&item, ContentType::Game).unwrap();
        assert_eq!(record.title, "Portal 2");
        assert_eq!(record.year, Some(2011));
        assert_eq!(record.position, Position::Game { platform: Some("PC".to_string()) });
    }

    #[test]
    fn test_unreleased_game_has_no_year() {
        let item = json!({"id": 1, "name": "Untitled", "released": null});
        assert_eq!(candidate(&item, ContentType::Game).unwrap().year, None);
    }
}
