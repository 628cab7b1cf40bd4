//! Media-related data models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Media type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Music,
    Book,
    Game,
}

impl MediaType {
    /// All media types, in display order.
    pub const ALL: [MediaType; 4] = [
        MediaType::Video,
        MediaType::Music,
        MediaType::Book,
        MediaType::Game,
    ];

    /// Lowercase name used in configuration keys and templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Music => "music",
            MediaType::Book => "book",
            MediaType::Game => "game",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "video" | "movies" | "tv" => Ok(MediaType::Video),
            "music" | "audio" => Ok(MediaType::Music),
            "book" | "books" => Ok(MediaType::Book),
            "game" | "games" => Ok(MediaType::Game),
            other => Err(crate::Error::other(format!("Unknown media type: {}", other))),
        }
    }
}

/// Content type within a media category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Series,
    Episode,
    Album,
    Track,
    Artist,
    Book,
    Game,
    Dlc,
}

impl ContentType {
    /// The media category this content type belongs to.
    pub fn media_type(&self) -> MediaType {
        match self {
            ContentType::Movie | ContentType::Series | ContentType::Episode => MediaType::Video,
            ContentType::Album | ContentType::Track | ContentType::Artist => MediaType::Music,
            ContentType::Book => MediaType::Book,
            ContentType::Game | ContentType::Dlc => MediaType::Game,
        }
    }

    /// Content type searched when a query carries no hint.
    pub fn default_for(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Video => ContentType::Movie,
            MediaType::Music => ContentType::Album,
            MediaType::Book => ContentType::Book,
            MediaType::Game => ContentType::Game,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Series => "series",
            ContentType::Episode => "episode",
            ContentType::Album => "album",
            ContentType::Track => "track",
            ContentType::Artist => "artist",
            ContentType::Book => "book",
            ContentType::Game => "game",
            ContentType::Dlc => "dlc",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "movie" => Ok(ContentType::Movie),
            "series" | "tv" | "tvshow" => Ok(ContentType::Series),
            "episode" => Ok(ContentType::Episode),
            "album" => Ok(ContentType::Album),
            "track" => Ok(ContentType::Track),
            "artist" => Ok(ContentType::Artist),
            "book" => Ok(ContentType::Book),
            "game" => Ok(ContentType::Game),
            "dlc" => Ok(ContentType::Dlc),
            other => Err(crate::Error::other(format!("Unknown content type: {}", other))),
        }
    }
}

/// A search request against the metadata providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Free text, usually a parsed title guess.
    pub text: String,
    /// Media category to search in.
    pub media_type: MediaType,
    /// Optional content type hint.
    pub content_type: Option<ContentType>,
    /// Optional disambiguating year.
    pub year: Option<u16>,
}

impl Query {
    pub fn new(text: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            text: text.into(),
            media_type,
            content_type: None,
            year: None,
        }
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    /// Content type that will actually be searched.
    pub fn effective_content_type(&self) -> ContentType {
        self.content_type
            .filter(|c| c.media_type() == self.media_type)
            .unwrap_or_else(|| ContentType::default_for(self.media_type))
    }
}

/// Provider-scoped identifier of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId {
    pub provider: String,
    pub id: String,
    pub content_type: ContentType,
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.content_type, self.id)
    }
}

/// One provider's proposed match for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub title: String,
    pub media_type: MediaType,
    pub year: Option<u16>,
    /// Popularity or rating, when the provider supplies one.
    pub score: Option<f32>,
    /// Artist, author or platform, depending on the media type.
    pub creator: Option<String>,
    /// Every provider id known for this work (filled further by merging).
    pub provider_ids: BTreeMap<String, String>,
}

impl Candidate {
    pub fn new(
        provider: impl Into<String>,
        id: impl Into<String>,
        content_type: ContentType,
        title: impl Into<String>,
    ) -> Self {
        let provider = provider.into();
        let id = id.into();
        let mut provider_ids = BTreeMap::new();
        provider_ids.insert(provider.clone(), id.clone());
        Self {
            id: CandidateId {
                provider,
                id,
                content_type,
            },
            title: title.into(),
            media_type: content_type.media_type(),
            year: None,
            score: None,
            creator: None,
            provider_ids,
        }
    }

    pub fn with_year(mut self, year: Option<u16>) -> Self {
        self.year = year;
        self
    }

    pub fn with_score(mut self, score: Option<f32>) -> Self {
        self.score = score;
        self
    }

    pub fn with_creator(mut self, creator: Option<String>) -> Self {
        self.creator = creator.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn content_type(&self) -> ContentType {
        self.id.content_type
    }

    pub fn provider(&self) -> &str {
        &self.id.provider
    }

    /// Build a record from what the search result alone tells us.
    pub fn to_record(&self) -> MediaRecord {
        let position = match self.content_type() {
            ContentType::Album | ContentType::Track => Position::Track {
                artist: self.creator.clone(),
                album: (self.content_type() == ContentType::Album).then(|| self.title.clone()),
                disc: None,
                track: None,
            },
            ContentType::Book => Position::Book {
                author: self.creator.clone(),
            },
            ContentType::Game | ContentType::Dlc => Position::Game {
                platform: self.creator.clone(),
            },
            _ => Position::None,
        };

        MediaRecord {
            title: self.title.clone(),
            media_type: self.media_type,
            content_type: self.content_type(),
            year: self.year,
            position,
            provider_ids: self.provider_ids.clone(),
        }
    }
}

/// Inclusive episode range; a single episode has `first == last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRange {
    pub first: u32,
    pub last: u32,
}

impl EpisodeRange {
    pub fn single(episode: u32) -> Self {
        Self {
            first: episode,
            last: episode,
        }
    }

    /// Range from `first` to `last`, or a single episode when `last` is not after `first`.
    pub fn span(first: u32, last: u32) -> Self {
        Self {
            first,
            last: last.max(first),
        }
    }

    pub fn is_single(&self) -> bool {
        self.first == self.last
    }
}

/// Where a work sits inside its hierarchy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Position {
    #[default]
    None,
    Episode {
        series: String,
        season: Option<u32>,
        episodes: EpisodeRange,
        episode_title: Option<String>,
    },
    Track {
        artist: Option<String>,
        album: Option<String>,
        disc: Option<u32>,
        track: Option<u32>,
    },
    Book {
        author: Option<String>,
    },
    Game {
        platform: Option<String>,
    },
}

/// Canonical, provider-agnostic description of an identified work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub title: String,
    pub media_type: MediaType,
    pub content_type: ContentType,
    pub year: Option<u16>,
    pub position: Position,
    /// Provider name to provider id, for traceability.
    pub provider_ids: BTreeMap<String, String>,
}

impl MediaRecord {
    pub fn new(title: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            title: title.into(),
            media_type: content_type.media_type(),
            content_type,
            year: None,
            position: Position::None,
            provider_ids: BTreeMap::new(),
        }
    }

    pub fn with_year(mut self, year: Option<u16>) -> Self {
        self.year = year;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_provider_id(mut self, provider: impl Into<String>, id: impl Into<String>) -> Self {
        self.provider_ids.insert(provider.into(), id.into());
        self
    }

    /// Derive an episode record from a series record.
    ///
    /// The series title becomes `series`; the episode title (if known)
    /// becomes the record title.
    pub fn at_episode(
        &self,
        season: Option<u32>,
        episodes: EpisodeRange,
        episode_title: Option<String>,
    ) -> MediaRecord {
        let series = match &self.position {
            Position::Episode { series, .. } => series.clone(),
            _ => self.title.clone(),
        };
        MediaRecord {
            title: episode_title.clone().unwrap_or_else(|| series.clone()),
            media_type: MediaType::Video,
            content_type: ContentType::Episode,
            year: self.year,
            position: Position::Episode {
                series,
                season,
                episodes,
                episode_title,
            },
            provider_ids: self.provider_ids.clone(),
        }
    }

    /// Derive a track record from an album record.
    pub fn at_track(&self, disc: Option<u32>, track: Option<u32>, title: impl Into<String>) -> MediaRecord {
        let (artist, album) = match &self.position {
            Position::Track { artist, album, .. } => (
                artist.clone(),
                album.clone().or_else(|| Some(self.title.clone())),
            ),
            _ => (None, Some(self.title.clone())),
        };
        MediaRecord {
            title: title.into(),
            media_type: MediaType::Music,
            content_type: ContentType::Track,
            year: self.year,
            position: Position::Track {
                artist,
                album,
                disc,
                track,
            },
            provider_ids: self.provider_ids.clone(),
        }
    }
}
