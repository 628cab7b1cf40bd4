//! Naming template engine.
//!
//! A template is a `/`-separated list of path segments. Each segment mixes
//! literal text with placeholders: `{title}`, `{year}`, `{season:03}`,
//! `{id:tmdb}` and so on. Placeholders are validated when the template is
//! parsed; rendering fails when the record lacks a field the template uses.

use crate::models::media::{EpisodeRange, MediaRecord, Position};
use crate::utils::fs::sanitize_segment;
use crate::{Error, Result};
use std::path::PathBuf;

/// A placeholder field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Title,
    Year,
    Ext,
    MediaType,
    ContentType,
    Series,
    Season,
    Episode,
    EpisodeTitle,
    Artist,
    Album,
    Disc,
    Track,
    Author,
    Platform,
    ProviderId(String),
}

impl Field {
    fn parse(name: &str) -> Option<Field> {
        if let Some(provider) = name.strip_prefix("id:") {
            return (!provider.is_empty()).then(|| Field::ProviderId(provider.to_string()));
        }
        Some(match name {
            "title" => Field::Title,
            "year" => Field::Year,
            "ext" => Field::Ext,
            "media_type" => Field::MediaType,
            "content_type" => Field::ContentType,
            "series" => Field::Series,
            "season" => Field::Season,
            "episode" => Field::Episode,
            "episode_title" => Field::EpisodeTitle,
            "artist" => Field::Artist,
            "album" => Field::Album,
            "disc" => Field::Disc,
            "track" => Field::Track,
            "author" => Field::Author,
            "platform" => Field::Platform,
            _ => return None,
        })
    }

    /// Minimum width of numeric fields when the template gives none.
    fn default_width(&self) -> Option<usize> {
        match self {
            Field::Season | Field::Episode | Field::Track => Some(2),
            Field::Year | Field::Disc => Some(0),
            _ => None,
        }
    }

    fn name(&self) -> String {
        match self {
            Field::Title => "title".to_string(),
            Field::Year => "year".to_string(),
            Field::Ext => "ext".to_string(),
            Field::MediaType => "media_type".to_string(),
            Field::ContentType => "content_type".to_string(),
            Field::Series => "series".to_string(),
            Field::Season => "season".to_string(),
            Field::Episode => "episode".to_string(),
            Field::EpisodeTitle => "episode_title".to_string(),
            Field::Artist => "artist".to_string(),
            Field::Album => "album".to_string(),
            Field::Disc => "disc".to_string(),
            Field::Track => "track".to_string(),
            Field::Author => "author".to_string(),
            Field::Platform => "platform".to_string(),
            Field::ProviderId(provider) => format!("id:{}", provider),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Placeholder { field: Field, width: Option<usize> },
}

/// Value of a field for one record, before formatting.
enum Value {
    Text(String),
    Number(u32),
    Range(EpisodeRange),
}

/// A parsed naming template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Vec<Piece>>,
}

impl Template {
    /// Parse and validate a template.
    pub fn parse(source: &str) -> Result<Template> {
        let invalid = |reason: String| Error::PlanInvalid {
            template: source.to_string(),
            reason,
        };

        if source.trim().is_empty() {
            return Err(invalid("template is empty".to_string()));
        }

        let mut segments = Vec::new();
        for raw in source.split('/') {
            if raw.trim().is_empty() {
                return Err(invalid("template has an empty path segment".to_string()));
            }
            segments.push(Self::parse_segment(raw).map_err(invalid)?);
        }

        Ok(Template {
            source: source.to_string(),
            segments,
        })
    }

    fn parse_segment(raw: &str) -> std::result::Result<Vec<Piece>, String> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(open) = rest.find(['{', '}']) {
            if rest[open..].starts_with('}') {
                return Err(format!("unmatched '}}' in '{}'", raw));
            }
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| format!("unclosed placeholder in '{}'", raw))?;
            let inner = &after[..close];
            if inner.contains('{') {
                return Err(format!("nested placeholder in '{}'", raw));
            }

            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Self::parse_placeholder(inner)?);
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(pieces)
    }

    /// `field` or `field:0N`; `id:<provider>` takes no width.
    fn parse_placeholder(inner: &str) -> std::result::Result<Piece, String> {
        let (name, width) = match inner.rsplit_once(':') {
            Some((name, width)) if !inner.starts_with("id:") || name.contains(':') => {
                let digits = width
                    .strip_prefix('0')
                    .filter(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()))
                    .ok_or_else(|| format!("invalid width '{}' for field '{}'", width, name))?;
                let width: usize = digits
                    .parse()
                    .map_err(|_| format!("invalid width '{}' for field '{}'", width, name))?;
                (name, Some(width))
            }
            _ => (inner, None),
        };

        let field = Field::parse(name).ok_or_else(|| format!("unknown field '{}'", name))?;
        if width.is_some() && field.default_width().is_none() {
            return Err(format!("field '{}' is not numeric and cannot be padded", name));
        }
        Ok(Piece::Placeholder { field, width })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Fields used by this template, in order of appearance.
    pub fn fields(&self) -> Vec<&Field> {
        self.segments
            .iter()
            .flatten()
            .filter_map(|piece| match piece {
                Piece::Placeholder { field, .. } => Some(field),
                Piece::Literal(_) => None,
            })
            .collect()
    }

    fn value(field: &Field, record: &MediaRecord, extension: &str) -> Option<Value> {
        let text = |s: &Option<String>| s.as_ref().filter(|s| !s.trim().is_empty()).cloned().map(Value::Text);

        match (field, &record.position) {
            (Field::Title, _) => Some(Value::Text(record.title.clone())),
            (Field::Year, _) => record.year.map(|y| Value::Number(u32::from(y))),
            (Field::Ext, _) => Some(Value::Text(extension.to_string())),
            (Field::MediaType, _) => Some(Value::Text(record.media_type.as_str().to_string())),
            (Field::ContentType, _) => Some(Value::Text(record.content_type.as_str().to_string())),
            (Field::ProviderId(provider), _) => record.provider_ids.get(provider).cloned().map(Value::Text),

            (Field::Series, Position::Episode { series, .. }) => Some(Value::Text(series.clone())),
            (Field::Season, Position::Episode { season, .. }) => season.map(Value::Number),
            (Field::Episode, Position::Episode { episodes, .. }) => Some(Value::Range(*episodes)),
            (Field::EpisodeTitle, Position::Episode { episode_title, .. }) => text(episode_title),

            (Field::Artist, Position::Track { artist, .. }) => text(artist),
            (Field::Album, Position::Track { album, .. }) => text(album),
            (Field::Disc, Position::Track { disc, .. }) => disc.map(Value::Number),
            (Field::Track, Position::Track { track, .. }) => track.map(Value::Number),

            (Field::Author, Position::Book { author }) => text(author),
            (Field::Platform, Position::Game { platform }) => text(platform),

            _ => None,
        }
    }

    fn format(value: Value, width: usize) -> String {
        match value {
            Value::Text(text) => text,
            Value::Number(n) => format!("{:0width$}", n, width = width),
            Value::Range(range) if range.is_single() => format!("{:0width$}", range.first, width = width),
            Value::Range(range) => format!(
                "{:0width$}-{:0width$}",
                range.first,
                range.last,
                width = width
            ),
        }
    }

    /// Render the relative destination path for `record`.
    ///
    /// `extension` is substituted for `{ext}` as given (e.g. `.mkv`).
    /// Substituted values are sanitized with `replacement`; literal text is
    /// kept as written.
    pub fn render(&self, record: &MediaRecord, extension: &str, replacement: &str) -> Result<PathBuf> {
        let invalid = |reason: String| Error::PlanInvalid {
            template: self.source.clone(),
            reason,
        };

        let mut path = PathBuf::new();
        for pieces in &self.segments {
            let mut segment = String::new();
            for piece in pieces {
                match piece {
                    Piece::Literal(text) => segment.push_str(text),
                    Piece::Placeholder { field, width } => {
                        let value = Self::value(field, record, extension).ok_or_else(|| {
                            invalid(format!(
                                "{} record has no '{}'",
                                record.content_type,
                                field.name()
                            ))
                        })?;
                        let width = width.or(field.default_width()).unwrap_or(0);
                        let formatted = Self::format(value, width);
                        if *field == Field::Ext {
                            segment.push_str(&formatted);
                        } else {
                            segment.push_str(&sanitize_segment(&formatted, replacement));
                        }
                    }
                }
            }

            let segment = segment.trim().trim_end_matches(['.', ' ']).to_string();
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(invalid(format!(
                    "path segment '{}' renders empty",
                    pieces
                        .iter()
                        .map(|p| match p {
                            Piece::Literal(text) => text.clone(),
                            Piece::Placeholder { field, .. } => format!("{{{}}}", field.name()),
                        })
                        .collect::<String>()
                )));
            }
            path.push(segment);
        }

        Ok(path)
    }
}
