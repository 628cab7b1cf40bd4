//! Rule-based filename parser.
//!
//! Extracts structural signals from loosely-named media files:
//! - Season and episode numbers, including ranges and absolute numbering
//! - Release year
//! - Quality, codec and source tags
//! - Disc and track numbers
//!
//! Rules are tried in priority order; the first match for a field wins and
//! later rules only fill fields that are still empty. Parsing never fails:
//! unrecognized input yields a title guess and nothing else.

use crate::models::media::{ContentType, EpisodeRange, MediaType, Query};
use crate::utils::fs;
use chrono::Datelike;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Widest episode range accepted from a multi-episode marker.
const MAX_EPISODE_SPAN: u32 = 50;

/// First year of motion pictures; anything earlier is not a release year.
const MIN_YEAR: u16 = 1888;

/// Parsed filename information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    /// Best guess at the work's title.
    pub title: String,
    /// Season number (for TV shows).
    pub season: Option<u32>,
    /// Episode or episode range (for TV shows).
    pub episodes: Option<EpisodeRange>,
    /// Year of release.
    pub year: Option<u16>,
    /// Quality, codec and source tags in canonical spelling.
    pub quality: BTreeSet<String>,
    /// Disc number.
    pub disc: Option<u32>,
    /// Track number (music).
    pub track: Option<u32>,
    /// Lowercase extension without the dot, when it is a known media extension.
    pub extension: Option<String>,
}

impl ParseResult {
    /// First episode number.
    pub fn episode(&self) -> Option<u32> {
        self.episodes.map(|range| range.first)
    }

    /// Whether the name looks like part of a series.
    pub fn is_episode(&self) -> bool {
        self.episodes.is_some()
    }

    /// Build the identification query for this file.
    pub fn to_query(&self, media_type: MediaType) -> Query {
        let mut query = Query::new(self.title.clone(), media_type);
        if let Some(year) = self.year {
            query = query.with_year(year);
        }
        match media_type {
            MediaType::Video if self.episodes.is_some() || self.season.is_some() => {
                query.with_content_type(ContentType::Series)
            }
            MediaType::Music if self.track.is_some() => query.with_content_type(ContentType::Track),
            _ => query,
        }
    }
}

/// Byte range of a structural match within the stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    fn of(m: regex::Match<'_>) -> Self {
        Self {
            start: m.start(),
            end: m.end(),
        }
    }

    fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

struct EpisodeHit {
    season: Option<u32>,
    episodes: EpisodeRange,
    span: Span,
}

struct TrackHit {
    disc: Option<u32>,
    track: u32,
    span: Span,
}

/// A quality tag and the pattern recognizing it.
struct Tag {
    canonical: &'static str,
    pattern: Regex,
}

fn tags(entries: &[(&'static str, &str)]) -> Vec<Tag> {
    entries
        .iter()
        .map(|(canonical, pattern)| Tag {
            canonical,
            pattern: Regex::new(&format!("(?i){}", pattern)).unwrap(),
        })
        .collect()
}

static GROUP_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(?:\[[^\]]*\]\s*)+").unwrap());
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

// Video episode rules, in priority order.
static SEASON_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)S(\d{1,3})[ ._-]?E(\d{1,4})((?:[ ._]?-?[ ._]?E\d{1,4}|-\d{1,4})*)").unwrap()
});
static CROSS_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2})x(\d{2,3})").unwrap());
static WORD_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Season[ ._-]*(\d{1,2})[ ._-]*(?:Episode|Ep)[ ._-]*(\d{1,4})").unwrap()
});
static SEASON_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Season[ ._-]*(\d{1,2})").unwrap());
static ABSOLUTE_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s-\s(\d{1,4})(?:v\d)?").unwrap());
static ABSOLUTE_EP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Ep(?:isode)?[ ._-]*(\d{1,4})").unwrap());
static ABSOLUTE_HASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\d{1,4})").unwrap());
static ABSOLUTE_E: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)E(\d{1,4})").unwrap());

// Disc and track rules.
static DISC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:CD|Disc|Disk)[ ._-]?(\d{1,2})").unwrap());
static DISC_TRACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d)-(\d{2})(?:[ ._]+|[ ]*-[ ]*)").unwrap());
static LEADING_TRACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3})(?:[ ]*[-.][ ]*|[ ]+)").unwrap());
static INNER_TRACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s-\s(\d{1,3})\s-\s").unwrap());
static WORD_TRACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Track[ ._-]*(\d{1,3})").unwrap());

// Longer spellings come first so they claim their span before shorter ones.
static VIDEO_TAGS: LazyLock<Vec<Tag>> = LazyLock::new(|| {
    tags(&[
        ("2160p", "2160p"),
        ("4K", "4k"),
        ("UHD", "uhd"),
        ("1080p", "1080p"),
        ("1080i", "1080i"),
        ("720p", "720p"),
        ("576p", "576p"),
        ("480p", "480p"),
        ("x264", "x264"),
        ("x265", "x265"),
        ("H264", r"h\.?264"),
        ("H265", r"h\.?265"),
        ("HEVC", "hevc"),
        ("AVC", "avc"),
        ("XviD", "xvid"),
        ("DivX", "divx"),
        ("VP9", "vp9"),
        ("AV1", "av1"),
        ("10bit", r"10[ -]?bit"),
        ("HDR", r"hdr(?:10\+?)?"),
        ("DTS-HD", r"dts-?hd(?:[ .-]?ma)?"),
        ("DTS", "dts"),
        ("TrueHD", "true-?hd"),
        ("Atmos", "atmos"),
        ("DD+", r"dd(?:\+|p)(?:[57]\.1)?"),
        ("DD5.1", r"dd5\.1"),
        ("EAC3", "e-?ac-?3"),
        ("AC3", "ac-?3"),
        ("AAC", r"aac(?:2\.0|5\.1)?"),
        ("FLAC", "flac"),
        ("MP3", "mp3"),
        ("BluRay", "blu-?ray"),
        ("BRRip", "br-?rip"),
        ("BDRip", "bd-?rip"),
        ("WEB-DL", r"web[ .-]?dl"),
        ("WEBRip", "web-?rip"),
        ("HDTV", "hdtv"),
        ("DVDRip", "dvd-?rip"),
        ("DVD", "dvd"),
        ("REMUX", "remux"),
    ])
});

static MUSIC_TAGS: LazyLock<Vec<Tag>> = LazyLock::new(|| {
    tags(&[
        ("FLAC", "flac"),
        ("ALAC", "alac"),
        ("MP3", "mp3"),
        ("AAC", "aac"),
        ("320kbps", r"320 ?kbps|320k"),
        ("V0", "v0"),
        ("24bit", r"24[ -]?bit"),
        ("16bit", r"16[ -]?bit"),
        ("Lossless", "lossless"),
        ("WEB", "web"),
        ("CD", "cd"),
        ("Vinyl", "vinyl"),
    ])
});

static BOOK_TAGS: LazyLock<Vec<Tag>> = LazyLock::new(|| {
    tags(&[
        ("EPUB", "epub"),
        ("PDF", "pdf"),
        ("MOBI", "mobi"),
        ("AZW3", "azw3"),
        ("CBZ", "cbz"),
        ("CBR", "cbr"),
        ("Retail", "retail"),
    ])
});

static GAME_TAGS: LazyLock<Vec<Tag>> = LazyLock::new(|| {
    tags(&[
        ("GOG", "gog"),
        ("Repack", "repack"),
        ("PROPER", "proper"),
        ("ISO", "iso"),
        ("NSP", "nsp"),
        ("XCI", "xci"),
        ("MULTi", r"multi\d{0,2}"),
    ])
});

fn vocabulary(media_type: MediaType) -> &'static [Tag] {
    match media_type {
        MediaType::Video => &VIDEO_TAGS,
        MediaType::Music => &MUSIC_TAGS,
        MediaType::Book => &BOOK_TAGS,
        MediaType::Game => &GAME_TAGS,
    }
}

/// Whether `token` is, in its entirety, a quality tag for `media_type`.
pub fn is_quality_tag(token: &str, media_type: MediaType) -> bool {
    vocabulary(media_type).iter().any(|tag| {
        tag.pattern
            .find(token)
            .map_or(false, |m| m.start() == 0 && m.end() == token.len())
    })
}

fn boundary_before(s: &str, idx: usize) -> bool {
    s[..idx]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric())
}

fn boundary_after(s: &str, idx: usize) -> bool {
    s[idx..].chars().next().map_or(true, |c| !c.is_alphanumeric())
}

fn number(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

fn max_year() -> u16 {
    u16::try_from(chrono::Local::now().year() + 1).unwrap_or(u16::MAX)
}

fn is_year(digits: &str) -> bool {
    digits.len() == 4
        && digits
            .parse::<u16>()
            .map_or(false, |y| (MIN_YEAR..=max_year()).contains(&y))
}

/// Inclusive range, or a single episode when the end is implausible.
fn episode_range(first: u32, last: Option<u32>) -> EpisodeRange {
    match last {
        Some(last) if last > first && last - first <= MAX_EPISODE_SPAN => {
            EpisodeRange::span(first, last)
        }
        _ => EpisodeRange::single(first),
    }
}

/// First match of `pattern` bounded by non-alphanumeric characters.
fn bounded_captures<'a>(pattern: &Regex, stem: &'a str, check_after: bool) -> Option<Captures<'a>> {
    pattern.captures_iter(stem).find(|caps| {
        let Some(m) = caps.get(0) else {
            return false;
        };
        boundary_before(stem, m.start()) && (!check_after || boundary_after(stem, m.end()))
    })
}

fn split_extension(file_name: &str) -> (&str, Option<String>) {
    if let Some((stem, ext)) = file_name.rsplit_once('.') {
        if !stem.is_empty() && MediaType::ALL.iter().any(|t| fs::is_media_extension(ext, *t)) {
            return (stem, Some(ext.to_lowercase()));
        }
    }
    (file_name, None)
}

fn strip_group_tags(stem: &str) -> &str {
    match GROUP_TAGS.find(stem) {
        Some(m) => &stem[m.end()..],
        None => stem,
    }
}

/// `S01E02`, with ranges `S01E01-E03`, `S01E01E02` and `S01E01-03`.
fn season_episode(stem: &str) -> Option<EpisodeHit> {
    let caps = bounded_captures(&SEASON_EPISODE, stem, false)?;
    let first = number(&caps, 2)?;
    let last = caps
        .get(3)
        .and_then(|tail| DIGITS.find_iter(tail.as_str()).last())
        .and_then(|d| d.as_str().parse().ok());

    Some(EpisodeHit {
        season: number(&caps, 1),
        episodes: episode_range(first, last),
        span: Span::of(caps.get(0)?),
    })
}

/// `1x05`
fn cross_format(stem: &str) -> Option<EpisodeHit> {
    let caps = bounded_captures(&CROSS_FORMAT, stem, true)?;
    Some(EpisodeHit {
        season: number(&caps, 1),
        episodes: EpisodeRange::single(number(&caps, 2)?),
        span: Span::of(caps.get(0)?),
    })
}

/// `Season 1 Episode 5`, `Season 1 Ep 5`
fn word_form(stem: &str) -> Option<EpisodeHit> {
    let caps = bounded_captures(&WORD_FORM, stem, true)?;
    Some(EpisodeHit {
        season: number(&caps, 1),
        episodes: EpisodeRange::single(number(&caps, 2)?),
        span: Span::of(caps.get(0)?),
    })
}

/// `Show - 045`, `Ep 12`, `#12`, `E12`: an episode without a season.
fn absolute(stem: &str) -> Option<EpisodeHit> {
    let dash = ABSOLUTE_DASH
        .captures_iter(stem)
        .filter(|caps| caps.get(0).map_or(false, |m| boundary_after(stem, m.end())))
        .find(|caps| caps.get(1).map_or(false, |d| !is_year(d.as_str())));

    let caps = dash
        .or_else(|| bounded_captures(&ABSOLUTE_EP, stem, true))
        .or_else(|| {
            ABSOLUTE_HASH
                .captures_iter(stem)
                .find(|caps| caps.get(0).map_or(false, |m| boundary_after(stem, m.end())))
        })
        .or_else(|| bounded_captures(&ABSOLUTE_E, stem, true))?;

    Some(EpisodeHit {
        season: None,
        episodes: EpisodeRange::single(number(&caps, 1)?),
        span: Span::of(caps.get(0)?),
    })
}

fn find_episode(stem: &str) -> Option<EpisodeHit> {
    season_episode(stem)
        .or_else(|| cross_format(stem))
        .or_else(|| word_form(stem))
        .or_else(|| absolute(stem))
}

fn find_season_only(stem: &str) -> Option<(u32, Span)> {
    let caps = bounded_captures(&SEASON_ONLY, stem, true)?;
    Some((number(&caps, 1)?, Span::of(caps.get(0)?)))
}

fn find_track(stem: &str) -> Option<TrackHit> {
    if let Some(caps) = DISC_TRACK.captures(stem) {
        return Some(TrackHit {
            disc: number(&caps, 1),
            track: number(&caps, 2)?,
            span: Span::of(caps.get(0)?),
        });
    }

    if let Some(caps) = LEADING_TRACK.captures(stem) {
        let m = caps.get(0)?;
        let next_is_digit = stem[m.end()..].starts_with(|c: char| c.is_ascii_digit());
        if !next_is_digit && m.end() < stem.len() {
            return Some(TrackHit {
                disc: None,
                track: number(&caps, 1)?,
                span: Span::of(m),
            });
        }
    }

    let caps = INNER_TRACK
        .captures(stem)
        .or_else(|| bounded_captures(&WORD_TRACK, stem, true))?;
    Some(TrackHit {
        disc: None,
        track: number(&caps, 1)?,
        span: Span::of(caps.get(0)?),
    })
}

fn find_disc(stem: &str) -> Option<(u32, Span)> {
    let caps = bounded_captures(&DISC, stem, true)?;
    Some((number(&caps, 1)?, Span::of(caps.get(0)?)))
}

/// Last valid year that is not at the very start of the name; a leading
/// year is only used when it is the only one.
fn find_year(stem: &str) -> Option<(u16, Span)> {
    let candidates: Vec<(u16, Span)> = DIGITS
        .find_iter(stem)
        .filter(|m| is_year(m.as_str()))
        .filter(|m| boundary_before(stem, m.start()) && boundary_after(stem, m.end()))
        .filter_map(|m| Some((m.as_str().parse().ok()?, Span::of(m))))
        .collect();

    let leading = |span: &Span| !stem[..span.start].chars().any(char::is_alphanumeric);

    candidates
        .iter()
        .rev()
        .find(|(_, span)| !leading(span))
        .or_else(|| candidates.first())
        .copied()
}

fn find_quality(stem: &str, media_type: MediaType) -> (BTreeSet<String>, Vec<Span>) {
    let mut found = BTreeSet::new();
    let mut spans: Vec<Span> = Vec::new();

    for tag in vocabulary(media_type) {
        for m in tag.pattern.find_iter(stem) {
            if !boundary_before(stem, m.start()) || !boundary_after(stem, m.end()) {
                continue;
            }
            let span = Span::of(m);
            if spans.iter().any(|s| s.overlaps(&span)) {
                continue;
            }
            found.insert(tag.canonical.to_string());
            spans.push(span);
        }
    }

    (found, spans)
}

/// Normalize separators to spaces and strip stray brackets.
fn clean_title(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if matches!(c, '.' | '_' | '-') { ' ' } else { c })
        .collect();
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || "[](){}".contains(c))
        .to_string()
}

fn guess_title(stem: &str, spans: &[Span]) -> String {
    let Some(first) = spans.iter().min_by_key(|s| s.start) else {
        return clean_title(stem);
    };

    let before = clean_title(&stem[..first.start]);
    if !before.is_empty() {
        return before;
    }

    let next = spans
        .iter()
        .filter(|s| s.start >= first.end)
        .map(|s| s.start)
        .min()
        .unwrap_or(stem.len());
    let between = clean_title(&stem[first.end..next]);
    if !between.is_empty() {
        return between;
    }

    clean_title(stem)
}

/// Parse a file name (or path) for the given media type.
pub fn parse(name: &str, media_type: MediaType) -> ParseResult {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, extension) = split_extension(file_name);
    let stem = strip_group_tags(stem);

    let mut result = ParseResult {
        extension,
        ..Default::default()
    };
    let mut spans = Vec::new();

    if media_type == MediaType::Video {
        if let Some(hit) = find_episode(stem) {
            result.season = hit.season;
            result.episodes = Some(hit.episodes);
            spans.push(hit.span);
        }
        if result.season.is_none() {
            if let Some((season, span)) = find_season_only(stem) {
                result.season = Some(season);
                spans.push(span);
            }
        }
    }

    if media_type == MediaType::Music {
        if let Some(hit) = find_track(stem) {
            result.disc = hit.disc;
            result.track = Some(hit.track);
            spans.push(hit.span);
        }
    }

    if result.disc.is_none() {
        if let Some((disc, span)) = find_disc(stem) {
            result.disc = Some(disc);
            spans.push(span);
        }
    }

    if let Some((year, span)) = find_year(stem) {
        result.year = Some(year);
        spans.push(span);
    }

    let (quality, quality_spans) = find_quality(stem, media_type);
    result.quality = quality;
    spans.extend(quality_spans);

    result.title = guess_title(stem, &spans);
    result
}
