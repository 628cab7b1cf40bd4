//! File system utilities.

use crate::models::media::MediaType;
use crate::Result;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static SEASON_DIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:season|saison|staffel|temporada|s)[\s._]*0*(\d{1,3})(?:[\s\-].*)?$").unwrap()
});

const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "m4v", "ts", "m2ts", "flv", "webm", "mpg", "mpeg", "vob",
    "ogv", "3gp", "divx", "rmvb",
];

const MUSIC_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "m4a", "aac", "ogg", "opus", "wma", "ape", "alac", "aiff", "dsf",
];

const BOOK_EXTENSIONS: &[&str] = &[
    "epub", "mobi", "azw", "azw3", "pdf", "djvu", "fb2", "cbz", "cbr", "lit",
];

const GAME_EXTENSIONS: &[&str] = &[
    "iso", "bin", "cue", "img", "mdf", "nrg", "nes", "sfc", "smc", "n64", "z64", "v64", "nds",
    "3ds", "cia", "nsp", "xci", "wbfs", "rvz", "chd", "gba", "gbc",
];

/// Characters that may not appear in a path segment.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Check if a path exists and is a directory.
pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(crate::Error::PathNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(crate::Error::NotADirectory(path.display().to_string()));
    }
    Ok(())
}

/// Get file extension in lowercase.
pub fn get_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Known extensions for a media type, without the leading dot.
pub fn extensions_for(media_type: MediaType) -> &'static [&'static str] {
    match media_type {
        MediaType::Video => VIDEO_EXTENSIONS,
        MediaType::Music => MUSIC_EXTENSIONS,
        MediaType::Book => BOOK_EXTENSIONS,
        MediaType::Game => GAME_EXTENSIONS,
    }
}

/// Check if an extension (without dot, any case) is a known media extension.
pub fn is_media_extension(ext: &str, media_type: MediaType) -> bool {
    let ext = ext.to_lowercase();
    extensions_for(media_type).contains(&ext.as_str())
}

/// Check if a file belongs to a media type based on extension.
pub fn is_media_file(path: &Path, media_type: MediaType) -> bool {
    get_extension(path)
        .map(|ext| extensions_for(media_type).contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Guess the media type of a file from its extension.
///
/// Ambiguous extensions resolve in `MediaType::ALL` order.
pub fn media_type_of(path: &Path) -> Option<MediaType> {
    MediaType::ALL
        .into_iter()
        .find(|media_type| is_media_file(path, *media_type))
}

/// Make a substituted value safe to use inside one path segment.
///
/// Illegal and control characters are replaced with `replacement`,
/// whitespace runs collapse, and trailing dots and spaces are trimmed.
pub fn sanitize_segment(value: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if ILLEGAL_CHARS.contains(&c) || c.is_control() {
            out.push_str(replacement);
        } else {
            out.push(c);
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches(['.', ' ']).to_string()
}

/// Whether two paths refer to the same existing file.
pub fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Season number of a season folder name: `Season 01`, `Saison 1`,
/// `S01`, `Staffel 2 - Extras`.
pub fn season_number(name: &str) -> Option<u32> {
    SEASON_DIR
        .captures(name.trim())
        .and_then(|caps| caps[1].parse().ok())
}

/// Check if a path contains "sample" (case insensitive).
pub fn is_sample(path: &Path) -> bool {
    path.file_name()
        .map(|n| {
            let lower = n.to_string_lossy().to_lowercase();
            lower.contains("sample") && !lower.contains("sampler")
        })
        .unwrap_or(false)
}
