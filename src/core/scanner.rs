//! Directory scanner module.
//!
//! Scans directories recursively for media files, skipping samples and
//! bonus material folders.

use crate::models::media::MediaType;
use crate::utils::fs::{is_sample, media_type_of};
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Folder names holding bonus material rather than the work itself.
const EXTRAS_NAMES: &[&str] = &[
    "extras",
    "extra",
    "featurettes",
    "featurette",
    "behind the scenes",
    "behindthescenes",
    "deleted scenes",
    "deletedscenes",
    "making of",
    "makingof",
    "bonus",
    "bonuses",
    "special features",
    "specialfeatures",
    "sample",
    "samples",
    "scans",
    "artwork",
];

/// A media file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
    pub media_type: MediaType,
}

/// Result of scanning a directory.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Media files found, sorted by path.
    pub files: Vec<MediaFile>,
    /// Media files skipped as samples or extras.
    pub skipped: Vec<PathBuf>,
    /// Total files scanned.
    pub total_files_scanned: usize,
    /// Total directories scanned.
    pub total_dirs_scanned: usize,
}

/// Check if a file is inside an extras or sample directory below `root`.
///
/// Matches the names in [`EXTRAS_NAMES`] exactly (case-insensitive) and
/// release-style suffixes such as `The.Movie.Extras-Group`.
fn is_in_extras_directory(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let Some(parent) = relative.parent() else {
        return false;
    };

    parent.components().any(|component| {
        let std::path::Component::Normal(name) = component else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        EXTRAS_NAMES.contains(&name.as_str())
            || [".extras", "-extras", "_extras", ".featurette", "-featurette", ".sample", "-sample"]
                .iter()
                .any(|suffix| name.contains(suffix))
    })
}

/// Scan a directory for media files.
///
/// With `media_type` set only files of that type are returned; otherwise
/// every recognized media file is, typed by its extension.
pub fn scan_directory(path: &Path, media_type: Option<MediaType>) -> Result<ScanResult> {
    // Validate path exists and is a directory
    if !path.exists() {
        return Err(crate::Error::PathNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(crate::Error::NotADirectory(path.display().to_string()));
    }

    let mut result = ScanResult::default();

    for entry in WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let entry_path = entry.path();

        if entry.file_type().is_dir() {
            result.total_dirs_scanned += 1;
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        result.total_files_scanned += 1;

        let Some(found_type) = media_type_of(entry_path) else {
            continue;
        };
        if media_type.map_or(false, |wanted| wanted != found_type) {
            continue;
        }

        if is_in_extras_directory(path, entry_path) || is_sample(entry_path) {
            tracing::debug!("Skipping sample/extra: {}", entry_path.display());
            result.skipped.push(entry_path.to_path_buf());
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => result.files.push(MediaFile {
                path: entry_path.to_path_buf(),
                filename: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                media_type: found_type,
            }),
            Err(e) => {
                tracing::warn!("Failed to read media file {:?}: {}", entry_path, e);
            }
        }
    }

    // Sort results for consistent output
    result.files.sort_by(|a, b| a.path.cmp(&b.path));
    result.skipped.sort();

    tracing::info!(
        "Scanned {} files in {} directories: {} media files, {} skipped",
        result.total_files_scanned,
        result.total_dirs_scanned,
        result.files.len(),
        result.skipped.len()
    );

    Ok(result)
}
