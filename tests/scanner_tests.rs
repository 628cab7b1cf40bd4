//! Integration tests for the scanner module.
//!
//! Tests cover:
//! - Directory scanning across media types
//! - Sample and extras detection
//! - Error handling for non-existent paths

use media_librarian::core::scanner::scan_directory;
use media_librarian::models::media::MediaType;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_scan_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let result = scan_directory(temp_dir.path(), None).unwrap();

    assert!(result.files.is_empty());
    assert!(result.skipped.is_empty());
}

#[test]
fn test_scan_with_video_files() {
    let temp_dir = TempDir::new().unwrap();

    let video_path = temp_dir.path().join("movie.mkv");
    fs::write(&video_path, "fake video content").unwrap();

    let result = scan_directory(temp_dir.path(), Some(MediaType::Video)).unwrap();

    assert_eq!(result.files.len(), 1);
    assert_eq!(result.files[0].filename, "movie.mkv");
    assert_eq!(result.files[0].size, 18);
    assert_eq!(result.files[0].media_type, MediaType::Video);
}

#[test]
fn test_scan_with_sample_folder() {
    let temp_dir = TempDir::new().unwrap();

    let sample_dir = temp_dir.path().join("Sample");
    fs::create_dir(&sample_dir).unwrap();
    fs::write(sample_dir.join("clip.mkv"), "fake sample").unwrap();
    fs::write(temp_dir.path().join("movie-sample.mkv"), "fake sample").unwrap();
    fs::write(temp_dir.path().join("movie.mkv"), "fake video").unwrap();

    let result = scan_directory(temp_dir.path(), None).unwrap();

    assert_eq!(result.files.len(), 1);
    assert_eq!(result.skipped.len(), 2);
}

#[test]
fn test_scan_nonexistent_path() {
    let result = scan_directory(Path::new("/nonexistent/path"), None);
    assert!(result.is_err());
}

#[test]
fn test_scan_file_is_not_a_directory() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("movie.mkv");
    fs::write(&file, "fake").unwrap();

    let err = scan_directory(&file, None).unwrap_err();
    assert!(err.to_string().contains("Not a directory"));
}

#[test]
fn test_scan_filters_by_media_type() {
    let temp_dir = TempDir::new().unwrap();

    fs::write(temp_dir.path().join("movie1.mkv"), "fake").unwrap();
    fs::write(temp_dir.path().join("movie2.mp4"), "fake").unwrap();
    fs::write(temp_dir.path().join("01 - Song.flac"), "fake").unwrap();
    fs::write(temp_dir.path().join("Dune.epub"), "fake").unwrap();
    fs::write(temp_dir.path().join("document.txt"), "not media").unwrap();

    let videos = scan_directory(temp_dir.path(), Some(MediaType::Video)).unwrap();
    assert_eq!(videos.files.len(), 2);

    let everything = scan_directory(temp_dir.path(), None).unwrap();
    assert_eq!(everything.files.len(), 4);
    assert_eq!(everything.total_files_scanned, 5);

    let names: Vec<&str> = everything.files.iter().map(|f| f.filename.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn test_scan_nested_directories() {
    let temp_dir = TempDir::new().unwrap();

    let nested = temp_dir.path().join("Show").join("Season 01");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("Show.S01E01.mkv"), "fake").unwrap();

    let result = scan_directory(temp_dir.path(), Some(MediaType::Video)).unwrap();

    assert_eq!(result.files.len(), 1);
    assert!(result.total_dirs_scanned >= 3);
}
