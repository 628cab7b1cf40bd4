//! End-to-end tests: file name in, organized library out.
//!
//! Providers are scripted in-process; everything else (parser, cache,
//! adapters, planner, executor) is the real thing.

mod common;

use common::{registry, ScriptedProvider};
use media_librarian::core::orchestrator::Resolution;
use media_librarian::core::planner::PlanRequest;
use media_librarian::models::config::Config;
use media_librarian::models::media::{ContentType, MediaType};
use media_librarian::Engine;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "media bytes").unwrap();
}

// ========== MOVIES ==========

#[tokio::test]
async fn test_movie_file_is_organized() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir
        .path()
        .join("downloads/The.Matrix.1999.1080p.BluRay.x264.mkv");
    write(&source);
    let library = temp_dir.path().join("library");

    let tmdb = ScriptedProvider::new("tmdb", &[MediaType::Video])
        .returning(vec![
            json!({"id": 603, "title": "The Matrix", "release_date": "1999-03-30", "popularity": 80.1}),
            json!({"id": 604, "title": "The Matrix Reloaded", "release_date": "2003-05-15", "popularity": 40.2}),
        ])
        .build();
    let engine = Engine::with_registry(Config::default(), registry(&[tmdb.clone()]));
    let cancel = CancellationToken::new();

    let identified = engine
        .identify_file(&source, MediaType::Video, &cancel)
        .await
        .unwrap();
    assert_eq!(identified.query.text, "The Matrix");
    assert_eq!(identified.query.year, Some(1999));

    let Resolution::Resolved(record) = identified.resolution else {
        panic!("expected a resolved record");
    };
    assert_eq!(record.title, "The Matrix");
    assert_eq!(record.year, Some(1999));
    assert_eq!(record.provider_ids.get("tmdb").map(String::as_str), Some("603"));

    let plan = engine.plan(&record, &source, &library).unwrap();
    engine.validate(&plan).unwrap();
    let report = engine.execute(&plan, &cancel).await;

    assert!(report.is_complete());
    let destination = library.join("The Matrix (1999)").join("The Matrix (1999).mkv");
    assert!(destination.exists());
    assert!(!source.exists());

    // Same query again is answered from the cache
    let again = engine
        .identify_file(&destination, MediaType::Video, &cancel)
        .await
        .unwrap();
    assert!(matches!(again.resolution, Resolution::Resolved(_)));
    assert_eq!(tmdb.searches(), 1);

    // Planning the organized file again is a no-op
    let Resolution::Resolved(record) = again.resolution else {
        unreachable!();
    };
    assert!(engine.plan(&record, &destination, &library).unwrap().is_noop());
}

// ========== EPISODES ==========

#[tokio::test]
async fn test_episode_file_is_organized() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("downloads/Breaking.Bad.S01E02.720p.HDTV.x264.mkv");
    write(&source);
    let library = temp_dir.path().join("tv");

    let tmdb = ScriptedProvider::new("tmdb", &[MediaType::Video])
        .returning(vec![json!({
            "id": 1396,
            "name": "Breaking Bad",
            "first_air_date": "2008-01-20"
        })])
        .with_episodes(
            1,
            vec![
                json!({"season_number": 1, "episode_number": 1, "name": "Pilot"}),
                json!({"season_number": 1, "episode_number": 2, "name": "Cat's in the Bag..."}),
            ],
        )
        .build();
    let engine = Engine::with_registry(Config::default(), registry(&[tmdb.clone()]));
    let cancel = CancellationToken::new();

    let identified = engine
        .identify_file(&source, MediaType::Video, &cancel)
        .await
        .unwrap();
    assert_eq!(identified.parsed.season, Some(1));
    assert_eq!(identified.query.content_type, Some(ContentType::Series));

    let Resolution::Resolved(record) = identified.resolution else {
        panic!("expected a resolved record");
    };
    assert_eq!(record.content_type, ContentType::Episode);
    assert_eq!(tmdb.episode_calls(), 1);

    let plan = engine
        .plan_batch(
            &[PlanRequest {
                record,
                source: source.clone(),
            }],
            &library,
        )
        .unwrap();
    let report = engine.execute(&plan, &cancel).await;

    assert!(report.is_complete());
    assert!(library
        .join("Breaking Bad")
        .join("Season 01")
        .join("Breaking Bad - S01E02.mkv")
        .exists());
}

// ========== MUSIC ==========

#[tokio::test]
async fn test_track_file_uses_track_details() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("downloads/01 - One More Time.flac");
    write(&source);
    let library = temp_dir.path().join("music");

    let deezer = ScriptedProvider::new("deezer", &[MediaType::Music])
        .returning(vec![json!({
            "id": 3135556,
            "title": "One More Time",
            "artist": {"name": "Daft Punk"}
        })])
        .with_details(
            "3135556",
            json!({
                "id": 3135556,
                "title": "One More Time",
                "release_date": "2001-03-07",
                "track_position": 1,
                "disk_number": 1,
                "artist": {"name": "Daft Punk"},
                "album": {"title": "Discovery"}
            }),
        )
        .build();
    let engine = Engine::with_registry(Config::default(), registry(&[deezer.clone()]));
    let cancel = CancellationToken::new();

    let identified = engine
        .identify_file(&source, MediaType::Music, &cancel)
        .await
        .unwrap();
    assert_eq!(identified.parsed.track, Some(1));

    let Resolution::Resolved(record) = identified.resolution else {
        panic!("expected a resolved record");
    };
    assert_eq!(deezer.detail_calls(), 1);

    let plan = engine.plan(&record, &source, &library).unwrap();
    assert_eq!(
        plan.operations[0].destination,
        library
            .join("Daft Punk")
            .join("Discovery (2001)")
            .join("01 - One More Time.flac")
    );
}

// ========== UNRESOLVED ==========

#[tokio::test]
async fn test_unknown_file_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("downloads/home.video.2019.mp4");
    write(&source);

    let tmdb = ScriptedProvider::new("tmdb", &[MediaType::Video]).build();
    let engine = Engine::with_registry(Config::default(), registry(&[tmdb]));

    let identified = engine
        .identify_file(&source, MediaType::Video, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(identified.resolution, Resolution::NotFound);
}
