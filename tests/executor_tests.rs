//! Integration tests for the plan executor.
//!
//! Tests cover:
//! - Ordered execution stopping at the first failure
//! - Copy, verify and delete transfers
//! - Refusing to overwrite existing files
//! - Resuming and running several plans

use media_librarian::core::executor::Executor;
use media_librarian::core::planner::operation_kind;
use media_librarian::events::{Event, EventBus};
use media_librarian::models::config::ExecutorConfig;
use media_librarian::models::plan::{
    OperationOutcome, OrganizationPlan, PlannedOperation, TransferMethod,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn executor(config: ExecutorConfig) -> (Executor, EventBus) {
    let events = EventBus::default();
    (Executor::new(config, events.clone()), events)
}

fn op(source: PathBuf, destination: PathBuf) -> PlannedOperation {
    PlannedOperation {
        kind: operation_kind(&source, &destination),
        source,
        destination,
    }
}

fn plan(id: &str, library_root: &Path, operations: Vec<PlannedOperation>) -> OrganizationPlan {
    OrganizationPlan {
        id: id.to_string(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        library_root: library_root.to_path_buf(),
        operations,
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

// ========== ORDERED EXECUTION ==========

#[tokio::test]
async fn test_moves_files_into_library() {
    let temp_dir = TempDir::new().unwrap();
    let library = temp_dir.path().join("library");
    let source = temp_dir.path().join("in/The.Matrix.1999.mkv");
    write(&source, "matrix");
    let destination = library.join("The Matrix (1999)/The Matrix (1999).mkv");

    let (executor, _) = executor(ExecutorConfig::default());
    let plan = plan("p1", &library, vec![op(source.clone(), destination.clone())]);
    executor.validate(&plan).unwrap();

    let report = executor.execute(&plan, &CancellationToken::new()).await;

    assert!(report.is_complete());
    assert_eq!(
        report.outcomes,
        vec![OperationOutcome::Succeeded {
            method: TransferMethod::Rename
        }]
    );
    assert!(!source.exists());
    assert_eq!(fs::read_to_string(&destination).unwrap(), "matrix");
}

#[tokio::test]
async fn test_failure_stops_execution() {
    let temp_dir = TempDir::new().unwrap();
    let library = temp_dir.path().join("library");
    let first = temp_dir.path().join("in/a.mkv");
    let missing = temp_dir.path().join("in/b.mkv");
    let third = temp_dir.path().join("in/c.mkv");
    write(&first, "a");
    write(&third, "c");

    let (executor, events) = executor(ExecutorConfig::default());
    let mut rx = events.subscribe();
    let plan = plan(
        "p2",
        &library,
        vec![
            op(first.clone(), library.join("A/a.mkv")),
            op(missing, library.join("B/b.mkv")),
            op(third.clone(), library.join("C/c.mkv")),
        ],
    );

    let report = executor.execute(&plan, &CancellationToken::new()).await;

    assert!(matches!(report.outcomes[0], OperationOutcome::Succeeded { .. }));
    assert!(matches!(report.outcomes[1], OperationOutcome::Failed { .. }));
    assert_eq!(report.outcomes[2], OperationOutcome::NotAttempted);
    assert_eq!(report.resume_from, Some(1));
    assert!(!report.cancelled);

    assert!(library.join("A/a.mkv").exists());
    assert!(third.exists());
    assert!(!library.join("C").exists());

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            Event::OperationStarted { index, .. } => format!("start {}", index),
            Event::OperationSucceeded { index, .. } => format!("ok {}", index),
            Event::OperationFailed { index, .. } => format!("fail {}", index),
            other => format!("{:?}", other),
        });
    }
    assert_eq!(kinds, vec!["start 0", "ok 0", "start 1", "fail 1"]);
}

#[tokio::test]
async fn test_remaining_plan_resumes() {
    let temp_dir = TempDir::new().unwrap();
    let library = temp_dir.path().join("library");
    let first = temp_dir.path().join("in/a.mkv");
    let second = temp_dir.path().join("in/b.mkv");
    write(&first, "a");

    let (executor, _) = executor(ExecutorConfig::default());
    let plan = plan(
        "p3",
        &library,
        vec![
            op(first, library.join("a.mkv")),
            op(second.clone(), library.join("b.mkv")),
        ],
    );

    let report = executor.execute(&plan, &CancellationToken::new()).await;
    assert_eq!(report.resume_from, Some(1));

    write(&second, "b");
    let remaining = report.remaining(&plan);
    assert_eq!(remaining.len(), 1);

    let resumed = executor.execute(&remaining, &CancellationToken::new()).await;
    assert!(resumed.is_complete());
    assert_eq!(fs::read_to_string(library.join("b.mkv")).unwrap(), "b");
}

#[tokio::test]
async fn test_cancelled_before_start_touches_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let library = temp_dir.path().join("library");
    let source = temp_dir.path().join("in/a.mkv");
    write(&source, "a");

    let (executor, _) = executor(ExecutorConfig::default());
    let plan = plan("p4", &library, vec![op(source.clone(), library.join("a.mkv"))]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = executor.execute(&plan, &cancel).await;

    assert!(report.cancelled);
    assert_eq!(report.resume_from, Some(0));
    assert!(source.exists());
}

// ========== TRANSFERS ==========

#[tokio::test]
async fn test_copy_verify_delete() {
    let temp_dir = TempDir::new().unwrap();
    let library = temp_dir.path().join("library");
    let source = temp_dir.path().join("in/album/01.flac");
    write(&source, "lossless audio bytes");
    let destination = library.join("Daft Punk/Discovery (2001)/01 - One More Time.flac");

    let (executor, _) = executor(ExecutorConfig {
        verify_checksum: true,
        always_copy: true,
    });
    let plan = plan("p5", &library, vec![op(source.clone(), destination.clone())]);

    let report = executor.execute(&plan, &CancellationToken::new()).await;

    assert_eq!(
        report.outcomes,
        vec![OperationOutcome::Succeeded {
            method: TransferMethod::CopyVerifyDelete
        }]
    );
    assert!(!source.exists());
    assert_eq!(
        fs::read_to_string(&destination).unwrap(),
        "lossless audio bytes"
    );

    let leftovers: Vec<_> = fs::read_dir(destination.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_existing_destination_is_not_overwritten() {
    let temp_dir = TempDir::new().unwrap();
    let library = temp_dir.path().join("library");
    let source = temp_dir.path().join("in/a.mkv");
    let destination = library.join("a.mkv");
    write(&source, "new");
    write(&destination, "old");

    let (executor, _) = executor(ExecutorConfig::default());
    let plan = plan("p6", &library, vec![op(source.clone(), destination.clone())]);

    let report = executor.execute(&plan, &CancellationToken::new()).await;

    match &report.outcomes[0] {
        OperationOutcome::Failed { reason } => assert!(reason.contains("already exists")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(fs::read_to_string(&source).unwrap(), "new");
    assert_eq!(fs::read_to_string(&destination).unwrap(), "old");
}

#[tokio::test]
async fn test_already_in_place_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let library = temp_dir.path().join("library");
    let path = library.join("a.mkv");
    write(&path, "a");

    let (executor, _) = executor(ExecutorConfig::default());
    let plan = plan("p7", &library, vec![op(path.clone(), path.clone())]);

    let report = executor.execute(&plan, &CancellationToken::new()).await;

    assert_eq!(report.outcomes, vec![OperationOutcome::SkippedAlreadyCorrect]);
    assert!(report.is_complete());
    assert!(path.exists());
}

// ========== SEVERAL PLANS ==========

#[tokio::test]
async fn test_execute_all_keeps_input_order() {
    let temp_dir = TempDir::new().unwrap();
    let movies = temp_dir.path().join("movies");
    let music = temp_dir.path().join("music");
    let a = temp_dir.path().join("in/a.mkv");
    let b = temp_dir.path().join("in/b.flac");
    let c = temp_dir.path().join("in/c.mkv");
    for path in [&a, &b, &c] {
        write(path, "x");
    }

    let (executor, _) = executor(ExecutorConfig::default());
    let plans = vec![
        plan("movies-1", &movies, vec![op(a, movies.join("a.mkv"))]),
        plan("music-1", &music, vec![op(b, music.join("b.flac"))]),
        plan("movies-2", &movies, vec![op(c, movies.join("c.mkv"))]),
    ];

    let reports = executor.execute_all(&plans, &CancellationToken::new()).await;

    let ids: Vec<&str> = reports.iter().map(|r| r.plan_id.as_str()).collect();
    assert_eq!(ids, vec!["movies-1", "music-1", "movies-2"]);
    assert!(reports.iter().all(|r| r.is_complete()));
    assert!(movies.join("a.mkv").exists());
    assert!(movies.join("c.mkv").exists());
    assert!(music.join("b.flac").exists());
}

#[test]
fn test_validate_rejects_duplicate_destinations() {
    let library = PathBuf::from("/library");
    let (executor, _) = executor(ExecutorConfig::default());
    let plan = plan(
        "p8",
        &library,
        vec![
            op(PathBuf::from("/in/a.mkv"), library.join("x.mkv")),
            op(PathBuf::from("/in/b.mkv"), library.join("x.mkv")),
        ],
    );
    assert!(executor.validate(&plan).is_err());
}
