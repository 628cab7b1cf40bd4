//! Organize command implementation.
//!
//! Scans a directory, identifies each media file and plans its move into
//! the library. The plan is saved for review, or applied with `--execute`.

use crate::cli::commands::execute::{default_report_path, run_plan};
use crate::cli::{cancel_on_ctrl_c, load_config, parse_media_type};
use crate::core::orchestrator::Resolution;
use crate::core::planner::{self, PlanRequest};
use crate::core::scanner::{self, MediaFile};
use crate::events::Event;
use crate::models::media::MediaType;
use crate::{Engine, FileIdentification, Result};
use colored::Colorize;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::TryRecvError;

/// Files identified concurrently.
const IDENTIFY_CONCURRENCY: usize = 4;

/// Options for the organize command.
#[derive(Debug, Clone)]
pub struct OrganizeOptions<'a> {
    pub source: &'a Path,
    pub library: &'a Path,
    pub media_type: Option<&'a str>,
    pub template: Option<&'a str>,
    pub execute: bool,
    pub output: Option<&'a Path>,
    pub config: Option<&'a Path>,
}

/// A file that could not be identified on its own.
struct Unresolved {
    path: PathBuf,
    reason: String,
}

/// Scan, identify and plan (or apply).
pub async fn organize(options: OrganizeOptions<'_>) -> Result<()> {
    println!("{}", "[ORGANIZE] Planning library layout...".bold().cyan());
    println!();

    let media_type = options.media_type.map(parse_media_type).transpose()?;
    let mut config = load_config(options.config)?;
    if let Some(template) = options.template {
        for value in config.naming.templates.values_mut() {
            *value = template.to_string();
        }
        for media_type in MediaType::ALL {
            config
                .naming
                .templates
                .insert(media_type.as_str().to_string(), template.to_string());
        }
    }
    let engine = Engine::new(config);

    println!("  {} {}", "Source:".bold(), options.source.display());
    println!("  {} {}", "Library:".bold(), options.library.display());
    if let Some(media_type) = media_type {
        println!("  {} {}", "Media type:".bold(), media_type);
    }
    println!();

    println!("[INFO] Scanning directory...");
    let scan = scanner::scan_directory(options.source, media_type)?;
    println!(
        "[INFO] Found {} media files ({} samples/extras skipped)",
        scan.files.len(),
        scan.skipped.len()
    );

    if scan.files.is_empty() {
        println!("{}", "[WARNING] No media files found".yellow());
        return Ok(());
    }

    let (requests, unresolved) = identify_files(&engine, &scan.files).await;

    println!();
    println!("  {} {}", "Identified:".bold(), requests.len().to_string().green());
    println!("  {} {}", "Unresolved:".bold(), unresolved.len().to_string().yellow());
    for item in &unresolved {
        println!("  {} {}", "[SKIP]".yellow(), item.path.display());
        println!("    {} {}", "->".yellow(), item.reason.dimmed());
    }
    println!();

    let mut planner_events = engine.subscribe();
    let plan = engine.plan_batch(&requests, options.library)?;
    loop {
        match planner_events.try_recv() {
            Ok(Event::DuplicateSkipped { source, existing }) => {
                println!("  {} {}", "[DUPLICATE]".yellow(), source.display());
                println!("    {} {}", "==".yellow(), existing.display());
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }

    if options.execute {
        let report_path = match options.output {
            Some(p) => p.to_path_buf(),
            None => default_report_path(Some(options.library)),
        };
        run_plan(&engine, &plan, &report_path).await?;
        return Ok(());
    }

    let output_path = match options.output {
        Some(p) => p.to_path_buf(),
        None => planner::default_plan_path(options.library),
    };
    planner::save_plan(&plan, &output_path)?;

    println!("{}", "[PLAN]".bold());
    for op in &plan.operations {
        println!("  {} {}", format!("[{}]", op.kind).cyan(), op.source.display());
        println!("    {} {}", "->".green(), op.destination.display());
    }
    println!();
    println!(
        "{} {}",
        "[OK] Plan saved to:".bold().green(),
        output_path.display()
    );

    println!();
    println!("{}", "[Next Steps]".bold().yellow());
    println!("  1. Review the plan: {}", output_path.display());
    println!(
        "  2. Execute: {}",
        format!("media-librarian execute {}", output_path.display()).cyan()
    );

    Ok(())
}

/// Identify every file, keeping scan order.
async fn identify_files(engine: &Engine, files: &[MediaFile]) -> (Vec<PlanRequest>, Vec<Unresolved>) {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let cancel = cancel_on_ctrl_c();
    let results: Vec<(PathBuf, Result<FileIdentification>)> = stream::iter(files)
        .map(|file| {
            let pb = pb.clone();
            let cancel = cancel.clone();
            async move {
                pb.set_message(file.filename.clone());
                let result = engine.identify_file(&file.path, file.media_type, &cancel).await;
                pb.inc(1);
                (file.path.clone(), result)
            }
        })
        .buffered(IDENTIFY_CONCURRENCY)
        .collect()
        .await;
    pb.finish_and_clear();

    let mut requests = Vec::new();
    let mut unresolved = Vec::new();
    for (path, result) in results {
        match result {
            Ok(FileIdentification {
                resolution: Resolution::Resolved(record),
                ..
            }) => requests.push(PlanRequest { record, source: path }),
            Ok(FileIdentification {
                resolution: Resolution::Ambiguous(candidates),
                query,
                ..
            }) => unresolved.push(Unresolved {
                path,
                reason: format!("{} candidates for '{}'", candidates.len(), query.text),
            }),
            Ok(FileIdentification { query, .. }) => unresolved.push(Unresolved {
                path,
                reason: format!("no match for '{}'", query.text),
            }),
            Err(e) => {
                tracing::warn!("Identification failed for {:?}: {}", path, e);
                unresolved.push(Unresolved {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    (requests, unresolved)
}
