//! Execute command implementation.
//!
//! Reads a plan.json file, applies its operations in order and writes an
//! execution report. When the run stops early the operations that still
//! need to run are saved as a new plan.

use crate::cli::{cancel_on_ctrl_c, load_config, track_execution};
use crate::core::planner;
use crate::models::plan::{ExecutionReport, OperationOutcome, OrganizationPlan};
use crate::{Engine, Result};
use chrono::Utc;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Execute a plan file.
pub async fn execute_plan(plan_file: &Path, output: Option<&Path>, config_path: Option<&Path>) -> Result<()> {
    println!("{}", "[EXEC] Executing plan...".bold().cyan());
    println!();

    if !plan_file.exists() {
        return Err(crate::Error::PathNotFound(plan_file.display().to_string()));
    }

    println!("[INFO] Loading plan: {}", plan_file.display());
    let plan = planner::load_plan(plan_file)?;

    let engine = Engine::new(load_config(config_path)?);
    let report_path = match output {
        Some(p) => p.to_path_buf(),
        None => default_report_path(plan_file.parent()),
    };

    run_plan(&engine, &plan, &report_path).await?;
    Ok(())
}

/// Validate and apply a plan, print its outcome and save the report.
pub async fn run_plan(engine: &Engine, plan: &OrganizationPlan, report_path: &Path) -> Result<ExecutionReport> {
    engine.validate(plan)?;

    println!("  {} {}", "Plan:".bold(), plan.id);
    println!("  {} {}", "Library:".bold(), plan.library_root.display());
    println!("  {} {}", "Operations:".bold(), plan.len());
    println!();

    if plan.is_noop() {
        println!("{}", "[OK] Nothing to do, every file is already in place".bold().green());
        return Ok(ExecutionReport {
            plan_id: plan.id.clone(),
            ..Default::default()
        });
    }

    println!("{}", "[WARNING] This will move and rename files!".bold().yellow());
    println!();

    let cancel = cancel_on_ctrl_c();
    let (pb, progress) = track_execution(engine.subscribe(), plan.len());
    let report = engine.execute(plan, &cancel).await;
    progress.abort();
    pb.finish_and_clear();

    print_report(plan, &report);
    save_report(&report, report_path)?;
    println!(
        "{} {}",
        "[OK] Report saved to:".bold().green(),
        report_path.display()
    );

    if !report.is_complete() {
        let remaining = report.remaining(plan);
        let remaining_path = report_path.with_file_name(format!("remaining_{}.json", plan.id));
        planner::save_plan(&remaining, &remaining_path)?;

        println!();
        println!("{}", "[Next Steps]".bold().yellow());
        println!(
            "  To resume: {}",
            format!("media-librarian execute {}", remaining_path.display()).cyan()
        );
    }

    Ok(report)
}

fn print_report(plan: &OrganizationPlan, report: &ExecutionReport) {
    for (op, outcome) in plan.operations.iter().zip(&report.outcomes) {
        match outcome {
            OperationOutcome::Failed { reason } => {
                println!("{} {}", "[FAIL]".red(), op.source.display());
                println!("  {} {}", "->".yellow(), reason);
            }
            OperationOutcome::SkippedAlreadyCorrect => {
                println!("{} {}", "[SKIP]".dimmed(), op.destination.display());
            }
            _ => {}
        }
    }

    println!();
    println!("{}", "[SUMMARY]".bold());
    println!("  {} {}", "Succeeded:".bold(), report.succeeded().to_string().green());
    println!("  {} {}", "Failed:".bold(), report.failed().to_string().red());
    if report.cancelled {
        println!("  {}", "Cancelled before completion".yellow());
    }
    if let Some(index) = report.resume_from {
        println!("  {} {}", "Resume from:".bold(), index);
    }
    println!();
}

fn save_report(report: &ExecutionReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    tracing::info!("Report saved to {:?}", path);
    Ok(())
}

/// Report path next to the plan, timestamped.
pub fn default_report_path(dir: Option<&Path>) -> PathBuf {
    let filename = format!("report_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
    dir.map(|p| p.join(&filename))
        .unwrap_or_else(|| PathBuf::from(filename))
}
