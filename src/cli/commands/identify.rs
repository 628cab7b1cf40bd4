//! Identify command implementation.

use crate::cli::{cancel_on_ctrl_c, load_config, parse_media_type};
use crate::core::orchestrator::Resolution;
use crate::models::media::{Candidate, ContentType, MediaRecord, Position, Query};
use crate::{Engine, Result};
use colored::Colorize;
use std::path::Path;

/// Identify a title against the configured providers.
pub async fn identify(
    text: &str,
    media_type: &str,
    content_type: Option<&str>,
    year: Option<u16>,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let media_type = parse_media_type(media_type)?;
    let mut query = Query::new(text, media_type);
    if let Some(content_type) = content_type {
        query = query.with_content_type(content_type.parse::<ContentType>()?);
    }
    if let Some(year) = year {
        query = query.with_year(year);
    }

    let engine = Engine::new(load_config(config_path)?);
    let cancel = cancel_on_ctrl_c();
    let resolution = engine.identify_with_cancel(&query, &cancel).await?;

    if json {
        let value = match &resolution {
            Resolution::Resolved(record) => serde_json::json!({ "resolved": record }),
            Resolution::Ambiguous(candidates) => serde_json::json!({ "ambiguous": candidates }),
            Resolution::NotFound => serde_json::json!({ "not_found": query.text }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", "[IDENTIFY] Querying providers...".bold().cyan());
    println!("  {} {}", "Query:".bold(), query.text);
    println!("  {} {}", "Media type:".bold(), query.media_type);
    if let Some(year) = query.year {
        println!("  {} {}", "Year:".bold(), year);
    }
    println!();

    match resolution {
        Resolution::Resolved(record) => {
            println!("{}", "[OK] Identified".bold().green());
            print_record(&record);
        }
        Resolution::Ambiguous(candidates) => {
            println!(
                "{} {} candidates",
                "[AMBIGUOUS]".bold().yellow(),
                candidates.len()
            );
            for (i, candidate) in candidates.iter().enumerate() {
                print_candidate(i + 1, candidate);
            }
            println!();
            println!("{}", "[Next Steps]".bold().yellow());
            println!("  Narrow the query with --year or --content-type");
        }
        Resolution::NotFound => {
            println!("{} No match for '{}'", "[NOT FOUND]".bold().red(), query.text);
        }
    }

    Ok(())
}

fn print_record(record: &MediaRecord) {
    println!("  {} {}", "Title:".bold(), record.title);
    println!("  {} {}", "Type:".bold(), record.content_type);
    if let Some(year) = record.year {
        println!("  {} {}", "Year:".bold(), year);
    }
    match &record.position {
        Position::Track { artist, album, .. } => {
            if let Some(artist) = artist {
                println!("  {} {}", "Artist:".bold(), artist);
            }
            if let Some(album) = album {
                println!("  {} {}", "Album:".bold(), album);
            }
        }
        Position::Book { author: Some(author) } => println!("  {} {}", "Author:".bold(), author),
        Position::Game { platform: Some(platform) } => println!("  {} {}", "Platform:".bold(), platform),
        _ => {}
    }
    for (provider, id) in &record.provider_ids {
        println!("  {} {}", format!("{}:", provider).bold(), id.dimmed());
    }
}

fn print_candidate(rank: usize, candidate: &Candidate) {
    let year = candidate
        .year
        .map(|y| format!(" ({})", y))
        .unwrap_or_default();
    let creator = candidate
        .creator
        .as_deref()
        .map(|c| format!(" - {}", c))
        .unwrap_or_default();
    println!(
        "  {:>2}. {}{}{} {}",
        rank,
        candidate.title.bold(),
        year,
        creator,
        format!("[{}]", candidate.id).dimmed()
    );
}
