//! Parse command implementation.

use crate::cli::parse_media_type;
use crate::core::parser;
use crate::Result;
use colored::Colorize;

/// Show what the parser extracts from a file name.
pub fn parse_name(name: &str, media_type: &str, json: bool) -> Result<()> {
    let media_type = parse_media_type(media_type)?;
    let result = parser::parse(name, media_type);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", "[PARSE] File name".bold().cyan());
    println!("  {} {}", "Input:".bold(), name);
    println!("  {} {}", "Title:".bold(), result.title);

    if let Some(year) = result.year {
        println!("  {} {}", "Year:".bold(), year);
    }
    if let Some(season) = result.season {
        println!("  {} {}", "Season:".bold(), season);
    }
    if let Some(episodes) = result.episodes {
        if episodes.is_single() {
            println!("  {} {}", "Episode:".bold(), episodes.first);
        } else {
            println!("  {} {}-{}", "Episodes:".bold(), episodes.first, episodes.last);
        }
    }
    if let Some(disc) = result.disc {
        println!("  {} {}", "Disc:".bold(), disc);
    }
    if let Some(track) = result.track {
        println!("  {} {}", "Track:".bold(), track);
    }
    if !result.quality.is_empty() {
        let tags: Vec<&str> = result.quality.iter().map(String::as_str).collect();
        println!("  {} {}", "Tags:".bold(), tags.join(", ").dimmed());
    }
    if let Some(ext) = &result.extension {
        println!("  {} {}", "Extension:".bold(), ext);
    }

    let query = result.to_query(media_type);
    println!();
    println!(
        "  {} {} ({})",
        "Query:".bold(),
        query.text.green(),
        query.effective_content_type()
    );

    Ok(())
}
