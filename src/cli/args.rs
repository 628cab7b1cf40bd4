//! Command line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Media Librarian - Identify and organize media files
#[derive(Parser, Debug)]
#[command(name = "media-librarian")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: <config dir>/media_librarian/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show what the parser extracts from a file name
    Parse {
        /// File name or path
        #[arg(value_name = "NAME")]
        name: String,

        /// Media type: video, music, book or game
        #[arg(short, long, default_value = "video")]
        media_type: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Identify a title against the metadata providers
    Identify {
        /// Title to look up
        #[arg(value_name = "QUERY")]
        query: String,

        /// Media type: video, music, book or game
        #[arg(short, long, default_value = "video")]
        media_type: String,

        /// Content type hint (movie, series, album, track, ...)
        #[arg(long)]
        content_type: Option<String>,

        /// Release year
        #[arg(short, long)]
        year: Option<u16>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Scan a directory, identify its files and plan (or apply) their moves
    Organize {
        /// Directory containing the files to organize
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Library root the files are organized into
        #[arg(short, long, value_name = "ROOT")]
        library: PathBuf,

        /// Only organize this media type
        #[arg(short, long)]
        media_type: Option<String>,

        /// Naming template overriding the configured one
        #[arg(short, long)]
        template: Option<String>,

        /// Apply the plan right away instead of saving it
        #[arg(long)]
        execute: bool,

        /// Output path for plan.json
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Execute a plan file
    Execute {
        /// Path to the plan.json file
        #[arg(value_name = "PLAN_FILE")]
        plan_file: PathBuf,

        /// Output path for the execution report
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },
}
