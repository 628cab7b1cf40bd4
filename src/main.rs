//! Media Librarian CLI
//!
//! A command-line tool for identifying media files through online metadata
//! providers and organizing them into a consistent library layout.

use clap::Parser;
use media_librarian::cli::{
    args::{Cli, Commands},
    commands::{execute, identify, organize, parse},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config = cli.config.as_deref();

    // Run the appropriate command
    match cli.command {
        Commands::Parse { name, media_type, json } => {
            parse::parse_name(&name, &media_type, json)?;
        }

        Commands::Identify {
            query,
            media_type,
            content_type,
            year,
            json,
        } => {
            identify::identify(&query, &media_type, content_type.as_deref(), year, json, config).await?;
        }

        Commands::Organize {
            source,
            library,
            media_type,
            template,
            execute,
            output,
        } => {
            organize::organize(organize::OrganizeOptions {
                source: &source,
                library: &library,
                media_type: media_type.as_deref(),
                template: template.as_deref(),
                execute,
                output: output.as_deref(),
                config,
            })
            .await?;
        }

        Commands::Execute { plan_file, output } => {
            execute::execute_plan(&plan_file, output.as_deref(), config).await?;
        }
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("media_librarian=debug")
    } else {
        EnvFilter::new("media_librarian=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
