//! Command-line front end.

pub mod args;
pub mod commands;

use crate::events::Event;
use crate::models::config::{self, Config};
use crate::models::media::MediaType;
use crate::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Load the configuration file given on the command line, or the default one.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config_from(path),
        None => Ok(config::load_config()),
    }
}

pub fn parse_media_type(value: &str) -> Result<MediaType> {
    value.parse()
}

/// Token cancelled when the user presses Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing the current operation");
            child.cancel();
        }
    });
    token
}

/// Progress bar driven by executor events.
pub fn track_execution(mut events: broadcast::Receiver<Event>, total: usize) -> (ProgressBar, JoinHandle<()>) {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let bar = pb.clone();
    let handle = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Event::OperationStarted { source, .. }) => {
                    let name = source
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    bar.set_message(name);
                }
                Ok(Event::OperationSucceeded { .. })
                | Ok(Event::OperationSkipped { .. })
                | Ok(Event::OperationFailed { .. }) => bar.inc(1),
                Ok(Event::PlanCancelled { .. }) => bar.set_message("cancelled"),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!("Progress display missed {} events", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    (pb, handle)
}
