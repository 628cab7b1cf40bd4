//! Media Librarian Library
//!
//! Identifies loosely-named media files (video, music, books, games) through
//! external metadata providers and organizes them into a normalized library
//! layout.

pub mod adapters;
pub mod cli;
pub mod core;
pub mod engine;
pub mod error;
pub mod events;
pub mod generators;
pub mod models;
pub mod services;
pub mod utils;

pub use engine::{Engine, FileIdentification};
pub use error::{Error, Result};
