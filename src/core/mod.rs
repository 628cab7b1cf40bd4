//! Core business logic modules.

pub mod cache;
pub mod executor;
pub mod orchestrator;
pub mod parser;
pub mod planner;
pub mod ranking;
pub mod scanner;
