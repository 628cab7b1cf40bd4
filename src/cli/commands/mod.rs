//! CLI command implementations.

pub mod execute;
pub mod identify;
pub mod organize;
pub mod parse;
