//! Destination name generators.

pub mod template;
