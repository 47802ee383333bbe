//! Tooling & Integration Layer
//!
//! Command-line surface over the workspace engine.

pub mod cli;

pub use cli::{load_config, Cli, CliContext, Commands};
