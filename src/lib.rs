//! Canopy: Client-Side Workspace Tree Engine
//!
//! Keeps an in-memory mirror of a repository's directory tree, applies
//! create/rename/delete with cascading path updates, and tracks staged paths.
//! The mirror is backed either by a remote HTTP API or by an in-process
//! virtual filesystem seeded from fixture data.

pub mod backend;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod logging;
pub mod tooling;
pub mod tree;
pub mod types;
pub mod workspace;
