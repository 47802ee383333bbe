//! Built-in defaults every load starts from.

use crate::tree::path::ROOT;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with defaults that must hold even when no file sets them.
pub(crate) fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("workspace.root", ROOT)?
        .set_default("backend.mode", "auto")?
        .set_default("backend.reconcile", "refetch")
}
