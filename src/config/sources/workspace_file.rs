//! Workspace config file: `canopy.toml` in the workspace directory, optional.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::Path;

/// File name looked up in the workspace directory.
pub const WORKSPACE_CONFIG_FILE: &str = "canopy.toml";

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_dir: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = workspace_dir.join(WORKSPACE_CONFIG_FILE);
    Ok(builder.add_source(File::from(path).required(false)))
}
