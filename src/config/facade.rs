//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::CanopyConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from files and environment, then validate it.
    pub fn load(workspace_dir: &Path) -> Result<CanopyConfig, ApiError> {
        let config = MergeService::load(workspace_dir)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file with the environment overlay.
    pub fn load_from_file(path: &Path) -> Result<CanopyConfig, ApiError> {
        let config = MergeService::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}
