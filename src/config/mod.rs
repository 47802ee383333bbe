//! Configuration for the workspace engine, its backend, and logging.
//!
//! Loaded in layers by [`ConfigLoader`]: defaults, global file, workspace
//! file, then `CANOPY__*` environment variables.

mod facade;
mod merge;
pub mod paths;
mod sources;

pub use facade::ConfigLoader;

use crate::backend::ReconcilePolicy;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::tree::path::ROOT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanopyConfig {
    #[serde(default)]
    pub workspace: WorkspaceSettings,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub fixture: FixtureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_root() -> String {
    ROOT.to_string()
}

/// Which workspace the engine mirrors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Workspace root path on the backend
    #[serde(default = "default_root")]
    pub root: String,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Remote when a base URL is configured, virtual otherwise
    #[default]
    Auto,
    Virtual,
    Remote,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub mode: BackendMode,
    /// Reconciliation after remote mutations (the virtual backend always patches)
    #[serde(default)]
    pub reconcile: ReconcilePolicy,
    #[serde(default)]
    pub remote: RemoteConfig,
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
            auth_token: None,
        }
    }
}

/// Fixture data for the virtual backend. Both unset means the embedded demo workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Fixture document (.json, .yaml, .yml)
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Local directory to seed from
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl CanopyConfig {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ApiError> {
        if !self.workspace.root.starts_with('/') {
            return Err(ApiError::ConfigError(format!(
                "workspace.root must be absolute: {}",
                self.workspace.root
            )));
        }

        let remote = &self.backend.remote;
        if self.backend.mode == BackendMode::Remote && remote.base_url.is_none() {
            return Err(ApiError::ConfigError(
                "backend.mode = remote requires backend.remote.base_url".to_string(),
            ));
        }
        if let Some(url) = &remote.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ApiError::ConfigError(format!(
                    "backend.remote.base_url must start with http:// or https://: {}",
                    url
                )));
            }
        }
        if remote.timeout_ms == 0 {
            return Err(ApiError::ConfigError(
                "backend.remote.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
