//! Backend capability consumed by the workspace engine.
//!
//! Two interchangeable implementations are selected once at construction:
//! [`RemoteBackend`] delegates to an HTTP transport, [`VirtualBackend`] serves
//! an in-process store seeded from fixture data (demo/offline mode).

pub mod fixture;
pub mod remote;
pub mod virtual_fs;

pub use fixture::{FixtureCache, FixtureDocument, FixtureSource};
pub use remote::{HttpTransport, Method, RemoteBackend, Transport, TransportRequest, TransportResponse};
pub use virtual_fs::{CommitRecord, VirtualBackend};

use crate::config::{BackendMode, CanopyConfig};
use crate::error::{ApiError, BackendError};
use crate::tree::Tree;
use crate::types::{BackendKind, GitStatusSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How the engine brings its local tree in line after a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilePolicy {
    /// Apply the same TreeModel operation locally.
    Patch,
    /// Re-fetch the whole tree from the backend.
    Refetch,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        ReconcilePolicy::Refetch
    }
}

/// Workspace storage operations.
///
/// Every failure is a typed [`BackendError`]; implementations never panic
/// across this boundary.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn list_tree(&self, root: &str) -> Result<Tree, BackendError>;

    async fn read_file(&self, path: &str) -> Result<String, BackendError>;

    async fn write_file(&self, path: &str, content: &str) -> Result<(), BackendError>;

    async fn create_file(&self, path: &str) -> Result<(), BackendError>;

    async fn create_folder(&self, path: &str) -> Result<(), BackendError>;

    /// Remove `path` and everything below it.
    async fn delete_path(&self, path: &str) -> Result<(), BackendError>;

    async fn rename_path(&self, old_path: &str, new_path: &str) -> Result<(), BackendError>;

    async fn git_status(&self, root: &str) -> Result<GitStatusSnapshot, BackendError>;

    async fn stage_path(&self, root: &str, path: &str) -> Result<(), BackendError>;

    async fn unstage_path(&self, root: &str, path: &str) -> Result<(), BackendError>;

    async fn commit(&self, root: &str, message: &str, paths: &[String]) -> Result<(), BackendError>;

    async fn reset(&self, root: &str) -> Result<(), BackendError>;

    /// Drop any cached state; called when the workspace root changes.
    fn invalidate(&self) {}
}

/// Build the backend selected by configuration.
///
/// `auto` mode picks the remote backend when a base URL is configured and the
/// virtual backend otherwise.
pub fn build_backend(config: &CanopyConfig) -> Result<Arc<dyn Backend>, ApiError> {
    let remote = &config.backend.remote;
    let use_remote = match config.backend.mode {
        BackendMode::Remote => true,
        BackendMode::Virtual => false,
        BackendMode::Auto => remote.base_url.is_some(),
    };

    if use_remote {
        let base_url = remote.base_url.clone().ok_or_else(|| {
            ApiError::ConfigError("Remote backend requires backend.remote.base_url".to_string())
        })?;
        let transport = HttpTransport::new(
            base_url.clone(),
            Duration::from_millis(remote.timeout_ms),
            remote.auth_token.clone(),
        )?;
        info!(base_url = %base_url, "Using remote backend");
        Ok(Arc::new(RemoteBackend::new(Arc::new(transport))))
    } else {
        let source = FixtureSource::from_config(&config.fixture);
        info!(source = ?source, "Using virtual backend");
        Ok(Arc::new(VirtualBackend::new(FixtureCache::new(source))))
    }
}
