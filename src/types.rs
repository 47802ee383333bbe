//! Core types shared by the tree model, backends, and the engine.

use serde::{Deserialize, Serialize};

/// Kind of a workspace tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// Read-only git status projection fetched from a backend.
///
/// The backend is authoritative for these counts; nothing here is derived
/// from the local tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatusSnapshot {
    pub branch: String,
    #[serde(default)]
    pub dirty_count: u64,
    #[serde(default)]
    pub ahead: u64,
    #[serde(default)]
    pub behind: u64,
}

impl Default for GitStatusSnapshot {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            dirty_count: 0,
            ahead: 0,
            behind: 0,
        }
    }
}

/// Which backend implementation serves a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Remote,
    Virtual,
}
