//! Workspace tree node.

use crate::tree::path::base_name_of;
use crate::types::NodeKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A file or directory addressed by its canonical path.
///
/// Directories always carry a (possibly empty) children sequence; files never
/// have children. Children are shared behind `Arc` so untouched branches are
/// reused across tree snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Arc<Node>>,
}

impl Node {
    /// Create a file node.
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: base_name_of(&path).to_string(),
            path,
            kind: NodeKind::File,
            children: Vec::new(),
        }
    }

    /// Create a directory node with the given children.
    pub fn directory(path: impl Into<String>, children: Vec<Node>) -> Self {
        let path = path.into();
        Self {
            name: base_name_of(&path).to_string(),
            path,
            kind: NodeKind::Directory,
            children: children.into_iter().map(Arc::new).collect(),
        }
    }

    /// Create an empty node of the given kind.
    pub fn new(kind: NodeKind, path: impl Into<String>) -> Self {
        match kind {
            NodeKind::File => Self::file(path),
            NodeKind::Directory => Self::directory(path, Vec::new()),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&Arc<Node>> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Number of nodes in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_len()).sum::<usize>()
    }
}
