//! In-process backend used when no remote is configured.
//!
//! Holds a tree, a path -> content map, and a small git model seeded from a
//! [`FixtureCache`]. Every mutation applies the same TreeModel operation the
//! engine applies locally, so the engine observes the same results it would
//! get from a real server.

use super::fixture::{entries_under, Fixture, FixtureCache};
use super::Backend;
use crate::error::BackendError;
use crate::tree::path::{canonicalize_path, is_descendant_or_self, parent_of, rebase};
use crate::tree::{Node, Tree};
use crate::types::{BackendKind, GitStatusSnapshot, NodeKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One commit recorded by the virtual git model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub message: String,
    pub paths: Vec<String>,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct VirtualState {
    tree: Tree,
    files: BTreeMap<String, String>,
    git: GitStatusSnapshot,
    staged: BTreeSet<String>,
    committed_tree: Tree,
    committed_files: BTreeMap<String, String>,
    log: Vec<CommitRecord>,
}

impl VirtualState {
    fn seed(fixture: &Fixture) -> Self {
        Self {
            tree: fixture.tree.clone(),
            files: fixture.files.clone(),
            git: fixture.git.clone(),
            staged: BTreeSet::new(),
            committed_tree: fixture.tree.clone(),
            committed_files: fixture.files.clone(),
            log: Vec::new(),
        }
    }

    /// Fail unless `path` could be created: absent, with an existing parent.
    fn check_creatable(&self, path: &str) -> Result<(), BackendError> {
        if self.tree.contains(path) {
            return Err(BackendError::Conflict(format!("{} already exists", path)));
        }
        let parent = parent_of(path);
        if !self.tree.is_container(&parent) {
            return Err(BackendError::NotFound(format!("parent {} not found", parent)));
        }
        Ok(())
    }

    fn insert(&mut self, kind: NodeKind, path: &str) -> Result<(), BackendError> {
        self.check_creatable(path)?;
        let parent = parent_of(path);
        self.tree = self
            .tree
            .insert(&parent, Node::new(kind, path))
            .map_err(|e| BackendError::Conflict(e.to_string()))?;
        Ok(())
    }
}

/// Backend over an in-memory virtual filesystem.
pub struct VirtualBackend {
    fixture: FixtureCache,
    state: Mutex<Option<VirtualState>>,
}

impl VirtualBackend {
    pub fn new(fixture: FixtureCache) -> Self {
        Self {
            fixture,
            state: Mutex::new(None),
        }
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut VirtualState) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut guard = self.state.lock();
        if guard.is_none() {
            let fixture = self
                .fixture
                .load()
                .map_err(|e| BackendError::Unavailable(e.to_string()))?;
            *guard = Some(VirtualState::seed(&fixture));
        }
        match guard.as_mut() {
            Some(state) => f(state),
            None => Err(BackendError::Unavailable(
                "virtual store is not seeded".to_string(),
            )),
        }
    }

    /// Paths currently staged in the virtual git model.
    pub fn staged(&self) -> Result<Vec<String>, BackendError> {
        self.with_state(|state| Ok(state.staged.iter().cloned().collect()))
    }

    /// Commits recorded since the store was seeded, oldest first.
    pub fn commit_log(&self) -> Result<Vec<CommitRecord>, BackendError> {
        self.with_state(|state| Ok(state.log.clone()))
    }

    /// Every stored content entry, keyed by path.
    pub fn contents(&self) -> Result<BTreeMap<String, String>, BackendError> {
        self.with_state(|state| Ok(state.files.clone()))
    }
}

fn canonical(path: &str) -> Result<String, BackendError> {
    canonicalize_path(path).map_err(|e| BackendError::NotFound(e.to_string()))
}

#[async_trait]
impl Backend for VirtualBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Virtual
    }

    async fn list_tree(&self, root: &str) -> Result<Tree, BackendError> {
        let root = canonical(root)?;
        debug!(root = %root, "virtual list_tree");
        self.with_state(|state| {
            if root == state.tree.root() {
                return Ok(state.tree.clone());
            }
            match state.tree.find(&root) {
                Some(node) if node.is_dir() => Ok(Tree::from_shared(
                    root.clone(),
                    node.children.clone(),
                )),
                _ => Err(BackendError::NotFound(format!("{} is not a directory", root))),
            }
        })
    }

    async fn read_file(&self, path: &str) -> Result<String, BackendError> {
        let path = canonical(path)?;
        debug!(path = %path, "virtual read_file");
        self.with_state(|state| match state.tree.find(&path) {
            Some(node) if node.is_file() => {
                Ok(state.files.get(&path).cloned().unwrap_or_default())
            }
            _ => Err(BackendError::NotFound(format!("no file at {}", path))),
        })
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), BackendError> {
        let path = canonical(path)?;
        debug!(path = %path, bytes = content.len(), "virtual write_file");
        self.with_state(|state| {
            match state.tree.find(&path) {
                Some(node) if node.is_dir() => {
                    return Err(BackendError::Conflict(format!("{} is a directory", path)));
                }
                Some(_) => {}
                None => state.insert(NodeKind::File, &path)?,
            }
            state.files.insert(path.clone(), content.to_string());
            Ok(())
        })
    }

    async fn create_file(&self, path: &str) -> Result<(), BackendError> {
        let path = canonical(path)?;
        debug!(path = %path, "virtual create_file");
        self.with_state(|state| {
            state.insert(NodeKind::File, &path)?;
            state.files.insert(path.clone(), String::new());
            state.git.dirty_count += 1;
            Ok(())
        })
    }

    async fn create_folder(&self, path: &str) -> Result<(), BackendError> {
        let path = canonical(path)?;
        debug!(path = %path, "virtual create_folder");
        self.with_state(|state| state.insert(NodeKind::Directory, &path))
    }

    async fn delete_path(&self, path: &str) -> Result<(), BackendError> {
        let path = canonical(path)?;
        debug!(path = %path, "virtual delete_path");
        self.with_state(|state| {
            if !state.tree.contains(&path) {
                return Err(BackendError::NotFound(format!("{} not found", path)));
            }
            state.tree = state.tree.remove(&path);
            state.files.retain(|key, _| !is_descendant_or_self(key, &path));
            state.staged.retain(|key| !is_descendant_or_self(key, &path));
            state.git.dirty_count = state.git.dirty_count.saturating_sub(1);
            Ok(())
        })
    }

    async fn rename_path(&self, old_path: &str, new_path: &str) -> Result<(), BackendError> {
        let old_path = canonical(old_path)?;
        let new_path = canonical(new_path)?;
        debug!(from = %old_path, to = %new_path, "virtual rename_path");
        self.with_state(|state| {
            if !state.tree.contains(&old_path) {
                return Err(BackendError::NotFound(format!("{} not found", old_path)));
            }
            if is_descendant_or_self(&new_path, &old_path) {
                return Err(BackendError::Conflict(format!(
                    "cannot move {} into itself",
                    old_path
                )));
            }
            state.check_creatable(&new_path)?;

            state.tree = state.tree.rename(&old_path, &new_path);

            let moved: Vec<String> = entries_under(&state.files, &old_path).cloned().collect();
            for key in moved {
                if let Some(content) = state.files.remove(&key) {
                    state
                        .files
                        .insert(rebase(&key, &old_path, &new_path), content);
                }
            }
            state.staged = state
                .staged
                .iter()
                .map(|key| rebase(key, &old_path, &new_path))
                .collect();
            Ok(())
        })
    }

    async fn git_status(&self, root: &str) -> Result<GitStatusSnapshot, BackendError> {
        debug!(root = %root, "virtual git_status");
        self.with_state(|state| Ok(state.git.clone()))
    }

    async fn stage_path(&self, _root: &str, path: &str) -> Result<(), BackendError> {
        let path = canonical(path)?;
        debug!(path = %path, "virtual stage_path");
        self.with_state(|state| {
            if !state.tree.contains(&path) {
                return Err(BackendError::NotFound(format!("{} not found", path)));
            }
            state.staged.insert(path.clone());
            Ok(())
        })
    }

    async fn unstage_path(&self, _root: &str, path: &str) -> Result<(), BackendError> {
        let path = canonical(path)?;
        debug!(path = %path, "virtual unstage_path");
        self.with_state(|state| {
            state.staged.remove(&path);
            Ok(())
        })
    }

    async fn commit(&self, _root: &str, message: &str, paths: &[String]) -> Result<(), BackendError> {
        debug!(files = paths.len(), "virtual commit");
        self.with_state(|state| {
            if paths.is_empty() {
                return Err(BackendError::Conflict("nothing to commit".to_string()));
            }
            for path in paths {
                state.staged.remove(path);
            }
            state.git.dirty_count = state.git.dirty_count.saturating_sub(paths.len() as u64);
            state.git.ahead += 1;
            state.committed_tree = state.tree.clone();
            state.committed_files = state.files.clone();
            state.log.push(CommitRecord {
                message: message.to_string(),
                paths: paths.to_vec(),
                committed_at: Utc::now(),
            });
            Ok(())
        })
    }

    async fn reset(&self, _root: &str) -> Result<(), BackendError> {
        debug!("virtual reset");
        self.with_state(|state| {
            state.tree = state.committed_tree.clone();
            state.files = state.committed_files.clone();
            state.staged.clear();
            state.git.dirty_count = 0;
            Ok(())
        })
    }

    fn invalidate(&self) {
        self.fixture.invalidate();
        *self.state.lock() = None;
    }
}
