//! Workspace engine: backend calls plus local tree reconciliation.
//!
//! Mutations for one root run one at a time through the [`OperationQueue`].
//! Each performs the backend call first and only touches local state after it
//! succeeds, so a failed call leaves the tree and the tracker as they were.
//! Reads ([`WorkspaceEngine::snapshot`], [`WorkspaceEngine::find`]) never wait
//! on the queue.

use crate::backend::{Backend, ReconcilePolicy};
use crate::concurrency::{OperationGuard, OperationQueue};
use crate::error::{ApiError, BackendError, TreeError};
use crate::tree::path::{canonicalize_path, join, parent_of, validate_name};
use crate::tree::{Node, Tree};
use crate::types::{BackendKind, GitStatusSnapshot, NodeKind};
use crate::workspace::editor::{EditorBridge, NoopEditor, OpenRequest};
use crate::workspace::tracker::SelectionTracker;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mutation state of the current root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Mutating,
}

/// Result of a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched tree replaced the local one.
    Applied,
    /// A newer refresh or mutation landed first; the result was discarded.
    Superseded,
}

#[derive(Debug, Clone)]
struct WorkspaceState {
    tree: Tree,
    tracker: SelectionTracker,
}

/// Local tracker change applied together with a tree patch.
enum TrackerUpdate<'a> {
    None,
    Renamed(&'a str, &'a str),
    Removed(&'a str),
}

pub struct WorkspaceEngine {
    backend: Arc<dyn Backend>,
    queue: Arc<OperationQueue>,
    root: RwLock<String>,
    state: RwLock<WorkspaceState>,
    /// Bumped by every refresh and every committed mutation
    generation: AtomicU64,
    editor: Arc<dyn EditorBridge>,
    policy: ReconcilePolicy,
}

impl WorkspaceEngine {
    /// Engine over `backend` rooted at `root`, with an empty tree until the
    /// first [`refresh`](Self::refresh).
    pub fn new(backend: Arc<dyn Backend>, root: &str) -> Result<Self, ApiError> {
        let root = canonicalize_path(root)?;
        Ok(Self {
            backend,
            queue: Arc::new(OperationQueue::new()),
            state: RwLock::new(WorkspaceState {
                tree: Tree::new(root.clone()),
                tracker: SelectionTracker::new(),
            }),
            root: RwLock::new(root),
            generation: AtomicU64::new(0),
            editor: Arc::new(NoopEditor),
            policy: ReconcilePolicy::default(),
        })
    }

    pub fn with_editor(mut self, editor: Arc<dyn EditorBridge>) -> Self {
        self.editor = editor;
        self
    }

    pub fn with_reconcile(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Share an operation queue with other engines.
    pub fn with_queue(mut self, queue: Arc<OperationQueue>) -> Self {
        self.queue = queue;
        self
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn root(&self) -> String {
        self.root.read().clone()
    }

    /// Last committed tree.
    pub fn snapshot(&self) -> Tree {
        self.state.read().tree.clone()
    }

    pub fn find(&self, path: &str) -> Option<Arc<Node>> {
        self.state.read().tree.find(path).cloned()
    }

    pub fn tracker(&self) -> SelectionTracker {
        self.state.read().tracker.clone()
    }

    pub fn staged(&self) -> Vec<String> {
        self.state.read().tracker.staged().iter().cloned().collect()
    }

    pub fn selected(&self) -> Option<String> {
        self.state.read().tracker.selected().map(str::to_string)
    }

    pub fn state(&self) -> EngineState {
        if self.queue.is_busy(&self.root()) {
            EngineState::Mutating
        } else {
            EngineState::Idle
        }
    }

    /// Mutations queued or in flight on the current root.
    pub fn pending_operations(&self) -> usize {
        self.queue.pending_for(&self.root())
    }

    fn effective_policy(&self) -> ReconcilePolicy {
        match self.backend.kind() {
            BackendKind::Virtual => ReconcilePolicy::Patch,
            BackendKind::Remote => self.policy,
        }
    }

    /// Hold the queue of the current root.
    ///
    /// The root only changes while its own guard is held, so a caller that
    /// finds the root moved after waiting requeues on the new one.
    async fn lock_root(&self) -> (String, OperationGuard) {
        loop {
            let root = self.root();
            let guard = self.queue.acquire(&root).await;
            if *self.root.read() == root {
                return (root, guard);
            }
            drop(guard);
            debug!(from = %root, "Root switched while queued, requeueing");
        }
    }

    /// Create a file or folder `name` under `base_path`; returns the new path.
    ///
    /// The new path becomes the selection, and files are opened in the editor.
    pub async fn create(
        &self,
        kind: NodeKind,
        base_path: &str,
        name: &str,
    ) -> Result<String, ApiError> {
        let name = validate_name(name)?;
        let base = canonicalize_path(base_path)?;
        let (root, _guard) = self.lock_root().await;

        let target = join(&base, &name);
        {
            let state = self.state.read();
            if !state.tree.is_container(&base) {
                return Err(ApiError::NotFound(base));
            }
            if state.tree.has_child(&base, &name) {
                return Err(ApiError::AlreadyExists(target));
            }
        }

        let result = match kind {
            NodeKind::File => self.backend.create_file(&target).await,
            NodeKind::Directory => self.backend.create_folder(&target).await,
        };
        logged("create", &target, result)?;

        let node = Node::new(kind, target.clone());
        self.reconcile(&root, TrackerUpdate::None, |tree| tree.insert(&base, node))
            .await;
        {
            let mut state = self.state.write();
            if state.tree.contains(&target) {
                state.tracker.select(Some(target.clone()));
            }
            if base != root {
                state.tracker.expand(&base);
            }
        }
        if kind == NodeKind::File {
            self.editor.open(OpenRequest::new(target.clone(), ""));
        }
        info!(path = %target, kind = ?kind, "Created");
        Ok(target)
    }

    /// Rename the node at `old_path` to `new_name` within its parent; returns
    /// the new path. Renaming to the current name is a no-op.
    pub async fn rename(&self, old_path: &str, new_name: &str) -> Result<String, ApiError> {
        let old = canonicalize_path(old_path)?;
        let name = validate_name(new_name)?;
        let (root, _guard) = self.lock_root().await;
        if old == root {
            return Err(ApiError::InvalidInput(
                "cannot rename the workspace root".to_string(),
            ));
        }

        let parent = parent_of(&old);
        let new_path = join(&parent, &name);
        if new_path == old {
            return Ok(new_path);
        }
        if self.state.read().tree.has_child(&parent, &name) {
            return Err(ApiError::AlreadyExists(new_path));
        }

        logged("rename", &old, self.backend.rename_path(&old, &new_path).await)?;

        self.reconcile(&root, TrackerUpdate::Renamed(&old, &new_path), |tree| {
            Ok(tree.rename(&old, &new_path))
        })
        .await;
        self.editor.renamed(&old, &new_path);
        info!(from = %old, to = %new_path, "Renamed");
        Ok(new_path)
    }

    /// Delete `path` and everything below it.
    ///
    /// Always goes to the backend, even when the local tree lacks the path.
    pub async fn remove(&self, path: &str) -> Result<(), ApiError> {
        let path = canonicalize_path(path)?;
        let (root, _guard) = self.lock_root().await;
        if path == root {
            return Err(ApiError::InvalidInput(
                "cannot delete the workspace root".to_string(),
            ));
        }

        logged("delete", &path, self.backend.delete_path(&path).await)?;

        self.reconcile(&root, TrackerUpdate::Removed(&path), |tree| {
            Ok(tree.remove(&path))
        })
        .await;
        self.editor.removed(&path);
        info!(path = %path, "Deleted");
        Ok(())
    }

    /// Replace the local tree with a fresh listing from the backend.
    ///
    /// Not queued behind mutations. A result that lost the race to a newer
    /// refresh or mutation is discarded.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ApiError> {
        let root = self.root();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let tree = logged("refresh", &root, self.backend.list_tree(&root).await)?;

        let mut state = self.state.write();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(root = %root, generation, "Discarding superseded refresh");
            return Ok(RefreshOutcome::Superseded);
        }
        state.tracker.prune(&tree);
        state.tree = tree;
        debug!(root = %root, nodes = state.tree.len(), "Refreshed");
        Ok(RefreshOutcome::Applied)
    }

    /// Mark `path` for the next commit.
    pub async fn stage(&self, path: &str) -> Result<(), ApiError> {
        let path = canonicalize_path(path)?;
        let (root, _guard) = self.lock_root().await;

        logged("stage", &path, self.backend.stage_path(&root, &path).await)?;
        self.state.write().tracker.stage(&path);
        info!(path = %path, "Staged");
        Ok(())
    }

    pub async fn unstage(&self, path: &str) -> Result<(), ApiError> {
        let path = canonicalize_path(path)?;
        let (root, _guard) = self.lock_root().await;

        logged("unstage", &path, self.backend.unstage_path(&root, &path).await)?;
        self.state.write().tracker.unstage(&path);
        info!(path = %path, "Unstaged");
        Ok(())
    }

    /// Commit the staged set in sorted order; returns the committed paths.
    pub async fn commit(&self, message: &str) -> Result<Vec<String>, ApiError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ApiError::InvalidInput(
                "commit message cannot be empty".to_string(),
            ));
        }
        let (root, _guard) = self.lock_root().await;

        let paths = self.staged();
        if paths.is_empty() {
            return Err(ApiError::InvalidInput("nothing staged".to_string()));
        }
        logged("commit", &root, self.backend.commit(&root, message, &paths).await)?;
        self.state.write().tracker.clear_staged();
        info!(root = %root, files = paths.len(), "Committed");
        Ok(paths)
    }

    /// Discard uncommitted changes on the backend, then reload the tree.
    pub async fn reset(&self) -> Result<RefreshOutcome, ApiError> {
        let (root, _guard) = self.lock_root().await;

        logged("reset", &root, self.backend.reset(&root).await)?;
        self.state.write().tracker.clear_staged();
        info!(root = %root, "Reset");
        self.refresh().await
    }

    pub async fn git_status(&self) -> Result<GitStatusSnapshot, ApiError> {
        let root = self.root();
        Ok(self.backend.git_status(&root).await?)
    }

    /// Read a file and hand it to the editor; returns the open request.
    pub async fn open_file(&self, path: &str) -> Result<OpenRequest, ApiError> {
        let path = canonicalize_path(path)?;
        match self.find(&path) {
            Some(node) if node.is_file() => {}
            Some(_) => return Err(ApiError::InvalidInput(format!("{} is a directory", path))),
            None => return Err(ApiError::NotFound(path)),
        }
        let content = self.backend.read_file(&path).await?;
        let request = OpenRequest::new(path.clone(), content);
        self.state.write().tracker.select(Some(path));
        self.editor.open(request.clone());
        Ok(request)
    }

    /// Write editor content through the backend.
    pub async fn save_file(&self, path: &str, content: &str) -> Result<(), ApiError> {
        let path = canonicalize_path(path)?;
        let parent = parent_of(&path);
        let (root, _guard) = self.lock_root().await;

        logged("save", &path, self.backend.write_file(&path, content).await)?;

        // Writes upsert, so a save can introduce a file the mirror lacks
        let node_path = path.clone();
        self.reconcile(&root, TrackerUpdate::None, |tree| {
            if tree.contains(&node_path) || !tree.is_container(&parent) {
                Ok(tree.clone())
            } else {
                tree.insert(&parent, Node::file(node_path.clone()))
            }
        })
        .await;
        self.editor.saved(&path, content);
        info!(path = %path, bytes = content.len(), "Saved");
        Ok(())
    }

    /// Select `path`, or clear the selection with `None`.
    pub fn select(&self, path: Option<&str>) -> Result<(), ApiError> {
        let mut state = self.state.write();
        match path {
            Some(path) => {
                let path = canonicalize_path(path)?;
                if !state.tree.contains(&path) {
                    return Err(ApiError::NotFound(path));
                }
                state.tracker.select(Some(path));
            }
            None => state.tracker.select(None),
        }
        Ok(())
    }

    /// Flip the expanded flag of a directory; returns the new value.
    pub fn toggle_expanded(&self, path: &str) -> Result<bool, ApiError> {
        let path = canonicalize_path(path)?;
        let mut guard = self.state.write();
        let state = &mut *guard;
        match state.tree.find(&path) {
            Some(node) if node.is_dir() => Ok(state.tracker.toggle_expanded(&path)),
            Some(_) => Err(ApiError::InvalidInput(format!("{} is not a directory", path))),
            None => Err(ApiError::NotFound(path)),
        }
    }

    /// Point the engine at another root: waits for in-flight mutations on the
    /// current root, drops backend caches and derived state, then loads the
    /// new tree.
    pub async fn switch_root(&self, new_root: &str) -> Result<RefreshOutcome, ApiError> {
        let new_root = canonicalize_path(new_root)?;
        let old_root = {
            let (old_root, _guard) = self.lock_root().await;
            self.backend.invalidate();
            *self.root.write() = new_root.clone();
            let mut state = self.state.write();
            self.generation.fetch_add(1, Ordering::SeqCst);
            state.tree = Tree::new(new_root.clone());
            state.tracker.clear();
            old_root
        };
        info!(from = %old_root, to = %new_root, "Switched workspace root");
        self.refresh().await
    }

    /// Bring local state in line after a successful backend mutation.
    ///
    /// Never fails: the mutation already happened on the backend. Refetch
    /// failures fall back to the local patch, and a patch that no longer
    /// applies (a concurrent refresh already carried the change) keeps the
    /// current tree.
    async fn reconcile<F>(&self, root: &str, update: TrackerUpdate<'_>, patch: F)
    where
        F: FnOnce(&Tree) -> Result<Tree, TreeError>,
    {
        let fetched = match self.effective_policy() {
            ReconcilePolicy::Patch => None,
            ReconcilePolicy::Refetch => match self.backend.list_tree(root).await {
                Ok(tree) => Some(tree),
                Err(e) => {
                    warn!(root = %root, error = %e, "Refetch failed, patching locally");
                    None
                }
            },
        };

        let mut state = self.state.write();
        let tree = match fetched {
            Some(tree) => tree,
            None => match patch(&state.tree) {
                Ok(tree) => tree,
                Err(e) => {
                    warn!(root = %root, error = %e, "Local patch did not apply, keeping current tree");
                    state.tree.clone()
                }
            },
        };
        match update {
            TrackerUpdate::None => {}
            TrackerUpdate::Renamed(old, new) => state.tracker.on_renamed(old, new),
            TrackerUpdate::Removed(path) => state.tracker.on_removed(path),
        }
        state.tracker.prune(&tree);
        state.tree = tree;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

fn logged<T>(op: &str, path: &str, result: Result<T, BackendError>) -> Result<T, ApiError> {
    result.map_err(|e| {
        warn!(op, path = %path, error = %e, "Backend operation failed");
        ApiError::from(e)
    })
}
