//! Immutable workspace tree.
//!
//! Every mutation returns a new [`Tree`]. Only the nodes on the path from the
//! root to the change are reallocated; untouched branches are shared with the
//! previous snapshot through `Arc`.

use crate::error::TreeError;
use crate::tree::node::Node;
use crate::tree::path::{base_name_of, is_descendant_or_self, parent_of, rebase, ROOT};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered root-level nodes of a workspace, plus the root path they hang off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    root: Arc<str>,
    nodes: Arc<Vec<Arc<Node>>>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(ROOT)
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}

impl Tree {
    /// Empty tree rooted at `root`.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: Arc::from(root.into()),
            nodes: Arc::new(Vec::new()),
        }
    }

    /// Tree rooted at `root` with the given root-level nodes.
    pub fn from_nodes(root: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            root: Arc::from(root.into()),
            nodes: Arc::new(nodes.into_iter().map(Arc::new).collect()),
        }
    }

    /// Tree rooted at `root` over already-shared nodes.
    pub fn from_shared(root: impl Into<String>, nodes: Vec<Arc<Node>>) -> Self {
        Self {
            root: Arc::from(root.into()),
            nodes: Arc::new(nodes),
        }
    }

    fn with_nodes(&self, nodes: Vec<Arc<Node>>) -> Self {
        Self {
            root: Arc::clone(&self.root),
            nodes: Arc::new(nodes),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Root-level nodes in listing order.
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of nodes at every level.
    pub fn len(&self) -> usize {
        self.nodes.iter().map(|n| n.subtree_len()).sum()
    }

    /// True when both trees share the same root-level allocation.
    pub fn ptr_eq(&self, other: &Tree) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes)
    }

    /// Depth-first lookup by path.
    pub fn find(&self, path: &str) -> Option<&Arc<Node>> {
        find_in(&self.nodes, path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// True when `path` can hold children: the root, or an existing directory.
    pub fn is_container(&self, path: &str) -> bool {
        path == self.root() || self.find(path).map(|n| n.is_dir()).unwrap_or(false)
    }

    /// Names of the direct children of `base`, or `None` if `base` is not a container.
    pub fn child_names(&self, base: &str) -> Option<Vec<&str>> {
        let level: &[Arc<Node>] = if base == self.root() {
            &self.nodes
        } else {
            let node = self.find(base)?;
            if !node.is_dir() {
                return None;
            }
            &node.children
        };
        Some(level.iter().map(|n| n.name.as_str()).collect())
    }

    /// True when `base` already has a direct child called `name`.
    pub fn has_child(&self, base: &str, name: &str) -> bool {
        self.child_names(base)
            .map(|names| names.contains(&name))
            .unwrap_or(false)
    }

    /// Every node in preorder.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Node>> {
        let mut stack: Vec<&Arc<Node>> = self.nodes.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Every path in preorder.
    pub fn paths(&self) -> Vec<String> {
        self.iter().map(|n| n.path.clone()).collect()
    }

    /// Append `node` to the children of the directory at `base_path`, or to the
    /// root sequence when `base_path` is the tree root.
    ///
    /// Never creates intermediate directories.
    pub fn insert(&self, base_path: &str, node: Node) -> Result<Tree, TreeError> {
        if parent_of(&node.path) != base_path || node.name != base_name_of(&node.path) {
            return Err(TreeError::InvalidPath(node.path));
        }
        let node = Arc::new(node);

        if base_path == self.root() {
            if self.nodes.iter().any(|n| n.name == node.name) {
                return Err(TreeError::AlreadyExists(node.path.clone()));
            }
            let mut nodes = (*self.nodes).clone();
            nodes.push(node);
            return Ok(self.with_nodes(nodes));
        }

        match insert_into(&self.nodes, base_path, &node)? {
            Some(nodes) => Ok(self.with_nodes(nodes)),
            None => Err(TreeError::NotFound(base_path.to_string())),
        }
    }

    /// Rebase `old_path` and every descendant onto `new_path`.
    ///
    /// A new path under a different parent moves the subtree there (appended
    /// last). Returns this same tree when `old_path` is absent, when
    /// `new_path` already exists or lies inside `old_path`, or when the new
    /// parent does not exist.
    pub fn rename(&self, old_path: &str, new_path: &str) -> Tree {
        if old_path == new_path
            || is_descendant_or_self(new_path, old_path)
            || self.contains(new_path)
        {
            return self.clone();
        }
        let subtree = match self.find(old_path) {
            Some(node) => Arc::clone(node),
            None => return self.clone(),
        };

        let new_parent = parent_of(new_path);
        if parent_of(old_path) == new_parent {
            return match rename_in(&self.nodes, old_path, new_path) {
                Some(nodes) => self.with_nodes(nodes),
                None => self.clone(),
            };
        }

        if !self.is_container(&new_parent) {
            return self.clone();
        }
        let moved = rebased(&subtree, old_path, new_path);
        self.remove(old_path)
            .insert(&new_parent, moved)
            .unwrap_or_else(|_| self.clone())
    }

    /// Drop `target_path` and every descendant. Absent paths are a no-op.
    pub fn remove(&self, target_path: &str) -> Tree {
        match remove_from(&self.nodes, target_path) {
            Some(nodes) => self.with_nodes(nodes),
            None => self.clone(),
        }
    }

    /// Check the structural invariants: canonical child paths, names matching
    /// base names, unique sibling names, and childless files.
    pub fn validate(&self) -> Result<(), TreeError> {
        validate_level(&self.nodes, self.root())
    }
}

fn find_in<'a>(level: &'a [Arc<Node>], path: &str) -> Option<&'a Arc<Node>> {
    for node in level {
        if node.path == path {
            return Some(node);
        }
        if node.is_dir() && is_descendant_or_self(path, &node.path) {
            if let Some(found) = find_in(&node.children, path) {
                return Some(found);
            }
        }
    }
    None
}

fn replace_at(level: &[Arc<Node>], index: usize, node: Node) -> Vec<Arc<Node>> {
    let mut out = level.to_vec();
    out[index] = Arc::new(node);
    out
}

fn with_children(node: &Node, children: Vec<Arc<Node>>) -> Node {
    Node {
        path: node.path.clone(),
        name: node.name.clone(),
        kind: node.kind,
        children,
    }
}

fn insert_into(
    level: &[Arc<Node>],
    base_path: &str,
    node: &Arc<Node>,
) -> Result<Option<Vec<Arc<Node>>>, TreeError> {
    for (index, child) in level.iter().enumerate() {
        if child.path == base_path {
            if !child.is_dir() {
                return Err(TreeError::NotFound(base_path.to_string()));
            }
            if child.child(&node.name).is_some() {
                return Err(TreeError::AlreadyExists(node.path.clone()));
            }
            let mut children = child.children.clone();
            children.push(Arc::clone(node));
            return Ok(Some(replace_at(level, index, with_children(child, children))));
        }
        if child.is_dir() && is_descendant_or_self(base_path, &child.path) {
            if let Some(children) = insert_into(&child.children, base_path, node)? {
                return Ok(Some(replace_at(level, index, with_children(child, children))));
            }
        }
    }
    Ok(None)
}

fn rebased(node: &Node, old_path: &str, new_path: &str) -> Node {
    let path = rebase(&node.path, old_path, new_path);
    Node {
        name: base_name_of(&path).to_string(),
        path,
        kind: node.kind,
        children: node
            .children
            .iter()
            .map(|c| Arc::new(rebased(c, old_path, new_path)))
            .collect(),
    }
}

fn rename_in(level: &[Arc<Node>], old_path: &str, new_path: &str) -> Option<Vec<Arc<Node>>> {
    for (index, child) in level.iter().enumerate() {
        if child.path == old_path {
            return Some(replace_at(level, index, rebased(child, old_path, new_path)));
        }
        if child.is_dir() && is_descendant_or_self(old_path, &child.path) {
            if let Some(children) = rename_in(&child.children, old_path, new_path) {
                return Some(replace_at(level, index, with_children(child, children)));
            }
        }
    }
    None
}

fn remove_from(level: &[Arc<Node>], target_path: &str) -> Option<Vec<Arc<Node>>> {
    let mut changed = false;
    let mut out = Vec::with_capacity(level.len());
    for child in level {
        if is_descendant_or_self(&child.path, target_path) {
            changed = true;
            continue;
        }
        if child.is_dir() && is_descendant_or_self(target_path, &child.path) {
            if let Some(children) = remove_from(&child.children, target_path) {
                out.push(Arc::new(with_children(child, children)));
                changed = true;
                continue;
            }
        }
        out.push(Arc::clone(child));
    }
    changed.then_some(out)
}

fn validate_level(level: &[Arc<Node>], parent: &str) -> Result<(), TreeError> {
    let mut names = HashSet::new();
    for node in level {
        if parent_of(&node.path) != parent || node.name != base_name_of(&node.path) {
            return Err(TreeError::InvalidPath(node.path.clone()));
        }
        if node.name.is_empty() || !names.insert(node.name.as_str()) {
            return Err(TreeError::AlreadyExists(node.path.clone()));
        }
        if node.is_file() && !node.children.is_empty() {
            return Err(TreeError::InvalidPath(format!(
                "file {} has children",
                node.path
            )));
        }
        validate_level(&node.children, &node.path)?;
    }
    Ok(())
}
