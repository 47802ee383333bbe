//! Selection, expanded directories, and the staged set.
//!
//! Derived state that follows the tree: every rename rebases tracked paths and
//! every delete drops them, so nothing here ever refers to a path the tree no
//! longer has.

use crate::tree::path::{is_descendant_or_self, rebase};
use crate::tree::Tree;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTracker {
    selected: Option<String>,
    expanded: BTreeSet<String>,
    staged: BTreeSet<String>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn select(&mut self, path: Option<String>) {
        self.selected = path;
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    pub fn expand(&mut self, path: &str) {
        self.expanded.insert(path.to_string());
    }

    /// Flip the expanded flag; returns the new value.
    pub fn toggle_expanded(&mut self, path: &str) -> bool {
        if self.expanded.remove(path) {
            false
        } else {
            self.expanded.insert(path.to_string());
            true
        }
    }

    pub fn expanded(&self) -> impl Iterator<Item = &str> {
        self.expanded.iter().map(String::as_str)
    }

    /// Staged paths in sorted order.
    pub fn staged(&self) -> &BTreeSet<String> {
        &self.staged
    }

    pub fn is_staged(&self, path: &str) -> bool {
        self.staged.contains(path)
    }

    pub fn stage(&mut self, path: &str) {
        self.staged.insert(path.to_string());
    }

    pub fn unstage(&mut self, path: &str) {
        self.staged.remove(path);
    }

    pub fn clear_staged(&mut self) {
        self.staged.clear();
    }

    /// Rebase every tracked path under `old_path` onto `new_path`.
    pub fn on_renamed(&mut self, old_path: &str, new_path: &str) {
        if let Some(selected) = self.selected.take() {
            self.selected = Some(rebase(&selected, old_path, new_path));
        }
        self.expanded = rebase_set(&self.expanded, old_path, new_path);
        self.staged = rebase_set(&self.staged, old_path, new_path);
    }

    /// Forget every tracked path under `path`, itself included.
    pub fn on_removed(&mut self, path: &str) {
        if self
            .selected
            .as_deref()
            .map(|selected| is_descendant_or_self(selected, path))
            .unwrap_or(false)
        {
            self.selected = None;
        }
        self.expanded.retain(|p| !is_descendant_or_self(p, path));
        self.staged.retain(|p| !is_descendant_or_self(p, path));
    }

    /// Keep only paths present in `tree`.
    pub fn prune(&mut self, tree: &Tree) {
        if self
            .selected
            .as_deref()
            .map(|selected| !tree.contains(selected))
            .unwrap_or(false)
        {
            self.selected = None;
        }
        self.expanded.retain(|p| tree.contains(p));
        self.staged.retain(|p| tree.contains(p));
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn rebase_set(paths: &BTreeSet<String>, old_path: &str, new_path: &str) -> BTreeSet<String> {
    paths
        .iter()
        .map(|p| rebase(p, old_path, new_path))
        .collect()
}
