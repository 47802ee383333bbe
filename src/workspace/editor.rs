//! Editor collaborator: open requests out, save notifications in.
//!
//! Tabs reference tree paths by value. A rename re-keys every tab under the
//! renamed path and a delete closes every tab under the deleted path, so a tab
//! never outlives the file it shows.

use crate::tree::path::{is_descendant_or_self, rebase};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Emitted when the engine wants a file shown in the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    pub path: String,
    pub content: String,
    pub language: String,
    pub is_dirty: bool,
}

impl OpenRequest {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            language: language_for_path(&path).to_string(),
            path,
            content: content.into(),
            is_dirty: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenEditorTab {
    pub path: String,
    pub content: String,
    pub language: String,
    pub is_dirty: bool,
}

impl From<OpenRequest> for OpenEditorTab {
    fn from(request: OpenRequest) -> Self {
        Self {
            path: request.path,
            content: request.content,
            language: request.language,
            is_dirty: request.is_dirty,
        }
    }
}

/// Receives editor-facing notifications from the workspace engine.
pub trait EditorBridge: Send + Sync {
    fn open(&self, request: OpenRequest);

    /// `old_path` and everything below it now live under `new_path`.
    fn renamed(&self, old_path: &str, new_path: &str);

    /// `path` and everything below it are gone.
    fn removed(&self, path: &str);

    /// `content` was written to `path` by the backend.
    fn saved(&self, path: &str, content: &str);
}

/// Bridge for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEditor;

impl EditorBridge for NoopEditor {
    fn open(&self, _request: OpenRequest) {}
    fn renamed(&self, _old_path: &str, _new_path: &str) {}
    fn removed(&self, _path: &str) {}
    fn saved(&self, _path: &str, _content: &str) {}
}

#[derive(Debug, Default)]
struct TabsState {
    tabs: Vec<OpenEditorTab>,
    active: Option<String>,
}

/// In-memory open tab set.
#[derive(Debug, Default)]
pub struct EditorTabs {
    state: Mutex<TabsState>,
}

impl EditorTabs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tabs(&self) -> Vec<OpenEditorTab> {
        self.state.lock().tabs.clone()
    }

    pub fn tab(&self, path: &str) -> Option<OpenEditorTab> {
        self.state.lock().tabs.iter().find(|t| t.path == path).cloned()
    }

    pub fn active(&self) -> Option<String> {
        self.state.lock().active.clone()
    }

    /// Replace a tab's buffer and mark it dirty. Returns false if no tab shows `path`.
    pub fn edit(&self, path: &str, content: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        match state.tabs.iter_mut().find(|t| t.path == path) {
            Some(tab) => {
                tab.content = content.into();
                tab.is_dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn close(&self, path: &str) {
        let mut state = self.state.lock();
        state.tabs.retain(|t| t.path != path);
        if state.active.as_deref() == Some(path) {
            state.active = state.tabs.last().map(|t| t.path.clone());
        }
    }
}

impl EditorBridge for EditorTabs {
    fn open(&self, request: OpenRequest) {
        let mut state = self.state.lock();
        state.active = Some(request.path.clone());
        // An already open tab keeps its buffer, unsaved edits included
        if state.tabs.iter().any(|t| t.path == request.path) {
            return;
        }
        state.tabs.push(request.into());
    }

    fn renamed(&self, old_path: &str, new_path: &str) {
        let mut state = self.state.lock();
        for tab in state
            .tabs
            .iter_mut()
            .filter(|t| is_descendant_or_self(&t.path, old_path))
        {
            tab.path = rebase(&tab.path, old_path, new_path);
            tab.language = language_for_path(&tab.path).to_string();
        }
        if let Some(active) = state.active.take() {
            state.active = Some(rebase(&active, old_path, new_path));
        }
    }

    fn removed(&self, path: &str) {
        let mut state = self.state.lock();
        state.tabs.retain(|t| !is_descendant_or_self(&t.path, path));
        let active_removed = state
            .active
            .as_deref()
            .map(|active| is_descendant_or_self(active, path))
            .unwrap_or(false);
        if active_removed {
            state.active = state.tabs.last().map(|t| t.path.clone());
        }
    }

    fn saved(&self, path: &str, content: &str) {
        let mut state = self.state.lock();
        if let Some(tab) = state.tabs.iter_mut().find(|t| t.path == path) {
            tab.content = content.to_string();
            tab.is_dirty = false;
        }
    }
}

/// Editor language id from the file extension; `plaintext` when unknown.
pub fn language_for_path(path: &str) -> &'static str {
    let name = path.rsplit('/').next().unwrap_or(path);
    if name == "Dockerfile" {
        return "dockerfile";
    }
    if name == "Makefile" {
        return "makefile";
    }
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return "plaintext",
    };
    match ext.as_str() {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "rs" => "rust",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" | "markdown" => "markdown",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "sh" | "bash" => "shell",
        "sql" => "sql",
        "xml" => "xml",
        _ => "plaintext",
    }
}
