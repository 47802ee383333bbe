//! Workspace domain: the engine, its derived selection state, and the editor
//! and status-bar collaborators.

pub mod editor;
pub mod engine;
mod format;
pub mod status;
pub mod tracker;

pub use editor::{EditorBridge, EditorTabs, NoopEditor, OpenEditorTab, OpenRequest};
pub use engine::{EngineState, RefreshOutcome, WorkspaceEngine};
pub use format::{format_git_status_text, format_section_heading, format_tabs_text, format_tree_text};
pub use status::StatusPoller;
pub use tracker::SelectionTracker;
