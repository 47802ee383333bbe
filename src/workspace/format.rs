//! Format workspace trees and git status as text.

use crate::tree::{Node, Tree};
use crate::types::GitStatusSnapshot;
use crate::workspace::editor::OpenEditorTab;
use crate::workspace::tracker::SelectionTracker;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::sync::Arc;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Render the tree with box-drawing guides. Staged paths are marked `+` and
/// the selected path `>`.
pub fn format_tree_text(tree: &Tree, tracker: Option<&SelectionTracker>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", tree.root().bold()));
    if tree.is_empty() {
        out.push_str("  (empty)\n");
        return out;
    }
    render_level(tree.nodes(), "", tracker, &mut out);
    out
}

fn render_level(
    nodes: &[Arc<Node>],
    prefix: &str,
    tracker: Option<&SelectionTracker>,
    out: &mut String,
) {
    for (idx, node) in nodes.iter().enumerate() {
        let last = idx + 1 == nodes.len();
        let branch = if last { "└── " } else { "├── " };
        let selected = tracker
            .and_then(|t| t.selected())
            .map(|s| s == node.path)
            .unwrap_or(false);
        let staged = tracker.map(|t| t.is_staged(&node.path)).unwrap_or(false);

        let label = if node.is_dir() {
            format!("{}", format!("{}/", node.name).blue().bold())
        } else if staged {
            format!("{}", node.name.green())
        } else {
            node.name.clone()
        };
        let marker = match (selected, staged) {
            (true, _) => " >",
            (false, true) => " +",
            _ => "",
        };
        out.push_str(&format!("{}{}{}{}\n", prefix, branch, label, marker));

        if node.is_dir() {
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            render_level(&node.children, &child_prefix, tracker, out);
        }
    }
}

/// Format git status and the staged set as a table.
pub fn format_git_status_text(status: &GitStatusSnapshot, staged: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Git Status")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Branch", "Dirty", "Ahead", "Behind"]);
    table.add_row(vec![
        status.branch.clone(),
        status.dirty_count.to_string(),
        status.ahead.to_string(),
        status.behind.to_string(),
    ]);
    out.push_str(&format!("{}\n\n", table));

    out.push_str(&format!("{}\n\n", format_section_heading("Staged")));
    if staged.is_empty() {
        out.push_str("Nothing staged.\n");
    } else {
        for path in staged {
            out.push_str(&format!("  {} {}\n", "+".green(), path));
        }
    }
    out
}

/// Format a tab listing: path, language, and dirty flag.
pub fn format_tabs_text(tabs: &[OpenEditorTab]) -> String {
    if tabs.is_empty() {
        return "No open tabs.\n".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Language", "Modified"]);
    for tab in tabs {
        let modified = if tab.is_dirty { "yes" } else { "no" };
        table.add_row(vec![tab.path.clone(), tab.language.clone(), modified.to_string()]);
    }
    format!("{}\n", table)
}
