//! Unread markers and contact-name normalization for session entries

use crate::locator::find_descendants;
use crate::UiNode;
use once_cell::sync::Lazy;
use regex::Regex;

static UNREAD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+条新消息|未读").expect("valid regex"));
static UNREAD_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\d+\s*条新消息|未读)$").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// How deep under a session entry a badge can sit.
const BADGE_DEPTH: usize = 5;

/// Canonical contact identity from a session entry's display name.
///
/// `"Alice\n3条新消息"` becomes `"Alice"`.
pub fn normalize_contact_name(name: &str) -> String {
    let first_line = name
        .trim()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    let collapsed = WHITESPACE.replace_all(first_line, " ");
    UNREAD_SUFFIX.replace(&collapsed, "").trim().to_string()
}

fn is_badge_text(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return false;
    }
    name.chars().all(char::is_numeric) || name.contains("条新消息") || name.contains("未读")
}

/// Whether a session entry advertises unseen messages, by its own name or a
/// shallow badge descendant.
pub fn is_unread(item: &UiNode) -> bool {
    if UNREAD_NAME.is_match(&item.name()) {
        return true;
    }
    find_descendants(item, BADGE_DEPTH).any(|node| is_badge_text(&node.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::MemoryTree;
    use crate::ControlKind;

    #[test]
    fn test_normalize_strips_unread_suffix() {
        assert_eq!(normalize_contact_name("Alice\n3条新消息"), "Alice");
        assert_eq!(normalize_contact_name("  Bob   Smith 12 条新消息"), "Bob Smith");
        assert_eq!(normalize_contact_name("Carol未读"), "Carol");
        assert_eq!(normalize_contact_name("\n\n  Dave \n"), "Dave");
        assert_eq!(normalize_contact_name(""), "");
    }

    #[test]
    fn test_name_marker_is_unread() {
        let tree = MemoryTree::new();
        let item = tree.node(ControlKind::ListItem, "Alice 2条新消息");
        assert!(is_unread(&item.to_node()));
    }

    #[test]
    fn test_numeric_badge_is_unread() {
        let tree = MemoryTree::new();
        let item = tree.node(ControlKind::ListItem, "Alice").child(
            tree.node(ControlKind::Pane, "")
                .child(tree.node(ControlKind::Text, "Alice"))
                .child(tree.node(ControlKind::Text, "3")),
        );
        assert!(is_unread(&item.to_node()));
    }

    #[test]
    fn test_full_width_badge_is_unread() {
        let tree = MemoryTree::new();
        let item = tree
            .node(ControlKind::ListItem, "Alice")
            .child(tree.node(ControlKind::Text, "１２"));
        assert!(is_unread(&item.to_node()));
    }

    #[test]
    fn test_plain_entry_is_read() {
        let tree = MemoryTree::new();
        let item = tree
            .node(ControlKind::ListItem, "Alice")
            .child(tree.node(ControlKind::Text, "see you 10:30"))
            .child(tree.node(ControlKind::Text, "12:01"));
        assert!(!is_unread(&item.to_node()));
    }
}
