//! Session list, message list and the content root they live under
//!
//! The client exposes these without stable ids, so the named lookup is tried
//! first and a geometric heuristic over large list-like containers backs it
//! up. Coordinates are absolute screen pixels as reported by the tree.

use crate::locator::{find_descendants, first_existing, resolve_first, Matcher, Strategy};
use crate::platforms::AutomationBackend;
use crate::unread::is_unread;
use crate::{ControlKind, UiNode};
use tracing::debug;

pub const CONTENT_ROOT_CLASS: &str = "MMUIRenderSubWindowHW";
pub const SESSION_LIST_NAME: &str = "会话";
pub const MESSAGE_LIST_NAME: &str = "消息";
/// Entries past this index are never examined for unread markers.
pub const SESSION_SCAN_WINDOW: usize = 20;

const SEARCH_DEPTH: usize = 25;

/// Render sub-window hosting the chat pane, or the window itself.
pub fn content_root(window: &UiNode) -> UiNode {
    window
        .children()
        .unwrap_or_default()
        .into_iter()
        .find(|child| child.class_name() == CONTENT_ROOT_CLASS || child.name() == CONTENT_ROOT_CLASS)
        .unwrap_or_else(|| window.clone())
}

/// Content root first, then the window when they differ.
pub fn search_roots(window: &UiNode) -> Vec<UiNode> {
    let root = content_root(window);
    if &root == window {
        vec![root]
    } else {
        vec![root, window.clone()]
    }
}

fn is_list_like(node: &UiNode) -> bool {
    matches!(node.kind(), ControlKind::List | ControlKind::Pane)
}

/// Largest list-like descendant of `root` whose bounds pass `fits`.
fn largest_candidate<F>(root: &UiNode, fits: F) -> Option<UiNode>
where
    F: Fn(&UiNode, &crate::Rect) -> bool,
{
    find_descendants(root, SEARCH_DEPTH)
        .filter(is_list_like)
        .filter_map(|node| node.bounds().map(|rect| (node, rect)))
        .filter(|(node, rect)| fits(node, rect))
        .max_by_key(|(_, rect)| rect.area())
        .map(|(node, _)| node)
}

pub fn locate_session_list(backend: &dyn AutomationBackend, window: &UiNode) -> Option<UiNode> {
    let strategies = vec![
        Strategy::new("named list", || {
            let matcher = Matcher::new()
                .kind(ControlKind::List)
                .name(SESSION_LIST_NAME);
            first_existing(backend, window, &matcher, 12)
        }),
        Strategy::new("left column geometry", || {
            Ok(largest_candidate(window, |node, rect| {
                rect.width() >= 160
                    && rect.height() >= 200
                    && rect.left <= 280
                    && find_descendants(node, 2).any(|n| n.kind() == ControlKind::ListItem)
            }))
        }),
    ];
    resolve_first("session list", strategies).map(|r| r.value)
}

pub fn locate_message_list(backend: &dyn AutomationBackend, window: &UiNode) -> Option<UiNode> {
    let strategies = vec![
        Strategy::new("named list", || {
            let matcher = Matcher::new()
                .kind(ControlKind::List)
                .name(MESSAGE_LIST_NAME);
            first_existing(backend, window, &matcher, 15)
        }),
        Strategy::new("right pane geometry", || {
            for root in search_roots(window) {
                let found = largest_candidate(&root, |_, rect| {
                    rect.width() >= 200 && rect.height() >= 200 && rect.left >= 180
                });
                if found.is_some() {
                    return Ok(found);
                }
            }
            Ok(None)
        }),
    ];
    resolve_first("message list", strategies).map(|r| r.value)
}

/// Unread entries among the first [`SESSION_SCAN_WINDOW`] sessions, at most
/// `max` of them, in list order.
pub fn unread_sessions(session_list: &UiNode, max: usize) -> Vec<UiNode> {
    let entries = match session_list.children() {
        Ok(entries) => entries,
        Err(e) => {
            debug!("session list unreadable: {}", e);
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .take(SESSION_SCAN_WINDOW)
        .filter(is_unread)
        .take(max)
        .collect()
}
