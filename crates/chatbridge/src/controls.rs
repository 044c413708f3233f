//! Chat header, input field and send button

use crate::lists::search_roots;
use crate::locator::{find_descendants, first_existing, resolve_first, Matcher, Strategy};
use crate::platforms::AutomationBackend;
use crate::{ControlKind, UiNode};
use tracing::{debug, trace};

const SEARCH_DEPTH: usize = 25;

pub const INPUT_FIELD_CLASS: &str = "mmui::ChatInputField";
pub const INPUT_FIELD_AUTOMATION_ID: &str = "chat_input_field";
pub const INPUT_FIELD_NAME: &str = "输入";
pub const SEND_BUTTON_NAMES: [&str; 2] = ["发送", "发送(S)"];
const SEND_MARKER: &str = "发送";

/// Header labels that are chrome, never a chat title.
const NAVIGATION_LABELS: &[&str] = &[
    "微信", "通讯录", "发现", "我", "朋友圈", "小程序", "视频号", "搜一搜", "看一看",
    "文件传输助手", "置顶", "最小化", "最大化", "关闭", "还原",
];
/// The session column is roughly this wide; the header starts past it.
const HEADER_LEFT_OFFSET: i32 = 280;
const HEADER_HEIGHT: i32 = 100;
const MAX_TITLE_CHARS: usize = 40;

/// Title of the open chat: the top-most plausible label in the header band.
pub fn current_chat_title(window: &UiNode) -> Option<String> {
    let win = window.bounds()?;
    let header_left = win.left + HEADER_LEFT_OFFSET;
    let header_bottom = win.bottom.min(win.top + HEADER_HEIGHT);

    let title = find_descendants(window, SEARCH_DEPTH)
        .filter(|node| {
            matches!(
                node.kind(),
                ControlKind::Text
                    | ControlKind::Button
                    | ControlKind::Pane
                    | ControlKind::Group
                    | ControlKind::Custom
            )
        })
        .filter_map(|node| {
            let text = node.label();
            if text.is_empty()
                || text.chars().count() > MAX_TITLE_CHARS
                || NAVIGATION_LABELS.contains(&text.as_str())
            {
                return None;
            }
            let (cx, cy) = node.bounds()?.center();
            let in_header = (header_left..=win.right).contains(&cx)
                && (win.top..=header_bottom).contains(&cy);
            in_header.then_some((cy, text))
        })
        .min_by_key(|(cy, _)| *cy)
        .map(|(_, text)| text);

    trace!("chat title candidate: {:?}", title);
    title
}

fn edit_matching(
    backend: &dyn AutomationBackend,
    roots: &[UiNode],
    matcher: &Matcher,
    depth: usize,
) -> Result<Option<UiNode>, crate::BridgeError> {
    for root in roots {
        if let Some(edit) = first_existing(backend, root, matcher, depth)? {
            return Ok(Some(edit));
        }
    }
    Ok(None)
}

/// Edits of at least 10x10 from the first root that has any.
fn visible_edits(roots: &[UiNode]) -> Vec<UiNode> {
    for root in roots {
        let edits: Vec<UiNode> = find_descendants(root, SEARCH_DEPTH)
            .filter(|node| node.kind() == ControlKind::Edit)
            .filter(|node| {
                node.bounds()
                    .map(|r| r.width() >= 10 && r.height() >= 10)
                    .unwrap_or(false)
            })
            .collect();
        if !edits.is_empty() {
            return edits;
        }
    }
    Vec::new()
}

/// The message composer. `title` is the open chat's title, when known; some
/// client builds name the composer after it.
pub fn find_input_field(
    backend: &dyn AutomationBackend,
    window: &UiNode,
    title: Option<&str>,
) -> Option<UiNode> {
    let roots = search_roots(window);
    let roots = roots.as_slice();
    let edit = || Matcher::new().kind(ControlKind::Edit);

    let strategies = vec![
        Strategy::new("class name", || {
            edit_matching(backend, roots, &edit().class_name(INPUT_FIELD_CLASS), SEARCH_DEPTH)
        }),
        Strategy::new("automation id", || {
            edit_matching(
                backend,
                roots,
                &edit().automation_id(INPUT_FIELD_AUTOMATION_ID),
                SEARCH_DEPTH,
            )
        }),
        Strategy::new("legacy name", || {
            edit_matching(backend, roots, &edit().name(INPUT_FIELD_NAME), 15)
        }),
        Strategy::new("chat title", || match title {
            Some(title) if !title.is_empty() => {
                edit_matching(backend, roots, &edit().name(title), SEARCH_DEPTH)
            }
            _ => Ok(None),
        }),
        Strategy::new("lowest edit", || {
            let Some(win) = window.bounds() else {
                return Ok(None);
            };
            let lowest = visible_edits(roots)
                .into_iter()
                .filter_map(|e| e.bounds().map(|r| (r.top, e)))
                .max_by_key(|(top, _)| *top);
            let threshold = win.top as f64 + win.height() as f64 * 0.3;
            Ok(lowest
                .filter(|(top, _)| *top as f64 > threshold)
                .map(|(_, e)| e))
        }),
    ];
    let found = resolve_first("input field", strategies).map(|r| r.value);
    if found.is_none() {
        debug!("no input field; {} visible edits", visible_edits(roots).len());
    }
    found
}

/// The send button, if the client shows one.
pub fn find_send_button(backend: &dyn AutomationBackend, window: &UiNode) -> Option<UiNode> {
    let roots = search_roots(window);
    let roots = roots.as_slice();

    let strategies = vec![
        Strategy::new("exact label", || {
            for root in roots {
                for name in SEND_BUTTON_NAMES {
                    let matcher = Matcher::new().kind(ControlKind::Button).name(name);
                    if let Some(button) = first_existing(backend, root, &matcher, SEARCH_DEPTH)? {
                        return Ok(Some(button));
                    }
                }
            }
            Ok(None)
        }),
        Strategy::new("lowest labelled button", || {
            for root in roots {
                let lowest = find_descendants(root, SEARCH_DEPTH)
                    .filter(|n| n.kind() == ControlKind::Button && n.name().contains(SEND_MARKER))
                    .filter_map(|n| n.bounds().map(|r| (r.bottom, n)))
                    .max_by_key(|(bottom, _)| *bottom);
                if let Some((_, button)) = lowest {
                    return Ok(Some(button));
                }
            }
            Ok(None)
        }),
    ];
    resolve_first("send button", strategies).map(|r| r.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::{MemoryBackend, MemoryTree};

    fn window_with(tree: &MemoryTree, children: Vec<crate::platforms::memory::MemoryNode>) -> UiNode {
        let window = tree.node(ControlKind::Window, "微信").bounds(0, 0, 1200, 800);
        for child in children {
            window.push_child(child);
        }
        window.to_node()
    }

    #[test]
    fn test_title_is_top_most_header_label() {
        let tree = MemoryTree::new();
        let window = window_with(
            &tree,
            vec![
                tree.node(ControlKind::Text, "微信").bounds(300, 10, 400, 30),
                tree.node(ControlKind::Text, "Alice").bounds(320, 20, 420, 50),
                tree.node(ControlKind::Text, "subtitle").bounds(320, 60, 420, 80),
                tree.node(ControlKind::Text, "Sidebar").bounds(20, 5, 120, 25),
                tree.node(ControlKind::Text, "body text").bounds(400, 300, 600, 330),
            ],
        );
        assert_eq!(current_chat_title(&window).as_deref(), Some("Alice"));
    }

    #[test]
    fn test_title_absent_without_header_labels() {
        let tree = MemoryTree::new();
        let window = window_with(
            &tree,
            vec![tree.node(ControlKind::Text, "关闭").bounds(1100, 0, 1150, 30)],
        );
        assert_eq!(current_chat_title(&window), None);
    }

    #[test]
    fn test_input_field_by_class_name() {
        let tree = MemoryTree::new();
        let field = tree
            .node(ControlKind::Edit, "")
            .class_name(INPUT_FIELD_CLASS)
            .bounds(300, 600, 1100, 700);
        let window = window_with(&tree, vec![tree.node(ControlKind::Pane, "").child(field.clone())]);
        let backend = MemoryBackend::new(tree.clone());
        assert_eq!(find_input_field(&backend, &window, None), Some(field.to_node()));
    }

    #[test]
    fn test_input_field_named_after_title() {
        let tree = MemoryTree::new();
        let field = tree.node(ControlKind::Edit, "Alice").bounds(300, 600, 1100, 700);
        let window = window_with(&tree, vec![field.clone()]);
        let backend = MemoryBackend::new(tree.clone());
        assert_eq!(
            find_input_field(&backend, &window, Some("Alice")),
            Some(field.to_node())
        );
    }

    #[test]
    fn test_lowest_edit_must_sit_below_the_top_third() {
        let tree = MemoryTree::new();
        let search = tree.node(ControlKind::Edit, "搜索").bounds(20, 20, 250, 50);
        let window = window_with(&tree, vec![search]);
        let backend = MemoryBackend::new(tree.clone());
        assert_eq!(find_input_field(&backend, &window, None), None);

        let composer = tree.node(ControlKind::Edit, "").bounds(300, 650, 1100, 760);
        let window = window_with(
            &tree,
            vec![
                tree.node(ControlKind::Edit, "搜索").bounds(20, 20, 250, 50),
                composer.clone(),
                tree.node(ControlKind::Edit, "tiny").bounds(300, 780, 305, 785),
            ],
        );
        assert_eq!(find_input_field(&backend, &window, None), Some(composer.to_node()));
    }

    #[test]
    fn test_send_button_lookup() {
        let tree = MemoryTree::new();
        let exact = tree.node(ControlKind::Button, "发送(S)").bounds(1000, 740, 1100, 780);
        let window = window_with(&tree, vec![exact.clone()]);
        let backend = MemoryBackend::new(tree.clone());
        assert_eq!(find_send_button(&backend, &window), Some(exact.to_node()));

        let upper = tree.node(ControlKind::Button, "发送文件").bounds(900, 100, 990, 130);
        let lower = tree.node(ControlKind::Button, "发送 ▾").bounds(1000, 740, 1100, 780);
        let window = window_with(&tree, vec![upper, lower.clone()]);
        assert_eq!(find_send_button(&backend, &window), Some(lower.to_node()));

        let window = window_with(&tree, vec![tree.node(ControlKind::Button, "表情")]);
        assert_eq!(find_send_button(&backend, &window), None);
    }
}
