//! Depth-first dump of a window's tree, for working out selectors by hand

use crate::UiNode;

/// Names or automation ids containing one of these are flagged.
pub const HIGHLIGHT_KEYWORDS: &[&str] = &["未读", "消息", "输入", "发送"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectLine {
    pub depth: usize,
    pub highlight: bool,
    pub kind: String,
    pub name: String,
    pub automation_id: String,
    pub bounds: Option<String>,
}

impl std::fmt::Display for InspectLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}{} | Name={} | AutomationId={} | Rect={}",
            if self.highlight { "HIGHLIGHT" } else { "NODE" },
            "  ".repeat(self.depth),
            self.kind,
            self.name,
            self.automation_id,
            self.bounds.as_deref().unwrap_or("")
        )
    }
}

/// Pre-order walk from `root` (included), children in on-screen order.
pub fn inspect_tree(root: &UiNode) -> Vec<InspectLine> {
    let mut lines = Vec::new();
    let mut stack = vec![(root.clone(), 0usize)];
    while let Some((node, depth)) = stack.pop() {
        let name = node.name();
        let automation_id = node.automation_id();
        let highlight = HIGHLIGHT_KEYWORDS
            .iter()
            .any(|k| name.contains(k) || automation_id.contains(k));
        lines.push(InspectLine {
            depth,
            highlight,
            kind: node.kind().to_string(),
            name,
            automation_id,
            bounds: node.bounds().map(|r| r.to_string()),
        });
        let children = node.children().unwrap_or_default();
        stack.extend(children.into_iter().rev().map(|c| (c, depth + 1)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::MemoryTree;
    use crate::ControlKind;

    #[test]
    fn test_preorder_with_highlights() {
        let tree = MemoryTree::new();
        let root = tree
            .node(ControlKind::Window, "w")
            .child(
                tree.node(ControlKind::List, "消息")
                    .child(tree.node(ControlKind::ListItem, "hi")),
            )
            .child(tree.node(ControlKind::Edit, "").automation_id("chat_输入"));
        let lines = inspect_tree(&root.to_node());

        let names: Vec<_> = lines.iter().map(|l| (l.depth, l.name.as_str())).collect();
        assert_eq!(names, vec![(0, "w"), (1, "消息"), (2, "hi"), (1, "")]);
        let flagged: Vec<_> = lines.iter().map(|l| l.highlight).collect();
        assert_eq!(flagged, vec![false, true, false, true]);
        assert!(lines[1].to_string().starts_with("HIGHLIGHT   ListControl"));
    }
}
