//! Message-list rows to structured messages

use crate::direction::DirectionClassifier;
use crate::locator::find_descendants;
use crate::UiNode;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Rows that are nothing but a time separator.
static TIMESTAMP_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d{1,2}:\d{2}|昨天.*|星期.*|202\d年.*)$").expect("valid regex")
});
static CLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}$").expect("valid regex"));

const TEXT_ITEM_CLASS: &str = "ChatTextItemView";
const CONTENT_DEPTH: usize = 5;
/// Lower bound on how many trailing rows a pass looks at.
pub const MIN_SCAN_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMessage {
    pub contact: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    /// Local time, ISO-8601 with second precision.
    pub timestamp: String,
    pub is_self: bool,
    pub trigger_reply: bool,
    #[serde(rename = "ui_id")]
    pub native_id: Option<String>,
}

fn now_iso() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

/// Text a row displays, if it is a message at all.
pub fn message_content(item: &UiNode) -> Option<String> {
    let name = item.label();
    if TIMESTAMP_ROW.is_match(&name) {
        return None;
    }
    if !name.is_empty() && item.class_name().contains(TEXT_ITEM_CLASS) {
        return Some(name);
    }
    // Stickers, files and images keep their caption somewhere below.
    find_descendants(item, CONTENT_DEPTH)
        .map(|node| node.label())
        .find(|text| !text.is_empty() && !CLOCK.is_match(text))
}

pub struct MessageExtractor {
    classifier: Arc<dyn DirectionClassifier>,
}

impl MessageExtractor {
    pub fn new(classifier: Arc<dyn DirectionClassifier>) -> Self {
        Self { classifier }
    }

    pub fn extract(&self, contact: &str, item: &UiNode) -> Option<ExtractedMessage> {
        let content = message_content(item)?;
        let is_self = item
            .bounds()
            .map(|bounds| self.classifier.is_self(bounds))
            .unwrap_or(false);
        Some(ExtractedMessage {
            contact: contact.to_string(),
            kind: MessageKind::Text,
            content,
            timestamp: now_iso(),
            is_self,
            trigger_reply: false,
            native_id: item.runtime_id(),
        })
    }

    /// Extract the trailing rows of `message_list` in on-screen order.
    ///
    /// Only the final message can carry `trigger_reply`, and only when the
    /// other side wrote it.
    pub fn extract_latest(
        &self,
        contact: &str,
        message_list: &UiNode,
        scan_limit: usize,
    ) -> Vec<ExtractedMessage> {
        let items = match message_list.children() {
            Ok(items) => items,
            Err(e) => {
                debug!("message list unreadable: {}", e);
                return Vec::new();
            }
        };
        let limit = scan_limit.max(MIN_SCAN_LIMIT);
        let start = items.len().saturating_sub(limit);

        let mut messages: Vec<ExtractedMessage> = items[start..]
            .iter()
            .filter_map(|item| self.extract(contact, item))
            .collect();

        if let Some(last) = messages.last_mut() {
            if !last.is_self {
                last.trigger_reply = true;
            }
        }
        trace!(
            "extracted {} of {} rows for '{}'",
            messages.len(),
            items.len() - start,
            contact
        );
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::FixedDirection;
    use crate::platforms::memory::{MemoryNode, MemoryTree};
    use crate::{ControlKind, Rect};

    /// Rows whose left edge is 0 read as self-authored.
    struct LeftEdgeIsSelf;

    impl DirectionClassifier for LeftEdgeIsSelf {
        fn is_self(&self, bounds: Rect) -> bool {
            bounds.left == 0
        }
    }

    fn text_row(tree: &MemoryTree, text: &str, is_self: bool) -> MemoryNode {
        let left = if is_self { 0 } else { 10 };
        tree.node(ControlKind::ListItem, text)
            .class_name("mmui::ChatTextItemView")
            .bounds(left, 0, 400, 40)
    }

    #[test]
    fn test_timestamp_rows_are_skipped() {
        let tree = MemoryTree::new();
        for name in ["08:18", "昨天 12:00", "星期二", "2024年3月1日"] {
            assert!(message_content(&tree.node(ControlKind::ListItem, name).to_node()).is_none());
        }
    }

    #[test]
    fn test_content_falls_back_to_descendant() {
        let tree = MemoryTree::new();
        let row = tree.node(ControlKind::ListItem, "").child(
            tree.node(ControlKind::Pane, "")
                .child(tree.node(ControlKind::Text, "12:30"))
                .child(tree.node(ControlKind::Text, "[Sticker]")),
        );
        assert_eq!(message_content(&row.to_node()).as_deref(), Some("[Sticker]"));
    }

    #[test]
    fn test_trigger_reply_on_last_other_message() {
        let tree = MemoryTree::new();
        let list = tree
            .node(ControlKind::List, "消息")
            .child(text_row(&tree, "hi", false))
            .child(text_row(&tree, "hello", true))
            .child(text_row(&tree, "are you there?", false));
        let extractor = MessageExtractor::new(Arc::new(LeftEdgeIsSelf));
        let messages = extractor.extract_latest("Alice", &list.to_node(), 10);

        assert_eq!(messages.len(), 3);
        let flagged: Vec<_> = messages.iter().filter(|m| m.trigger_reply).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].content, "are you there?");
        assert!(messages[1].is_self);
    }

    #[test]
    fn test_no_trigger_when_last_is_self() {
        let tree = MemoryTree::new();
        let list = tree
            .node(ControlKind::List, "消息")
            .child(text_row(&tree, "question", false))
            .child(text_row(&tree, "answer", true));
        let extractor = MessageExtractor::new(Arc::new(LeftEdgeIsSelf));
        let messages = extractor.extract_latest("Alice", &list.to_node(), 10);
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| !m.trigger_reply));
    }

    #[test]
    fn test_scan_limit_keeps_trailing_rows_in_order() {
        let tree = MemoryTree::new();
        let list = tree.node(ControlKind::List, "消息");
        for i in 0..12 {
            list.push_child(text_row(&tree, &format!("m{}", i), false));
        }
        let extractor = MessageExtractor::new(Arc::new(FixedDirection::default()));

        let contents: Vec<_> = extractor
            .extract_latest("Alice", &list.to_node(), 3)
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["m7", "m8", "m9", "m10", "m11"]);
    }

    #[test]
    fn test_serialized_field_names() {
        let message = ExtractedMessage {
            contact: "Alice".into(),
            kind: MessageKind::Text,
            content: "hi".into(),
            timestamp: "2024-01-01T10:00:00".into(),
            is_self: false,
            trigger_reply: true,
            native_id: Some("42.7".into()),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["ui_id"], "42.7");
        assert_eq!(json["trigger_reply"], true);
        assert!(json.get("native_id").is_none());
    }
}
