#![allow(dead_code)]

use chatbridge::direction::{DirectionClassifier, FixedDirection};
use chatbridge::extractor::ExtractedMessage;
use chatbridge::pacing::RecordingPacer;
use chatbridge::platforms::memory::{MemoryBackend, MemoryNode, MemoryTree};
use chatbridge::{BridgeConfig, ChatUi, ControlKind, InteractionGate, MessageSink, NoopGate};
use parking_lot::Mutex;
use std::sync::Arc;

pub const MAIN_CLASS: &str = "mmui::MainWindow";
pub const MAIN_TITLE: &str = "微信";

/// A main window laid out like the real client: session column on the left,
/// chat header, message list, composer and send button on the right.
pub struct FakeClient {
    pub tree: MemoryTree,
    pub window: MemoryNode,
    pub title: MemoryNode,
    pub sessions: MemoryNode,
    pub messages: MemoryNode,
    pub input: MemoryNode,
    pub send_button: MemoryNode,
    pub backend: Arc<MemoryBackend>,
}

impl FakeClient {
    pub fn new(open_chat: &str) -> Self {
        Self::build(open_chat, false)
    }

    /// Same layout, but the send button rejects clicks.
    pub fn with_broken_send_button(open_chat: &str) -> Self {
        Self::build(open_chat, true)
    }

    fn build(open_chat: &str, broken_send: bool) -> Self {
        let tree = MemoryTree::new();
        let title = tree
            .node(ControlKind::Text, open_chat)
            .bounds(300, 20, 500, 50);
        let sessions = tree
            .node(ControlKind::List, "会话")
            .bounds(0, 60, 280, 800);
        let messages = tree
            .node(ControlKind::List, "消息")
            .bounds(300, 100, 1200, 600);
        let input = tree
            .node(ControlKind::Edit, "")
            .class_name("mmui::ChatInputField")
            .bounds(300, 650, 1100, 750);
        let mut send_button = tree
            .node(ControlKind::Button, "发送")
            .bounds(1100, 760, 1180, 790);
        if broken_send {
            send_button = send_button.failing_click();
        }
        let window = tree
            .node(ControlKind::Window, MAIN_TITLE)
            .class_name(MAIN_CLASS)
            .pid(4242)
            .native_handle(0x1234)
            .bounds(0, 0, 1200, 800)
            .child(sessions.clone())
            .child(title.clone())
            .child(messages.clone())
            .child(input.clone())
            .child(send_button.clone());
        tree.desktop().push_child(window.clone());
        let backend = Arc::new(MemoryBackend::new(tree.clone()));
        Self {
            tree,
            window,
            title,
            sessions,
            messages,
            input,
            send_button,
            backend,
        }
    }

    /// A text row; rows at x >= 700 are the local user's.
    pub fn row(&self, content: &str, is_self: bool, runtime_id: Option<&str>) -> MemoryNode {
        let left = if is_self { 700 } else { 320 };
        let mut row = self
            .tree
            .node(ControlKind::ListItem, content)
            .class_name("ChatTextItemView")
            .bounds(left, 120, left + 300, 160);
        if let Some(id) = runtime_id {
            row = row.runtime_id(id);
        }
        row
    }

    pub fn show_messages(&self, rows: &[(&str, bool)]) {
        let rows = rows
            .iter()
            .map(|(content, is_self)| self.row(content, *is_self, None))
            .collect();
        self.messages.set_children(rows);
    }

    /// A session entry. Clicking it opens the chat: the header switches to
    /// `contact` and the message list shows `greeting` from them.
    pub fn add_session(&self, display_name: &str, contact: &str, greeting: &str) -> MemoryNode {
        let title = self.title.clone();
        let messages = self.messages.clone();
        let tree = self.tree.clone();
        let contact = contact.to_string();
        let greeting = greeting.to_string();
        let index = self.sessions.to_node().children().map(|c| c.len()).unwrap_or(0) as i32;
        let top = 70 + index * 60;
        let entry = self
            .tree
            .node(ControlKind::ListItem, display_name)
            .bounds(0, top, 280, top + 60)
            .on_click(move || {
                title.set_name(&contact);
                messages.set_children(vec![tree
                    .node(ControlKind::ListItem, &greeting)
                    .class_name("ChatTextItemView")
                    .bounds(320, 120, 620, 160)]);
            });
        self.sessions.push_child(entry.clone());
        entry
    }

    pub fn config(&self) -> BridgeConfig {
        BridgeConfig::default()
    }

    pub fn ui(&self) -> ChatUi {
        self.ui_with(Arc::new(NoopGate), Arc::new(RightSideIsSelf))
    }

    pub fn ui_with(
        &self,
        gate: Arc<dyn InteractionGate>,
        classifier: Arc<dyn DirectionClassifier>,
    ) -> ChatUi {
        ChatUi::builder(self.backend.clone(), &self.config())
            .gate(gate)
            .pacer(Arc::new(RecordingPacer::new()))
            .classifier(classifier)
            .build()
    }
}

/// Direction by row position, matching [`FakeClient::row`].
pub struct RightSideIsSelf;

impl DirectionClassifier for RightSideIsSelf {
    fn is_self(&self, bounds: chatbridge::Rect) -> bool {
        bounds.left >= 700
    }
}

pub fn incoming_only() -> Arc<dyn DirectionClassifier> {
    Arc::new(FixedDirection::default())
}

/// Sink that keeps everything it is handed.
#[derive(Default)]
pub struct CollectingSink {
    pub messages: Mutex<Vec<ExtractedMessage>>,
}

impl CollectingSink {
    pub fn contents(&self) -> Vec<String> {
        self.messages.lock().iter().map(|m| m.content.clone()).collect()
    }
}

impl MessageSink for CollectingSink {
    fn accept(&self, message: &ExtractedMessage) {
        self.messages.lock().push(message.clone());
    }
}

/// Gate that admits everyone and remembers which operations entered it.
#[derive(Default)]
pub struct RecordingGate {
    pub entries: Mutex<Vec<&'static str>>,
}

impl InteractionGate for RecordingGate {
    fn enter(&self, op: &'static str) -> chatbridge::gate::GateGuard<'_> {
        self.entries.lock().push(op);
        chatbridge::gate::GateGuard::unheld(op)
    }
}
