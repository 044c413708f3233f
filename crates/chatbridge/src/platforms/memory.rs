//! Scriptable in-memory accessibility tree
//!
//! Stands in for the real client wherever there is no desktop: unit tests,
//! scenario tests and non-Windows development. Nodes are shared handles, so a
//! test can keep a reference to e.g. the title label and rename it from an
//! `on_click` hook to simulate switching chats.

use super::{AutomationBackend, Timeouts};
use crate::{BridgeError, ControlKind, Key, Rect, UiNode, UiNodeImpl};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Something the bridge did to the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Click(String),
    Activate(String),
    Key(Key),
    Clipboard(String),
}

#[derive(Default)]
struct TreeShared {
    next_id: AtomicUsize,
    reads: AtomicUsize,
    hung: AtomicBool,
    native_lookup_disabled: AtomicBool,
    events: Mutex<Vec<Event>>,
    processes: RwLock<Vec<(String, u32)>>,
    desktop: RwLock<Option<MemoryNode>>,
}

/// Factory and shared log for a family of [`MemoryNode`]s.
#[derive(Clone, Default)]
pub struct MemoryTree {
    shared: Arc<TreeShared>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, kind: ControlKind, name: &str) -> MemoryNode {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        MemoryNode {
            state: Arc::new(NodeState {
                id,
                tree: Arc::clone(&self.shared),
                attrs: RwLock::new(Attrs {
                    kind: Some(kind),
                    name: name.to_string(),
                    ..Default::default()
                }),
                children: RwLock::new(Vec::new()),
                alive: AtomicBool::new(true),
                on_click: RwLock::new(None),
            }),
        }
    }

    /// The desktop root, created on first use. Top-level windows go under it.
    pub fn desktop(&self) -> MemoryNode {
        if let Some(desktop) = self.shared.desktop.read().as_ref() {
            return desktop.clone();
        }
        let mut slot = self.shared.desktop.write();
        slot.get_or_insert_with(|| self.node(ControlKind::Pane, "Desktop"))
            .clone()
    }

    /// Number of child expansions since the last reset.
    pub fn reads(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }

    pub fn reset_reads(&self) {
        self.shared.reads.store(0, Ordering::SeqCst);
    }

    pub fn set_hung(&self, hung: bool) {
        self.shared.hung.store(hung, Ordering::SeqCst);
    }

    /// Make the native window lookup miss, forcing the tree strategies.
    pub fn disable_native_lookup(&self) {
        self.shared.native_lookup_disabled.store(true, Ordering::SeqCst);
    }

    pub fn add_process(&self, executable: &str, pid: u32) {
        self.shared
            .processes
            .write()
            .push((executable.to_string(), pid));
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.shared.events.lock().clear();
    }

    pub fn clicks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Click(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Key(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn clipboard(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e {
            Event::Clipboard(text) => Some(text),
            _ => None,
        })
    }

    fn record(&self, event: Event) {
        self.shared.events.lock().push(event);
    }
}

#[derive(Default)]
struct Attrs {
    kind: Option<ControlKind>,
    name: String,
    class_name: String,
    automation_id: String,
    bounds: Option<Rect>,
    process_id: Option<u32>,
    runtime_id: Option<String>,
    native_handle: Option<isize>,
    click_fails: bool,
}

type ClickHook = Arc<dyn Fn() + Send + Sync>;

struct NodeState {
    id: usize,
    tree: Arc<TreeShared>,
    attrs: RwLock<Attrs>,
    children: RwLock<Vec<MemoryNode>>,
    alive: AtomicBool,
    on_click: RwLock<Option<ClickHook>>,
}

/// Shared, mutable node handle. Builder methods consume and return `self` so
/// trees can be written inline.
#[derive(Clone)]
pub struct MemoryNode {
    state: Arc<NodeState>,
}

impl MemoryNode {
    fn tree(&self) -> MemoryTree {
        MemoryTree {
            shared: Arc::clone(&self.state.tree),
        }
    }

    pub fn child(self, child: MemoryNode) -> Self {
        self.state.children.write().push(child);
        self
    }

    pub fn class_name(self, class_name: &str) -> Self {
        self.state.attrs.write().class_name = class_name.to_string();
        self
    }

    pub fn automation_id(self, automation_id: &str) -> Self {
        self.state.attrs.write().automation_id = automation_id.to_string();
        self
    }

    pub fn bounds(self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        self.state.attrs.write().bounds = Rect::new(left, top, right, bottom);
        self
    }

    pub fn pid(self, pid: u32) -> Self {
        self.state.attrs.write().process_id = Some(pid);
        self
    }

    pub fn runtime_id(self, runtime_id: &str) -> Self {
        self.state.attrs.write().runtime_id = Some(runtime_id.to_string());
        self
    }

    pub fn native_handle(self, handle: isize) -> Self {
        self.state.attrs.write().native_handle = Some(handle);
        self
    }

    pub fn failing_click(self) -> Self {
        self.state.attrs.write().click_fails = true;
        self
    }

    pub fn on_click<F>(self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.state.on_click.write() = Some(Arc::new(hook));
        self
    }

    pub fn set_name(&self, name: &str) {
        self.state.attrs.write().name = name.to_string();
    }

    pub fn set_children(&self, children: Vec<MemoryNode>) {
        *self.state.children.write() = children;
    }

    pub fn push_child(&self, child: MemoryNode) {
        self.state.children.write().push(child);
    }

    /// Mark the node destroyed; later reads fail like a vanished element.
    pub fn remove(&self) {
        self.state.alive.store(false, Ordering::SeqCst);
    }

    pub fn name(&self) -> String {
        self.state.attrs.read().name.clone()
    }

    pub fn to_node(&self) -> UiNode {
        UiNode::new(Box::new(MemoryNodeImpl { node: self.clone() }))
    }

    fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attrs = self.state.attrs.read();
        f.debug_struct("MemoryNode")
            .field("id", &self.state.id)
            .field("kind", &attrs.kind)
            .field("name", &attrs.name)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct MemoryNodeImpl {
    node: MemoryNode,
}

impl MemoryNodeImpl {
    fn ensure_alive(&self) -> Result<(), BridgeError> {
        if self.node.is_alive() {
            Ok(())
        } else {
            Err(BridgeError::NotFound(format!(
                "node {} no longer exists",
                self.node.state.id
            )))
        }
    }
}

impl UiNodeImpl for MemoryNodeImpl {
    fn object_id(&self) -> usize {
        self.node.state.id
    }

    fn kind(&self) -> ControlKind {
        self.node.state.attrs.read().kind.unwrap_or(ControlKind::Other)
    }

    fn name(&self) -> String {
        if !self.node.is_alive() {
            return String::new();
        }
        self.node.state.attrs.read().name.clone()
    }

    fn class_name(&self) -> String {
        self.node.state.attrs.read().class_name.clone()
    }

    fn automation_id(&self) -> String {
        self.node.state.attrs.read().automation_id.clone()
    }

    fn bounds(&self) -> Option<Rect> {
        self.node.state.attrs.read().bounds
    }

    fn process_id(&self) -> Option<u32> {
        self.node.state.attrs.read().process_id
    }

    fn runtime_id(&self) -> Option<String> {
        self.node.state.attrs.read().runtime_id.clone()
    }

    fn native_handle(&self) -> Option<isize> {
        self.node.state.attrs.read().native_handle
    }

    fn children(&self) -> Result<Vec<UiNode>, BridgeError> {
        self.node.state.tree.reads.fetch_add(1, Ordering::SeqCst);
        self.ensure_alive()?;
        Ok(self
            .node
            .state
            .children
            .read()
            .iter()
            .filter(|c| c.is_alive())
            .map(|c| c.to_node())
            .collect())
    }

    fn exists(&self) -> bool {
        self.node.is_alive()
    }

    fn click(&self) -> Result<(), BridgeError> {
        self.ensure_alive()?;
        if self.node.state.attrs.read().click_fails {
            return Err(BridgeError::Interaction(format!(
                "click on '{}' rejected",
                self.node.name()
            )));
        }
        self.node.tree().record(Event::Click(self.node.name()));
        let hook = self.node.state.on_click.read().clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }

    fn activate(&self) -> Result<(), BridgeError> {
        self.ensure_alive()?;
        self.node.tree().record(Event::Activate(self.node.name()));
        Ok(())
    }

    fn send_key(&self, key: Key) -> Result<(), BridgeError> {
        self.ensure_alive()?;
        self.node.tree().record(Event::Key(key));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn UiNodeImpl> {
        Box::new(self.clone())
    }
}

/// [`AutomationBackend`] over a [`MemoryTree`].
pub struct MemoryBackend {
    tree: MemoryTree,
    timeouts: Mutex<Timeouts>,
}

impl MemoryBackend {
    pub fn new(tree: MemoryTree) -> Self {
        Self {
            tree,
            timeouts: Mutex::new(Timeouts::default()),
        }
    }

    pub fn tree(&self) -> &MemoryTree {
        &self.tree
    }
}

impl AutomationBackend for MemoryBackend {
    fn configure_timeouts(&self, timeouts: Timeouts) {
        *self.timeouts.lock() = timeouts;
    }

    fn timeouts(&self) -> Timeouts {
        *self.timeouts.lock()
    }

    fn desktop_root(&self) -> Result<UiNode, BridgeError> {
        Ok(self.tree.desktop().to_node())
    }

    fn find_native_window(
        &self,
        class_name: &str,
        title: &str,
    ) -> Result<Option<UiNode>, BridgeError> {
        if self.tree.shared.native_lookup_disabled.load(Ordering::SeqCst) {
            return Ok(None);
        }
        // Direct registry lookup, like FindWindow: no tree expansion.
        let desktop = self.tree.desktop();
        let windows = desktop.state.children.read();
        Ok(windows
            .iter()
            .filter(|w| w.is_alive())
            .find(|w| {
                let attrs = w.state.attrs.read();
                attrs.class_name == class_name && attrs.name == title
            })
            .map(|w| w.to_node()))
    }

    fn is_hung(&self, _window: &UiNode) -> bool {
        self.tree.shared.hung.load(Ordering::SeqCst)
    }

    fn process_ids(&self, executables: &[String]) -> Vec<u32> {
        self.tree
            .shared
            .processes
            .read()
            .iter()
            .filter(|(exe, _)| executables.iter().any(|e| e.eq_ignore_ascii_case(exe)))
            .map(|(_, pid)| *pid)
            .collect()
    }

    fn set_clipboard(&self, text: &str) -> Result<(), BridgeError> {
        self.tree.record(Event::Clipboard(text.to_string()));
        Ok(())
    }

    fn press_key(&self, key: Key) -> Result<(), BridgeError> {
        self.tree.record(Event::Key(key));
        Ok(())
    }

    fn platform_name(&self) -> &'static str {
        "memory"
    }
}
