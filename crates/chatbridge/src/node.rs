//! Live handles into the chat client's accessibility tree
//!
//! A [`UiNode`] never owns anything: the target process can destroy or repaint
//! the element behind it at any moment, so every attribute read is live and
//! may come back empty.

use crate::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Semantic control category, independent of the platform's own enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Window,
    Pane,
    List,
    ListItem,
    Text,
    Button,
    Edit,
    Group,
    Custom,
    Document,
    Image,
    Other,
}

impl ControlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Window => "WindowControl",
            ControlKind::Pane => "PaneControl",
            ControlKind::List => "ListControl",
            ControlKind::ListItem => "ListItemControl",
            ControlKind::Text => "TextControl",
            ControlKind::Button => "ButtonControl",
            ControlKind::Edit => "EditControl",
            ControlKind::Group => "GroupControl",
            ControlKind::Custom => "CustomControl",
            ControlKind::Document => "DocumentControl",
            ControlKind::Image => "ImageControl",
            ControlKind::Other => "Control",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screen rectangle in physical pixels. Degenerate rectangles are rejected at
/// construction, so holding a `Rect` means it has positive area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Option<Self> {
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn center(&self) -> (i32, i32) {
        (
            (self.left + self.right) / 2,
            (self.top + self.bottom) / 2,
        )
    }

    /// Grow the rectangle vertically, e.g. so a thin message row still
    /// covers the whole avatar.
    pub fn pad_vertical(&self, pixels: i32) -> Rect {
        Rect {
            left: self.left,
            top: self.top - pixels,
            right: self.right,
            bottom: self.bottom + pixels,
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{},{},{})[{}x{}]",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

/// Keys the bridge ever needs to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    SelectAll,
    Delete,
    Paste,
    Enter,
}

/// Interface for platform-specific node implementations
pub trait UiNodeImpl: Send + Sync + Debug {
    /// Identity within this process; stable for the lifetime of the handle.
    fn object_id(&self) -> usize;
    fn kind(&self) -> ControlKind;
    fn name(&self) -> String;
    fn class_name(&self) -> String;
    fn automation_id(&self) -> String;
    fn bounds(&self) -> Option<Rect>;
    fn process_id(&self) -> Option<u32>;
    /// Platform runtime identifier, when the platform exposes one.
    fn runtime_id(&self) -> Option<String>;
    fn native_handle(&self) -> Option<isize>;
    /// Children in on-screen order, fetched live.
    fn children(&self) -> Result<Vec<UiNode>, BridgeError>;
    /// Cheap liveness probe; never walks the tree.
    fn exists(&self) -> bool;
    fn click(&self) -> Result<(), BridgeError>;
    fn activate(&self) -> Result<(), BridgeError>;
    fn send_key(&self, key: Key) -> Result<(), BridgeError>;
    fn as_any(&self) -> &dyn std::any::Any;
    fn clone_box(&self) -> Box<dyn UiNodeImpl>;
}

/// A node in the target application's accessibility tree.
pub struct UiNode {
    inner: Box<dyn UiNodeImpl>,
}

impl UiNode {
    pub fn new(inner: Box<dyn UiNodeImpl>) -> Self {
        Self { inner }
    }

    pub fn object_id(&self) -> usize {
        self.inner.object_id()
    }

    pub fn kind(&self) -> ControlKind {
        self.inner.kind()
    }

    pub fn name(&self) -> String {
        self.inner.name()
    }

    pub fn class_name(&self) -> String {
        self.inner.class_name()
    }

    pub fn automation_id(&self) -> String {
        self.inner.automation_id()
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.inner.bounds()
    }

    pub fn process_id(&self) -> Option<u32> {
        self.inner.process_id()
    }

    pub fn runtime_id(&self) -> Option<String> {
        self.inner.runtime_id()
    }

    pub fn native_handle(&self) -> Option<isize> {
        self.inner.native_handle()
    }

    pub fn children(&self) -> Result<Vec<UiNode>, BridgeError> {
        self.inner.children()
    }

    pub fn exists(&self) -> bool {
        self.inner.exists()
    }

    pub fn click(&self) -> Result<(), BridgeError> {
        self.inner.click()
    }

    pub fn activate(&self) -> Result<(), BridgeError> {
        self.inner.activate()
    }

    pub fn send_key(&self, key: Key) -> Result<(), BridgeError> {
        self.inner.send_key(key)
    }

    pub fn as_any(&self) -> &dyn std::any::Any {
        self.inner.as_any()
    }

    /// Trimmed display name.
    pub fn label(&self) -> String {
        self.inner.name().trim().to_string()
    }
}

impl Clone for UiNode {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}

impl PartialEq for UiNode {
    fn eq(&self, other: &Self) -> bool {
        self.inner.object_id() == other.inner.object_id()
    }
}

impl Eq for UiNode {}

impl std::hash::Hash for UiNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.object_id().hash(state);
    }
}

impl Debug for UiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiNode")
            .field("kind", &self.inner.kind())
            .field("name", &self.inner.name())
            .field("class_name", &self.inner.class_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_rect_is_rejected() {
        assert!(Rect::new(10, 10, 10, 20).is_none());
        assert!(Rect::new(10, 10, 20, 5).is_none());
        assert!(Rect::new(0, 0, 1, 1).is_some());
    }

    #[test]
    fn test_rect_geometry() {
        let rect = Rect::new(100, 50, 400, 250).unwrap();
        assert_eq!(rect.width(), 300);
        assert_eq!(rect.height(), 200);
        assert_eq!(rect.area(), 60_000);
        assert_eq!(rect.center(), (250, 150));

        let padded = rect.pad_vertical(5);
        assert_eq!(padded.top, 45);
        assert_eq!(padded.bottom, 255);
        assert_eq!(padded.left, rect.left);
    }
}
