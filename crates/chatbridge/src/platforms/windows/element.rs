//! UIA-backed tree nodes

use super::types::{ThreadSafeWinUIAutomation, ThreadSafeWinUIElement};
use super::utils::{key_sequence, map_control_type};
use crate::{BridgeError, ControlKind, Key, Rect, UiNode, UiNodeImpl};
use std::fmt::{self, Debug};
use std::sync::Arc;
use tracing::debug;
use uiautomation::inputs::Mouse;
use uiautomation::types::{Point, TreeScope};

#[derive(Clone)]
pub struct WindowsNode {
    pub(crate) element: ThreadSafeWinUIElement,
    pub(crate) automation: Arc<ThreadSafeWinUIAutomation>,
}

impl WindowsNode {
    pub(crate) fn wrap(
        element: uiautomation::UIElement,
        automation: &Arc<ThreadSafeWinUIAutomation>,
    ) -> UiNode {
        #[allow(clippy::arc_with_non_send_sync)]
        let node = WindowsNode {
            element: ThreadSafeWinUIElement(Arc::new(element)),
            automation: Arc::clone(automation),
        };
        UiNode::new(Box::new(node))
    }

    pub(crate) fn raw(&self) -> &uiautomation::UIElement {
        &self.element.0
    }
}

impl Debug for WindowsNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowsNode")
            .field("name", &self.element.0.get_name().unwrap_or_default())
            .field("class_name", &self.element.0.get_classname().unwrap_or_default())
            .finish()
    }
}

impl UiNodeImpl for WindowsNode {
    /// Hash of the UIA runtime id, which is unique while the element lives.
    fn object_id(&self) -> usize {
        match self.element.0.get_runtime_id() {
            Ok(id) if !id.is_empty() => {
                let bytes: Vec<u8> = id.iter().flat_map(|part| part.to_le_bytes()).collect();
                let hash = blake3::hash(&bytes);
                let mut prefix = [0u8; 8];
                prefix.copy_from_slice(&hash.as_bytes()[0..8]);
                u64::from_le_bytes(prefix) as usize
            }
            _ => Arc::as_ptr(&self.element.0) as usize,
        }
    }

    fn kind(&self) -> ControlKind {
        self.element
            .0
            .get_control_type()
            .map(map_control_type)
            .unwrap_or(ControlKind::Other)
    }

    fn name(&self) -> String {
        self.element.0.get_name().unwrap_or_default()
    }

    fn class_name(&self) -> String {
        self.element.0.get_classname().unwrap_or_default()
    }

    fn automation_id(&self) -> String {
        self.element.0.get_automation_id().unwrap_or_default()
    }

    fn bounds(&self) -> Option<Rect> {
        let rect = self.element.0.get_bounding_rectangle().ok()?;
        Rect::new(
            rect.get_left(),
            rect.get_top(),
            rect.get_right(),
            rect.get_bottom(),
        )
    }

    fn process_id(&self) -> Option<u32> {
        self.element.0.get_process_id().ok().map(|pid| pid as u32)
    }

    fn runtime_id(&self) -> Option<String> {
        let id = self.element.0.get_runtime_id().ok()?;
        if id.is_empty() {
            return None;
        }
        Some(
            id.iter()
                .map(|part| part.to_string())
                .collect::<Vec<_>>()
                .join("."),
        )
    }

    fn native_handle(&self) -> Option<isize> {
        let handle = self.element.0.get_native_window_handle().ok()?;
        let hwnd: windows::Win32::Foundation::HWND = handle.into();
        let raw = hwnd.0 as isize;
        (raw != 0).then_some(raw)
    }

    /// One provider round trip, capped by the client transaction timeout.
    fn children(&self) -> Result<Vec<UiNode>, BridgeError> {
        let true_condition = self.automation.0.create_true_condition().map_err(|e| {
            BridgeError::PlatformError(format!("Failed to create true condition: {e}"))
        })?;
        let children = self
            .element
            .0
            .find_all(TreeScope::Children, &true_condition)
            .map_err(|e| BridgeError::NotFound(format!("Failed to get children: {e}")))?;
        Ok(children
            .into_iter()
            .map(|child| WindowsNode::wrap(child, &self.automation))
            .collect())
    }

    fn exists(&self) -> bool {
        self.element.0.get_control_type().is_ok()
    }

    /// Pattern click first, then the element's clickable point, then the
    /// centre of its rectangle.
    fn click(&self) -> Result<(), BridgeError> {
        self.element.0.try_focus();
        if self.element.0.click().is_ok() {
            return Ok(());
        }

        let mouse = Mouse::default();
        if let Ok(Some(point)) = self.element.0.get_clickable_point() {
            debug!("using clickable point: {:?}", point);
            if mouse.click(point).is_ok() {
                return Ok(());
            }
        }

        debug!("clickable point unavailable, falling back to bounding rectangle");
        let rect = self
            .element
            .0
            .get_bounding_rectangle()
            .map_err(|e| BridgeError::Interaction(format!("no clickable area: {e}")))?;
        let center = Point::new(
            rect.get_left() + rect.get_width() / 2,
            rect.get_top() + rect.get_height() / 2,
        );
        mouse
            .click(center)
            .map_err(|e| BridgeError::Interaction(format!("click failed: {e}")))
    }

    fn activate(&self) -> Result<(), BridgeError> {
        use windows::Win32::UI::WindowsAndMessaging::{
            BringWindowToTop, IsIconic, SetForegroundWindow, ShowWindow, SW_RESTORE,
        };

        let handle = match self.element.0.get_native_window_handle() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("no native window handle, falling back to set_focus");
                return self
                    .element
                    .0
                    .set_focus()
                    .map_err(|e| BridgeError::Interaction(e.to_string()));
            }
        };

        unsafe {
            let hwnd: windows::Win32::Foundation::HWND = handle.into();
            if IsIconic(hwnd).as_bool() {
                debug!("window is minimized, restoring it");
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
            let _ = BringWindowToTop(hwnd);
            if !SetForegroundWindow(hwnd).as_bool() {
                debug!("SetForegroundWindow failed, but continuing");
            }
            let _ = self.element.0.set_focus();
        }
        Ok(())
    }

    fn send_key(&self, key: Key) -> Result<(), BridgeError> {
        self.element
            .0
            .send_keys(key_sequence(key), 10)
            .map_err(|e| BridgeError::Interaction(format!("Failed to press key: {e:?}")))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn UiNodeImpl> {
        Box::new(self.clone())
    }
}
