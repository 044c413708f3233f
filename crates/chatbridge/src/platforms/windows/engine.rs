//! [`AutomationBackend`] over Windows UI Automation

use super::element::WindowsNode;
use super::types::ThreadSafeWinUIAutomation;
use super::utils::{enable_dpi_awareness, init_com, key_sequence};
use crate::locator::{find_descendants, Matcher};
use crate::platforms::{AutomationBackend, Timeouts};
use crate::{BridgeError, Key, UiNode};
use arboard::Clipboard;
use parking_lot::Mutex;
use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, instrument, warn};
use uiautomation::UIAutomation;
use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{FindWindowW, IsHungAppWindow};

pub struct WindowsBackend {
    automation: Arc<ThreadSafeWinUIAutomation>,
    timeouts: Mutex<Timeouts>,
}

impl WindowsBackend {
    pub fn new() -> Result<Self, BridgeError> {
        init_com()?;
        enable_dpi_awareness();
        let automation = UIAutomation::new_direct()
            .map_err(|e| BridgeError::PlatformError(e.to_string()))?;
        let timeouts = Timeouts::default();
        apply_client_timeouts(&automation, timeouts);
        Ok(Self {
            automation: Arc::new(ThreadSafeWinUIAutomation(automation)),
            timeouts: Mutex::new(timeouts),
        })
    }
}

/// Bound every cross-process UIA call. The transaction timeout caps a single
/// provider round trip (property reads, `find_all`, child walks); the
/// connection timeout caps reaching a provider that stopped responding.
fn apply_client_timeouts(automation: &UIAutomation, timeouts: Timeouts) {
    let transaction_ms = timeouts.transaction.as_millis().min(u32::MAX as u128) as u32;
    let connection_ms = timeouts.search.as_millis().min(u32::MAX as u128) as u32;
    if let Err(e) = automation.set_transaction_timeout(transaction_ms) {
        warn!("could not set UIA transaction timeout: {}", e);
    }
    if let Err(e) = automation.set_connection_timeout(connection_ms) {
        warn!("could not set UIA connection timeout: {}", e);
    }
}

impl AutomationBackend for WindowsBackend {
    fn configure_timeouts(&self, timeouts: Timeouts) {
        debug!(
            "search timeout {:?}, transaction timeout {:?}",
            timeouts.search, timeouts.transaction
        );
        apply_client_timeouts(&self.automation.0, timeouts);
        *self.timeouts.lock() = timeouts;
    }

    fn timeouts(&self) -> Timeouts {
        *self.timeouts.lock()
    }

    fn desktop_root(&self) -> Result<UiNode, BridgeError> {
        let root = self.automation.0.get_root_element()?;
        Ok(WindowsNode::wrap(root, &self.automation))
    }

    fn find_native_window(
        &self,
        class_name: &str,
        title: &str,
    ) -> Result<Option<UiNode>, BridgeError> {
        let class_name = HSTRING::from(class_name);
        let title = HSTRING::from(title);
        let hwnd = match unsafe {
            FindWindowW(PCWSTR(class_name.as_ptr()), PCWSTR(title.as_ptr()))
        } {
            Ok(hwnd) if !hwnd.is_invalid() => hwnd,
            _ => return Ok(None),
        };
        match self.automation.0.element_from_handle(hwnd.into()) {
            Ok(element) => Ok(Some(WindowsNode::wrap(element, &self.automation))),
            Err(e) => {
                debug!("window handle found but not wrappable: {}", e);
                Ok(None)
            }
        }
    }

    fn is_hung(&self, window: &UiNode) -> bool {
        let Some(raw) = window.native_handle() else {
            return false;
        };
        unsafe { IsHungAppWindow(HWND(raw as *mut std::ffi::c_void)).as_bool() }
    }

    fn process_ids(&self, executables: &[String]) -> Vec<u32> {
        let wanted: Vec<String> = executables.iter().map(|e| e.to_lowercase()).collect();
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let mut pids: Vec<u32> = system
            .processes()
            .iter()
            .filter(|(_, process)| {
                let name = process.name().to_string_lossy().to_lowercase();
                wanted.iter().any(|w| *w == name)
            })
            .map(|(pid, _)| pid.as_u32())
            .collect();
        pids.sort_unstable();
        pids
    }

    /// Runs the search inside UIA's own matcher so the walk stays in-process
    /// on the provider side and honours the search timeout.
    #[instrument(level = "trace", skip(self, root, matcher))]
    fn find_first(
        &self,
        root: &UiNode,
        matcher: &Matcher,
        depth: usize,
    ) -> Result<Option<UiNode>, BridgeError> {
        let Some(root_node) = root.as_any().downcast_ref::<WindowsNode>() else {
            return Ok(find_descendants(root, depth).find(|node| matcher.matches(node)));
        };
        let timeout_ms = self.timeouts.lock().search.as_millis() as u64;
        let criteria = matcher.clone();
        let automation = Arc::clone(&self.automation);
        let search = self
            .automation
            .0
            .create_matcher()
            .from_ref(root_node.raw())
            .depth(depth as u32)
            .filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                Ok(criteria.matches(&WindowsNode::wrap(e.clone(), &automation)))
            }))
            .timeout(timeout_ms);
        match search.find_first() {
            Ok(element) => Ok(Some(WindowsNode::wrap(element, &self.automation))),
            Err(e) => {
                debug!("no match within depth {}: {}", depth, e);
                Ok(None)
            }
        }
    }

    fn set_clipboard(&self, text: &str) -> Result<(), BridgeError> {
        let mut clipboard = Clipboard::new()
            .map_err(|e| BridgeError::Interaction(format!("clipboard unavailable: {e}")))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| BridgeError::Interaction(format!("clipboard write failed: {e}")))
    }

    fn press_key(&self, key: Key) -> Result<(), BridgeError> {
        let focused = self
            .automation
            .0
            .get_focused_element()
            .map_err(|e| BridgeError::NotFound(format!("no focused element: {e}")))?;
        focused
            .send_keys(key_sequence(key), 10)
            .map_err(|e| BridgeError::Interaction(format!("Failed to press key: {e:?}")))
    }

    fn platform_name(&self) -> &'static str {
        "windows"
    }
}
