use crate::direction::ScreenCapture;
use crate::locator::{find_descendants, Matcher};
use crate::{BridgeError, Key, UiNode};
use std::sync::Arc;
use std::time::Duration;

pub mod memory;
#[cfg(target_os = "windows")]
pub mod windows;

/// Search and transaction budgets applied to every tree lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub search: Duration,
    pub transaction: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            search: Duration::from_millis(500),
            transaction: Duration::from_millis(500),
        }
    }
}

/// The common trait that all platform-specific backends must implement
pub trait AutomationBackend: Send + Sync {
    /// Install the global search/transaction budgets. Called once at startup.
    fn configure_timeouts(&self, timeouts: Timeouts);

    fn timeouts(&self) -> Timeouts;

    /// The desktop root whose children are the top-level windows.
    fn desktop_root(&self) -> Result<UiNode, BridgeError>;

    /// Native top-level window lookup by class and title, bypassing any tree
    /// walk. `Ok(None)` when no such window exists.
    fn find_native_window(
        &self,
        class_name: &str,
        title: &str,
    ) -> Result<Option<UiNode>, BridgeError>;

    /// Whether the process owning `window` has stopped pumping messages.
    fn is_hung(&self, window: &UiNode) -> bool;

    /// Process ids of running processes whose executable matches one of
    /// `executables` (case-insensitive).
    fn process_ids(&self, executables: &[String]) -> Vec<u32>;

    /// First descendant of `root` within `depth` levels satisfying `matcher`.
    fn find_first(
        &self,
        root: &UiNode,
        matcher: &Matcher,
        depth: usize,
    ) -> Result<Option<UiNode>, BridgeError> {
        Ok(find_descendants(root, depth).find(|node| matcher.matches(node)))
    }

    fn set_clipboard(&self, text: &str) -> Result<(), BridgeError>;

    /// Key injection into whatever has keyboard focus.
    fn press_key(&self, key: Key) -> Result<(), BridgeError>;

    fn platform_name(&self) -> &'static str;
}

/// Per-thread platform setup (COM apartment on Windows). Every thread that
/// touches the tree must call this first.
pub fn init_thread() -> Result<(), BridgeError> {
    #[cfg(target_os = "windows")]
    {
        windows::init_com()
    }
    #[cfg(not(target_os = "windows"))]
    {
        Ok(())
    }
}

pub fn create_backend() -> Result<Arc<dyn AutomationBackend>, BridgeError> {
    #[cfg(target_os = "windows")]
    {
        let backend = windows::WindowsBackend::new()?;
        Ok(Arc::new(backend))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(BridgeError::UnsupportedPlatform(format!(
            "no accessibility backend for {}",
            std::env::consts::OS
        )))
    }
}

/// Screen capture for the direction heuristic, when the platform has one.
pub fn create_screen_capture() -> Option<Arc<dyn ScreenCapture>> {
    #[cfg(target_os = "windows")]
    {
        Some(Arc::new(windows::XcapCapture))
    }
    #[cfg(not(target_os = "windows"))]
    {
        None
    }
}
