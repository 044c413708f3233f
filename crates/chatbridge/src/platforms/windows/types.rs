//! Send/Sync wrappers around the UIA COM objects

use crate::BridgeError;
use std::sync::Arc;

/// Thread-safe wrapper for the UIAutomation COM object
pub struct ThreadSafeWinUIAutomation(pub(crate) uiautomation::UIAutomation);

// Safety: the automation object is free-threaded once the calling thread has
// joined the multithreaded apartment, which `init_com` guarantees.
unsafe impl Send for ThreadSafeWinUIAutomation {}
unsafe impl Sync for ThreadSafeWinUIAutomation {}

/// Thread-safe wrapper for UIElement
#[derive(Clone)]
pub(crate) struct ThreadSafeWinUIElement(pub(crate) Arc<uiautomation::UIElement>);

// Safety: see above; elements come from the same MTA automation object.
unsafe impl Send for ThreadSafeWinUIElement {}
unsafe impl Sync for ThreadSafeWinUIElement {}

impl From<uiautomation::Error> for BridgeError {
    fn from(error: uiautomation::Error) -> Self {
        BridgeError::PlatformError(format!("UIAutomation error: {error}"))
    }
}
