//! COM and process-level setup

use crate::{BridgeError, ControlKind};
use tracing::debug;
use uiautomation::controls::ControlType;
use windows::core::HRESULT;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};
use windows::Win32::UI::HiDpi::{SetProcessDpiAwareness, PROCESS_PER_MONITOR_DPI_AWARE};

/// RPC_E_CHANGED_MODE: the thread already joined an apartment.
const RPC_E_CHANGED_MODE: HRESULT = HRESULT(0x80010106u32 as i32);

/// Join the multithreaded COM apartment on the calling thread.
pub fn init_com() -> Result<(), BridgeError> {
    unsafe {
        let hr = CoInitializeEx(None, COINIT_MULTITHREADED);
        if hr.is_err() && hr != RPC_E_CHANGED_MODE {
            return Err(BridgeError::PlatformError(format!(
                "Failed to initialize COM in multithreaded mode: {hr}"
            )));
        }
        if hr == RPC_E_CHANGED_MODE {
            debug!("COM already initialized in this thread");
        }
    }
    Ok(())
}

/// Ask for per-monitor DPI awareness so UIA rectangles and screen captures
/// share one physical pixel space. Fails harmlessly when already set.
pub(crate) fn enable_dpi_awareness() {
    if let Err(e) = unsafe { SetProcessDpiAwareness(PROCESS_PER_MONITOR_DPI_AWARE) } {
        debug!("DPI awareness not changed: {}", e);
    }
}

pub(crate) fn map_control_type(control_type: ControlType) -> ControlKind {
    match control_type {
        ControlType::Window => ControlKind::Window,
        ControlType::Pane => ControlKind::Pane,
        ControlType::List => ControlKind::List,
        ControlType::ListItem => ControlKind::ListItem,
        ControlType::Text => ControlKind::Text,
        ControlType::Button => ControlKind::Button,
        ControlType::Edit => ControlKind::Edit,
        ControlType::Group => ControlKind::Group,
        ControlType::Custom => ControlKind::Custom,
        ControlType::Document => ControlKind::Document,
        ControlType::Image => ControlKind::Image,
        _ => ControlKind::Other,
    }
}

/// Keystroke syntax understood by `UIElement::send_keys`.
pub(crate) fn key_sequence(key: crate::Key) -> &'static str {
    match key {
        crate::Key::SelectAll => "{Ctrl}a",
        crate::Key::Delete => "{Delete}",
        crate::Key::Paste => "{Ctrl}v",
        crate::Key::Enter => "{Enter}",
    }
}
