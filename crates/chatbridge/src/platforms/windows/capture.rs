use crate::direction::ScreenCapture;
use crate::{BridgeError, Rect};
use image::RgbaImage;

/// Region grabs through `xcap`, from whichever monitor holds the region's
/// top-left corner.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapCapture;

impl ScreenCapture for XcapCapture {
    fn capture(&self, region: Rect) -> Result<RgbaImage, BridgeError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| BridgeError::PlatformError(format!("Failed to get monitors: {e}")))?;

        for monitor in monitors {
            let x = monitor.x().map_err(|e| {
                BridgeError::PlatformError(format!("Failed to get monitor x: {e}"))
            })?;
            let y = monitor.y().map_err(|e| {
                BridgeError::PlatformError(format!("Failed to get monitor y: {e}"))
            })?;
            let width = monitor.width().map_err(|e| {
                BridgeError::PlatformError(format!("Failed to get monitor width: {e}"))
            })?;
            let height = monitor.height().map_err(|e| {
                BridgeError::PlatformError(format!("Failed to get monitor height: {e}"))
            })?;

            let inside_x = region.left >= x && region.left < x + width as i32;
            let inside_y = region.top >= y && region.top < y + height as i32;
            if !(inside_x && inside_y) {
                continue;
            }

            let rel_x = (region.left - x) as u32;
            let rel_y = (region.top.max(y) - y) as u32;
            let rel_width = (region.width() as u32).min(width - rel_x);
            let rel_height = (region.height() as u32).min(height - rel_y);
            return monitor
                .capture_region(rel_x, rel_y, rel_width, rel_height)
                .map_err(|e| BridgeError::PlatformError(format!("Failed to capture region: {e}")));
        }

        Err(BridgeError::NotFound(format!(
            "region {} is not on any monitor",
            region
        )))
    }
}
