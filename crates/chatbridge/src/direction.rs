//! Who wrote a message, guessed from where the avatar sits
//!
//! The client draws the sender's avatar at the left edge of a row and the
//! local user's at the right. An avatar is visually busy while the empty side
//! is flat background, so comparing colour spread in two edge bands is enough
//! for a best-effort answer.

use crate::{BridgeError, Rect};
use image::RgbaImage;
use std::sync::Arc;
use tracing::trace;

/// Pixel grabs of a screen region.
pub trait ScreenCapture: Send + Sync {
    fn capture(&self, region: Rect) -> Result<RgbaImage, BridgeError>;
}

pub trait DirectionClassifier: Send + Sync {
    /// True when the row at `bounds` was authored by the local user.
    fn is_self(&self, bounds: Rect) -> bool;
}

/// Always answers the same way. Used where no screen is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDirection {
    pub is_self: bool,
}

impl DirectionClassifier for FixedDirection {
    fn is_self(&self, _bounds: Rect) -> bool {
        self.is_self
    }
}

/// Compares colour variance of the left and right avatar bands.
pub struct VarianceClassifier {
    capture: Arc<dyn ScreenCapture>,
    band_width: u32,
    flat_threshold: f64,
    vertical_padding: i32,
}

impl VarianceClassifier {
    pub const BAND_WIDTH: u32 = 70;
    pub const FLAT_THRESHOLD: f64 = 2.0;
    pub const VERTICAL_PADDING: i32 = 5;

    pub fn new(capture: Arc<dyn ScreenCapture>) -> Self {
        Self {
            capture,
            band_width: Self::BAND_WIDTH,
            flat_threshold: Self::FLAT_THRESHOLD,
            vertical_padding: Self::VERTICAL_PADDING,
        }
    }

    pub fn with_band_width(mut self, band_width: u32) -> Self {
        self.band_width = band_width.max(1);
        self
    }

    pub fn with_flat_threshold(mut self, threshold: f64) -> Self {
        self.flat_threshold = threshold;
        self
    }

    fn classify(&self, image: &RgbaImage) -> bool {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return false;
        }
        let band = self.band_width.min(width);
        let left = band_score(image, 0, band);
        let right = band_score(image, width - band, width);
        trace!("avatar band scores: left={:.2} right={:.2}", left, right);

        // Two flat edges is a system notice or a timestamp row.
        if left < self.flat_threshold && right < self.flat_threshold {
            return false;
        }
        right > left
    }
}

impl DirectionClassifier for VarianceClassifier {
    fn is_self(&self, bounds: Rect) -> bool {
        match self.capture.capture(bounds.pad_vertical(self.vertical_padding)) {
            Ok(image) => self.classify(&image),
            Err(e) => {
                trace!("capture of {} failed, assuming other: {}", bounds, e);
                false
            }
        }
    }
}

/// Mean over R, G and B of each channel's population standard deviation in
/// columns `x0..x1`.
fn band_score(image: &RgbaImage, x0: u32, x1: u32) -> f64 {
    let mut sum = [0f64; 3];
    let mut sum_sq = [0f64; 3];
    let mut count = 0f64;
    for y in 0..image.height() {
        for x in x0..x1 {
            let pixel = image.get_pixel(x, y);
            for c in 0..3 {
                let v = pixel[c] as f64;
                sum[c] += v;
                sum_sq[c] += v * v;
            }
            count += 1.0;
        }
    }
    if count == 0.0 {
        return 0.0;
    }
    let stddev: f64 = (0..3)
        .map(|c| {
            let mean = sum[c] / count;
            (sum_sq[c] / count - mean * mean).max(0.0).sqrt()
        })
        .sum();
    stddev / 3.0
}
