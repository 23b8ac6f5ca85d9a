//! Window capture functionality.
//!
//! Provides the `ScreenCapture` seam the OCR fallback reads from, plus the
//! macOS implementation that snapshots a single window's pixels.

use crate::types::{WindowBounds, WindowId, WindowInfo};
use image::{DynamicImage, RgbaImage};
use tracing::{debug, trace};

/// Capability to capture a window's pixels.
///
/// Returns `None` when the window cannot be captured (gone, on another
/// Space, or the platform has no capture support).
pub trait ScreenCapture: Send + Sync {
    fn capture_window(&self, window: &WindowInfo) -> Option<DynamicImage>;
}

/// Captures real window pixels through the OS.
pub struct SystemCapture {
    /// Margin trimmed from each window edge, tolerates chrome variance
    margin: u32,
}

impl SystemCapture {
    pub fn new(margin: u32) -> Self {
        Self { margin }
    }
}

impl ScreenCapture for SystemCapture {
    fn capture_window(&self, window: &WindowInfo) -> Option<DynamicImage> {
        let bounds = window.bounds.padded(self.margin);
        trace!("Capturing window {} at {:?}", window.id, bounds);

        let start = std::time::Instant::now();
        let result = platform::capture_window(window.id, &bounds);

        if result.is_some() {
            trace!("Window {} captured in {:?}", window.id, start.elapsed());
        } else {
            debug!("Window {} not capturable (likely on different Space)", window.id);
        }

        result.map(DynamicImage::ImageRgba8)
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use super::*;
    use core_graphics::geometry::{CGPoint, CGRect, CGSize};
    use core_graphics::image::CGImage;
    use core_graphics::window::{
        kCGWindowImageBestResolution, kCGWindowImageBoundsIgnoreFraming,
        kCGWindowListOptionIncludingWindow, CGWindowListCreateImage,
    };
    use foreign_types_shared::ForeignType;

    /// Capture a specific window by ID
    pub fn capture_window(window_id: WindowId, bounds: &WindowBounds) -> Option<RgbaImage> {
        let rect = CGRect::new(
            &CGPoint::new(bounds.x as f64, bounds.y as f64),
            &CGSize::new(bounds.width as f64, bounds.height as f64),
        );

        let options = kCGWindowImageBoundsIgnoreFraming | kCGWindowImageBestResolution;

        let cg_image: CGImage = unsafe {
            let image_ref = CGWindowListCreateImage(
                rect,
                kCGWindowListOptionIncludingWindow,
                window_id as u32,
                options,
            );
            if image_ref.is_null() {
                return None;
            }
            CGImage::from_ptr(image_ref)
        };

        convert_cgimage_to_rgba(&cg_image)
    }

    /// Convert CGImage to image crate's RgbaImage
    fn convert_cgimage_to_rgba(cg_image: &CGImage) -> Option<RgbaImage> {
        let width = cg_image.width();
        let height = cg_image.height();
        let bytes_per_row = cg_image.bytes_per_row();
        let bits_per_pixel = cg_image.bits_per_pixel();

        // Get raw pixel data
        let data = cg_image.data();
        let bytes = data.bytes();

        if bytes.is_empty() {
            return None;
        }

        // CGImage pixel data is BGRA on macOS
        let mut rgba_data = Vec::with_capacity((width * height * 4) as usize);

        for y in 0..height {
            let row_start = y * bytes_per_row;
            for x in 0..width {
                let pixel_start = row_start + x * (bits_per_pixel / 8);
                if pixel_start + 3 < bytes.len() {
                    let b = bytes[pixel_start];
                    let g = bytes[pixel_start + 1];
                    let r = bytes[pixel_start + 2];
                    let a = bytes[pixel_start + 3];
                    rgba_data.extend_from_slice(&[r, g, b, a]);
                }
            }
        }

        RgbaImage::from_raw(width as u32, height as u32, rgba_data)
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use super::*;

    pub fn capture_window(_window_id: WindowId, _bounds: &WindowBounds) -> Option<RgbaImage> {
        None
    }
}
