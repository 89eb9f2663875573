//! Native pixel capture and clipboard access

use arboard::Clipboard;
use image::imageops;
use tracing::debug;

use super::{ClipboardPort, PixelSampler};
use crate::errors::AutomationError;
use crate::types::{PixelGrid, Rect, Rgb};

/// Samples pixels from a full capture of the monitor containing the
/// rectangle's top-left corner. The rectangle must lie on a single monitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapSampler;

impl XcapSampler {
    pub fn new() -> Self {
        Self
    }

    fn capture(rect: Rect) -> Result<PixelGrid, AutomationError> {
        if rect.is_empty() {
            return Err(AutomationError::InvalidArgument(format!(
                "cannot sample empty rectangle {rect}"
            )));
        }

        let monitor = xcap::Monitor::from_point(rect.x, rect.y).map_err(|e| {
            AutomationError::PlatformError(format!("No monitor at ({}, {}): {}", rect.x, rect.y, e))
        })?;
        let origin_x = monitor
            .x()
            .map_err(|e| AutomationError::PlatformError(format!("Failed to get monitor x: {e}")))?;
        let origin_y = monitor
            .y()
            .map_err(|e| AutomationError::PlatformError(format!("Failed to get monitor y: {e}")))?;

        let image = monitor.capture_image().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to capture monitor: {e}"))
        })?;

        let left = (rect.x - origin_x).max(0) as u32;
        let top = (rect.y - origin_y).max(0) as u32;
        if left + rect.width as u32 > image.width() || top + rect.height as u32 > image.height() {
            return Err(AutomationError::InvalidArgument(format!(
                "{rect} extends past the monitor ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let cropped = imageops::crop_imm(&image, left, top, rect.width as u32, rect.height as u32)
            .to_image();
        debug!("Sampled {} from monitor capture", rect);

        let pixels = cropped
            .pixels()
            .map(|p| Rgb::new(p.0[0], p.0[1], p.0[2]))
            .collect();
        PixelGrid::new(cropped.width(), cropped.height(), pixels)
    }
}

#[async_trait::async_trait]
impl PixelSampler for XcapSampler {
    async fn sample_colors(&self, rect: Rect) -> Result<PixelGrid, AutomationError> {
        tokio::task::spawn_blocking(move || Self::capture(rect))
            .await
            .map_err(|e| AutomationError::Internal(format!("capture task failed: {e}")))?
    }
}

/// System clipboard through `arboard`
#[derive(Debug, Default, Clone, Copy)]
pub struct ArboardClipboard;

impl ArboardClipboard {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ClipboardPort for ArboardClipboard {
    async fn set_content(&self, text: &str) -> Result<(), AutomationError> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            let mut clipboard = Clipboard::new()
                .map_err(|e| AutomationError::Clipboard(format!("Failed to access clipboard: {e}")))?;
            clipboard
                .set_text(text)
                .map_err(|e| AutomationError::Clipboard(format!("Failed to copy to clipboard: {e}")))
        })
        .await
        .map_err(|e| AutomationError::Internal(format!("clipboard task failed: {e}")))?
    }
}
