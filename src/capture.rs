//! Full-frame screen capture.
//!
//! This module provides the frame sources the engine samples from. Capture
//! is best-effort: a primary backend is tried first, then a secondary one,
//! and callers treat a missing frame as a soft failure, never an error.

use crate::types::WindowRect;
use image::RgbaImage;
use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

/// An in-memory raster snapshot of the display.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
}

impl Frame {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Screen bounds implied by this frame.
    pub fn bounds(&self) -> WindowRect {
        WindowRect::new(0, 0, self.width(), self.height())
    }

    /// Content-hash fingerprint: truncated SHA-256 over the raw pixels.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.image.as_raw());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        hex[..16].to_string()
    }
}

/// A capture backend. Implementations return `None` when capture is not
/// possible (missing permission, headless host, no display).
pub trait FrameSource: Send + Sync {
    fn grab(&self) -> Option<Frame>;

    fn name(&self) -> &'static str;

    /// Whether the backend can plausibly produce frames at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Primary backend: the `xcap` monitor API.
pub struct XcapSource;

impl FrameSource for XcapSource {
    fn grab(&self) -> Option<Frame> {
        let monitors = match xcap::Monitor::all() {
            Ok(m) => m,
            Err(e) => {
                debug!("xcap monitor enumeration failed: {}", e);
                return None;
            }
        };
        let monitor = monitors.iter().find(|m| m.is_primary()).or(monitors.first())?;

        match monitor.capture_image() {
            Ok(image) => {
                trace!("Captured {}x{} frame via xcap", image.width(), image.height());
                Some(Frame::new(image))
            }
            Err(e) => {
                debug!("xcap capture failed: {}", e);
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "xcap"
    }

    fn is_available(&self) -> bool {
        xcap::Monitor::all().map(|m| !m.is_empty()).unwrap_or(false)
    }
}

/// Secondary backend: the `screenshots` crate.
pub struct ScreenshotsSource;

impl FrameSource for ScreenshotsSource {
    fn grab(&self) -> Option<Frame> {
        let screens = match screenshots::Screen::all() {
            Ok(s) => s,
            Err(e) => {
                debug!("screen enumeration failed: {}", e);
                return None;
            }
        };
        let screen = screens.first()?;

        match screen.capture() {
            Ok(image) => {
                trace!(
                    "Captured {}x{} frame via screenshots",
                    image.width(),
                    image.height()
                );
                // The `screenshots` crate links image 0.24; rebuild the
                // buffer as this crate's image 0.25 `RgbaImage`.
                let (width, height) = (image.width(), image.height());
                RgbaImage::from_raw(width, height, image.into_raw()).map(Frame::new)
            }
            Err(e) => {
                debug!("screenshots capture failed: {}", e);
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "screenshots"
    }

    fn is_available(&self) -> bool {
        screenshots::Screen::all().map(|s| !s.is_empty()).unwrap_or(false)
    }
}

/// Null-object backend: capture is never possible.
pub struct NullSource;

impl FrameSource for NullSource {
    fn grab(&self) -> Option<Frame> {
        None
    }

    fn name(&self) -> &'static str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Capture service that falls back from a primary to a secondary backend.
pub struct CaptureService {
    primary: Box<dyn FrameSource>,
    secondary: Box<dyn FrameSource>,
}

impl CaptureService {
    /// Platform backends: xcap first, screenshots as fallback.
    pub fn platform() -> Self {
        Self {
            primary: Box::new(XcapSource),
            secondary: Box::new(ScreenshotsSource),
        }
    }

    /// Service with explicit backends; tests inject synthetic sources here.
    pub fn with_sources(primary: Box<dyn FrameSource>, secondary: Box<dyn FrameSource>) -> Self {
        Self { primary, secondary }
    }

    /// Service that never produces a frame.
    pub fn unavailable() -> Self {
        Self {
            primary: Box::new(NullSource),
            secondary: Box::new(NullSource),
        }
    }

    /// Capture a frame from the first backend that succeeds. `None` means
    /// no backend could capture; callers skip the dependent step.
    pub fn capture(&self) -> Option<Frame> {
        if let Some(frame) = self.primary.grab() {
            return Some(frame);
        }
        debug!(
            "Primary capture backend '{}' produced no frame, trying '{}'",
            self.primary.name(),
            self.secondary.name()
        );
        if let Some(frame) = self.secondary.grab() {
            return Some(frame);
        }
        warn!("No capture backend produced a frame");
        None
    }

    /// Whether any backend is available at all.
    pub fn is_available(&self) -> bool {
        self.primary.is_available() || self.secondary.is_available()
    }
}
