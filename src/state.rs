//! UI state sampling and change detection.
//!
//! A state fingerprint is a content hash of the full frame plus optional
//! recognized text lines. Fingerprints taken before and after an action are
//! compared to decide whether the action visibly had an effect.

use crate::capture::CaptureService;
use crate::ocr::OcrBackend;
use crate::types::UiStateFingerprint;
use tracing::trace;

/// Samples comparable UI state fingerprints.
pub struct StateSampler<'a> {
    capture: &'a CaptureService,
    ocr: &'a dyn OcrBackend,
}

impl<'a> StateSampler<'a> {
    pub fn new(capture: &'a CaptureService, ocr: &'a dyn OcrBackend) -> Self {
        Self { capture, ocr }
    }

    /// Capture the current UI state. When no frame can be captured the
    /// fingerprint carries an absent hash; callers treat it as unobservable
    /// rather than failed.
    pub fn sample(&self) -> UiStateFingerprint {
        let timestamp = unix_now();

        let Some(frame) = self.capture.capture() else {
            trace!("State sample without frame (capture unavailable)");
            return UiStateFingerprint {
                timestamp,
                hash: None,
                visible_text: None,
            };
        };

        let hash = Some(frame.fingerprint());
        let visible_text = if self.ocr.is_available() {
            self.ocr.recognize_lines(&frame.image)
        } else {
            None
        };

        UiStateFingerprint {
            timestamp,
            hash,
            visible_text,
        }
    }
}

/// True iff both hashes were observed and differ. An unobservable side
/// (absent hash) can never assert a change.
pub fn changed(before: &UiStateFingerprint, after: &UiStateFingerprint) -> bool {
    match (&before.hash, &after.hash) {
        (Some(b), Some(a)) => b != a,
        _ => false,
    }
}

pub(crate) fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
