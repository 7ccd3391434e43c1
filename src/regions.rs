//! Multi-scale region extraction around interaction points.
//!
//! Each qualifying event gets a family of concentric crops at five fixed
//! sizes, clipped to frame bounds, plus a best-effort text fragment from a
//! small window around the point.

use crate::capture::Frame;
use crate::ocr::OcrBackend;
use crate::types::{RegionSize, RegionSnapshot};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, trace};

/// Upsampling factor applied to the text window before recognition.
const TEXT_UPSAMPLE: u32 = 2;

/// A crop taken from a frame, not yet persisted.
#[derive(Debug, Clone)]
pub struct ExtractedRegion {
    pub size: RegionSize,
    pub image: RgbaImage,
    /// Crop origin in full-frame coordinates.
    pub left: i32,
    pub top: i32,
}

/// Extract the fixed family of concentric crops centered on (x, y), clipped
/// to frame bounds. Sizes whose clipped rectangle is empty are omitted.
pub fn extract(frame: &Frame, x: i32, y: i32) -> Vec<ExtractedRegion> {
    let (fw, fh) = (frame.width() as i32, frame.height() as i32);
    let mut regions = Vec::new();

    for size in RegionSize::ALL {
        let (w, h) = size.dimensions();
        let left = (x - w as i32 / 2).max(0);
        let top = (y - h as i32 / 2).max(0);
        let right = (left + w as i32).min(fw);
        let bottom = (top + h as i32).min(fh);

        if right <= left || bottom <= top {
            trace!("Region {} clipped to empty, skipping", size.as_str());
            continue;
        }

        let crop = imageops::crop_imm(
            &frame.image,
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        )
        .to_image();

        regions.push(ExtractedRegion {
            size,
            image: crop,
            left,
            top,
        });
    }

    regions
}

/// Persist extracted regions as PNGs under `<dir>/images/` and return the
/// snapshots referencing them with paths relative to `dir`. A crop that
/// fails to save is skipped, never an error.
pub fn persist(dir: &Path, regions: &[ExtractedRegion]) -> Vec<RegionSnapshot> {
    let images_dir = dir.join("images");
    if let Err(e) = std::fs::create_dir_all(&images_dir) {
        debug!("Failed to create images directory: {}", e);
        return Vec::new();
    }

    let mut snapshots = Vec::new();
    for region in regions {
        let name = format!("{}_{}.png", region.size.as_str(), crop_hash(&region.image));
        let path = images_dir.join(&name);
        if let Err(e) = region.image.save(&path) {
            debug!("Failed to save {} region: {}", region.size.as_str(), e);
            continue;
        }
        snapshots.push(RegionSnapshot {
            size: region.size,
            path: Path::new("images").join(name),
            left: region.left,
            top: region.top,
        });
    }
    snapshots
}

/// Best-effort text extraction from a small rectangular window. The window
/// is clipped to frame bounds, grayscaled, and upsampled before recognition.
/// Absence of a recognition backend yields `None`.
pub fn extract_text(
    frame: &Frame,
    x: i32,
    y: i32,
    w: u32,
    h: u32,
    ocr: &dyn OcrBackend,
) -> Option<String> {
    let (fw, fh) = (frame.width() as i32, frame.height() as i32);
    let left = x.max(0);
    let top = y.max(0);
    let right = (left + w as i32).min(fw);
    let bottom = (top + h as i32).min(fh);
    if right <= left || bottom <= top {
        return None;
    }

    let crop = imageops::crop_imm(
        &frame.image,
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    )
    .to_image();

    let gray = imageops::grayscale(&crop);
    let upsampled = imageops::resize(
        &gray,
        gray.width() * TEXT_UPSAMPLE,
        gray.height() * TEXT_UPSAMPLE,
        FilterType::Lanczos3,
    );

    ocr.recognize_fragment(&DynamicImage::ImageLuma8(upsampled).to_rgba8())
}

fn crop_hash(image: &RgbaImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.as_raw());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    hex
}
