//! Perceptual target relocation.
//!
//! Given the region snapshots and recognized text stored with a recorded
//! event, the cascade re-locates the interaction point in a freshly captured
//! frame. Strategies are tried in a fixed order (template correlation at
//! descending confidence tiers, sparse feature correspondence, then text)
//! and the first acceptance short-circuits. Missing region files and absent
//! backends degrade to "no result"; the caller falls back to geometry
//! translation.

use crate::capture::Frame;
use crate::config::MatchingConfig;
use crate::ocr::OcrBackend;
use crate::types::{InteractionEvent, MatchResult, MatchStrategy, RegionSize, RegionSnapshot};
use image::imageops;
use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use std::path::Path;
use tracing::{debug, trace};

/// Half-width of the square neighborhood a keypoint descriptor is built from.
const PATCH_RADIUS: u32 = 8;

/// Descriptors are 8x8 block means over the 16x16 patch.
const DESCRIPTOR_GRID: u32 = 8;
const DESCRIPTOR_DIM: usize = (DESCRIPTOR_GRID * DESCRIPTOR_GRID) as usize;

/// Keypoints kept per image, strongest first.
const MAX_KEYPOINTS: usize = 1500;

pub struct MatchingCascade<'a> {
    config: &'a MatchingConfig,
    ocr: &'a dyn OcrBackend,
}

impl<'a> MatchingCascade<'a> {
    pub fn new(config: &'a MatchingConfig, ocr: &'a dyn OcrBackend) -> Self {
        Self { config, ocr }
    }

    /// Re-locate the event's interaction point in `frame`. Region images are
    /// resolved relative to `recording_dir`. Returns `None` when every
    /// strategy comes up empty; that is a degraded outcome, not an error.
    pub fn locate(
        &self,
        event: &InteractionEvent,
        recording_dir: &Path,
        frame: &Frame,
    ) -> Option<MatchResult> {
        let frame_gray = imageops::grayscale(&frame.image);

        // Stage 1: template correlation, per size, descending tiers.
        for size in RegionSize::MATCH_ORDER {
            let Some(snapshot) = event.region(size) else {
                continue;
            };
            let Some(template) = self.load_region(recording_dir, snapshot) else {
                continue;
            };
            if let Some(result) = self.match_template_tiers(&template, &frame_gray, size) {
                return Some(result);
            }
        }

        // Stage 2: sparse feature correspondence over the same sizes.
        if self.config.feature_matching_enabled {
            for size in RegionSize::MATCH_ORDER {
                let Some(snapshot) = event.region(size) else {
                    continue;
                };
                let Some(template) = self.load_region(recording_dir, snapshot) else {
                    continue;
                };
                if let Some(result) = self.match_features(&template, &frame_gray, size) {
                    return Some(result);
                }
            }
        } else {
            trace!("Feature matching disabled, skipping stage");
        }

        // Stage 3: recognized-text containment.
        if let Some(text) = event.ocr_text.as_deref() {
            if let Some(result) = self.match_text(text, frame) {
                return Some(result);
            }
        }

        debug!("Matching cascade exhausted without a hit");
        None
    }

    /// Load a stored region crop as grayscale. A missing or unreadable file
    /// is a degraded path (logged at debug), never an error.
    fn load_region(&self, recording_dir: &Path, snapshot: &RegionSnapshot) -> Option<GrayImage> {
        let mut path = recording_dir.join(&snapshot.path);
        if !path.exists() {
            // Recordings moved between machines may carry stale absolute
            // paths; retry by filename under the images directory.
            if let Some(name) = snapshot.path.file_name() {
                let fallback = recording_dir.join("images").join(name);
                if fallback.exists() {
                    path = fallback;
                } else {
                    debug!(
                        "Region file missing for {} ({:?}), skipping size",
                        snapshot.size.as_str(),
                        snapshot.path
                    );
                    return None;
                }
            } else {
                return None;
            }
        }

        match image::open(&path) {
            Ok(img) => Some(img.to_luma8()),
            Err(e) => {
                debug!("Failed to load region {:?}: {}", path, e);
                None
            }
        }
    }

    fn match_template_tiers(
        &self,
        template: &GrayImage,
        frame: &GrayImage,
        size: RegionSize,
    ) -> Option<MatchResult> {
        if template.width() == 0
            || template.height() == 0
            || template.width() > frame.width()
            || template.height() > frame.height()
        {
            trace!("Template {} does not fit frame, skipping", size.as_str());
            return None;
        }

        let scores = match_template(frame, template, MatchTemplateMethod::CrossCorrelationNormalized);
        let extremes = find_extremes(&scores);
        let peak = extremes.max_value as f64;
        let (px, py) = extremes.max_value_location;

        for tier in self.config.confidence_tiers() {
            if peak >= tier {
                let x = px as i32 + template.width() as i32 / 2;
                let y = py as i32 + template.height() as i32 / 2;
                debug!(
                    "Template match: size={} peak={:.3} tier={:.2} at ({}, {})",
                    size.as_str(),
                    peak,
                    tier,
                    x,
                    y
                );
                return Some(MatchResult {
                    x,
                    y,
                    confidence: peak,
                    strategy: MatchStrategy::Template,
                });
            }
        }

        trace!(
            "Template miss: size={} peak={:.3} below all tiers",
            size.as_str(),
            peak
        );
        None
    }

    fn match_features(
        &self,
        template: &GrayImage,
        frame: &GrayImage,
        size: RegionSize,
    ) -> Option<MatchResult> {
        let template_kps = keypoint_descriptors(template, self.config.corner_threshold);
        let frame_kps = keypoint_descriptors(frame, self.config.corner_threshold);
        if template_kps.len() < 4 || frame_kps.len() < 4 {
            trace!(
                "Too few keypoints for {} ({} template, {} frame)",
                size.as_str(),
                template_kps.len(),
                frame_kps.len()
            );
            return None;
        }

        let ratio = self.config.feature_match_ratio as f32;
        let mut matched: Vec<(u32, u32)> = Vec::new();

        for (_, _, descriptor) in &template_kps {
            let mut best = f32::MAX;
            let mut second = f32::MAX;
            let mut best_pos = (0u32, 0u32);
            for (fx, fy, frame_descriptor) in &frame_kps {
                let dist = descriptor_distance(descriptor, frame_descriptor);
                if dist < best {
                    second = best;
                    best = dist;
                    best_pos = (*fx, *fy);
                } else if dist < second {
                    second = dist;
                }
            }
            // Ratio test rejects ambiguous correspondences.
            if best < ratio * second {
                matched.push(best_pos);
            }
        }

        if matched.len() < self.config.feature_min_matches {
            trace!(
                "Feature miss: size={} only {} good matches",
                size.as_str(),
                matched.len()
            );
            return None;
        }

        let cx = matched.iter().map(|p| p.0 as i64).sum::<i64>() / matched.len() as i64;
        let cy = matched.iter().map(|p| p.1 as i64).sum::<i64>() / matched.len() as i64;
        let confidence = (matched.len() as f64 / template_kps.len() as f64).min(1.0);

        debug!(
            "Feature match: size={} {}/{} correspondences at ({}, {})",
            size.as_str(),
            matched.len(),
            template_kps.len(),
            cx,
            cy
        );

        Some(MatchResult {
            x: cx as i32,
            y: cy as i32,
            confidence,
            strategy: MatchStrategy::Feature,
        })
    }

    fn match_text(&self, target: &str, frame: &Frame) -> Option<MatchResult> {
        if target.is_empty() {
            return None;
        }
        let Some(words) = self.ocr.recognize_words(&frame.image) else {
            trace!("No text recognition backend, skipping text stage");
            return None;
        };

        for word in &words {
            if word.text.contains(target) {
                let (x, y) = word.center();
                let confidence = if word.text == target { 0.7 } else { 0.6 };
                debug!(
                    "Text match: '{}' in '{}' at ({}, {})",
                    target, word.text, x, y
                );
                return Some(MatchResult {
                    x,
                    y,
                    confidence,
                    strategy: MatchStrategy::Text,
                });
            }
        }

        trace!("Text miss: '{}' not on screen", target);
        None
    }
}

/// FAST-9 keypoints with normalized intensity-patch descriptors. Corners too
/// close to the image border for a full patch are dropped.
fn keypoint_descriptors(image: &GrayImage, threshold: u8) -> Vec<(u32, u32, Vec<f32>)> {
    let mut corners = corners_fast9(image, threshold);
    corners.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    corners.truncate(MAX_KEYPOINTS);

    let (w, h) = (image.width(), image.height());
    let mut keypoints = Vec::new();

    for corner in corners {
        if corner.x < PATCH_RADIUS
            || corner.y < PATCH_RADIUS
            || corner.x + PATCH_RADIUS >= w
            || corner.y + PATCH_RADIUS >= h
        {
            continue;
        }
        if let Some(descriptor) = patch_descriptor(image, corner.x, corner.y) {
            keypoints.push((corner.x, corner.y, descriptor));
        }
    }

    keypoints
}

/// 8x8 block means over the 16x16 patch around (cx, cy), zero-meaned and
/// scaled to unit length for lighting invariance.
fn patch_descriptor(image: &GrayImage, cx: u32, cy: u32) -> Option<Vec<f32>> {
    let cell = (PATCH_RADIUS * 2) / DESCRIPTOR_GRID;
    let x0 = cx - PATCH_RADIUS;
    let y0 = cy - PATCH_RADIUS;

    let mut descriptor = vec![0.0f32; DESCRIPTOR_DIM];
    for gy in 0..DESCRIPTOR_GRID {
        for gx in 0..DESCRIPTOR_GRID {
            let mut sum = 0u32;
            for dy in 0..cell {
                for dx in 0..cell {
                    let px = x0 + gx * cell + dx;
                    let py = y0 + gy * cell + dy;
                    sum += image.get_pixel(px, py).0[0] as u32;
                }
            }
            descriptor[(gy * DESCRIPTOR_GRID + gx) as usize] = sum as f32 / (cell * cell) as f32;
        }
    }

    let mean = descriptor.iter().sum::<f32>() / DESCRIPTOR_DIM as f32;
    for v in &mut descriptor {
        *v -= mean;
    }
    let norm = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        // Flat patch carries no signal.
        return None;
    }
    for v in &mut descriptor {
        *v /= norm;
    }
    Some(descriptor)
}

fn descriptor_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{NullOcr, RecognizedWord};
    use crate::regions;
    use crate::types::{ActionKind, PointerButton};
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    /// Deterministic high-texture image so correlation peaks are sharp and
    /// corners are plentiful.
    fn noise_frame(width: u32, height: u32) -> Frame {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(2654435761) ^ y.wrapping_mul(40503)).wrapping_add(x * y);
            let v = ((v >> 8) & 0xff) as u8;
            Rgba([v, v.wrapping_mul(3), v.wrapping_add(64), 255])
        });
        Frame::new(image)
    }

    fn click_event(x: i32, y: i32) -> InteractionEvent {
        InteractionEvent::new(
            0.0,
            ActionKind::PointerClick {
                button: PointerButton::Left,
                pressed: true,
            },
            x,
            y,
        )
    }

    struct FakeOcr {
        words: Vec<RecognizedWord>,
    }

    impl OcrBackend for FakeOcr {
        fn recognize_lines(&self, _image: &RgbaImage) -> Option<Vec<String>> {
            None
        }

        fn recognize_words(&self, _image: &RgbaImage) -> Option<Vec<RecognizedWord>> {
            Some(self.words.clone())
        }

        fn recognize_fragment(&self, _image: &RgbaImage) -> Option<String> {
            None
        }

        fn is_available(&self) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    #[test]
    fn test_template_relocates_point_on_unmodified_frame() {
        let dir = tempfile::tempdir().unwrap();
        let frame = noise_frame(640, 480);

        let mut event = click_event(100, 100);
        let extracted = regions::extract(&frame, 100, 100);
        event.regions = regions::persist(dir.path(), &extracted);
        assert!(!event.regions.is_empty());

        let config = MatchingConfig::default();
        let cascade = MatchingCascade::new(&config, &NullOcr);
        let result = cascade.locate(&event, dir.path(), &frame).unwrap();

        assert_eq!(result.strategy, MatchStrategy::Template);
        assert!(result.confidence >= config.confidence_high);
        assert!((result.x - 100).abs() <= 2, "x={}", result.x);
        assert!((result.y - 100).abs() <= 2, "y={}", result.y);
    }

    #[test]
    fn test_missing_region_files_fall_through_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let frame = noise_frame(320, 240);

        let mut event = click_event(50, 50);
        event.regions = vec![crate::types::RegionSnapshot {
            size: RegionSize::Small,
            path: PathBuf::from("images/small_deadbeef.png"),
            left: 0,
            top: 0,
        }];
        event.ocr_text = Some("OK".to_string());

        let ocr = FakeOcr {
            words: vec![RecognizedWord {
                text: "OK".to_string(),
                left: 200,
                top: 100,
                width: 20,
                height: 10,
            }],
        };
        let config = MatchingConfig::default();
        let cascade = MatchingCascade::new(&config, &ocr);

        let result = cascade.locate(&event, dir.path(), &frame).unwrap();
        assert_eq!(result.strategy, MatchStrategy::Text);
        assert_eq!((result.x, result.y), (210, 105));
        assert_eq!(result.confidence, 0.7);
    }

    #[test]
    fn test_containment_scores_below_exact() {
        let dir = tempfile::tempdir().unwrap();
        let frame = noise_frame(64, 64);

        let mut event = click_event(10, 10);
        event.ocr_text = Some("Save".to_string());

        let ocr = FakeOcr {
            words: vec![RecognizedWord {
                text: "Save...".to_string(),
                left: 10,
                top: 10,
                width: 40,
                height: 12,
            }],
        };
        let config = MatchingConfig::default();
        let cascade = MatchingCascade::new(&config, &ocr);
        let result = cascade.locate(&event, dir.path(), &frame).unwrap();
        assert_eq!(result.confidence, 0.6);
    }

    #[test]
    fn test_no_regions_no_text_yields_absent() {
        let dir = tempfile::tempdir().unwrap();
        let frame = noise_frame(64, 64);
        let event = click_event(10, 10);

        let config = MatchingConfig::default();
        let cascade = MatchingCascade::new(&config, &NullOcr);
        assert!(cascade.locate(&event, dir.path(), &frame).is_none());
    }

    #[test]
    fn test_feature_match_finds_embedded_region() {
        let frame = noise_frame(300, 300);
        let frame_gray = imageops::grayscale(&frame.image);
        let template = imageops::crop_imm(&frame_gray, 80, 80, 120, 120).to_image();

        let config = MatchingConfig::default();
        let cascade = MatchingCascade::new(&config, &NullOcr);
        let result = cascade
            .match_features(&template, &frame_gray, RegionSize::Small)
            .unwrap();

        assert_eq!(result.strategy, MatchStrategy::Feature);
        assert!(result.confidence > 0.0);
        // Centroid of correspondences lands inside the embedded region.
        assert!((80..200).contains(&result.x), "x={}", result.x);
        assert!((80..200).contains(&result.y), "y={}", result.y);
    }

    #[test]
    fn test_template_larger_than_frame_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let big = noise_frame(640, 480);

        let mut event = click_event(320, 240);
        let extracted = regions::extract(&big, 320, 240);
        event.regions = regions::persist(dir.path(), &extracted);

        // Current frame is smaller than every stored template.
        let tiny = noise_frame(40, 30);
        let config = MatchingConfig {
            feature_matching_enabled: false,
            ..MatchingConfig::default()
        };
        let cascade = MatchingCascade::new(&config, &NullOcr);
        assert!(cascade.locate(&event, dir.path(), &tiny).is_none());
    }
}
