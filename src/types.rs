//! Core types used throughout the recorder/replayer.
//!
//! This module defines the recorded event model, state fingerprints,
//! match results, and the structural error taxonomy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pointer button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

impl PointerButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointerButton::Left => "left",
            PointerButton::Right => "right",
            PointerButton::Middle => "middle",
        }
    }
}

/// What the user did. One variant per action kind with a fixed, typed
/// payload; unknown kinds are rejected at deserialization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    PointerMove,
    PointerClick { button: PointerButton, pressed: bool },
    Scroll { dx: i32, dy: i32 },
    KeyDown { key: String },
    KeyUp { key: String },
}

impl ActionKind {
    /// Pointer-family actions carry a meaningful (x, y); key events do not.
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            ActionKind::PointerMove | ActionKind::PointerClick { .. } | ActionKind::Scroll { .. }
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::PointerMove => "pointer_move",
            ActionKind::PointerClick { .. } => "pointer_click",
            ActionKind::Scroll { .. } => "scroll",
            ActionKind::KeyDown { .. } => "key_down",
            ActionKind::KeyUp { .. } => "key_up",
        }
    }
}

/// The five fixed region sizes captured around an interaction point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSize {
    Micro,
    Small,
    Medium,
    Large,
    Context,
}

impl RegionSize {
    /// All sizes, in nesting order (tightest first).
    pub const ALL: [RegionSize; 5] = [
        RegionSize::Micro,
        RegionSize::Small,
        RegionSize::Medium,
        RegionSize::Large,
        RegionSize::Context,
    ];

    /// The order the matching cascade tries sizes in. Micro comes after
    /// the mid sizes: the tightest crop is too ambiguous to lead with.
    /// Preserved as a behavioral contract.
    pub const MATCH_ORDER: [RegionSize; 5] = [
        RegionSize::Small,
        RegionSize::Medium,
        RegionSize::Large,
        RegionSize::Micro,
        RegionSize::Context,
    ];

    /// Crop dimensions (width, height) in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            RegionSize::Micro => (80, 60),
            RegionSize::Small => (160, 120),
            RegionSize::Medium => (320, 240),
            RegionSize::Large => (480, 360),
            RegionSize::Context => (800, 600),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionSize::Micro => "micro",
            RegionSize::Small => "small",
            RegionSize::Medium => "medium",
            RegionSize::Large => "large",
            RegionSize::Context => "context",
        }
    }
}

/// A cropped region of the recorded frame, persisted as a PNG beside the
/// recording. The crop itself does not know where it was taken from, so the
/// top-left origin in full-frame coordinates is stored alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub size: RegionSize,
    /// Image path, relative to the recording directory.
    pub path: PathBuf,
    /// Crop origin in full-frame coordinates.
    pub left: i32,
    pub top: i32,
}

/// A cheap, comparable summary of the full screen at a point in time.
///
/// Two fingerprints are equal iff their hashes are bit-identical. The
/// recognized text is advisory only and never participates in equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiStateFingerprint {
    /// Unix timestamp (seconds, fractional).
    pub timestamp: f64,
    /// Truncated SHA-256 of the raw frame pixels; absent when capture failed.
    pub hash: Option<String>,
    /// Visible text lines, when a recognition backend was available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_text: Option<Vec<String>>,
}

/// A single recorded interaction, immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// Seconds since recording start.
    pub timestamp: f64,
    pub action: ActionKind,
    /// Recorded-frame pixel coordinates; zeroed for key events.
    pub x: i32,
    pub y: i32,
    /// 0-5 region snapshots around the interaction point.
    #[serde(default)]
    pub regions: Vec<RegionSnapshot>,
    /// Text recognized in a small window around the point, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_before: Option<UiStateFingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_after: Option<UiStateFingerprint>,
    /// True iff the before/after hashes were both observed and differ.
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub validation_confidence: f64,
}

impl InteractionEvent {
    pub fn new(timestamp: f64, action: ActionKind, x: i32, y: i32) -> Self {
        let (x, y) = if action.is_pointer() { (x, y) } else { (0, 0) };
        Self {
            timestamp,
            action,
            x,
            y,
            regions: Vec::new(),
            ocr_text: None,
            ui_before: None,
            ui_after: None,
            validated: false,
            validation_confidence: 0.0,
        }
    }

    /// Snapshot for a given size, if that size survived clipping.
    pub fn region(&self, size: RegionSize) -> Option<&RegionSnapshot> {
        self.regions.iter().find(|r| r.size == size)
    }
}

/// Recording provenance and target identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMeta {
    /// Document format version.
    pub version: u32,
    /// Window title (or equivalent logical handle) of the target surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_title: Option<String>,
    /// Unix timestamp of when the recording was made.
    pub recorded_at: i64,
    /// Screen dimensions at record time, used as the recorded window rect
    /// fallback during geometry translation.
    pub screen_width: u32,
    pub screen_height: u32,
}

/// Current recording document format version.
pub const RECORDING_VERSION: u32 = 1;

/// An ordered, immutable sequence of interactions plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub meta: RecordingMeta,
    pub events: Vec<InteractionEvent>,
}

impl Recording {
    /// Structural invariant: timestamps never decrease.
    pub fn timestamps_monotonic(&self) -> bool {
        self.events
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }
}

/// Axis-aligned window rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point of the rectangle.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width as i32 / 2),
            self.y + (self.height as i32 / 2),
        )
    }

    /// Whether a point falls inside this rectangle.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x + self.width as i32
            && y >= self.y
            && y < self.y + self.height as i32
    }
}

/// Which cascade strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Template,
    Feature,
    Text,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Template => "template",
            MatchStrategy::Feature => "feature",
            MatchStrategy::Text => "text",
        }
    }
}

/// A relocated interaction point in the current frame. Transient; produced
/// per replayed event and never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub x: i32,
    pub y: i32,
    pub confidence: f64,
    pub strategy: MatchStrategy,
}

/// Structural failures. Soft-missing capabilities and transient platform
/// failures are deliberately not represented here; they surface as `Option`
/// or `bool` at the component boundaries.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("recording not found at {0}")]
    NotFound(PathBuf),

    #[error("malformed recording: {0}")]
    Malformed(String),

    #[error("recording has no events")]
    Empty,

    #[error("target window not resolved: {0}")]
    TargetUnresolved(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_rect_center() {
        let rect = WindowRect::new(100, 200, 800, 600);
        assert_eq!(rect.center(), (500, 500));
    }

    #[test]
    fn test_window_rect_contains() {
        let rect = WindowRect::new(0, 0, 100, 100);
        assert!(rect.contains(50, 50));
        assert!(rect.contains(0, 0));
        assert!(!rect.contains(100, 100));
        assert!(!rect.contains(-1, 50));
    }

    #[test]
    fn test_key_event_point_zeroed() {
        let ev = InteractionEvent::new(
            0.5,
            ActionKind::KeyDown {
                key: "Return".to_string(),
            },
            300,
            400,
        );
        assert_eq!((ev.x, ev.y), (0, 0));
    }

    #[test]
    fn test_pointer_event_keeps_point() {
        let ev = InteractionEvent::new(
            0.5,
            ActionKind::PointerClick {
                button: PointerButton::Left,
                pressed: true,
            },
            300,
            400,
        );
        assert_eq!((ev.x, ev.y), (300, 400));
    }

    #[test]
    fn test_action_kind_roundtrip() {
        let action = ActionKind::Scroll { dx: 0, dy: -3 };
        let json = serde_json::to_string(&action).unwrap();
        let back: ActionKind = serde_json::from_str(&json).unwrap();
        assert_eq!(action, back);
    }

    #[test]
    fn test_unknown_action_kind_rejected() {
        let json = r#"{"kind":"teleport","x":1}"#;
        assert!(serde_json::from_str::<ActionKind>(json).is_err());
    }

    #[test]
    fn test_region_size_dimensions() {
        assert_eq!(RegionSize::Micro.dimensions(), (80, 60));
        assert_eq!(RegionSize::Context.dimensions(), (800, 600));
    }

    #[test]
    fn test_match_order_starts_small_not_micro() {
        assert_eq!(RegionSize::MATCH_ORDER[0], RegionSize::Small);
        assert_eq!(RegionSize::MATCH_ORDER[3], RegionSize::Micro);
    }

    #[test]
    fn test_timestamps_monotonic() {
        let meta = RecordingMeta {
            version: RECORDING_VERSION,
            target_title: None,
            recorded_at: 0,
            screen_width: 1920,
            screen_height: 1080,
        };
        let mut rec = Recording {
            meta,
            events: vec![
                InteractionEvent::new(0.0, ActionKind::PointerMove, 0, 0),
                InteractionEvent::new(1.0, ActionKind::PointerMove, 0, 0),
            ],
        };
        assert!(rec.timestamps_monotonic());
        rec.events[1].timestamp = -1.0;
        assert!(!rec.timestamps_monotonic());
    }
}
