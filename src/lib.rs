//! uireplay - Perceptual UI interaction recording and replay
//!
//! This crate records desktop interactions (clicks, scrolls, keystrokes)
//! together with multi-scale visual context around each interaction point,
//! then replays them against a target window that may have moved or been
//! resized since recording:
//!
//! - **Recording**: a global input listener captures each event with region
//!   crops at five fixed sizes, point-local recognized text, and before and
//!   after screen-state fingerprints.
//! - **Replay**: each pointer event is re-located in the live frame through
//!   a matching cascade (template correlation, sparse feature
//!   correspondence, text containment), with geometric window-to-window
//!   translation as the final fallback.
//!
//! # Architecture
//!
//! Capture, recognition, window resolution, and input injection sit behind
//! capability traits with null implementations, so every component degrades
//! instead of failing when a platform facility is missing.

pub mod abort;
pub mod capture;
pub mod config;
pub mod executor;
pub mod geometry;
pub mod matching;
pub mod ocr;
pub mod persist;
pub mod recorder;
pub mod regions;
pub mod replayer;
pub mod state;
pub mod types;
pub mod window;

// Re-export commonly used types
pub use abort::AbortSignal;
pub use capture::{CaptureService, Frame, FrameSource};
pub use config::Config;
pub use executor::{ActionExecutor, EnigoDevice, InputDevice};
pub use matching::MatchingCascade;
pub use ocr::{detect_backend, OcrBackend};
pub use recorder::Recorder;
pub use replayer::{ReplayReport, Replayer};
pub use types::{
    ActionKind, InteractionEvent, MatchResult, MatchStrategy, PointerButton, Recording,
    RecordingMeta, RegionSize, RegionSnapshot, ReplayError, UiStateFingerprint, WindowRect,
};
pub use window::{detect_resolver, WindowResolver};
