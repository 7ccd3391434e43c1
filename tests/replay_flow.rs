//! End-to-end recording-document replay tests.
//!
//! These build a recording the way the recorder would (region extraction
//! and persistence from a synthetic frame), round-trip it through disk, and
//! replay it with injected capture, resolver, and device fakes.

use image::{Rgba, RgbaImage};
use uireplay::capture::{Frame, FrameSource, NullSource};
use uireplay::ocr::NullOcr;
use uireplay::window::{NullResolver, WindowResolver};
use uireplay::{
    persist, regions, AbortSignal, ActionKind, CaptureService, Config, InputDevice,
    InteractionEvent, PointerButton, Recording, RecordingMeta, ReplayError, Replayer, WindowRect,
};

/// Deterministic high-frequency pattern so template correlation has
/// structure to lock onto.
fn noise_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let v = (x
            .wrapping_mul(2654435761)
            .wrapping_add(y.wrapping_mul(2246822519))
            .wrapping_add(x.wrapping_mul(y).wrapping_mul(3266489917)))
            >> 13;
        let v = (v & 0xff) as u8;
        Rgba([v, v.wrapping_mul(3), v.wrapping_add(41), 255])
    })
}

struct FixedSource(Frame);

impl FrameSource for FixedSource {
    fn grab(&self) -> Option<Frame> {
        Some(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

struct FixedResolver(WindowRect);

impl WindowResolver for FixedResolver {
    fn bring_to_front(&self, _title: &str) -> bool {
        true
    }

    fn is_foreground(&self, _title: &str) -> bool {
        true
    }

    fn bounds(&self, _title: &str) -> Option<WindowRect> {
        Some(self.0)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[derive(Default)]
struct LogDevice {
    clicks: Vec<(i32, i32)>,
    position: (i32, i32),
    keys: Vec<(String, bool)>,
}

impl InputDevice for LogDevice {
    fn move_to(&mut self, x: i32, y: i32) -> bool {
        self.position = (x, y);
        true
    }

    fn click_button(&mut self, _button: PointerButton) -> bool {
        self.clicks.push(self.position);
        true
    }

    fn scroll(&mut self, _amount: i32) -> bool {
        true
    }

    fn key(&mut self, key: &str, down: bool) -> bool {
        self.keys.push((key.to_string(), down));
        true
    }
}

fn click_event(timestamp: f64, x: i32, y: i32) -> InteractionEvent {
    InteractionEvent::new(
        timestamp,
        ActionKind::PointerClick {
            button: PointerButton::Left,
            pressed: true,
        },
        x,
        y,
    )
}

fn meta(screen_width: u32, screen_height: u32, target: Option<&str>) -> RecordingMeta {
    RecordingMeta {
        version: uireplay::types::RECORDING_VERSION,
        target_title: target.map(str::to_string),
        recorded_at: 1_700_000_000,
        screen_width,
        screen_height,
    }
}

#[tokio::test]
async fn click_relocates_via_template_on_unchanged_screen() {
    let dir = tempfile::tempdir().unwrap();
    let frame = Frame::new(noise_image(640, 480));

    // Record side: persist region crops around the interaction point.
    let extracted = regions::extract(&frame, 100, 100);
    let mut event = click_event(0.0, 100, 100);
    event.regions = regions::persist(dir.path(), &extracted);

    let recording = Recording {
        meta: meta(640, 480, None),
        events: vec![event],
    };
    persist::save(dir.path(), &recording).unwrap();
    let loaded = persist::load(dir.path()).unwrap();

    let capture =
        CaptureService::with_sources(Box::new(FixedSource(frame)), Box::new(NullSource));
    let mut replayer = Replayer::new(
        Config::default(),
        capture,
        Box::new(NullOcr),
        Box::new(NullResolver),
        LogDevice::default(),
        AbortSignal::new(),
    );

    let report = replayer.replay(&loaded, dir.path(), 50.0).await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.template_matches, 1);
    assert_eq!(report.geometry_fallbacks, 0);

    let device = replayer.into_device();
    assert_eq!(device.clicks.len(), 1);
    let (x, y) = device.clicks[0];
    assert!((x - 100).abs() <= 2, "clicked at x={}", x);
    assert!((y - 100).abs() <= 2, "clicked at y={}", y);
}

#[tokio::test]
async fn geometry_fallback_scales_to_resized_window() {
    let dir = tempfile::tempdir().unwrap();
    let recording = Recording {
        meta: meta(960, 540, Some("Calc")),
        events: vec![click_event(0.0, 100, 200)],
    };
    persist::save(dir.path(), &recording).unwrap();
    let loaded = persist::load(dir.path()).unwrap();

    // No capture and no stored regions: only geometry remains, against a
    // window twice the recorded screen size.
    let mut replayer = Replayer::new(
        Config::default(),
        CaptureService::unavailable(),
        Box::new(NullOcr),
        Box::new(FixedResolver(WindowRect::new(0, 0, 1920, 1080))),
        LogDevice::default(),
        AbortSignal::new(),
    );

    let report = replayer.replay(&loaded, dir.path(), 50.0).await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.geometry_fallbacks, 1);
    assert_eq!(report.template_matches, 0);

    let device = replayer.into_device();
    assert_eq!(device.clicks, vec![(200, 400)]);
}

#[tokio::test]
async fn mixed_sequence_replays_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut events = vec![click_event(0.0, 50, 60)];
    events.push(InteractionEvent::new(
        0.01,
        ActionKind::KeyDown {
            key: "enter".to_string(),
        },
        0,
        0,
    ));
    events.push(InteractionEvent::new(
        0.02,
        ActionKind::KeyUp {
            key: "enter".to_string(),
        },
        0,
        0,
    ));
    let recording = Recording {
        meta: meta(1920, 1080, None),
        events,
    };
    persist::save(dir.path(), &recording).unwrap();
    let loaded = persist::load(dir.path()).unwrap();

    let mut replayer = Replayer::new(
        Config::default(),
        CaptureService::unavailable(),
        Box::new(NullOcr),
        Box::new(NullResolver),
        LogDevice::default(),
        AbortSignal::new(),
    );

    let report = replayer.replay(&loaded, dir.path(), 50.0).await;
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);

    let device = replayer.into_device();
    // Without any backends the recorded point is used unchanged.
    assert_eq!(device.clicks, vec![(50, 60)]);
    assert_eq!(
        device.keys,
        vec![("enter".to_string(), true), ("enter".to_string(), false)]
    );
}

#[test]
fn load_rejects_missing_recording() {
    let dir = tempfile::tempdir().unwrap();
    let err = persist::load(&dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, ReplayError::NotFound(_)));
}
