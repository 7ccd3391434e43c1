//! Interaction recording.
//!
//! A global input listener feeds pointer and key events into an append-only
//! log. Each qualifying event is enriched synchronously in the handler:
//! before-state sample, multi-scale region extraction, point-local text
//! recognition, then a settle delay and an after-state sample that decides
//! validation. Pointer moves are dropped by default; they are noise at
//! replay time.

use crate::abort::AbortSignal;
use crate::capture::CaptureService;
use crate::config::Config;
use crate::ocr::OcrBackend;
use crate::regions;
use crate::state::{changed, StateSampler};
use crate::types::{
    ActionKind, InteractionEvent, PointerButton, Recording, RecordingMeta, ReplayError,
    RECORDING_VERSION,
};
use rdev::{Button, EventType, Key};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Screen dimensions assumed when no frame can be captured at start.
const FALLBACK_SCREEN: (u32, u32) = (1920, 1080);

/// State shared between the listener thread and the recording loop.
struct RecorderShared {
    config: Config,
    capture: CaptureService,
    ocr: Box<dyn OcrBackend>,
    abort: AbortSignal,
    recording_dir: PathBuf,
    started: Instant,
    events: Mutex<Vec<InteractionEvent>>,
    /// Last known pointer position; button and wheel events carry none.
    pointer: Mutex<(i32, i32)>,
    /// Keys currently held, for abort-chord detection.
    held_keys: Mutex<HashSet<Key>>,
}

/// Records user interactions into a recording directory.
pub struct Recorder {
    config: Config,
    capture: CaptureService,
    ocr: Box<dyn OcrBackend>,
    abort: AbortSignal,
}

impl Recorder {
    pub fn new(
        config: Config,
        capture: CaptureService,
        ocr: Box<dyn OcrBackend>,
        abort: AbortSignal,
    ) -> Self {
        Self {
            config,
            capture,
            ocr,
            abort,
        }
    }

    /// Record until the abort signal fires, then return the recording.
    /// Region images are persisted under `dir` as events arrive.
    pub fn record(
        self,
        dir: &Path,
        target_title: Option<String>,
    ) -> Result<Recording, ReplayError> {
        std::fs::create_dir_all(dir)?;

        let (screen_width, screen_height) = match self.capture.capture() {
            Some(frame) => (frame.width(), frame.height()),
            None => {
                warn!(
                    "No capture backend; assuming {}x{} screen",
                    FALLBACK_SCREEN.0, FALLBACK_SCREEN.1
                );
                FALLBACK_SCREEN
            }
        };

        let slice = Duration::from_millis(self.config.timing.replay_slice_ms);
        let shared = Arc::new(RecorderShared {
            config: self.config,
            capture: self.capture,
            ocr: self.ocr,
            abort: self.abort.clone(),
            recording_dir: dir.to_path_buf(),
            started: Instant::now(),
            events: Mutex::new(Vec::new()),
            pointer: Mutex::new((0, 0)),
            held_keys: Mutex::new(HashSet::new()),
        });

        info!(
            "Recording started; press Ctrl+Shift+A+F+K or Ctrl-C to stop"
        );
        let listener_shared = Arc::clone(&shared);
        std::thread::spawn(move || {
            // listen() blocks for the life of the process; the thread is
            // never joined.
            let callback_shared = Arc::clone(&listener_shared);
            if let Err(e) = rdev::listen(move |event| {
                handle_event(&callback_shared, event.event_type);
            }) {
                warn!("Input listener failed: {:?}", e);
                listener_shared.abort.set();
            }
        });

        while !self.abort.is_set() {
            std::thread::sleep(slice);
        }

        let events = shared.events.lock().unwrap().clone();
        info!("Recording stopped with {} events", events.len());
        if events.is_empty() {
            return Err(ReplayError::Empty);
        }

        Ok(Recording {
            meta: RecordingMeta {
                version: RECORDING_VERSION,
                target_title,
                recorded_at: chrono::Utc::now().timestamp(),
                screen_width,
                screen_height,
            },
            events,
        })
    }
}

fn handle_event(shared: &RecorderShared, event_type: EventType) {
    if shared.abort.is_set() {
        return;
    }

    match event_type {
        EventType::MouseMove { x, y } => {
            let point = (x.round() as i32, y.round() as i32);
            *shared.pointer.lock().unwrap() = point;
            if shared.config.recording.record_pointer_moves {
                let ev = InteractionEvent::new(
                    elapsed(shared),
                    ActionKind::PointerMove,
                    point.0,
                    point.1,
                );
                shared.events.lock().unwrap().push(ev);
            }
        }
        EventType::ButtonPress(button) => {
            let Some(button) = map_button(button) else {
                trace!("Ignoring unmapped pointer button");
                return;
            };
            let (x, y) = *shared.pointer.lock().unwrap();
            record_perceptual(
                shared,
                ActionKind::PointerClick {
                    button,
                    pressed: true,
                },
                x,
                y,
            );
        }
        EventType::ButtonRelease(_) => {
            // Presses carry the interaction; releases are implied at replay.
        }
        EventType::Wheel { delta_x, delta_y } => {
            let (x, y) = *shared.pointer.lock().unwrap();
            record_perceptual(
                shared,
                ActionKind::Scroll {
                    dx: delta_x as i32,
                    dy: delta_y as i32,
                },
                x,
                y,
            );
        }
        EventType::KeyPress(key) => {
            {
                let mut held = shared.held_keys.lock().unwrap();
                held.insert(key);
                if chord_complete(&held) {
                    info!("Abort chord pressed, stopping recording");
                    shared.abort.set();
                    return;
                }
            }
            let ev = InteractionEvent::new(
                elapsed(shared),
                ActionKind::KeyDown {
                    key: key_name(key),
                },
                0,
                0,
            );
            shared.events.lock().unwrap().push(ev);
        }
        EventType::KeyRelease(key) => {
            shared.held_keys.lock().unwrap().remove(&key);
            let ev = InteractionEvent::new(
                elapsed(shared),
                ActionKind::KeyUp {
                    key: key_name(key),
                },
                0,
                0,
            );
            shared.events.lock().unwrap().push(ev);
        }
    }
}

/// Full perceptual enrichment for clicks and scrolls: before state, region
/// crops, point-local text, settle, after state, validation.
fn record_perceptual(shared: &RecorderShared, action: ActionKind, x: i32, y: i32) {
    let timestamp = elapsed(shared);
    let sampler = StateSampler::new(&shared.capture, shared.ocr.as_ref());
    let before = sampler.sample();

    let mut event = InteractionEvent::new(timestamp, action, x, y);
    event.ui_before = Some(before.clone());

    if let Some(frame) = shared.capture.capture() {
        let extracted = regions::extract(&frame, x, y);
        event.regions = regions::persist(&shared.recording_dir, &extracted);

        let rc = &shared.config.recording;
        event.ocr_text = regions::extract_text(
            &frame,
            x - (rc.ocr_window_width as i32 / 2),
            y - (rc.ocr_window_height as i32 / 2),
            rc.ocr_window_width,
            rc.ocr_window_height,
            shared.ocr.as_ref(),
        );
    } else {
        debug!("No frame for event at ({}, {}); recording without context", x, y);
    }

    std::thread::sleep(Duration::from_millis(shared.config.timing.settle_delay_ms));
    let after = sampler.sample();
    event.validated = changed(&before, &after);
    event.validation_confidence = if event.validated { 1.0 } else { 0.0 };
    event.ui_after = Some(after);

    trace!(
        "Recorded {} at ({}, {}) validated={}",
        event.action.as_str(),
        x,
        y,
        event.validated
    );
    shared.events.lock().unwrap().push(event);
}

fn elapsed(shared: &RecorderShared) -> f64 {
    shared.started.elapsed().as_secs_f64()
}

fn map_button(button: Button) -> Option<PointerButton> {
    match button {
        Button::Left => Some(PointerButton::Left),
        Button::Right => Some(PointerButton::Right),
        Button::Middle => Some(PointerButton::Middle),
        Button::Unknown(_) => None,
    }
}

/// The stop chord: both modifier groups plus A, F and K held together.
fn chord_complete(held: &HashSet<Key>) -> bool {
    let ctrl = held.contains(&Key::ControlLeft) || held.contains(&Key::ControlRight);
    let shift = held.contains(&Key::ShiftLeft) || held.contains(&Key::ShiftRight);
    ctrl && shift
        && held.contains(&Key::KeyA)
        && held.contains(&Key::KeyF)
        && held.contains(&Key::KeyK)
}

/// Watch for the abort chord on a detached listener thread. Used during
/// replay, where no recording listener is running.
pub fn spawn_abort_hotkey(abort: AbortSignal) {
    std::thread::spawn(move || {
        let mut held: HashSet<Key> = HashSet::new();
        if let Err(e) = rdev::listen(move |event| match event.event_type {
            EventType::KeyPress(key) => {
                held.insert(key);
                if chord_complete(&held) {
                    abort.set();
                }
            }
            EventType::KeyRelease(key) => {
                held.remove(&key);
            }
            _ => {}
        }) {
            debug!("Abort hotkey listener unavailable: {:?}", e);
        }
    });
}

/// Logical key name stored in recordings and consumed by the executor.
fn key_name(key: Key) -> String {
    let name = match key {
        Key::Return => "enter",
        Key::Tab => "tab",
        Key::Space => "space",
        Key::Backspace => "backspace",
        Key::Escape => "escape",
        Key::Delete => "delete",
        Key::ControlLeft | Key::ControlRight => "ctrl",
        Key::ShiftLeft | Key::ShiftRight => "shift",
        Key::Alt | Key::AltGr => "alt",
        Key::MetaLeft | Key::MetaRight => "meta",
        Key::UpArrow => "up",
        Key::DownArrow => "down",
        Key::LeftArrow => "left",
        Key::RightArrow => "right",
        other => {
            let debug = format!("{:?}", other);
            // KeyA..KeyZ and Num0..Num9 reduce to their final character.
            let lowered = debug.to_lowercase();
            return if let Some(stripped) = lowered.strip_prefix("key") {
                stripped.to_string()
            } else if let Some(stripped) = lowered.strip_prefix("num") {
                stripped.to_string()
            } else {
                lowered
            };
        }
    };
    name.to_string()
}
