//! Recording replay.
//!
//! Replay walks the event log in order, pacing each event to its recorded
//! timestamp scaled by a speed factor. Pointer events are re-located in the
//! live frame through the matching cascade; when every strategy misses, the
//! recorded point is translated geometrically from the recorded screen rect
//! to the current target window rect. Individual failures degrade and are
//! counted; only the abort signal stops the run early.

use crate::abort::AbortSignal;
use crate::capture::CaptureService;
use crate::config::Config;
use crate::executor::{ActionExecutor, InputDevice};
use crate::geometry;
use crate::matching::MatchingCascade;
use crate::ocr::OcrBackend;
use crate::types::{ActionKind, InteractionEvent, MatchStrategy, Recording, WindowRect};
use crate::window::WindowResolver;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Outcome counters for a replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub template_matches: usize,
    pub feature_matches: usize,
    pub text_matches: usize,
    pub geometry_fallbacks: usize,
    pub aborted: bool,
}

impl ReplayReport {
    fn tally_strategy(&mut self, strategy: MatchStrategy) {
        match strategy {
            MatchStrategy::Template => self.template_matches += 1,
            MatchStrategy::Feature => self.feature_matches += 1,
            MatchStrategy::Text => self.text_matches += 1,
        }
    }
}

/// Replays a recording against the live screen.
pub struct Replayer<D: InputDevice> {
    config: Config,
    capture: CaptureService,
    ocr: Box<dyn OcrBackend>,
    resolver: Box<dyn WindowResolver>,
    executor: ActionExecutor<D>,
    abort: AbortSignal,
}

impl<D: InputDevice> Replayer<D> {
    pub fn new(
        config: Config,
        capture: CaptureService,
        ocr: Box<dyn OcrBackend>,
        resolver: Box<dyn WindowResolver>,
        device: D,
        abort: AbortSignal,
    ) -> Self {
        let executor = ActionExecutor::new(device, config.executor.clone());
        Self {
            config,
            capture,
            ocr,
            resolver,
            executor,
            abort,
        }
    }

    /// Replay `recording` whose region images live under `dir`.
    /// `speed_factor` scales pacing: 2.0 runs twice as fast.
    pub async fn replay(
        &mut self,
        recording: &Recording,
        dir: &Path,
        speed_factor: f64,
    ) -> ReplayReport {
        let mut report = ReplayReport {
            total: recording.events.len(),
            ..ReplayReport::default()
        };
        let speed = if speed_factor > 0.0 { speed_factor } else { 1.0 };

        if let Some(title) = &recording.meta.target_title {
            if !self.resolver.bring_to_front(title) {
                debug!("Target '{}' not activated, replaying anyway", title);
            }
            tokio::time::sleep(Duration::from_millis(self.config.timing.focus_settle_ms)).await;
        }

        let recorded_rect = WindowRect::new(
            0,
            0,
            recording.meta.screen_width,
            recording.meta.screen_height,
        );
        let started = Instant::now();

        for event in &recording.events {
            if !self.pace_until(event.timestamp / speed, started).await {
                report.aborted = true;
                break;
            }

            report.attempted += 1;
            let ok = self.perform(event, dir, recorded_rect, &recording.meta.target_title, &mut report)
                .await;
            if ok {
                report.succeeded += 1;
            } else {
                report.failed += 1;
                warn!(
                    "Event {} ({}) failed",
                    report.attempted - 1,
                    event.action.as_str()
                );
            }
        }

        info!(
            "Replay {}: {}/{} succeeded ({} template, {} feature, {} text, {} geometry)",
            if report.aborted { "aborted" } else { "finished" },
            report.succeeded,
            report.total,
            report.template_matches,
            report.feature_matches,
            report.text_matches,
            report.geometry_fallbacks,
        );
        report
    }

    /// Sleep until `target` seconds after `started`, in short slices so the
    /// abort signal is observed promptly. Returns false when aborted.
    async fn pace_until(&self, target: f64, started: Instant) -> bool {
        let slice = Duration::from_millis(self.config.timing.replay_slice_ms);
        loop {
            if self.abort.is_set() {
                return false;
            }
            let elapsed = started.elapsed().as_secs_f64();
            let remaining = target - elapsed;
            if remaining <= 0.0 {
                return true;
            }
            let nap = Duration::from_secs_f64(remaining).min(slice);
            tokio::time::sleep(nap).await;
        }
    }

    async fn perform(
        &mut self,
        event: &InteractionEvent,
        dir: &Path,
        recorded_rect: WindowRect,
        target_title: &Option<String>,
        report: &mut ReplayReport,
    ) -> bool {
        // Pointer events need the target focused; re-assert when it drifted.
        if event.action.is_pointer() {
            if let Some(title) = target_title {
                if !self.resolver.is_foreground(title) {
                    self.resolver.bring_to_front(title);
                }
            }
        }

        match &event.action {
            ActionKind::PointerMove => {
                let (x, y) = self.translate_only(event, recorded_rect, target_title);
                self.executor.device_mut().move_to(x, y)
            }
            ActionKind::PointerClick { button, pressed } => {
                if !pressed {
                    // Releases are implied by the click the press performs.
                    return true;
                }
                let (x, y) = self.resolve_point(event, dir, recorded_rect, target_title, report);
                self.executor.click(x, y, *button)
            }
            ActionKind::Scroll { dy, .. } => {
                let (x, y) = self.resolve_point(event, dir, recorded_rect, target_title, report);
                let ok = self.executor.scroll(x, y, *dy);
                tokio::time::sleep(Duration::from_millis(
                    self.config.timing.post_scroll_wait_ms,
                ))
                .await;
                ok
            }
            ActionKind::KeyDown { key } => self.executor.key(key, true),
            ActionKind::KeyUp { key } => self.executor.key(key, false),
        }
    }

    /// Resolve the live point for a perceptual event: cascade first, then
    /// geometric translation.
    fn resolve_point(
        &mut self,
        event: &InteractionEvent,
        dir: &Path,
        recorded_rect: WindowRect,
        target_title: &Option<String>,
        report: &mut ReplayReport,
    ) -> (i32, i32) {
        if let Some(frame) = self.capture.capture() {
            let cascade = MatchingCascade::new(&self.config.matching, self.ocr.as_ref());
            if let Some(result) = cascade.locate(event, dir, &frame) {
                trace!(
                    "Located ({}, {}) -> ({}, {}) via {} at {:.2}",
                    event.x,
                    event.y,
                    result.x,
                    result.y,
                    result.strategy.as_str(),
                    result.confidence
                );
                report.tally_strategy(result.strategy);
                return (result.x, result.y);
            }

            let current = self
                .window_rect(target_title)
                .unwrap_or_else(|| frame.bounds());
            report.geometry_fallbacks += 1;
            debug!("No visual match; translating geometrically");
            return geometry::translate((event.x, event.y), recorded_rect, current);
        }

        report.geometry_fallbacks += 1;
        self.translate_only(event, recorded_rect, target_title)
    }

    /// Geometric translation without visual matching.
    fn translate_only(
        &self,
        event: &InteractionEvent,
        recorded_rect: WindowRect,
        target_title: &Option<String>,
    ) -> (i32, i32) {
        let current = self.window_rect(target_title).unwrap_or(recorded_rect);
        geometry::translate((event.x, event.y), recorded_rect, current)
    }

    fn window_rect(&self, target_title: &Option<String>) -> Option<WindowRect> {
        target_title.as_deref().and_then(|t| self.resolver.bounds(t))
    }

    pub fn into_device(self) -> D {
        self.executor.into_device()
    }
}
