//! Target window resolution and activation.
//!
//! Replay needs the target window focused and needs its current bounds to
//! translate recorded coordinates. Resolution is best-effort: on platforms
//! without a backend the null resolver reports nothing and replay falls
//! back to full-screen geometry.

use crate::types::WindowRect;
use std::process::Command;
use tracing::{debug, warn};

/// Resolves and activates the target window by title substring.
pub trait WindowResolver: Send + Sync {
    /// Raise the first window whose title contains `title`. Returns whether
    /// the activation was issued successfully.
    fn bring_to_front(&self, title: &str) -> bool;

    /// Whether the foreground window currently matches `title`.
    fn is_foreground(&self, title: &str) -> bool;

    /// Current bounds of the matching window, if it can be located.
    fn bounds(&self, title: &str) -> Option<WindowRect>;

    fn name(&self) -> &'static str;
}

/// Resolver that never finds anything. Used on unsupported platforms.
pub struct NullResolver;

impl WindowResolver for NullResolver {
    fn bring_to_front(&self, _title: &str) -> bool {
        false
    }

    fn is_foreground(&self, _title: &str) -> bool {
        false
    }

    fn bounds(&self, _title: &str) -> Option<WindowRect> {
        None
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Case-insensitive title containment, the matching rule used everywhere a
/// recorded title is compared against a live one.
pub fn title_matches(candidate: &str, wanted: &str) -> bool {
    candidate.to_lowercase().contains(&wanted.to_lowercase())
}

fn parse_rect_reply(reply: &str) -> Option<WindowRect> {
    let parts: Vec<i32> = reply
        .trim()
        .split(',')
        .filter_map(|p| p.trim().parse::<i32>().ok())
        .collect();
    if parts.len() != 4 {
        return None;
    }
    Some(WindowRect {
        x: parts[0],
        y: parts[1],
        width: parts[2].max(0) as u32,
        height: parts[3].max(0) as u32,
    })
}

#[cfg(target_os = "macos")]
mod platform {
    use super::*;
    use tracing::trace;

    /// Resolver backed by System Events scripting.
    pub struct OsascriptResolver;

    fn escape(s: &str) -> String {
        s.replace('\\', "\\\\").replace('"', "\\\"")
    }

    fn run_script(script: &str) -> Option<String> {
        let output = Command::new("osascript").args(["-e", script]).output().ok()?;
        if !output.status.success() {
            trace!(
                "osascript failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    impl WindowResolver for OsascriptResolver {
        fn bring_to_front(&self, title: &str) -> bool {
            let script = format!(
                "tell application \"System Events\" to set frontmost of \
                 (first process whose name contains \"{}\") to true",
                escape(title)
            );
            let ok = run_script(&script).is_some();
            if !ok {
                warn!("Could not activate window matching '{}'", title);
            }
            ok
        }

        fn is_foreground(&self, title: &str) -> bool {
            let script =
                "tell application \"System Events\" to get name of first process whose frontmost is true";
            match run_script(script) {
                Some(front) => title_matches(&front, title),
                None => false,
            }
        }

        fn bounds(&self, title: &str) -> Option<WindowRect> {
            let script = format!(
                "tell application \"System Events\" to get {{position, size}} of front window of \
                 (first process whose name contains \"{}\")",
                escape(title)
            );
            let reply = run_script(&script)?;
            let rect = parse_rect_reply(&reply);
            if let Some(ref r) = rect {
                debug!("Window '{}' bounds: {:?}", title, r);
            }
            rect
        }

        fn name(&self) -> &'static str {
            "osascript"
        }
    }
}

#[cfg(target_os = "macos")]
pub use platform::OsascriptResolver;

/// Pick the platform resolver, or the null resolver when unsupported.
pub fn detect_resolver() -> Box<dyn WindowResolver> {
    #[cfg(target_os = "macos")]
    {
        return Box::new(OsascriptResolver);
    }
    #[cfg(not(target_os = "macos"))]
    {
        debug!("No window resolver for this platform");
        Box::new(NullResolver)
    }
}

/// Launches the target application when it is not already running.
pub trait AppLifecycle: Send + Sync {
    fn ensure_running(&self, name: &str) -> bool;
}

/// Lifecycle backed by the platform launcher.
pub struct Launcher;

impl AppLifecycle for Launcher {
    #[cfg(target_os = "macos")]
    fn ensure_running(&self, name: &str) -> bool {
        match Command::new("open").args(["-a", name]).status() {
            Ok(status) => status.success(),
            Err(e) => {
                warn!("Failed to launch '{}': {}", name, e);
                false
            }
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn ensure_running(&self, name: &str) -> bool {
        match Command::new(name).spawn() {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to launch '{}': {}", name, e);
                false
            }
        }
    }
}
