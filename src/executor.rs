//! Input injection with retry-by-search.
//!
//! The executor performs pointer and key actions at resolved points. A
//! failed click is retried at the eight surrounding ±8 px offsets, then on
//! expanding radii sampling a 3x3 grid at each, stopping at the first
//! success. Platform errors never propagate past this boundary; every
//! action reports a boolean outcome.

use crate::config::ExecutorConfig;
use crate::types::PointerButton;
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use tracing::{debug, trace, warn};

/// Offset grid spacing for the first retry ring.
const NEAR_OFFSET: i32 = 8;

/// Expanding retry radii; the last entry is replaced by the configured max.
const RETRY_RADII: [i32; 2] = [12, 18];

/// Raw injection device. Every method converts platform failures into a
/// `false` return.
pub trait InputDevice: Send {
    fn move_to(&mut self, x: i32, y: i32) -> bool;

    fn click_button(&mut self, button: PointerButton) -> bool;

    /// Scroll vertically by `amount` device units at the current position.
    fn scroll(&mut self, amount: i32) -> bool;

    /// Press or release a logical key.
    fn key(&mut self, key: &str, down: bool) -> bool;
}

/// Production device backed by `enigo`.
pub struct EnigoDevice {
    enigo: Enigo,
}

impl EnigoDevice {
    /// `None` when the platform has no input injection available (headless
    /// host, missing permission).
    pub fn new() -> Option<Self> {
        match Enigo::new(&Settings::default()) {
            Ok(enigo) => Some(Self { enigo }),
            Err(e) => {
                warn!("Input injection unavailable: {:?}", e);
                None
            }
        }
    }

    fn map_button(button: PointerButton) -> Button {
        match button {
            PointerButton::Left => Button::Left,
            PointerButton::Right => Button::Right,
            PointerButton::Middle => Button::Middle,
        }
    }

    fn map_key(key: &str) -> Option<Key> {
        let mapped = match key.to_lowercase().as_str() {
            "enter" | "return" => Key::Return,
            "tab" => Key::Tab,
            "escape" | "esc" => Key::Escape,
            "backspace" => Key::Backspace,
            "control" | "ctrl" => Key::Control,
            "shift" => Key::Shift,
            "alt" | "option" => Key::Alt,
            "meta" | "command" | "super" => Key::Meta,
            "delete" | "del" => Key::Delete,
            "space" => Key::Space,
            "up" => Key::UpArrow,
            "down" => Key::DownArrow,
            "left" => Key::LeftArrow,
            "right" => Key::RightArrow,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Unicode(c),
                    _ => return None,
                }
            }
        };
        Some(mapped)
    }
}

impl InputDevice for EnigoDevice {
    fn move_to(&mut self, x: i32, y: i32) -> bool {
        self.enigo.move_mouse(x, y, Coordinate::Abs).is_ok()
    }

    fn click_button(&mut self, button: PointerButton) -> bool {
        self.enigo
            .button(Self::map_button(button), Direction::Click)
            .is_ok()
    }

    fn scroll(&mut self, amount: i32) -> bool {
        self.enigo.scroll(amount, Axis::Vertical).is_ok()
    }

    fn key(&mut self, key: &str, down: bool) -> bool {
        let Some(mapped) = Self::map_key(key) else {
            debug!("Unmappable key '{}', skipping", key);
            return false;
        };
        let direction = if down {
            Direction::Press
        } else {
            Direction::Release
        };
        self.enigo.key(mapped, direction).is_ok()
    }
}

/// Performs resolved actions with the retry-by-search click policy.
pub struct ActionExecutor<D: InputDevice> {
    device: D,
    config: ExecutorConfig,
}

impl<D: InputDevice> ActionExecutor<D> {
    pub fn new(device: D, config: ExecutorConfig) -> Self {
        Self { device, config }
    }

    /// Click at (x, y), searching nearby on platform failure. Returns
    /// whether any attempt succeeded.
    pub fn click(&mut self, x: i32, y: i32, button: PointerButton) -> bool {
        if self.try_click(x, y, button) {
            return true;
        }

        // First ring: the 8 surrounding ±8 px offsets.
        for dx in [-NEAR_OFFSET, 0, NEAR_OFFSET] {
            for dy in [-NEAR_OFFSET, 0, NEAR_OFFSET] {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if self.try_click(x + dx, y + dy, button) {
                    debug!("Click succeeded at offset ({}, {})", dx, dy);
                    return true;
                }
            }
        }

        // Expanding radii, 3x3 grid per radius.
        let radii = [RETRY_RADII[0], RETRY_RADII[1], self.config.max_retry_radius];
        for r in radii {
            for dx in [-r, 0, r] {
                for dy in [-r, 0, r] {
                    if self.try_click(x + dx, y + dy, button) {
                        debug!("Click succeeded at radius {} offset ({}, {})", r, dx, dy);
                        return true;
                    }
                }
            }
        }

        warn!("Click failed at ({}, {}) after retry search", x, y);
        false
    }

    fn try_click(&mut self, x: i32, y: i32, button: PointerButton) -> bool {
        self.device.move_to(x, y) && self.device.click_button(button)
    }

    /// Scroll at (x, y) by `dy` recorded notches.
    pub fn scroll(&mut self, x: i32, y: i32, dy: i32) -> bool {
        if !self.device.move_to(x, y) {
            trace!("Move before scroll failed at ({}, {})", x, y);
            return false;
        }
        self.device.scroll(dy * self.config.scroll_multiplier)
    }

    /// Press or release a logical key.
    pub fn key(&mut self, key: &str, down: bool) -> bool {
        self.device.key(key, down)
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Device that fails clicks everywhere except a configured set of
    /// points, and records every attempt.
    struct ScriptedDevice {
        succeed_at: Vec<(i32, i32)>,
        position: (i32, i32),
        attempts: Vec<(i32, i32)>,
    }

    impl ScriptedDevice {
        fn new(succeed_at: Vec<(i32, i32)>) -> Self {
            Self {
                succeed_at,
                position: (0, 0),
                attempts: Vec::new(),
            }
        }
    }

    impl InputDevice for ScriptedDevice {
        fn move_to(&mut self, x: i32, y: i32) -> bool {
            self.position = (x, y);
            true
        }

        fn click_button(&mut self, _button: PointerButton) -> bool {
            self.attempts.push(self.position);
            self.succeed_at.contains(&self.position)
        }

        fn scroll(&mut self, _amount: i32) -> bool {
            true
        }

        fn key(&mut self, _key: &str, _down: bool) -> bool {
            true
        }
    }

    #[test]
    fn test_click_exact_point_first() {
        let device = ScriptedDevice::new(vec![(100, 100)]);
        let mut executor = ActionExecutor::new(device, ExecutorConfig::default());
        assert!(executor.click(100, 100, PointerButton::Left));
        assert_eq!(executor.device_mut().attempts, vec![(100, 100)]);
    }

    #[test]
    fn test_click_retries_near_offsets() {
        let device = ScriptedDevice::new(vec![(108, 92)]);
        let mut executor = ActionExecutor::new(device, ExecutorConfig::default());
        assert!(executor.click(100, 100, PointerButton::Left));
        let attempts = &executor.device_mut().attempts;
        assert_eq!(*attempts.last().unwrap(), (108, 92));
        // Never expanded beyond the ±8 ring.
        assert!(attempts
            .iter()
            .all(|(x, y)| (x - 100).abs() <= 8 && (y - 100).abs() <= 8));
    }

    #[test]
    fn test_click_radius_12_stops_before_18() {
        // Succeeds only at one radius-12 grid point.
        let device = ScriptedDevice::new(vec![(112, 88)]);
        let mut executor = ActionExecutor::new(device, ExecutorConfig::default());
        assert!(executor.click(100, 100, PointerButton::Left));
        let attempts = &executor.device_mut().attempts;
        assert!(attempts
            .iter()
            .all(|(x, y)| (x - 100).abs() < 18 && (y - 100).abs() < 18));
    }

    #[test]
    fn test_click_exhausts_and_fails() {
        let device = ScriptedDevice::new(vec![]);
        let mut executor = ActionExecutor::new(device, ExecutorConfig::default());
        assert!(!executor.click(100, 100, PointerButton::Left));
        let attempts = &executor.device_mut().attempts;
        // Exact + 8 near offsets + 3 radii x 9 grid points.
        assert_eq!(attempts.len(), 1 + 8 + 3 * 9);
        // Widest ring honors the configured max radius.
        let max = attempts
            .iter()
            .map(|(x, y)| (x - 100).abs().max((y - 100).abs()))
            .max()
            .unwrap();
        assert_eq!(max, ExecutorConfig::default().max_retry_radius);
    }

    #[test]
    fn test_scroll_applies_multiplier() {
        struct ScrollProbe {
            last: Option<i32>,
        }
        impl InputDevice for ScrollProbe {
            fn move_to(&mut self, _x: i32, _y: i32) -> bool {
                true
            }
            fn click_button(&mut self, _button: PointerButton) -> bool {
                true
            }
            fn scroll(&mut self, amount: i32) -> bool {
                self.last = Some(amount);
                true
            }
            fn key(&mut self, _key: &str, _down: bool) -> bool {
                true
            }
        }

        let config = ExecutorConfig {
            scroll_multiplier: 3,
            ..ExecutorConfig::default()
        };
        let mut executor = ActionExecutor::new(ScrollProbe { last: None }, config);
        assert!(executor.scroll(10, 10, -2));
        assert_eq!(executor.device_mut().last, Some(-6));
    }
}
