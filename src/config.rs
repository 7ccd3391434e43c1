//! Configuration management.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Descending template-match confidence tiers, tried in order.
    #[serde(default = "default_confidence_high")]
    pub confidence_high: f64,

    #[serde(default = "default_confidence_default")]
    pub confidence_default: f64,

    #[serde(default = "default_confidence_relaxed")]
    pub confidence_relaxed: f64,

    #[serde(default = "default_confidence_very_relaxed")]
    pub confidence_very_relaxed: f64,

    /// Enable the sparse feature-matching stage.
    #[serde(default = "default_true")]
    pub feature_matching_enabled: bool,

    /// Nearest-neighbor distance-ratio threshold for feature matches.
    #[serde(default = "default_feature_ratio")]
    pub feature_match_ratio: f64,

    /// Minimum accepted feature correspondences for a match.
    #[serde(default = "default_feature_min_matches")]
    pub feature_min_matches: usize,

    /// FAST corner detection threshold (0-255).
    #[serde(default = "default_corner_threshold")]
    pub corner_threshold: u8,
}

impl MatchingConfig {
    /// Tiers in the order the cascade tries them.
    pub fn confidence_tiers(&self) -> [f64; 4] {
        [
            self.confidence_high,
            self.confidence_default,
            self.confidence_relaxed,
            self.confidence_very_relaxed,
        ]
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            confidence_high: 0.85,
            confidence_default: 0.78,
            confidence_relaxed: 0.62,
            confidence_very_relaxed: 0.45,
            feature_matching_enabled: true,
            feature_match_ratio: 0.7,
            feature_min_matches: 6,
            corner_threshold: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay before sampling the after-state of an action, in milliseconds.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Time allowed for window focus to settle after activation.
    #[serde(default = "default_focus_settle")]
    pub focus_settle_ms: u64,

    /// Pause after performing a scroll.
    #[serde(default = "default_post_scroll_wait")]
    pub post_scroll_wait_ms: u64,

    /// Maximum single sleep slice during replay pacing; bounds abort latency.
    #[serde(default = "default_replay_slice")]
    pub replay_slice_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 300,
            focus_settle_ms: 150,
            post_scroll_wait_ms: 120,
            replay_slice_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum retry radius for imprecise clicks, in pixels.
    #[serde(default = "default_max_retry_radius")]
    pub max_retry_radius: i32,

    /// Scroll units per recorded wheel notch.
    #[serde(default = "default_scroll_multiplier")]
    pub scroll_multiplier: i32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retry_radius: 24,
            scroll_multiplier: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Whether raw pointer moves are persisted (noisy; off by default).
    #[serde(default)]
    pub record_pointer_moves: bool,

    /// Size of the text-recognition window around the interaction point.
    #[serde(default = "default_ocr_window_width")]
    pub ocr_window_width: u32,

    #[serde(default = "default_ocr_window_height")]
    pub ocr_window_height: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            record_pointer_moves: false,
            ocr_window_width: 100,
            ocr_window_height: 50,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_confidence_high() -> f64 {
    0.85
}

fn default_confidence_default() -> f64 {
    0.78
}

fn default_confidence_relaxed() -> f64 {
    0.62
}

fn default_confidence_very_relaxed() -> f64 {
    0.45
}

fn default_feature_ratio() -> f64 {
    0.7
}

fn default_feature_min_matches() -> usize {
    6
}

fn default_corner_threshold() -> u8 {
    32
}

fn default_settle_delay() -> u64 {
    300
}

fn default_focus_settle() -> u64 {
    150
}

fn default_post_scroll_wait() -> u64 {
    120
}

fn default_replay_slice() -> u64 {
    100
}

fn default_max_retry_radius() -> i32 {
    24
}

fn default_scroll_multiplier() -> i32 {
    120
}

fn default_ocr_window_width() -> u32 {
    100
}

fn default_ocr_window_height() -> u32 {
    50
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("uireplay")
            .join("config.toml")
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.matching.confidence_high, 0.85);
        assert_eq!(config.timing.settle_delay_ms, 300);
        assert_eq!(config.executor.max_retry_radius, 24);
        assert!(!config.recording.record_pointer_moves);
    }

    #[test]
    fn test_confidence_tiers_descending() {
        let tiers = MatchingConfig::default().confidence_tiers();
        assert!(tiers.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[matching]
confidence_high = 0.9
feature_matching_enabled = false

[executor]
max_retry_radius = 32
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.matching.confidence_high, 0.9);
        assert!(!config.matching.feature_matching_enabled);
        assert_eq!(config.executor.max_retry_radius, 32);
        // Unspecified sections keep defaults
        assert_eq!(config.timing.replay_slice_ms, 100);
    }
}
