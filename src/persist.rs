//! Recording persistence.
//!
//! A recording lives in its own directory: a `script.json` document plus an
//! `images/` subdirectory of region crops referenced by relative paths.
//! Loading validates structure up front so replay never operates on a
//! malformed document.

use crate::types::{Recording, ReplayError, RECORDING_VERSION};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// File name of the recording document inside a recording directory.
pub const SCRIPT_FILE: &str = "script.json";

/// Write a recording to `dir/script.json`, creating the directory if needed.
pub fn save(dir: &Path, recording: &Recording) -> Result<(), ReplayError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(SCRIPT_FILE);
    let json = serde_json::to_string_pretty(recording)?;
    fs::write(&path, json)?;
    info!(
        "Saved recording with {} events to {:?}",
        recording.events.len(),
        path
    );
    Ok(())
}

/// Load and validate a recording from a directory.
///
/// Structural failures are errors: a missing document, unparseable JSON, an
/// unsupported version, non-monotonic timestamps, or an empty event list.
pub fn load(dir: &Path) -> Result<Recording, ReplayError> {
    let path = dir.join(SCRIPT_FILE);
    if !path.exists() {
        return Err(ReplayError::NotFound(path));
    }

    let contents = fs::read_to_string(&path)?;
    let recording: Recording = serde_json::from_str(&contents)?;

    if recording.meta.version != RECORDING_VERSION {
        return Err(ReplayError::Malformed(format!(
            "unsupported version {} (expected {})",
            recording.meta.version, RECORDING_VERSION
        )));
    }

    if !recording.timestamps_monotonic() {
        return Err(ReplayError::Malformed(
            "event timestamps are not monotonically non-decreasing".to_string(),
        ));
    }

    if recording.events.is_empty() {
        return Err(ReplayError::Empty);
    }

    debug!(
        "Loaded recording: {} events, target {:?}",
        recording.events.len(),
        recording.meta.target_title
    );
    Ok(recording)
}
