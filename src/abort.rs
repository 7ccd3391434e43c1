//! Cooperative cancellation signal.
//!
//! A single shared flag set by an independent listener (Ctrl-C handler or
//! the global abort hotkey) and polled between discrete steps of recording
//! or replay. Setting it is idempotent; observing it never blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared abort token. Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Idempotent.
    pub fn set(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!("Abort signal raised");
        }
    }

    /// Non-blocking observation.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wire this signal to Ctrl-C. Installation failure is non-fatal; the
    /// hotkey listener remains as the abort path.
    pub fn install_ctrlc(&self) {
        let signal = self.clone();
        if let Err(e) = ctrlc::set_handler(move || signal.set()) {
            tracing::warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }
}
