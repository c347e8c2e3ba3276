//! Two-level interrupt handling.
//!
//! The first SIGINT/SIGTERM/SIGQUIT lets the sweep finish its current
//! tuning and exit cleanly; any further signal aborts the scan outright.
//! SIGPIPE needs no handling: the Rust runtime already ignores it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Default)]
pub struct SignalMonitor {
    signals_caught: Arc<AtomicUsize>,
}

impl SignalMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the process-wide handler. Call at most once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let signals_caught = self.signals_caught.clone();
        ctrlc::set_handler(move || {
            let previous = signals_caught.fetch_add(1, Ordering::SeqCst);
            if previous == 0 {
                tracing::info!("interrupt: finishing current scan");
            } else {
                tracing::info!("interrupt: aborting");
            }
        })
    }

    /// Number of signals caught so far. 0 = run, 1 = finish, >1 = abort.
    pub fn level(&self) -> usize {
        self.signals_caught.load(Ordering::SeqCst)
    }

    /// Behave as if a signal arrived. Used by tests.
    pub fn raise(&self) {
        self.signals_caught.fetch_add(1, Ordering::SeqCst);
    }
}
