//! Callbacks run when the browser process terminates.

// ============================================================================
// Imports
// ============================================================================

use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::traits::Cleanup;

// ============================================================================
// CleanupRegistry
// ============================================================================

/// Termination callbacks, each run exactly once in registration order.
///
/// Callbacks registered after the registry has fired run immediately.
#[derive(Default)]
pub(crate) struct CleanupRegistry {
    state: Mutex<CleanupState>,
}

#[derive(Default)]
struct CleanupState {
    /// Callbacks not yet run.
    callbacks: Vec<Cleanup>,
    /// Set by [`CleanupRegistry::run_all`].
    fired: bool,
}

impl CleanupRegistry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a callback, or runs it now if the registry already fired.
    pub(crate) fn register(&self, cleanup: Cleanup) {
        let late = {
            let mut state = self.state.lock();
            if state.fired {
                Some(cleanup)
            } else {
                state.callbacks.push(cleanup);
                None
            }
        };

        if let Some(cleanup) = late {
            debug!("Browser already exited, running cleanup now");
            run_one(cleanup);
        }
    }

    /// Runs every registered callback.
    ///
    /// Only the first call runs anything.
    pub(crate) fn run_all(&self) {
        let callbacks = {
            let mut state = self.state.lock();
            state.fired = true;
            mem::take(&mut state.callbacks)
        };

        debug!(count = callbacks.len(), "Running cleanup callbacks");
        for cleanup in callbacks {
            run_one(cleanup);
        }
    }

    /// Returns `true` once [`CleanupRegistry::run_all`] has been called.
    pub(crate) fn has_fired(&self) -> bool {
        self.state.lock().fired
    }
}

/// Runs one callback, logging failures and panics.
fn run_one(cleanup: Cleanup) {
    match catch_unwind(AssertUnwindSafe(cleanup)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Cleanup callback failed"),
        Err(_) => error!("Cleanup callback panicked"),
    }
}

// ============================================================================
// Tests
// ============================================================================
