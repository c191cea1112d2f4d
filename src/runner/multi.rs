//! Drives several extension runners as one.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::traits::{Cleanup, ExtensionRunner};

// ============================================================================
// MultiExtensionRunner
// ============================================================================

/// Fans every operation out to a set of runners.
///
/// Reload failures of all runners are merged into one
/// [`Error::ReloadFailed`].
pub struct MultiExtensionRunner {
    runners: Vec<Box<dyn ExtensionRunner>>,
}

impl MultiExtensionRunner {
    /// Wraps `runners`, operated in the given order.
    #[must_use]
    pub fn new(runners: Vec<Box<dyn ExtensionRunner>>) -> Self {
        Self { runners }
    }

    /// Returns the number of wrapped runners.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.runners.len()
    }

    /// Returns `true` if no runner is wrapped.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

#[async_trait]
impl ExtensionRunner for MultiExtensionRunner {
    fn name(&self) -> &str {
        "Multi Extension Runner"
    }

    async fn run(&mut self) -> Result<()> {
        for runner in &mut self.runners {
            debug!(runner = runner.name(), "Starting runner");
            runner.run().await?;
        }
        Ok(())
    }

    async fn reload_all_extensions(&self) -> Result<Vec<PathBuf>> {
        let mut reloaded = Vec::new();
        let mut failures = Vec::new();
        let mut first_error = None;

        for runner in &self.runners {
            match runner.reload_all_extensions().await {
                Ok(dirs) => reloaded.extend(dirs),
                Err(Error::ReloadFailed { failures: more }) => failures.extend(more),
                Err(e) => {
                    warn!(runner = runner.name(), error = %e, "Runner could not reload");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if failures.is_empty() {
            Ok(reloaded)
        } else {
            Err(Error::ReloadFailed { failures })
        }
    }

    async fn reload_extension_by_source_dir(&self, source_dir: &Path) -> Result<()> {
        for runner in &self.runners {
            match runner.reload_extension_by_source_dir(source_dir).await {
                Err(Error::NotReloadable { .. }) => continue,
                result => return result,
            }
        }
        Err(Error::not_reloadable(source_dir))
    }

    fn register_cleanup(&self, cleanup: Cleanup) {
        if self.runners.is_empty() {
            if let Err(e) = cleanup() {
                warn!(error = %e, "Cleanup callback failed");
            }
            return;
        }

        let shared = SharedCleanup::new(cleanup, self.runners.len());
        for runner in &self.runners {
            let shared = Arc::clone(&shared);
            runner.register_cleanup(Box::new(move || shared.finish_one()));
        }
    }

    async fn exit(&mut self) -> Result<()> {
        let results = join_all(self.runners.iter_mut().map(|runner| runner.exit())).await;

        let total = results.len();
        let mut not_running = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(()) => {}
                Err(Error::NotRunning) => not_running += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None if total > 0 && not_running == total => Err(Error::NotRunning),
            None => Ok(()),
        }
    }
}

// ============================================================================
// SharedCleanup
// ============================================================================

/// One callback shared by several runners; runs when the last one finishes.
struct SharedCleanup {
    remaining: AtomicUsize,
    cleanup: Mutex<Option<Cleanup>>,
}

impl SharedCleanup {
    fn new(cleanup: Cleanup, runners: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(runners),
            cleanup: Mutex::new(Some(cleanup)),
        })
    }

    fn finish_one(&self) -> Result<()> {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return Ok(());
        }
        match self.cleanup.lock().take() {
            Some(cleanup) => cleanup(),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
