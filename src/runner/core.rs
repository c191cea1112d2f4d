//! Firefox desktop extension runner.
//!
//! The [`FirefoxDesktopRunner`] sequences one development session:
//!
//! ```text
//! Idle ──setup()──► ProfileReady ──run()──► Running ──exit()──► Exited
//!   └───────────────────run()───────────────────┘   ▲
//!                                                   └─ reload_*()
//! ```
//!
//! Profile preparation, process launch, port allocation and the debugger
//! session are injected collaborators, see [`super::traits`].
//!
//! # Example
//!
//! ```no_run
//! use firefox_extension_runner::runner::{ExtensionRunner, FirefoxDesktopRunner};
//!
//! # async fn example() -> firefox_extension_runner::Result<()> {
//! let mut runner = FirefoxDesktopRunner::builder()
//!     .binary("/usr/bin/firefox")
//!     .extension("./my-extension")
//!     .build()?;
//!
//! runner.run().await?;
//! runner.reload_all_extensions().await?;
//! runner.exit().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::{Error, ReloadFailure, Result};
use crate::identifiers::AddonId;
use crate::remote::RemoteFirefox;

use super::builder::RunnerBuilder;
use super::cleanup::CleanupRegistry;
use super::extension::ExtensionDescriptor;
use super::launcher::LaunchRequest;
use super::options::{ProfileMode, RunnerOptions};
use super::profile::{Profile, default_prefs};
use super::traits::{
    BrowserLauncher, BrowserProcess, Cleanup, ExtensionRunner, PortAllocator, ProfileProvider,
    RemoteConnector,
};

// ============================================================================
// Types
// ============================================================================

/// Lifecycle state of a [`FirefoxDesktopRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Nothing prepared yet.
    Idle,
    /// Profile created and configured.
    ProfileReady,
    /// Browser launched.
    Running,
    /// Browser stopped; the runner cannot be restarted.
    Exited,
}

/// Injected collaborators.
pub(crate) struct Collaborators {
    pub profiles: Arc<dyn ProfileProvider>,
    pub launcher: Arc<dyn BrowserLauncher>,
    pub ports: Arc<dyn PortAllocator>,
    pub connector: Arc<dyn RemoteConnector>,
}

/// Handle on the task watching the browser process.
struct ProcessHandle {
    /// Process ID for logging.
    pid: Option<u32>,
    /// Asks the watcher to kill the process.
    kill_tx: Option<oneshot::Sender<()>>,
    /// Becomes `true` once the process is gone and cleanups have run.
    exited: watch::Receiver<bool>,
}

impl ProcessHandle {
    /// Waits until the watcher has finished.
    async fn wait_exited(&mut self) {
        // An error means the watcher is gone, which also means it is done.
        let _ = self.exited.wait_for(|exited| *exited).await;
    }
}

// ============================================================================
// FirefoxDesktopRunner
// ============================================================================

/// Runs extensions in a desktop Firefox.
pub struct FirefoxDesktopRunner {
    /// Path to the Firefox binary.
    binary: PathBuf,
    /// Extensions in install order.
    extensions: Vec<ExtensionDescriptor>,
    /// Launch and profile options.
    options: RunnerOptions,
    /// Injected collaborators.
    collaborators: Collaborators,

    /// Lifecycle state.
    state: RunnerState,
    /// Profile in use; temporary profiles are deleted when dropped.
    profile: Option<Profile>,
    /// Debugger server port of the running browser.
    debug_port: Option<u16>,
    /// Running browser process.
    process: Option<ProcessHandle>,
    /// Debugger session, absent when extensions were pre-installed.
    remote: Option<RemoteFirefox>,
    /// Successfully installed extensions by source directory.
    reloadable: FxHashMap<PathBuf, AddonId>,
    /// Termination callbacks (shared with the process watcher).
    cleanups: Arc<CleanupRegistry>,
}

impl fmt::Debug for FirefoxDesktopRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirefoxDesktopRunner")
            .field("binary", &self.binary)
            .field("state", &self.state)
            .field("debug_port", &self.debug_port)
            .field("pid", &self.process.as_ref().and_then(|p| p.pid))
            .field("reloadable", &self.reloadable.len())
            .field("cleanups_fired", &self.cleanups.has_fired())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// FirefoxDesktopRunner - Public API
// ============================================================================

impl FirefoxDesktopRunner {
    /// Creates a configuration builder for the runner.
    #[inline]
    #[must_use]
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Returns the extensions in install order.
    #[inline]
    #[must_use]
    pub fn extensions(&self) -> &[ExtensionDescriptor] {
        &self.extensions
    }

    /// Returns the profile directory once prepared.
    #[inline]
    #[must_use]
    pub fn profile_path(&self) -> Option<&Path> {
        self.profile.as_ref().map(Profile::path)
    }

    /// Returns the debugger server port of the running browser.
    #[inline]
    #[must_use]
    pub fn debug_port(&self) -> Option<u16> {
        self.debug_port
    }

    /// Returns the add-on ID installed from `source_dir`.
    #[inline]
    #[must_use]
    pub fn addon_id(&self, source_dir: &Path) -> Option<&AddonId> {
        self.reloadable.get(source_dir)
    }

    /// Creates and configures the profile.
    ///
    /// With `pre_install`, every extension is also installed into the
    /// profile as a proxy file.
    ///
    /// # Errors
    ///
    /// - [`Error::Usage`] if the profile was already prepared
    /// - Errors of the profile provider
    pub async fn setup(&mut self) -> Result<()> {
        if self.state != RunnerState::Idle {
            return Err(Error::usage(format!(
                "Cannot prepare the profile in state {:?}",
                self.state
            )));
        }

        let profiles = &self.collaborators.profiles;
        let profile = match &self.options.profile {
            ProfileMode::Temporary => profiles.create().await?,
            ProfileMode::Copy(source) => profiles.copy_from(source).await?,
            ProfileMode::InPlace(path) => profiles.use_existing(path).await?,
        };

        let prefs = default_prefs(&self.options.custom_prefs);
        profiles.configure(&profile, &prefs).await?;

        if self.options.pre_install {
            for extension in &self.extensions {
                profiles.install_proxy(&profile, extension).await?;
            }
            info!(
                count = self.extensions.len(),
                "Pre-installed extensions into profile"
            );
        }

        debug!(path = %profile.path().display(), "Profile ready");
        self.profile = Some(profile);
        self.state = RunnerState::ProfileReady;
        Ok(())
    }

    /// Waits until the browser exits on its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] if no browser is tracked.
    pub async fn wait_for_exit(&mut self) -> Result<()> {
        let process = self.process.as_mut().ok_or(Error::NotRunning)?;
        process.wait_exited().await;
        Ok(())
    }
}

// ============================================================================
// FirefoxDesktopRunner - Internal API
// ============================================================================

impl FirefoxDesktopRunner {
    /// Creates a runner; see [`RunnerBuilder::build`].
    pub(crate) fn new(
        binary: PathBuf,
        extensions: Vec<ExtensionDescriptor>,
        options: RunnerOptions,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            binary,
            extensions,
            options,
            collaborators,
            state: RunnerState::Idle,
            profile: None,
            debug_port: None,
            process: None,
            remote: None,
            reloadable: FxHashMap::default(),
            cleanups: Arc::new(CleanupRegistry::new()),
        }
    }

    /// Launches the browser and starts watching it.
    async fn launch(&mut self) -> Result<u16> {
        let profile = self
            .profile
            .as_ref()
            .ok_or_else(|| Error::profile("Profile has not been prepared"))?;

        let port = self.collaborators.ports.allocate().await?;
        let request = LaunchRequest {
            binary: self.binary.clone(),
            profile: profile.path().to_path_buf(),
            debug_port: port,
            args: self.options.to_args(),
            env: self.options.env.clone(),
        };

        let process = self.collaborators.launcher.launch(request).await?;
        let pid = process.pid();
        info!(pid, port, "Firefox launched");

        self.process = Some(watch_process(process, Arc::clone(&self.cleanups)));
        self.debug_port = Some(port);
        self.state = RunnerState::Running;
        Ok(port)
    }

    /// Installs every extension over the debugger session.
    async fn install_extensions(&mut self) -> Result<()> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| Error::usage("No debugger session"))?;

        for extension in &self.extensions {
            let addon = remote
                .install_temporary(&extension.source_dir, self.options.open_devtools)
                .await
                .map_err(explain_install_error)?;

            self.reloadable
                .insert(extension.source_dir.clone(), addon.id);
        }

        info!(count = self.reloadable.len(), "Installed temporary add-ons");
        Ok(())
    }

    /// Returns the debugger session used for reloading.
    fn remote(&self) -> Result<&RemoteFirefox> {
        if self.state != RunnerState::Running {
            return Err(Error::NotRunning);
        }

        self.remote.as_ref().ok_or_else(|| {
            Error::usage(
                "Extensions were pre-installed into the profile and cannot be reloaded. \
                 Run without pre_install to enable reloading.",
            )
        })
    }
}

// ============================================================================
// ExtensionRunner Implementation
// ============================================================================

#[async_trait]
impl ExtensionRunner for FirefoxDesktopRunner {
    fn name(&self) -> &str {
        "Firefox Desktop"
    }

    async fn run(&mut self) -> Result<()> {
        match self.state {
            RunnerState::Idle => self.setup().await?,
            RunnerState::ProfileReady => {}
            RunnerState::Running => return Err(Error::usage("Firefox is already running")),
            RunnerState::Exited => {
                return Err(Error::usage(
                    "This runner has exited; create a new runner to start Firefox again",
                ));
            }
        }

        let port = self.launch().await?;

        if self.options.pre_install {
            debug!("Extensions pre-installed, skipping debugger session");
            return Ok(());
        }

        let remote = self.collaborators.connector.connect(port).await?;
        self.remote = Some(remote);
        self.install_extensions().await
    }

    async fn reload_all_extensions(&self) -> Result<Vec<PathBuf>> {
        let remote = self.remote()?;

        let mut reloaded = Vec::new();
        let mut failures = Vec::new();

        for extension in &self.extensions {
            let source_dir = &extension.source_dir;
            let Some(id) = self.reloadable.get(source_dir) else {
                continue;
            };

            match remote.reload(id).await {
                Ok(()) => reloaded.push(source_dir.clone()),
                Err(e) => {
                    warn!(
                        source_dir = %source_dir.display(),
                        error = %e,
                        "Extension reload failed"
                    );
                    failures.push(ReloadFailure {
                        source_dir: source_dir.clone(),
                        error: Box::new(e),
                    });
                }
            }
        }

        if failures.is_empty() {
            info!(count = reloaded.len(), "Reloaded all extensions");
            Ok(reloaded)
        } else {
            Err(Error::ReloadFailed { failures })
        }
    }

    async fn reload_extension_by_source_dir(&self, source_dir: &Path) -> Result<()> {
        let id = self
            .reloadable
            .get(source_dir)
            .ok_or_else(|| Error::not_reloadable(source_dir))?;

        self.remote()?.reload(id).await.map_err(|e| Error::ReloadFailed {
            failures: vec![ReloadFailure {
                source_dir: source_dir.to_path_buf(),
                error: Box::new(e),
            }],
        })
    }

    fn register_cleanup(&self, cleanup: Cleanup) {
        self.cleanups.register(cleanup);
    }

    async fn exit(&mut self) -> Result<()> {
        let mut process = self.process.take().ok_or(Error::NotRunning)?;

        if let Some(remote) = self.remote.take() {
            remote.disconnect();
        }

        if let Some(kill_tx) = process.kill_tx.take() {
            let _ = kill_tx.send(());
        }
        process.wait_exited().await;

        self.reloadable.clear();
        self.debug_port = None;
        self.profile = None;
        self.state = RunnerState::Exited;

        info!(pid = process.pid, "Firefox runner exited");
        Ok(())
    }
}

// ============================================================================
// Private Helpers
// ============================================================================

/// Spawns the task that waits for the browser to terminate.
///
/// The process is killed when asked through the handle, or when the handle
/// is dropped. Cleanups run once it is gone.
fn watch_process(
    mut process: Box<dyn BrowserProcess>,
    cleanups: Arc<CleanupRegistry>,
) -> ProcessHandle {
    let pid = process.pid();
    let (kill_tx, kill_rx) = oneshot::channel::<()>();
    let (exited_tx, exited_rx) = watch::channel(false);

    tokio::spawn(async move {
        let kill_requested = tokio::select! {
            status = process.wait() => {
                match status {
                    Ok(code) => info!(pid, code, "Firefox exited"),
                    Err(e) => warn!(pid, error = %e, "Failed waiting for Firefox"),
                }
                false
            }
            _ = kill_rx => true,
        };

        if kill_requested && let Err(e) = process.kill().await {
            warn!(pid, error = %e, "Failed to kill Firefox");
        }

        cleanups.run_all();
        let _ = exited_tx.send(true);
    });

    ProcessHandle {
        pid,
        kill_tx: Some(kill_tx),
        exited: exited_rx,
    }
}

/// Points users at pre-installation when remote install is unavailable.
fn explain_install_error(error: Error) -> Error {
    match error {
        Error::TempInstallUnsupported { message } => Error::usage(format!(
            "Temporary add-on installation is not supported in this version of Firefox \
             ({message}). Use pre_install to install the extensions into the profile instead."
        )),
        other => other,
    }
}

// ============================================================================
// Tests
// ============================================================================
