//! Runner contract and injected collaborators.
//!
//! [`ExtensionRunner`] is what callers drive. The other traits are the seams
//! the desktop runner is built on, so its state machine can run against
//! fakes:
//!
//! | Trait | Default |
//! |-------|---------|
//! | [`ProfileProvider`] | [`FsProfileProvider`](super::profile::FsProfileProvider) |
//! | [`BrowserLauncher`] | [`FirefoxLauncher`](super::launcher::FirefoxLauncher) |
//! | [`PortAllocator`] | [`TcpPortAllocator`](super::connect::TcpPortAllocator) |
//! | [`RemoteConnector`] | [`TcpRemoteConnector`](super::connect::TcpRemoteConnector) |

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::remote::RemoteFirefox;

use super::extension::ExtensionDescriptor;
use super::launcher::LaunchRequest;
use super::profile::{FirefoxPreference, Profile};

// ============================================================================
// Types
// ============================================================================

/// Callback run once the browser process has terminated.
///
/// Errors are logged, never propagated.
pub type Cleanup = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

// ============================================================================
// ExtensionRunner
// ============================================================================

/// Runs extensions in a browser and reloads them on demand.
#[async_trait]
pub trait ExtensionRunner: Send + Sync {
    /// Human-readable runner name.
    fn name(&self) -> &str;

    /// Prepares the profile, launches the browser and installs the
    /// extensions.
    async fn run(&mut self) -> Result<()>;

    /// Reloads every installed extension and returns their source
    /// directories.
    ///
    /// All extensions are attempted; failures are reported together as
    /// [`Error::ReloadFailed`](crate::Error::ReloadFailed).
    async fn reload_all_extensions(&self) -> Result<Vec<PathBuf>>;

    /// Reloads the extension installed from `source_dir`.
    async fn reload_extension_by_source_dir(&self, source_dir: &Path) -> Result<()>;

    /// Registers a callback for browser termination.
    fn register_cleanup(&self, cleanup: Cleanup);

    /// Stops the browser and waits for cleanups to finish.
    async fn exit(&mut self) -> Result<()>;
}

// ============================================================================
// Collaborators
// ============================================================================

/// Creates and prepares Firefox profiles.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Creates an empty temporary profile.
    async fn create(&self) -> Result<Profile>;

    /// Creates a temporary copy of the profile at `source`.
    async fn copy_from(&self, source: &Path) -> Result<Profile>;

    /// Uses the profile at `path` in place.
    async fn use_existing(&self, path: &Path) -> Result<Profile>;

    /// Writes preferences into the profile.
    async fn configure(&self, profile: &Profile, prefs: &[FirefoxPreference]) -> Result<()>;

    /// Installs an extension into the profile before launch.
    async fn install_proxy(&self, profile: &Profile, extension: &ExtensionDescriptor) -> Result<()>;
}

/// Starts browser processes.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launches a browser.
    async fn launch(&self, request: LaunchRequest) -> Result<Box<dyn BrowserProcess>>;
}

/// A running browser process.
#[async_trait]
pub trait BrowserProcess: Send {
    /// OS process ID, if known.
    fn pid(&self) -> Option<u32>;

    /// Waits for the process to exit and returns its exit code.
    async fn wait(&mut self) -> Result<Option<i32>>;

    /// Terminates the process and waits until it is gone.
    async fn kill(&mut self) -> Result<()>;
}

/// Picks the port for the debugger server.
#[async_trait]
pub trait PortAllocator: Send + Sync {
    /// Returns a port nothing listens on.
    async fn allocate(&self) -> Result<u16>;
}

/// Opens an add-on session to a launched browser.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Connects to the debugger server on `port`.
    async fn connect(&self, port: u16) -> Result<RemoteFirefox>;
}
