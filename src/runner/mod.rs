//! Extension runners.
//!
//! A runner prepares a profile, launches Firefox, installs the extensions
//! and reloads them on request until the browser exits.
//!
//! # Example
//!
//! ```no_run
//! use firefox_extension_runner::runner::{ExtensionRunner, FirefoxDesktopRunner, RunnerOptions};
//!
//! # async fn example() -> firefox_extension_runner::Result<()> {
//! let mut runner = FirefoxDesktopRunner::builder()
//!     .binary("/usr/bin/firefox")
//!     .extension("./my-extension")
//!     .options(RunnerOptions::new().with_start_url("https://example.com"))
//!     .build()?;
//!
//! runner.run().await?;
//! runner.reload_extension_by_source_dir("./my-extension".as_ref()).await?;
//! runner.exit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`RunnerBuilder`] with validation |
//! | `connect` | TCP port allocation and session connection |
//! | `core` | [`FirefoxDesktopRunner`] state machine |
//! | `extension` | Extension source directories and manifests |
//! | `launcher` | Firefox process launch |
//! | `multi` | [`MultiExtensionRunner`] |
//! | `options` | [`RunnerOptions`] |
//! | `profile` | Profiles and preferences |
//! | `traits` | [`ExtensionRunner`] and collaborator traits |

// ============================================================================
// Submodules
// ============================================================================

/// Runner builder.
pub mod builder;

/// Termination callbacks.
pub(crate) mod cleanup;

/// Default TCP collaborators.
pub mod connect;

/// Desktop runner.
pub mod core;

/// Extension descriptors.
pub mod extension;

/// Firefox process launch.
pub mod launcher;

/// Fan-out runner.
pub mod multi;

/// Runner options.
pub mod options;

/// Firefox profiles.
pub mod profile;

/// Runner contract and collaborators.
pub mod traits;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::RunnerBuilder;
pub use connect::{TcpPortAllocator, TcpRemoteConnector};
pub use core::{FirefoxDesktopRunner, RunnerState};
pub use extension::ExtensionDescriptor;
pub use launcher::{ChildProcess, FirefoxLauncher, LaunchRequest};
pub use multi::MultiExtensionRunner;
pub use options::{ProfileMode, RunnerOptions};
pub use profile::{FirefoxPreference, FsProfileProvider, PreferenceValue, Profile, default_prefs};
pub use traits::{
    BrowserLauncher, BrowserProcess, Cleanup, ExtensionRunner, PortAllocator, ProfileProvider,
    RemoteConnector,
};
