//! Firefox Extension Runner - Run and hot-reload WebExtensions in Firefox.
//!
//! This library launches a desktop Firefox, installs unpacked extensions as
//! temporary add-ons over the remote debugging protocol and reloads them
//! while you develop.
//!
//! # Architecture
//!
//! The runner follows a client-server model:
//!
//! - **Local End (Rust)**: Sends requests to actors, correlates replies
//! - **Remote End (Firefox)**: Debugger server started with
//!   `-start-debugger-server <port>`
//!
//! Key design principles:
//!
//! - Each [`FirefoxDesktopRunner`] owns: profile + Firefox process + session
//! - Protocol units are JSON objects framed as `<length>:<json>`
//! - Replies are matched to requests in send order, per actor
//! - Cleanups run exactly once when the browser terminates
//!
//! # Quick Start
//!
//! ```no_run
//! use firefox_extension_runner::{ExtensionRunner, FirefoxDesktopRunner, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Build runner with Firefox binary and extension paths
//!     let mut runner = FirefoxDesktopRunner::builder()
//!         .binary("/path/to/firefox")
//!         .extension("/path/to/extension")
//!         .build()?;
//!
//!     // Launch Firefox and install the extension
//!     runner.run().await?;
//!
//!     // Pick up source changes
//!     let reloaded = runner.reload_all_extensions().await?;
//!     println!("Reloaded {} extension(s)", reloaded.len());
//!
//!     runner.exit().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Debugger protocol messages and framing |
//! | [`transport`] | TCP connection and retry helpers |
//! | [`remote`] | Add-on management session |
//! | [`runner`] | Extension runners |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for actors and add-ons.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Remote debugging protocol message types.
///
/// Defines the message structure and the length-prefixed frame codec.
pub mod protocol;

/// Debugger server transport layer.
///
/// Handles the TCP connection, request correlation and connect retries.
pub mod transport;

/// Add-on management on a running Firefox.
///
/// Use [`RemoteFirefox`] to install, find and reload add-ons.
pub mod remote;

/// Extension runners.
///
/// Use [`FirefoxDesktopRunner::builder()`] to create a configured runner.
pub mod runner;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, ReloadFailure, Result};

// Identifier types
pub use identifiers::{ActorId, AddonId};

// Remote types
pub use remote::{Addon, RemoteFirefox};

// Runner types
pub use runner::{
    Cleanup, ExtensionRunner, FirefoxDesktopRunner, MultiExtensionRunner, ProfileMode,
    RunnerBuilder, RunnerOptions, RunnerState,
};

// Transport types
pub use transport::{Connection, RetryPolicy};
