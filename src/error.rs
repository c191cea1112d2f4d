//! Error types for the Firefox extension runner.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use std::path::Path;
//!
//! use firefox_extension_runner::{Result, RemoteFirefox};
//!
//! async fn example(remote: &RemoteFirefox) -> Result<()> {
//!     let addon = remote
//!         .install_temporary(Path::new("/path/to/extension"), false)
//!         .await?;
//!     remote.reload(&addon.id).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Profile`], [`Error::FirefoxNotFound`], [`Error::ProcessLaunchFailed`] |
//! | Transport | [`Error::FrameLength`], [`Error::MalformedMessage`], [`Error::Connection`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Remote`], [`Error::RemoteRequest`], [`Error::Protocol`], [`Error::InvalidArgument`] |
//! | Capability gap | [`Error::TempInstallUnsupported`], [`Error::ReloadUnsupported`] |
//! | Usage | [`Error::Usage`], [`Error::AddonNotInstalled`], [`Error::NotReloadable`], [`Error::NotRunning`], [`Error::TooManyRetries`] |
//! | Aggregate | [`Error::ReloadFailed`] |
//! | External | [`Error::Io`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{Error as IoError, ErrorKind};
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::AddonId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when runner configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Profile error.
    ///
    /// Returned when Firefox profile creation or setup fails.
    #[error("Profile error: {message}")]
    Profile {
        /// Description of the profile error.
        message: String,
    },

    /// Firefox binary not found at path.
    #[error("Firefox not found at: {path}")]
    FirefoxNotFound {
        /// Path where Firefox was expected.
        path: PathBuf,
    },

    /// Failed to launch Firefox process.
    #[error("Failed to launch Firefox: {message}")]
    ProcessLaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Frame length prefix could not be parsed.
    ///
    /// Fatal: the byte stream can no longer be trusted and the connection
    /// is torn down.
    #[error("Invalid frame length prefix: {prefix:?}")]
    FrameLength {
        /// The raw prefix that failed to parse.
        prefix: String,
    },

    /// A complete frame carried a payload that is not a valid message.
    ///
    /// Recoverable: the frame is dropped and parsing continues.
    #[error("Malformed message payload: {message}")]
    MalformedMessage {
        /// Decoder error description.
        message: String,
    },

    /// Connection to the debugger server failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while a request was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// An actor replied with an error payload.
    #[error("Remote error {error}: {message}")]
    Remote {
        /// Error code reported by the actor (e.g. `unrecognizedPacketType`).
        error: String,
        /// Human-readable message reported by the actor.
        message: String,
    },

    /// A remote request failed; wraps the underlying failure with the
    /// request that caused it.
    #[error("Remote Firefox: {operation}() error: {source}")]
    RemoteRequest {
        /// Request type that failed.
        operation: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Protocol violation or unexpected response.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Invalid argument.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Capability Gaps
    // ========================================================================
    /// The remote Firefox does not expose an add-ons actor.
    #[error("Temporary add-on installation is not supported: {message}")]
    TempInstallUnsupported {
        /// Details from the discovery step.
        message: String,
    },

    /// The remote Firefox cannot reload add-ons.
    #[error(
        "This Firefox version does not support add-on reloading. \
         Re-run without automatic reloading to work around this."
    )]
    ReloadUnsupported,

    // ========================================================================
    // Usage Errors
    // ========================================================================
    /// A user-facing error that should be shown without a backtrace.
    #[error("{message}")]
    Usage {
        /// Message to present to the user.
        message: String,
    },

    /// The add-on is not installed in the remote Firefox.
    #[error("The remote Firefox does not have your extension installed: {addon_id}")]
    AddonNotInstalled {
        /// The add-on ID that was looked up.
        addon_id: AddonId,
    },

    /// No add-on has been installed from this source directory.
    #[error(
        "Extension not reloadable: no add-on has been installed from {}",
        .source_dir.display()
    )]
    NotReloadable {
        /// Source directory that was requested.
        source_dir: PathBuf,
    },

    /// The runner does not track a running browser process.
    #[error("No running Firefox instance is tracked")]
    NotRunning,

    /// A bounded retry loop was exhausted.
    #[error("Too many retries on {operation} after {attempts} attempts")]
    TooManyRetries {
        /// Operation that was retried.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
    },

    // ========================================================================
    // Aggregate Errors
    // ========================================================================
    /// One or more extensions failed to reload.
    #[error("Extension reload error: {}", ReloadFailures(.failures))]
    ReloadFailed {
        /// Every failing source directory with its error.
        failures: Vec<ReloadFailure>,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// ReloadFailure
// ============================================================================

/// A single failed reload inside [`Error::ReloadFailed`].
#[derive(Debug)]
pub struct ReloadFailure {
    /// Source directory of the extension that failed to reload.
    pub source_dir: PathBuf,
    /// Why it failed.
    pub error: Box<Error>,
}

/// Display adapter joining failures as `dir: error; dir: error`.
struct ReloadFailures<'a>(&'a [ReloadFailure]);

impl fmt::Display for ReloadFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, failure) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.source_dir.display(), failure.error)?;
        }
        Ok(())
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a profile error.
    #[inline]
    pub fn profile(message: impl Into<String>) -> Self {
        Self::Profile {
            message: message.into(),
        }
    }

    /// Creates a Firefox not found error.
    #[inline]
    pub fn firefox_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FirefoxNotFound { path: path.into() }
    }

    /// Creates a process launch failed error.
    #[inline]
    pub fn process_launch_failed(err: IoError) -> Self {
        Self::ProcessLaunchFailed {
            message: err.to_string(),
        }
    }

    /// Creates a frame length error from the raw prefix bytes.
    #[inline]
    pub fn frame_length(prefix: &[u8]) -> Self {
        Self::FrameLength {
            prefix: String::from_utf8_lossy(prefix).into_owned(),
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed_message(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a remote actor error.
    #[inline]
    pub fn remote(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            error: error.into(),
            message: message.into(),
        }
    }

    /// Wraps a failed remote request with the request type.
    #[inline]
    pub fn remote_request(operation: impl Into<String>, source: Error) -> Self {
        Self::RemoteRequest {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a temporary-install-unsupported error.
    #[inline]
    pub fn temp_install_unsupported(message: impl Into<String>) -> Self {
        Self::TempInstallUnsupported {
            message: message.into(),
        }
    }

    /// Creates a usage error.
    #[inline]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Creates an add-on not installed error.
    #[inline]
    pub fn addon_not_installed(addon_id: AddonId) -> Self {
        Self::AddonNotInstalled { addon_id }
    }

    /// Creates a not reloadable error.
    #[inline]
    pub fn not_reloadable(source_dir: impl Into<PathBuf>) -> Self {
        Self::NotReloadable {
            source_dir: source_dir.into(),
        }
    }

    /// Creates a too many retries error.
    #[inline]
    pub fn too_many_retries(operation: impl Into<String>, attempts: u32) -> Self {
        Self::TooManyRetries {
            operation: operation.into(),
            attempts,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::FrameLength { .. }
        )
    }

    /// Returns `true` if the OS refused the connection.
    ///
    /// Refusal means nothing listens on the port yet (or the port is free),
    /// which retry loops treat as a non-terminal signal.
    #[inline]
    #[must_use]
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == ErrorKind::ConnectionRefused)
    }

    /// Returns `true` if the remote Firefox lacks a required feature.
    #[inline]
    #[must_use]
    pub fn is_capability_gap(&self) -> bool {
        match self {
            Self::TempInstallUnsupported { .. } | Self::ReloadUnsupported => true,
            Self::RemoteRequest { source, .. } => source.is_capability_gap(),
            _ => false,
        }
    }

    /// Returns `true` if this error should be shown to the user without a
    /// backtrace.
    #[inline]
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::Usage { .. }
                | Self::AddonNotInstalled { .. }
                | Self::NotReloadable { .. }
                | Self::NotRunning
                | Self::TooManyRetries { .. }
                | Self::ReloadUnsupported
        )
    }

    /// Returns the per-directory failures of an aggregate reload error.
    #[inline]
    #[must_use]
    pub fn reload_failures(&self) -> Option<&[ReloadFailure]> {
        match self {
            Self::ReloadFailed { failures } => Some(failures),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_remote_request_display_wraps_source() {
        let err = Error::remote_request(
            "installTemporaryAddon",
            Error::remote("fileNotFound", "no such dir"),
        );
        assert_eq!(
            err.to_string(),
            "Remote Firefox: installTemporaryAddon() error: Remote error fileNotFound: no such dir"
        );
    }

    #[test]
    fn test_reload_failed_lists_every_directory() {
        let err = Error::ReloadFailed {
            failures: vec![
                ReloadFailure {
                    source_dir: PathBuf::from("/ext/a"),
                    error: Box::new(Error::ConnectionClosed),
                },
                ReloadFailure {
                    source_dir: PathBuf::from("/ext/b"),
                    error: Box::new(Error::ReloadUnsupported),
                },
            ],
        };

        let text = err.to_string();
        assert!(text.contains("/ext/a: Connection closed"));
        assert!(text.contains("/ext/b: "));
        assert_eq!(err.reload_failures().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_is_connection_refused() {
        let refused: Error = IoError::new(ErrorKind::ConnectionRefused, "refused").into();
        let denied: Error = IoError::new(ErrorKind::PermissionDenied, "denied").into();

        assert!(refused.is_connection_refused());
        assert!(!denied.is_connection_refused());
    }

    #[test]
    fn test_is_capability_gap() {
        assert!(Error::temp_install_unsupported("no addonsActor").is_capability_gap());
        assert!(Error::ReloadUnsupported.is_capability_gap());
        assert!(
            Error::remote_request("listTabs", Error::temp_install_unsupported("x"))
                .is_capability_gap()
        );
        assert!(!Error::ConnectionClosed.is_capability_gap());
    }

    #[test]
    fn test_is_usage_error() {
        assert!(Error::not_reloadable("/ext").is_usage_error());
        assert!(Error::too_many_retries("connect", 3).is_usage_error());
        assert!(Error::NotRunning.is_usage_error());
        assert!(!Error::connection("test").is_usage_error());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::frame_length(b"ab").is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_frame_length_keeps_prefix() {
        let err = Error::frame_length(b"1x2");
        assert!(matches!(err, Error::FrameLength { ref prefix } if prefix == "1x2"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
