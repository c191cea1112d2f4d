//! Builder pattern for runner configuration.
//!
//! Provides a fluent API for configuring and creating
//! [`FirefoxDesktopRunner`] instances.
//!
//! # Example
//!
//! ```no_run
//! use firefox_extension_runner::runner::{FirefoxDesktopRunner, RunnerOptions};
//!
//! # fn example() -> firefox_extension_runner::Result<()> {
//! let runner = FirefoxDesktopRunner::builder()
//!     .binary("/usr/bin/firefox")
//!     .extension("./my-extension")
//!     .options(RunnerOptions::new().with_browser_console())
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};

use super::connect::{TcpPortAllocator, TcpRemoteConnector};
use super::core::{Collaborators, FirefoxDesktopRunner};
use super::extension::ExtensionDescriptor;
use super::launcher::FirefoxLauncher;
use super::options::RunnerOptions;
use super::profile::FsProfileProvider;
use super::traits::{BrowserLauncher, PortAllocator, ProfileProvider, RemoteConnector};

// ============================================================================
// RunnerBuilder
// ============================================================================

/// Builder for configuring a [`FirefoxDesktopRunner`].
///
/// Use [`FirefoxDesktopRunner::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct RunnerBuilder {
    /// Path to Firefox binary.
    binary: Option<PathBuf>,
    /// Extension source directories, in install order.
    extensions: Vec<PathBuf>,
    /// Launch and profile options.
    options: RunnerOptions,
    /// Profile provider override.
    profiles: Option<Arc<dyn ProfileProvider>>,
    /// Launcher override.
    launcher: Option<Arc<dyn BrowserLauncher>>,
    /// Port allocator override.
    ports: Option<Arc<dyn PortAllocator>>,
    /// Connector override.
    connector: Option<Arc<dyn RemoteConnector>>,
}

impl fmt::Debug for RunnerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerBuilder")
            .field("binary", &self.binary)
            .field("extensions", &self.extensions)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RunnerBuilder Implementation
// ============================================================================

impl RunnerBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path to the Firefox binary executable.
    #[inline]
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Adds an unpacked extension directory.
    #[inline]
    #[must_use]
    pub fn extension(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.extensions.push(source_dir.into());
        self
    }

    /// Adds multiple unpacked extension directories.
    #[inline]
    #[must_use]
    pub fn extensions(mut self, dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.extensions.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Sets launch and profile options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the profile provider.
    #[inline]
    #[must_use]
    pub fn profile_provider(mut self, profiles: Arc<dyn ProfileProvider>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Replaces the browser launcher.
    #[inline]
    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Replaces the debugger port allocator.
    #[inline]
    #[must_use]
    pub fn port_allocator(mut self, ports: Arc<dyn PortAllocator>) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Replaces the remote connector.
    #[inline]
    #[must_use]
    pub fn remote_connector(mut self, connector: Arc<dyn RemoteConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the runner with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if binary or extensions are not set
    /// - [`Error::FirefoxNotFound`] if the binary path doesn't exist
    /// - [`Error::Config`] if an extension has no readable manifest, or
    ///   lacks a gecko ID while pre-installing
    /// - [`Error::Config`] if the options are invalid
    pub fn build(self) -> Result<FirefoxDesktopRunner> {
        let binary = self.validate_binary()?;
        let extensions = self.validate_extensions()?;
        self.options.validate().map_err(Error::config)?;

        let collaborators = Collaborators {
            profiles: self
                .profiles
                .unwrap_or_else(|| Arc::new(FsProfileProvider)),
            launcher: self.launcher.unwrap_or_else(|| Arc::new(FirefoxLauncher)),
            ports: self
                .ports
                .unwrap_or_else(|| Arc::new(TcpPortAllocator::default())),
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(TcpRemoteConnector::new(self.options.retry))),
        };

        Ok(FirefoxDesktopRunner::new(
            binary,
            extensions,
            self.options,
            collaborators,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl RunnerBuilder {
    /// Validates the binary path configuration.
    fn validate_binary(&self) -> Result<PathBuf> {
        let binary = self.binary.clone().ok_or_else(|| {
            Error::config(
                "Firefox binary path is required. Use .binary() to set it.\n\
                 Example: FirefoxDesktopRunner::builder().binary(\"/usr/bin/firefox\")",
            )
        })?;

        if !binary.exists() {
            return Err(Error::firefox_not_found(&binary));
        }

        Ok(binary)
    }

    /// Validates the extension directories and reads their manifests.
    fn validate_extensions(&self) -> Result<Vec<ExtensionDescriptor>> {
        if self.extensions.is_empty() {
            return Err(Error::config(
                "At least one extension is required. Use .extension() to add one.\n\
                 Example: FirefoxDesktopRunner::builder().extension(\"./my-extension\")",
            ));
        }

        let mut descriptors = Vec::with_capacity(self.extensions.len());
        for dir in &self.extensions {
            if !dir.is_dir() {
                return Err(Error::config(format!(
                    "Extension directory not found at: {}",
                    dir.display()
                )));
            }

            let descriptor = ExtensionDescriptor::from_dir(dir)?;
            if self.options.pre_install && descriptor.gecko_id().is_none() {
                return Err(Error::config(format!(
                    "Extension at {} needs browser_specific_settings.gecko.id in its \
                     manifest to be pre-installed",
                    dir.display()
                )));
            }
            descriptors.push(descriptor);
        }

        Ok(descriptors)
    }
}

// ============================================================================
// Tests
// ============================================================================
