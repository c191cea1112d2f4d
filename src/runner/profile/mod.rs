//! Firefox profile management.
//!
//! This module handles the Firefox profile the runner launches with:
//!
//! - Creating temporary profiles with automatic cleanup
//! - Copying an existing profile into a temporary one
//! - Using an existing profile in place
//! - Writing preferences (`user.js`)
//! - Pre-installing extensions as proxy files
//!
//! # Example
//!
//! ```no_run
//! use firefox_extension_runner::runner::profile::{Profile, default_prefs};
//!
//! # fn example() -> firefox_extension_runner::Result<()> {
//! let profile = Profile::new_temp()?;
//! profile.write_prefs(&default_prefs(&[]))?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};

use super::extension::ExtensionDescriptor;
use super::traits::ProfileProvider;

// ============================================================================
// Submodules
// ============================================================================

/// Firefox preference definitions and serialization.
pub mod preferences;

// ============================================================================
// Re-exports
// ============================================================================

pub use preferences::{FirefoxPreference, PreferenceValue, default_prefs};

// ============================================================================
// Constants
// ============================================================================

/// Header comment for `user.js` file.
const USER_JS_HEADER: &str = "// Firefox extension runner user.js\n\
                              // Auto-generated preferences for extension development\n\n";

/// Prefix of temporary profile directories.
const TEMP_PROFILE_PREFIX: &str = "firefox-extension-runner-";

/// Files that belong to a running Firefox and must not be copied.
const LOCK_FILES: &[&str] = &["lock", ".parentlock", "parent.lock"];

// ============================================================================
// Profile
// ============================================================================

/// A Firefox profile directory.
///
/// Temporary profiles (from [`Profile::new_temp`] and [`Profile::copy_of`])
/// are deleted when the `Profile` is dropped; profiles from
/// [`Profile::from_path`] are left in place.
pub struct Profile {
    /// Optional temporary directory handle (keeps temp dir alive).
    _temp_dir: Option<TempDir>,

    /// Path to the profile directory.
    path: PathBuf,
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("path", &self.path)
            .field("temporary", &self.is_temporary())
            .finish()
    }
}

// ============================================================================
// Profile - Constructors
// ============================================================================

impl Profile {
    /// Creates a new empty temporary profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the directory cannot be created.
    pub fn new_temp() -> Result<Self> {
        let temp_dir = TempDir::with_prefix(TEMP_PROFILE_PREFIX)
            .map_err(|e| Error::profile(format!("Failed to create temp profile: {e}")))?;

        let path = temp_dir.path().to_path_buf();
        debug!(path = %path.display(), "Created temporary profile");

        Ok(Self {
            _temp_dir: Some(temp_dir),
            path,
        })
    }

    /// Creates a temporary copy of an existing profile.
    ///
    /// Lock files of a running Firefox are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if `source` is not a directory or the copy
    /// fails.
    pub fn copy_of(source: &Path) -> Result<Self> {
        if !source.is_dir() {
            return Err(Error::profile(format!(
                "Cannot copy profile, not a directory: {}",
                source.display()
            )));
        }

        let profile = Self::new_temp()?;
        copy_dir_recursive(source, &profile.path).map_err(|e| {
            Error::profile(format!(
                "Failed to copy profile from {}: {}",
                source.display(),
                e
            ))
        })?;

        debug!(
            source = %source.display(),
            path = %profile.path.display(),
            "Copied profile"
        );
        Ok(profile)
    }

    /// Uses an existing profile directory in place.
    ///
    /// If the directory doesn't exist, it is created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the directory cannot be created.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            fs::create_dir_all(&path).map_err(|e| {
                Error::profile(format!(
                    "Failed to create profile directory at {}: {}",
                    path.display(),
                    e
                ))
            })?;
            debug!(path = %path.display(), "Created profile directory");
        } else {
            debug!(path = %path.display(), "Using existing profile directory");
        }

        Ok(Self {
            _temp_dir: None,
            path,
        })
    }
}

// ============================================================================
// Profile - Accessors
// ============================================================================

impl Profile {
    /// Returns the path to the profile directory.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the directory is deleted on drop.
    #[inline]
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self._temp_dir.is_some()
    }
}

// ============================================================================
// Profile - Preferences
// ============================================================================

impl Profile {
    /// Writes preferences to `user.js`, replacing the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the file cannot be written.
    pub fn write_prefs(&self, prefs: &[FirefoxPreference]) -> Result<()> {
        let file_path = self.path.join("user.js");

        let mut content = String::from(USER_JS_HEADER);
        for pref in prefs {
            content.push_str(&pref.to_user_pref_line());
            content.push('\n');
        }

        fs::write(&file_path, content).map_err(|e| {
            Error::profile(format!(
                "Failed to write user.js at {}: {}",
                file_path.display(),
                e
            ))
        })?;

        debug!(
            path = %file_path.display(),
            pref_count = prefs.len(),
            "Wrote preferences to user.js"
        );

        Ok(())
    }
}

// ============================================================================
// Profile - Extensions
// ============================================================================

impl Profile {
    /// Installs an extension as a proxy file.
    ///
    /// Firefox loads `extensions/<gecko id>` files that contain the path of
    /// an unpacked extension, so the source directory is used without
    /// copying.
    ///
    /// # Errors
    ///
    /// - [`Error::Usage`] if the manifest declares no gecko ID
    /// - [`Error::Profile`] if the proxy file cannot be written
    pub fn install_proxy(&self, extension: &ExtensionDescriptor) -> Result<PathBuf> {
        let id = extension.gecko_id().ok_or_else(|| {
            Error::usage(format!(
                "Cannot pre-install {}: manifest.json has no browser_specific_settings.gecko.id",
                extension.source_dir.display()
            ))
        })?;

        let source = extension
            .source_dir
            .canonicalize()
            .unwrap_or_else(|_| extension.source_dir.clone());

        let extensions_dir = self.path.join("extensions");
        fs::create_dir_all(&extensions_dir).map_err(|e| {
            Error::profile(format!(
                "Failed to create {}: {}",
                extensions_dir.display(),
                e
            ))
        })?;

        let proxy = extensions_dir.join(id);
        fs::write(&proxy, source.to_string_lossy().as_bytes()).map_err(|e| {
            Error::profile(format!(
                "Failed to write extension proxy {}: {}",
                proxy.display(),
                e
            ))
        })?;

        debug!(id, proxy = %proxy.display(), "Installed extension proxy file");
        Ok(proxy)
    }
}

// ============================================================================
// FsProfileProvider
// ============================================================================

/// [`ProfileProvider`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProfileProvider;

#[async_trait]
impl ProfileProvider for FsProfileProvider {
    async fn create(&self) -> Result<Profile> {
        Profile::new_temp()
    }

    async fn copy_from(&self, source: &Path) -> Result<Profile> {
        Profile::copy_of(source)
    }

    async fn use_existing(&self, path: &Path) -> Result<Profile> {
        Profile::from_path(path)
    }

    async fn configure(&self, profile: &Profile, prefs: &[FirefoxPreference]) -> Result<()> {
        profile.write_prefs(prefs)
    }

    async fn install_proxy(
        &self,
        profile: &Profile,
        extension: &ExtensionDescriptor,
    ) -> Result<()> {
        profile.install_proxy(extension).map(|_| ())
    }
}

// ============================================================================
// Private Helpers
// ============================================================================

/// Recursively copies a directory, skipping Firefox lock files.
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    if !dst.exists() {
        fs::create_dir_all(dst)?;
    }

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if LOCK_FILES.iter().any(|lock| name == *lock) {
            continue;
        }

        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(&name);

        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
