//! Runner configuration.
//!
//! Provides a type-safe interface for how Firefox is prepared and launched:
//! which profile to use, extra preferences and arguments, and how long to
//! wait for the debugger server.
//!
//! # Example
//!
//! ```ignore
//! use firefox_extension_runner::runner::RunnerOptions;
//!
//! let options = RunnerOptions::new()
//!     .with_profile_copy("/home/me/.mozilla/firefox/dev")
//!     .with_start_url("https://example.com")
//!     .with_browser_console();
//!
//! let args = options.to_args();
//! // ["--url", "https://example.com", "-jsconsole"]
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use crate::transport::RetryPolicy;

use super::profile::{FirefoxPreference, PreferenceValue};

// ============================================================================
// ProfileMode
// ============================================================================

/// Where the runner gets its Firefox profile from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProfileMode {
    /// A fresh temporary profile, deleted on exit.
    #[default]
    Temporary,

    /// A temporary copy of an existing profile; the original is untouched.
    Copy(PathBuf),

    /// An existing profile used in place; changes are kept.
    InPlace(PathBuf),
}

impl ProfileMode {
    /// Returns the source profile path, if any.
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Temporary => None,
            Self::Copy(path) | Self::InPlace(path) => Some(path),
        }
    }
}

// ============================================================================
// RunnerOptions
// ============================================================================

/// Firefox runner configuration.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Profile source.
    pub profile: ProfileMode,

    /// Install extensions into the profile instead of over the debugger.
    ///
    /// Pre-installed extensions cannot be reloaded.
    pub pre_install: bool,

    /// Preferences written after the built-in ones (later entries win).
    pub custom_prefs: Vec<FirefoxPreference>,

    /// Additional command-line arguments.
    pub extra_args: Vec<String>,

    /// Additional environment variables for the browser process.
    pub env: Vec<(String, String)>,

    /// Pages opened on startup.
    pub start_urls: Vec<String>,

    /// Open the browser console on startup.
    pub browser_console: bool,

    /// Open developer tools for each installed extension.
    pub open_devtools: bool,

    /// How long to wait for the debugger server.
    pub retry: RetryPolicy,
}

// ============================================================================
// Builder Methods
// ============================================================================

impl RunnerOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a temporary copy of an existing profile.
    #[inline]
    #[must_use]
    pub fn with_profile_copy(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile = ProfileMode::Copy(path.into());
        self
    }

    /// Uses an existing profile in place, keeping changes.
    #[inline]
    #[must_use]
    pub fn with_profile_in_place(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile = ProfileMode::InPlace(path.into());
        self
    }

    /// Installs extensions into the profile before launch.
    #[inline]
    #[must_use]
    pub fn with_pre_install(mut self) -> Self {
        self.pre_install = true;
        self
    }

    /// Adds a custom preference.
    #[inline]
    #[must_use]
    pub fn with_pref(mut self, key: impl Into<String>, value: impl Into<PreferenceValue>) -> Self {
        self.custom_prefs.push(FirefoxPreference::new(key, value));
        self
    }

    /// Adds a custom command-line argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Adds multiple custom command-line arguments.
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the browser process.
    #[inline]
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Opens a page on startup.
    #[inline]
    #[must_use]
    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_urls.push(url.into());
        self
    }

    /// Opens the browser console on startup.
    #[inline]
    #[must_use]
    pub fn with_browser_console(mut self) -> Self {
        self.browser_console = true;
        self
    }

    /// Opens developer tools for each installed extension.
    #[inline]
    #[must_use]
    pub fn with_devtools(mut self) -> Self {
        self.open_devtools = true;
        self
    }

    /// Sets how long to wait for the debugger server.
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl RunnerOptions {
    /// Converts options to Firefox command-line arguments.
    ///
    /// Profile and debugger arguments are added by the launcher.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(2 * self.start_urls.len() + 1 + self.extra_args.len());

        for url in &self.start_urls {
            args.push("--url".to_string());
            args.push(url.clone());
        }

        if self.browser_console {
            args.push("-jsconsole".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Validates the options configuration.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = self.profile.path()
            && !path.is_dir()
        {
            return Err(format!(
                "Profile directory not found at: {}",
                path.display()
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err("Retry policy needs at least one attempt".to_string());
        }

        if let Some(pref) = self.custom_prefs.iter().find(|p| p.key.is_empty()) {
            return Err(format!("Preference with empty name: {pref:?}"));
        }

        if self.env.iter().any(|(key, _)| key.is_empty() || key.contains('=')) {
            return Err("Environment variable names must be non-empty and contain no '='".into());
        }

        Ok(())
    }

    /// Returns `true` if the profile is deleted on exit.
    #[inline]
    #[must_use]
    pub fn is_temporary_profile(&self) -> bool {
        !matches!(self.profile, ProfileMode::InPlace(_))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn test_new_creates_default() {
        let options = RunnerOptions::new();
        assert_eq!(options.profile, ProfileMode::Temporary);
        assert!(!options.pre_install);
        assert!(options.custom_prefs.is_empty());
        assert!(options.to_args().is_empty());
        assert_eq!(options.retry, RetryPolicy::default());
    }

    #[test]
    fn test_to_args_order() {
        let options = RunnerOptions::new()
            .with_start_url("https://a.example")
            .with_start_url("https://b.example")
            .with_browser_console()
            .with_args(["-private", "-safe-mode"]);

        assert_eq!(
            options.to_args(),
            vec![
                "--url",
                "https://a.example",
                "--url",
                "https://b.example",
                "-jsconsole",
                "-private",
                "-safe-mode",
            ]
        );
    }

    #[test]
    fn test_profile_modes() {
        let copy = RunnerOptions::new().with_profile_copy("/p");
        assert_eq!(copy.profile, ProfileMode::Copy("/p".into()));
        assert!(copy.is_temporary_profile());

        let in_place = RunnerOptions::new().with_profile_in_place("/p");
        assert_eq!(in_place.profile.path(), Some(&PathBuf::from("/p")));
        assert!(!in_place.is_temporary_profile());
    }

    #[test]
    fn test_validate_valid() {
        let temp = tempfile::tempdir().expect("temp dir");
        let options = RunnerOptions::new()
            .with_profile_copy(temp.path())
            .with_pref("browser.startup.page", 0)
            .with_env("MOZ_LOG", "addons:5");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_profile() {
        let options = RunnerOptions::new().with_profile_in_place("/nonexistent/profile");
        assert!(options.validate().unwrap_err().contains("Profile directory"));
    }

    #[test]
    fn test_validate_zero_attempts() {
        let options =
            RunnerOptions::new().with_retry(RetryPolicy::new(0, Duration::from_millis(10)));
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_bad_env_name() {
        let options = RunnerOptions::new().with_env("A=B", "c");
        assert!(options.validate().is_err());
    }
}
