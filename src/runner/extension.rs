//! Extension source directories.

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// ExtensionDescriptor
// ============================================================================

/// An unpacked extension to run: its source directory and parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDescriptor {
    /// Directory containing `manifest.json`.
    pub source_dir: PathBuf,
    /// Parsed `manifest.json`.
    pub manifest: Value,
}

impl ExtensionDescriptor {
    /// Creates a descriptor from an already parsed manifest.
    #[inline]
    #[must_use]
    pub fn new(source_dir: impl Into<PathBuf>, manifest: Value) -> Self {
        Self {
            source_dir: source_dir.into(),
            manifest,
        }
    }

    /// Reads `manifest.json` from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the manifest is missing or not JSON.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let source_dir = dir.into();
        let manifest_path = source_dir.join("manifest.json");

        let content = fs::read_to_string(&manifest_path).map_err(|e| {
            Error::config(format!(
                "Extension manifest not found at {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        let manifest: Value = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Invalid manifest.json at {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        Ok(Self::new(source_dir, manifest))
    }

    /// Returns the source directory.
    #[inline]
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Returns the gecko add-on ID declared in the manifest.
    ///
    /// Looks in `browser_specific_settings.gecko.id`, then in the older
    /// `applications.gecko.id`.
    #[must_use]
    pub fn gecko_id(&self) -> Option<&str> {
        ["/browser_specific_settings/gecko/id", "/applications/gecko/id"]
            .into_iter()
            .find_map(|pointer| self.manifest.pointer(pointer).and_then(Value::as_str))
    }

    /// Returns the extension name from the manifest.
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.manifest.get("name").and_then(Value::as_str)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::testing::write_extension;

    #[test]
    fn test_from_dir_reads_manifest() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dir = write_extension(temp.path(), "hello", Some("hello@example.com"));

        let extension = ExtensionDescriptor::from_dir(&dir).expect("descriptor");
        assert_eq!(extension.source_dir(), dir.as_path());
        assert_eq!(extension.name(), Some("hello"));
        assert_eq!(extension.gecko_id(), Some("hello@example.com"));
    }

    #[test]
    fn test_from_dir_without_manifest() {
        let temp = tempfile::tempdir().expect("temp dir");
        let err = ExtensionDescriptor::from_dir(temp.path()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_from_dir_with_invalid_manifest() {
        let temp = tempfile::tempdir().expect("temp dir");
        fs::write(temp.path().join("manifest.json"), "{ not json").expect("write");
        let err = ExtensionDescriptor::from_dir(temp.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid manifest.json"));
    }

    #[test]
    fn test_gecko_id_legacy_location() {
        let extension = ExtensionDescriptor::new(
            "/ext",
            json!({ "applications": { "gecko": { "id": "old@example.com" } } }),
        );
        assert_eq!(extension.gecko_id(), Some("old@example.com"));
    }

    #[test]
    fn test_gecko_id_missing() {
        let extension = ExtensionDescriptor::new("/ext", json!({ "name": "x" }));
        assert_eq!(extension.gecko_id(), None);
    }
}
