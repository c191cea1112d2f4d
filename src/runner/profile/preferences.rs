//! Firefox preferences for extension development.
//!
//! Preferences are written to `user.js` as JavaScript calls:
//!
//! ```javascript
//! user_pref("devtools.debugger.remote-enabled", true);
//! ```
//!
//! [`default_prefs`] returns everything the runner needs: the remote
//! debugging switches that let the runner connect and install add-ons, plus
//! settings that keep a development browser quiet.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;

// ============================================================================
// PreferenceValue
// ============================================================================

/// A preference value in `user.js`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PreferenceValue {
    /// Boolean value.
    Bool(bool),

    /// Integer value.
    Int(i32),

    /// String value.
    String(String),
}

impl PreferenceValue {
    /// Formats the value as a JavaScript literal.
    #[must_use]
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::String(s) => format!("\"{}\"", escape_js_string(s)),
        }
    }
}

impl From<bool> for PreferenceValue {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PreferenceValue {
    #[inline]
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<String> for PreferenceValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for PreferenceValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

// ============================================================================
// FirefoxPreference
// ============================================================================

/// A named Firefox preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirefoxPreference {
    /// Preference name (e.g. `devtools.chrome.enabled`).
    pub key: String,

    /// Preference value.
    pub value: PreferenceValue,
}

impl FirefoxPreference {
    /// Creates a preference.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<PreferenceValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Formats the preference as a `user_pref(...)` line.
    #[must_use]
    pub fn to_user_pref_line(&self) -> String {
        format!(
            "user_pref(\"{}\", {});",
            escape_js_string(&self.key),
            self.value.to_js_string()
        )
    }
}

// ============================================================================
// Preference Sets
// ============================================================================

/// Preferences required to drive Firefox over the debugger server.
#[must_use]
pub fn remote_debugging_prefs() -> Vec<FirefoxPreference> {
    use FirefoxPreference as Pref;

    vec![
        Pref::new("devtools.debugger.remote-enabled", true),
        Pref::new("devtools.chrome.enabled", true),
        // Accept the connection without a confirmation dialog.
        Pref::new("devtools.debugger.prompt-connection", false),
        Pref::new("devtools.browserconsole.contentMessages", true),
        // Unsigned temporary add-ons.
        Pref::new("xpinstall.signatures.required", false),
        Pref::new("extensions.autoDisableScopes", 0),
        Pref::new("extensions.enabledScopes", 5),
        Pref::new("extensions.logging.enabled", true),
    ]
}

/// Preferences that keep a development browser from interrupting.
#[must_use]
pub fn quiet_browser_prefs() -> Vec<FirefoxPreference> {
    use FirefoxPreference as Pref;

    vec![
        Pref::new("browser.shell.checkDefaultBrowser", false),
        Pref::new("browser.startup.homepage_override.mstone", "ignore"),
        Pref::new("browser.warnOnQuit", false),
        Pref::new("browser.tabs.warnOnClose", false),
        Pref::new("browser.aboutConfig.showWarning", false),
        Pref::new("startup.homepage_welcome_url", ""),
        Pref::new("app.update.enabled", false),
        Pref::new("app.update.auto", false),
        Pref::new("extensions.update.enabled", false),
        Pref::new("extensions.getAddons.cache.enabled", false),
        Pref::new("toolkit.telemetry.enabled", false),
        Pref::new("toolkit.telemetry.reportingpolicy.firstRun", false),
        Pref::new("datareporting.policy.dataSubmissionEnabled", false),
        Pref::new("datareporting.healthreport.uploadEnabled", false),
        Pref::new("browser.sessionstore.resume_from_crash", false),
    ]
}

/// Built-in preferences followed by `custom` ones.
///
/// When a key appears more than once the last value wins and keeps the
/// position of its first occurrence.
#[must_use]
pub fn default_prefs(custom: &[FirefoxPreference]) -> Vec<FirefoxPreference> {
    let mut merged: Vec<FirefoxPreference> = Vec::new();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();

    let all = remote_debugging_prefs()
        .into_iter()
        .chain(quiet_browser_prefs())
        .chain(custom.iter().cloned());

    for pref in all {
        match index.get(&pref.key) {
            Some(&position) => merged[position] = pref,
            None => {
                index.insert(pref.key.clone(), merged.len());
                merged.push(pref);
            }
        }
    }

    merged
}

// ============================================================================
// Private Helpers
// ============================================================================

/// Escapes special characters for JavaScript strings.
fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_literals() {
        assert_eq!(PreferenceValue::Bool(false).to_js_string(), "false");
        assert_eq!(PreferenceValue::Int(-1).to_js_string(), "-1");
        assert_eq!(PreferenceValue::from("a\"b").to_js_string(), "\"a\\\"b\"");
    }

    #[test]
    fn test_user_pref_line() {
        let pref = FirefoxPreference::new("devtools.chrome.enabled", true);
        assert_eq!(
            pref.to_user_pref_line(),
            "user_pref(\"devtools.chrome.enabled\", true);"
        );
    }

    #[test]
    fn test_escape_path_value() {
        let pref = FirefoxPreference::new("x", "C:\\profiles\\dev");
        assert!(pref.to_user_pref_line().contains("C:\\\\profiles\\\\dev"));
    }

    #[test]
    fn test_remote_debugging_enabled_without_prompt() {
        let prefs = default_prefs(&[]);
        let get = |key: &str| prefs.iter().find(|p| p.key == key).map(|p| p.value.clone());

        assert_eq!(get("devtools.debugger.remote-enabled"), Some(PreferenceValue::Bool(true)));
        assert_eq!(get("devtools.debugger.prompt-connection"), Some(PreferenceValue::Bool(false)));
        assert_eq!(get("xpinstall.signatures.required"), Some(PreferenceValue::Bool(false)));
    }

    #[test]
    fn test_custom_prefs_override_in_place() {
        let custom = [
            FirefoxPreference::new("devtools.chrome.enabled", false),
            FirefoxPreference::new("my.pref", 3),
        ];
        let prefs = default_prefs(&custom);

        let position = prefs
            .iter()
            .position(|p| p.key == "devtools.chrome.enabled")
            .expect("present");
        assert_eq!(position, 1);
        assert_eq!(prefs[position].value, PreferenceValue::Bool(false));
        assert_eq!(prefs.last().map(|p| p.key.as_str()), Some("my.pref"));
        assert_eq!(
            prefs.iter().filter(|p| p.key == "devtools.chrome.enabled").count(),
            1
        );
    }
}
