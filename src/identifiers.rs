//! Type-safe identifiers for remote protocol entities.
//!
//! Newtype wrappers prevent passing an add-on ID where an actor ID is
//! expected (both are plain strings on the wire).
//!
//! | Type | Example | Source |
//! |------|---------|--------|
//! | [`ActorId`] | `root`, `server1.conn0.addonsActor2` | assigned by the debugger server |
//! | [`AddonId`] | `my-extension@example.com` | extension manifest / install response |

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Actor ID of the root actor every connection starts with.
const ROOT_ACTOR: &str = "root";

// ============================================================================
// ActorId
// ============================================================================

/// Identifier of a server-side actor.
///
/// Every request is addressed `to` one actor and every reply comes `from`
/// one actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Creates an actor ID.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the root actor ID.
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(ROOT_ACTOR.to_string())
    }

    /// Returns `true` if this is the root actor.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ACTOR
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ActorId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ActorId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// AddonId
// ============================================================================

/// Identifier of an installed add-on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddonId(String);

impl AddonId {
    /// Creates an add-on ID.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AddonId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AddonId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Tests
// ============================================================================
