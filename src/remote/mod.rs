//! Add-on management on a running Firefox.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `addon` | Installed add-on identity |
//! | `session` | [`RemoteFirefox`] session over one connection |

// ============================================================================
// Submodules
// ============================================================================

/// Installed add-on identity.
pub mod addon;

/// Add-on management session.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use addon::Addon;
pub use session::RemoteFirefox;
