//! Installed add-on identity.

use serde::{Deserialize, Serialize};

use crate::identifiers::{ActorId, AddonId};

/// An add-on as known to the remote Firefox.
///
/// Firefox reports more fields (name, icon, flags); only the identity is
/// kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addon {
    /// Add-on ID, usually the manifest's gecko ID.
    pub id: AddonId,
    /// Actor that accepts requests for this add-on.
    pub actor: ActorId,
}
