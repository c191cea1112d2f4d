//! Remote debugging protocol message types and framing.
//!
//! This module defines the wire format spoken by Firefox's debugger server.
//!
//! # Protocol Overview
//!
//! | Unit | Direction | Purpose |
//! |------|-----------|---------|
//! | Request | Local → Remote | `{ "to": actor, "type": kind, ... }` |
//! | Reply | Remote → Local | `{ "from": actor, ... }` or error payload |
//! | Notification | Remote → Local | `{ "from": actor, "type": event, ... }` |
//!
//! Every unit travels as one `<length>:<json>` frame.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Length-prefixed frame codec |
//! | `message` | Message type and notification set |

// ============================================================================
// Submodules
// ============================================================================

/// Length-prefixed frame codec.
pub mod frame;

/// Protocol message type.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{FrameStatus, decode_frame, encode_frame};
pub use message::{Message, UNSOLICITED_EVENTS};
