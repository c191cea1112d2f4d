//! Remote debugging protocol messages.
//!
//! Every packet is a JSON object. Requests name their target actor in `to`
//! and the request kind in `type`; replies name the answering actor in
//! `from` and carry either payload fields or an `error`/`message` pair.
//!
//! # Format
//!
//! Request:
//! ```json
//! { "to": "root", "type": "listAddons" }
//! ```
//!
//! Success reply:
//! ```json
//! { "from": "root", "addons": [ { "id": "ext@example.com", "actor": "addon1" } ] }
//! ```
//!
//! Error reply:
//! ```json
//! { "from": "root", "error": "unrecognizedPacketType", "message": "..." }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::ActorId;

// ============================================================================
// Constants
// ============================================================================

/// Message types the server pushes without a matching request.
///
/// These are routed to the unsolicited event channel instead of being
/// matched against the active request of the sending actor.
pub const UNSOLICITED_EVENTS: &[&str] = &[
    "tabNavigated",
    "styleApplied",
    "propertyChange",
    "networkEventUpdate",
    "networkEvent",
    "newMutations",
    "frameUpdate",
    "tabListChanged",
];

// ============================================================================
// Message
// ============================================================================

/// A decoded protocol message.
///
/// Well-known routing fields are typed; everything else lives in
/// [`Message::payload`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Target actor (requests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ActorId>,

    /// Sending actor (replies and notifications).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ActorId>,

    /// Request or notification type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Error code, present on error replies.
    ///
    /// Kept as raw JSON; actors are not consistent about its shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    /// Error description accompanying `error`, or any other `message` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,

    /// Remaining fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

// ============================================================================
// Message - Constructors
// ============================================================================

impl Message {
    /// Creates a request addressed to `to` with the given type.
    #[inline]
    #[must_use]
    pub fn request(to: impl Into<ActorId>, kind: impl Into<String>) -> Self {
        Self {
            to: Some(to.into()),
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Creates a reply from `from` with no payload.
    #[inline]
    #[must_use]
    pub fn reply(from: impl Into<ActorId>) -> Self {
        Self {
            from: Some(from.into()),
            ..Self::default()
        }
    }

    /// Adds a payload field.
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Marks this message as an error reply.
    #[inline]
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(Value::String(error.into()));
        self.message = Some(Value::String(message.into()));
        self
    }
}

// ============================================================================
// Message - Accessors
// ============================================================================

impl Message {
    /// Returns the message type, or an empty string.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or_default()
    }

    /// Returns a payload field.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Returns a payload field as a string.
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Returns `true` if this message carries an error payload.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns `true` if this is an unsolicited notification.
    #[inline]
    #[must_use]
    pub fn is_unsolicited(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| UNSOLICITED_EVENTS.contains(&kind))
    }

    /// Returns the error payload as [`Error::Remote`], if any.
    #[must_use]
    pub fn remote_error(&self) -> Option<Error> {
        let error = self.error.as_ref()?;
        let message = self.message.as_ref().map(value_text).unwrap_or_default();
        Some(Error::remote(value_text(error), message))
    }

    /// Converts an error reply into [`Error::Remote`].
    ///
    /// Success replies are returned unchanged.
    pub fn into_result(self) -> Result<Self> {
        match self.remote_error() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }

    /// Deserializes a payload field into `T`.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the field is missing
    /// - [`Error::Json`] if the field has the wrong shape
    pub fn field<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.payload.get(key).ok_or_else(|| {
            Error::protocol(format!(
                "Reply from {} has no '{}' field",
                self.from.as_ref().map_or("<unknown>", ActorId::as_str),
                key
            ))
        })?;

        Ok(T::deserialize(value)?)
    }
}

/// Renders a JSON value as text; strings lose their quotes.
fn value_text(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_owned)
}

// ============================================================================
// Tests
// ============================================================================
