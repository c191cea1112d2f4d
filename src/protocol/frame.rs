//! Length-prefixed frame codec.
//!
//! Each frame on the wire is `<decimal length>:<payload>` where `length` is
//! the exact byte length of the JSON payload. There is no trailing
//! delimiter, so frames are read back to back from the stream.
//!
//! ```text
//! 17:{"to":"root",...}42:{"from":"root",...}
//! ```
//!
//! Decoding is stateless: the caller owns the buffer and calls
//! [`decode_frame`] until it returns [`FrameStatus::Incomplete`].

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

use crate::error::{Error, Result};

use super::Message;

// ============================================================================
// Constants
// ============================================================================

/// Separator between the length prefix and the payload.
const SEPARATOR: u8 = b':';

/// Longest prefix that can still hold a `usize` length.
const MAX_PREFIX_LEN: usize = 20;

// ============================================================================
// FrameStatus
// ============================================================================

/// Outcome of one [`decode_frame`] call.
#[derive(Debug)]
pub enum FrameStatus {
    /// Not enough bytes buffered for a complete frame. Nothing was consumed.
    Incomplete,

    /// A complete frame was consumed and decoded.
    Message(Message),

    /// A complete frame was consumed but its payload is not a valid message.
    Malformed(Error),
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes the first frame from `buffer`.
///
/// Consumed bytes are removed from the front of `buffer`; on
/// [`FrameStatus::Incomplete`] the buffer is left untouched.
///
/// # Errors
///
/// Returns [`Error::FrameLength`] if the length prefix is not a decimal
/// integer. This is fatal for the stream.
pub fn decode_frame(buffer: &mut Vec<u8>) -> Result<FrameStatus> {
    let Some(separator) = buffer.iter().position(|&byte| byte == SEPARATOR) else {
        if buffer.len() > MAX_PREFIX_LEN {
            return Err(Error::frame_length(&buffer[..MAX_PREFIX_LEN]));
        }
        return Ok(FrameStatus::Incomplete);
    };

    let prefix = &buffer[..separator];
    let length = parse_length(prefix).ok_or_else(|| Error::frame_length(prefix))?;
    let end = (separator + 1)
        .checked_add(length)
        .ok_or_else(|| Error::frame_length(prefix))?;

    if buffer.len() < end {
        return Ok(FrameStatus::Incomplete);
    }

    let status = match serde_json::from_slice::<Message>(&buffer[separator + 1..end]) {
        Ok(message) => FrameStatus::Message(message),
        Err(e) => FrameStatus::Malformed(Error::malformed_message(e.to_string())),
    };

    buffer.drain(..end);
    trace!(length, remaining = buffer.len(), "Decoded frame");

    Ok(status)
}

/// Parses an ASCII decimal length prefix.
fn parse_length(prefix: &[u8]) -> Option<usize> {
    if prefix.is_empty() || !prefix.iter().all(u8::is_ascii_digit) {
        return None;
    }

    std::str::from_utf8(prefix).ok()?.parse().ok()
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes a message as one frame.
///
/// # Errors
///
/// Returns [`Error::Json`] if the message cannot be serialized.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(message)?;
    let mut frame = payload.len().to_string().into_bytes();
    frame.reserve(payload.len() + 1);
    frame.push(SEPARATOR);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    fn message(value: serde_json::Value) -> Message {
        serde_json::from_value(value).expect("valid message")
    }

    /// Feeds `chunks` one after another and collects every decoded message.
    fn decode_chunks(chunks: &[&[u8]]) -> Vec<Message> {
        let mut buffer = Vec::new();
        let mut decoded = Vec::new();

        for chunk in chunks {
            buffer.extend_from_slice(chunk);
            loop {
                match decode_frame(&mut buffer).expect("valid stream") {
                    FrameStatus::Incomplete => break,
                    FrameStatus::Message(message) => decoded.push(message),
                    FrameStatus::Malformed(err) => panic!("unexpected malformed frame: {err}"),
                }
            }
        }

        assert!(buffer.is_empty(), "leftover bytes: {buffer:?}");
        decoded
    }

    #[test]
    fn test_two_back_to_back_frames() {
        // `{"a":1}` is 7 bytes long, `{"a":22}` is 8.
        let decoded = decode_chunks(&[&br#"7:{"a":1}8:{"a":22}"#[..]]);
        assert_eq!(decoded, vec![message(json!({"a": 1})), message(json!({"a": 22}))]);
    }

    #[test]
    fn test_missing_separator_needs_more_data() {
        let mut buffer = b"12".to_vec();
        assert!(matches!(
            decode_frame(&mut buffer),
            Ok(FrameStatus::Incomplete)
        ));
        assert_eq!(buffer, b"12");
    }

    #[test]
    fn test_short_payload_consumes_nothing() {
        let mut buffer = br#"9:{"a":1"#.to_vec();
        let before = buffer.clone();
        assert!(matches!(
            decode_frame(&mut buffer),
            Ok(FrameStatus::Incomplete)
        ));
        assert_eq!(buffer, before);
    }

    #[test]
    fn test_unparsable_length_is_fatal() {
        let mut buffer = br#"x5:{"a":1}"#.to_vec();
        let err = decode_frame(&mut buffer).unwrap_err();
        assert!(matches!(err, Error::FrameLength { ref prefix } if prefix == "x5"));
    }

    #[test]
    fn test_empty_length_is_fatal() {
        let mut buffer = b":{}".to_vec();
        assert!(decode_frame(&mut buffer).is_err());
    }

    #[test]
    fn test_long_garbage_without_separator_is_fatal() {
        let mut buffer = vec![b'9'; MAX_PREFIX_LEN + 1];
        assert!(decode_frame(&mut buffer).is_err());
    }

    #[test]
    fn test_malformed_payload_is_consumed_and_parsing_continues() {
        let mut buffer = br#"3:abc7:{"b":2}"#.to_vec();

        assert!(matches!(
            decode_frame(&mut buffer),
            Ok(FrameStatus::Malformed(Error::MalformedMessage { .. }))
        ));

        match decode_frame(&mut buffer) {
            Ok(FrameStatus::Message(msg)) => assert_eq!(msg, message(json!({"b": 2}))),
            other => panic!("expected message, got {other:?}"),
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_length_counts_bytes_not_chars() {
        let original = message(json!({"from": "root", "title": "héllo ✓"}));
        let frame = encode_frame(&original).expect("encode");
        assert_eq!(decode_chunks(&[frame.as_slice()]), vec![original]);
    }

    #[test]
    fn test_encode_frame_prefix() {
        let frame = encode_frame(&Message::request("root", "getRoot")).expect("encode");
        let text = String::from_utf8(frame).expect("utf8");
        let (length, payload) = text.split_once(':').expect("separator");
        assert_eq!(length.parse::<usize>().expect("length"), payload.len());
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_decoded_messages(
            values in prop::collection::vec((any::<u16>(), "[a-zA-Z0-9 :é]{0,12}"), 1..8),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
        ) {
            let messages: Vec<Message> = values
                .iter()
                .map(|(n, s)| message(json!({ "from": "actor", "n": n, "s": s })))
                .collect();

            let mut stream = Vec::new();
            for msg in &messages {
                stream.extend(encode_frame(msg).expect("encode"));
            }

            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(stream.len() + 1)).collect();
            points.sort_unstable();
            points.dedup();

            let mut chunks: Vec<&[u8]> = Vec::new();
            let mut start = 0;
            for point in points {
                chunks.push(&stream[start..point]);
                start = point;
            }
            chunks.push(&stream[start..]);

            prop_assert_eq!(decode_chunks(&chunks), decode_chunks(&[stream.as_slice()]));
            prop_assert_eq!(decode_chunks(&[stream.as_slice()]), messages);
        }
    }
}
