//! Codec for encoding and decoding Flick frames.
//!
//! Frames travel as JSON text messages over the WebSocket, one frame per
//! message. The broadcast payloads inside them must stay byte-compatible
//! with the existing browser client, so JSON is the wire format at every
//! level rather than a binary encoding.

use thiserror::Error;

use crate::frames::Frame;

/// Maximum accepted frame size (64 KiB).
///
/// Real payloads here are two floats and a couple of short strings;
/// anything near this limit is garbage or abuse.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown topic/event combination.
    #[error("Unknown event {event:?} on topic {topic:?}")]
    UnknownEvent { topic: String, event: String },

    /// Invalid frame data.
    #[error("Invalid frame: {0}")]
    Invalid(String),
}

/// Encode a frame to its JSON text representation.
///
/// # Errors
///
/// Returns an error if the frame is too large or serialization fails.
pub fn encode(frame: &Frame) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(frame)?;
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(text.len()));
    }
    Ok(text)
}

/// Decode a frame from JSON text.
///
/// # Errors
///
/// Returns an error if the text is too large or not a valid frame.
pub fn decode(text: &str) -> Result<Frame, ProtocolError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(text.len()));
    }
    let frame = serde_json::from_str(text)?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BroadcastEvent;

    #[test]
    fn test_encode_decode_roundtrip() {
        let frames = vec![
            Frame::hello(Some("sess_abc".to_string())),
            Frame::publish(&BroadcastEvent::switch_flipped(true)).unwrap(),
            Frame::event(&BroadcastEvent::mouse_left("u1")).unwrap(),
            Frame::ping(Some(1234)),
            Frame::pong(None),
            Frame::error(1002, "invalid frame"),
        ];

        for frame in frames {
            let encoded = encode(&frame).unwrap();
            let decoded = decode(&encoded).unwrap();
            assert_eq!(frame, decoded);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not json").is_err());
        assert!(decode(r#"{"type": "warp"}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let huge = format!(
            r#"{{"type":"publish","topic":"switch","event":"SwitchFlipped","payload":"{}"}}"#,
            "x".repeat(MAX_FRAME_SIZE)
        );
        match decode(&huge) {
            Err(ProtocolError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {other:?}"),
        }
    }
}
