//! Frame types for the Flick client/server protocol.
//!
//! Frames are the envelope around broadcast event payloads, exchanged as
//! JSON text messages over the WebSocket. The `payload` of `Publish` and
//! `Event` frames is the wire JSON described in [`crate::events`].

use crate::codec::ProtocolError;
use crate::events::{BroadcastEvent, Position};
use serde::{Deserialize, Serialize};

/// A registry entry as carried in the `Welcome` roster, letting a
/// joining client render cursors that existed before it connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub position: Position,
    pub color: String,
}

/// A protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Client handshake. A token from a previous connection in the same
    /// browser session makes `Welcome` return the same identity.
    Hello {
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Server handshake response with the client's identity and the
    /// current shared state.
    Welcome {
        /// Session token to present on reconnect.
        token: String,
        #[serde(rename = "userId")]
        user_id: String,
        /// Display color assigned to this user.
        color: String,
        /// Current value of the shared switch.
        #[serde(rename = "toggleSwitch")]
        toggle_switch: bool,
        /// Cursors already active at join time.
        roster: Vec<RosterEntry>,
        /// Recommended heartbeat interval in milliseconds.
        heartbeat: u64,
    },

    /// Client publishes an event to a topic.
    Publish {
        topic: String,
        event: String,
        payload: serde_json::Value,
    },

    /// Server delivers an event from a topic the client is subscribed to.
    Event {
        topic: String,
        event: String,
        payload: serde_json::Value,
    },

    /// Keepalive ping.
    Ping {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Keepalive pong.
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Error response.
    Error {
        /// Error code.
        code: u16,
        /// Human-readable error message.
        message: String,
    },
}

impl Frame {
    /// Short frame kind label, used for logging and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::Welcome { .. } => "welcome",
            Frame::Publish { .. } => "publish",
            Frame::Event { .. } => "event",
            Frame::Ping { .. } => "ping",
            Frame::Pong { .. } => "pong",
            Frame::Error { .. } => "error",
        }
    }

    /// Create a new Hello frame.
    #[must_use]
    pub fn hello(token: Option<String>) -> Self {
        Frame::Hello { token }
    }

    /// Create a Publish frame from a broadcast event.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn publish(event: &BroadcastEvent) -> Result<Self, ProtocolError> {
        Ok(Frame::Publish {
            topic: event.topic().to_string(),
            event: event.name().to_string(),
            payload: event.to_payload()?,
        })
    }

    /// Create an Event delivery frame from a broadcast event.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn event(event: &BroadcastEvent) -> Result<Self, ProtocolError> {
        Ok(Frame::Event {
            topic: event.topic().to_string(),
            event: event.name().to_string(),
            payload: event.to_payload()?,
        })
    }

    /// Create a new Ping frame.
    #[must_use]
    pub fn ping(timestamp: Option<u64>) -> Self {
        Frame::Ping { timestamp }
    }

    /// Create a new Pong frame.
    #[must_use]
    pub fn pong(timestamp: Option<u64>) -> Self {
        Frame::Pong { timestamp }
    }

    /// Create a new Error frame.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Frame::Error {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Position;

    #[test]
    fn test_frame_kind() {
        assert_eq!(Frame::hello(None).kind(), "hello");
        assert_eq!(Frame::ping(Some(42)).kind(), "ping");
        assert_eq!(Frame::error(1002, "bad frame").kind(), "error");
    }

    #[test]
    fn test_publish_frame_carries_wire_payload() {
        let event = BroadcastEvent::mouse_moved("u1", Position::new(0.5, 0.5), "#00ff00");
        let frame = Frame::publish(&event).unwrap();
        match frame {
            Frame::Publish {
                topic,
                event,
                payload,
            } => {
                assert_eq!(topic, "mouse-movement");
                assert_eq!(event, "MouseMoved");
                assert_eq!(payload["userId"], "u1");
                assert_eq!(payload["color"], "#00ff00");
            }
            other => panic!("expected Publish, got {other:?}"),
        }
    }

    #[test]
    fn test_welcome_heartbeat_keeps_large_intervals() {
        let frame = Frame::Welcome {
            token: "sess_1".to_string(),
            user_id: "u1".to_string(),
            color: "#336699".to_string(),
            toggle_switch: false,
            roster: Vec::new(),
            heartbeat: u64::from(u32::MAX) + 1,
        };

        let json = serde_json::to_string(&frame).unwrap();
        let decoded: Frame = serde_json::from_str(&json).unwrap();
        match decoded {
            Frame::Welcome { heartbeat, .. } => {
                assert_eq!(heartbeat, u64::from(u32::MAX) + 1);
            }
            other => panic!("expected Welcome, got {other:?}"),
        }
    }
}
