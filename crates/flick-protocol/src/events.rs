//! Broadcast event payloads.
//!
//! These are the application-level events fanned out to every visitor.
//! The JSON shapes are part of the public wire contract and must not
//! change field names or nesting: existing browser clients match on
//! `toggleSwitch`, `userId`, `position` and `color` exactly.

use crate::codec::ProtocolError;
use serde::{Deserialize, Serialize};

/// Topic names events are published on.
pub mod topics {
    /// Shared toggle switch updates.
    pub const SWITCH: &str = "switch";
    /// Cursor position updates.
    pub const MOUSE_MOVEMENT: &str = "mouse-movement";
}

/// Event names within topics.
pub mod names {
    pub const SWITCH_FLIPPED: &str = "SwitchFlipped";
    pub const MOUSE_MOVED: &str = "MouseMoved";
}

/// A cursor position normalized to `[-1, 1]` on both axes,
/// relative to the viewport center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Payload of a `SwitchFlipped` event on the `switch` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchFlipped {
    #[serde(rename = "toggleSwitch")]
    pub toggle_switch: bool,
}

/// Payload of a `MouseMoved` event on the `mouse-movement` topic.
///
/// A `null` position is the absence sentinel: the user went inactive
/// (tab hidden, window blurred, connection dropped) and must be removed
/// from the registry. `color` is only meaningful alongside a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseMoved {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub position: Option<Position>,
    pub color: Option<String>,
}

/// The tagged union of everything that crosses the broadcast relay.
///
/// Decoded exactly once at the transport boundary; downstream code
/// matches on variants, never on string keys.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastEvent {
    SwitchFlipped(SwitchFlipped),
    MouseMoved(MouseMoved),
}

impl BroadcastEvent {
    /// Create a switch flip event.
    #[must_use]
    pub fn switch_flipped(toggle_switch: bool) -> Self {
        Self::SwitchFlipped(SwitchFlipped { toggle_switch })
    }

    /// Create a cursor movement event.
    #[must_use]
    pub fn mouse_moved(
        user_id: impl Into<String>,
        position: Position,
        color: impl Into<String>,
    ) -> Self {
        Self::MouseMoved(MouseMoved {
            user_id: user_id.into(),
            position: Some(position),
            color: Some(color.into()),
        })
    }

    /// Create the inactivity event for a user: `position` and `color`
    /// are both `null` on the wire.
    #[must_use]
    pub fn mouse_left(user_id: impl Into<String>) -> Self {
        Self::MouseMoved(MouseMoved {
            user_id: user_id.into(),
            position: None,
            color: None,
        })
    }

    /// The topic this event is published on.
    #[must_use]
    pub fn topic(&self) -> &'static str {
        match self {
            Self::SwitchFlipped(_) => topics::SWITCH,
            Self::MouseMoved(_) => topics::MOUSE_MOVEMENT,
        }
    }

    /// The event name carried alongside the payload.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SwitchFlipped(_) => names::SWITCH_FLIPPED,
            Self::MouseMoved(_) => names::MOUSE_MOVED,
        }
    }

    /// Serialize the payload to its wire JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_payload(&self) -> Result<serde_json::Value, ProtocolError> {
        let value = match self {
            Self::SwitchFlipped(p) => serde_json::to_value(p)?,
            Self::MouseMoved(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    /// Decode an event from its topic, event name and JSON payload.
    ///
    /// Validation is defensive: a `MouseMoved` with a `null` position is
    /// normalized to carry no color either, so downstream removal logic
    /// never sees a color without a position.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown topic/event combinations or payloads
    /// missing required fields.
    pub fn decode(
        topic: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<Self, ProtocolError> {
        match (topic, event) {
            (topics::SWITCH, names::SWITCH_FLIPPED) => {
                let p: SwitchFlipped = serde_json::from_value(payload)?;
                Ok(Self::SwitchFlipped(p))
            }
            (topics::MOUSE_MOVEMENT, names::MOUSE_MOVED) => {
                let mut p: MouseMoved = serde_json::from_value(payload)?;
                if p.position.is_none() {
                    p.color = None;
                }
                Ok(Self::MouseMoved(p))
            }
            _ => Err(ProtocolError::UnknownEvent {
                topic: topic.to_string(),
                event: event.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_switch_flipped_wire_shape() {
        let event = BroadcastEvent::switch_flipped(true);
        assert_eq!(event.topic(), "switch");
        assert_eq!(event.name(), "SwitchFlipped");
        assert_eq!(event.to_payload().unwrap(), json!({"toggleSwitch": true}));
    }

    #[test]
    fn test_mouse_moved_wire_shape() {
        let event = BroadcastEvent::mouse_moved("user_1a2b", Position::new(0.2, -0.3), "#aa00ff");
        assert_eq!(event.topic(), "mouse-movement");
        assert_eq!(event.name(), "MouseMoved");
        assert_eq!(
            event.to_payload().unwrap(),
            json!({
                "userId": "user_1a2b",
                "position": {"x": 0.2, "y": -0.3},
                "color": "#aa00ff"
            })
        );
    }

    #[test]
    fn test_mouse_left_wire_shape() {
        let event = BroadcastEvent::mouse_left("user_1a2b");
        assert_eq!(
            event.to_payload().unwrap(),
            json!({"userId": "user_1a2b", "position": null, "color": null})
        );
    }

    #[test]
    fn test_decode_switch_flipped() {
        let event = BroadcastEvent::decode(
            "switch",
            "SwitchFlipped",
            json!({"toggleSwitch": false}),
        )
        .unwrap();
        assert_eq!(event, BroadcastEvent::switch_flipped(false));
    }

    #[test]
    fn test_decode_normalizes_color_on_absent_position() {
        // A color alongside a null position must be ignored.
        let event = BroadcastEvent::decode(
            "mouse-movement",
            "MouseMoved",
            json!({"userId": "u1", "position": null, "color": "#ff0000"}),
        )
        .unwrap();
        assert_eq!(event, BroadcastEvent::mouse_left("u1"));
    }

    #[test]
    fn test_decode_unknown_event() {
        let err = BroadcastEvent::decode("switch", "Nope", json!({}));
        assert!(matches!(err, Err(ProtocolError::UnknownEvent { .. })));
    }

    #[test]
    fn test_decode_missing_user_id() {
        let err = BroadcastEvent::decode(
            "mouse-movement",
            "MouseMoved",
            json!({"position": {"x": 0.0, "y": 0.0}}),
        );
        assert!(err.is_err());
    }
}
