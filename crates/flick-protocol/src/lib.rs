//! # flick-protocol
//!
//! Wire protocol for the Flick shared-switch and live-cursor demo.
//!
//! Two layers:
//!
//! - **Events** - the broadcast payloads (`SwitchFlipped`, `MouseMoved`)
//!   whose JSON shapes are fixed for interop with the browser client
//! - **Frames** - the client/server envelope (`Hello`/`Welcome` handshake,
//!   `Publish`/`Event` fan-out, keepalives) with a JSON codec

pub mod codec;
pub mod events;
pub mod frames;

pub use codec::ProtocolError;
pub use events::{names, topics};
pub use events::{BroadcastEvent, MouseMoved, Position, SwitchFlipped};
pub use frames::{Frame, RosterEntry};
