//! # flick-core
//!
//! Core state and routing for the Flick shared-switch and live-cursor demo.
//!
//! Building blocks:
//!
//! - **Hub / Topic** - named broadcast groups fanning envelopes out to
//!   subscribers, with sender exclusion on the delivery path
//! - **CursorRegistry** - which users are active and where their cursors are
//! - **SessionDirectory** - stable per-session user ids and colors
//! - **SwitchState** - the single shared boolean, persisted, echo-suppressed
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Subscriber │────▶│     Hub     │────▶│    Topic    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │
//!        ▼
//! ┌───────────────┐   ┌─────────────┐
//! │ CursorRegistry│   │ SwitchState │
//! └───────────────┘   └─────────────┘
//! ```

pub mod envelope;
pub mod hub;
pub mod registry;
pub mod session;
pub mod switch;
pub mod topic;

pub use envelope::Envelope;
pub use hub::{Hub, HubConfig, HubError, HubStats};
pub use registry::{CursorEntry, CursorRegistry};
pub use session::{random_color, SessionDirectory, SessionIdentity};
pub use switch::{SwitchState, SwitchStore};
pub use topic::{Topic, TopicId};
