//! # flick-client
//!
//! Per-connection sync logic for the Flick demo: normalizes pointer
//! input, suppresses redundant emissions, mirrors remote presence, and
//! smooths cursor rendering.
//!
//! The controller is transport-agnostic and single-threaded by design:
//! the embedding layer feeds it input events and inbound broadcasts,
//! drains its outbox toward the relay, calls [`SyncController::tick`] at
//! a steady interval, and renders from [`SyncController::snapshot`].

pub mod controller;
pub mod smoothing;

pub use controller::{normalize, RenderedCursor, SyncController, ViewSnapshot};
pub use smoothing::{CursorSmoother, DEFAULT_SMOOTHING_FACTOR};
