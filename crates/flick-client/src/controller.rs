//! The per-client sync controller.
//!
//! Sits between the UI layer and the broadcast transport. Raw input
//! events come in (`on_pointer_move`, visibility and focus changes, the
//! switch toggle); outbound broadcast events accumulate in an outbox the
//! transport drains; inbound events from the relay are absorbed through
//! [`SyncController::apply`]. The UI reads one-way snapshots and never
//! mutates controller state directly.

use crate::smoothing::CursorSmoother;
use flick_core::{CursorRegistry, SessionIdentity, SwitchState};
use flick_protocol::{BroadcastEvent, Position, RosterEntry};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Normalize viewport coordinates to `[-1, 1]` relative to the center.
///
/// Returns `None` for a degenerate viewport, which input handling treats
/// as "nothing to emit".
#[must_use]
pub fn normalize(x: f64, y: f64, viewport_width: f64, viewport_height: f64) -> Option<Position> {
    if viewport_width <= 0.0 || viewport_height <= 0.0 {
        return None;
    }
    let half_w = viewport_width / 2.0;
    let half_h = viewport_height / 2.0;
    Some(Position::new((x - half_w) / half_w, (y - half_h) / half_h))
}

/// A cursor ready for the UI layer to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCursor {
    pub user_id: String,
    pub position: Position,
    pub color: String,
}

/// One-way state snapshot handed to the UI layer each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    /// Peers with visible cursors, plus the local viewer. Minimum 1.
    pub active_count: usize,
    /// Current shared switch value.
    pub toggle_switch: bool,
    /// Smoothed remote cursors.
    pub cursors: Vec<RenderedCursor>,
}

/// Per-connection controller owning the local mirror of shared state.
#[derive(Debug)]
pub struct SyncController {
    identity: SessionIdentity,
    switch: SwitchState,
    registry: CursorRegistry,
    smoother: CursorSmoother,
    /// Last position actually broadcast; `None` while inactive.
    last_sent: Option<Position>,
    outbox: VecDeque<BroadcastEvent>,
}

impl SyncController {
    /// Create a controller for the given identity.
    #[must_use]
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            identity,
            switch: SwitchState::in_memory(),
            registry: CursorRegistry::new(),
            smoother: CursorSmoother::new(),
            last_sent: None,
            outbox: VecDeque::new(),
        }
    }

    /// The local user's id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    /// The local user's assigned color.
    #[must_use]
    pub fn color(&self) -> &str {
        &self.identity.color
    }

    /// Seed the switch value from the server handshake. No event is
    /// emitted; this is initial sync, not a user action.
    pub fn sync_switch(&mut self, value: bool) {
        self.switch.apply_remote(value);
    }

    /// Seed the peer mirror from the handshake roster, so cursors that
    /// were already active render before their next movement.
    pub fn sync_roster(&mut self, roster: &[RosterEntry]) {
        for entry in roster {
            if entry.user_id == self.identity.user_id {
                continue;
            }
            self.registry
                .upsert(&entry.user_id, Some(entry.position), Some(entry.color.as_str()));
            self.smoother.retarget(&entry.user_id, entry.position);
        }
    }

    /// Handle raw pointer movement.
    ///
    /// Normalizes to relative coordinates and emits a `MouseMoved` only
    /// when the result differs from the last broadcast position, exact
    /// equality on both axes. Identical consecutive positions are noise
    /// and produce nothing.
    pub fn on_pointer_move(&mut self, x: f64, y: f64, viewport_width: f64, viewport_height: f64) {
        let Some(position) = normalize(x, y, viewport_width, viewport_height) else {
            return;
        };

        if self.last_sent == Some(position) {
            trace!(user = %self.identity.user_id, "Pointer moved without position change");
            return;
        }

        self.last_sent = Some(position);
        self.outbox.push_back(BroadcastEvent::mouse_moved(
            &self.identity.user_id,
            position,
            &self.identity.color,
        ));
    }

    /// Handle a tab visibility change. Going hidden marks the local user
    /// inactive immediately; becoming visible emits nothing, the next
    /// real movement re-activates implicitly.
    pub fn on_visibility_change(&mut self, hidden: bool) {
        if hidden {
            self.deactivate();
        }
    }

    /// Handle loss of window focus.
    pub fn on_blur(&mut self) {
        self.deactivate();
    }

    /// Handle the pointer leaving the document body.
    pub fn on_pointer_leave(&mut self) {
        self.deactivate();
    }

    /// Handle focus regain. Deliberately a no-op: re-activation rides on
    /// the next pointer movement.
    pub fn on_focus(&mut self) {}

    /// Handle the user toggling the shared switch.
    pub fn on_toggle_switch(&mut self, value: bool) {
        let event = self.switch.set(value);
        self.outbox.push_back(event);
    }

    /// Broadcast the absent-position event, once per period of activity.
    ///
    /// Deliberately stays silent when no position was ever broadcast:
    /// peers hold no entry for this user, so there is nothing for them
    /// to retract.
    fn deactivate(&mut self) {
        if self.last_sent.is_none() {
            return;
        }
        debug!(user = %self.identity.user_id, "Local user inactive");
        self.last_sent = None;
        self.outbox
            .push_back(BroadcastEvent::mouse_left(&self.identity.user_id));
    }

    /// Absorb an event received from the broadcast channel.
    ///
    /// Never re-publishes: a received `SwitchFlipped` updates local state
    /// only, which is what keeps two clients from ping-ponging a flip
    /// forever.
    pub fn apply(&mut self, event: BroadcastEvent) {
        match event {
            BroadcastEvent::SwitchFlipped(p) => {
                self.switch.apply_remote(p.toggle_switch);
            }
            BroadcastEvent::MouseMoved(p) => {
                if p.user_id == self.identity.user_id {
                    // Echo of our own event; the relay should have
                    // excluded us, drop it defensively.
                    return;
                }
                match p.position {
                    Some(position) => {
                        self.registry
                            .upsert(&p.user_id, Some(position), p.color.as_deref());
                        self.smoother.retarget(&p.user_id, position);
                    }
                    None => {
                        self.registry.remove(&p.user_id);
                        self.smoother.forget(&p.user_id);
                    }
                }
            }
        }
    }

    /// Advance render smoothing one animation tick.
    pub fn tick(&mut self) {
        self.smoother.advance();
    }

    /// Drain events queued for publication, oldest first.
    pub fn drain_outbox(&mut self) -> Vec<BroadcastEvent> {
        self.outbox.drain(..).collect()
    }

    /// Number of queued outbound events.
    #[must_use]
    pub fn pending_outbox(&self) -> usize {
        self.outbox.len()
    }

    /// Build the snapshot the UI renders from.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        let cursors = self
            .registry
            .entries()
            .into_iter()
            .filter_map(|entry| {
                self.smoother
                    .rendered(&entry.user_id)
                    .map(|position| RenderedCursor {
                        user_id: entry.user_id.clone(),
                        position,
                        color: entry.color.clone(),
                    })
            })
            .collect();

        ViewSnapshot {
            active_count: self.registry.active_count(),
            toggle_switch: self.switch.get(),
            cursors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(user_id: &str, color: &str) -> SyncController {
        SyncController::new(SessionIdentity {
            user_id: user_id.to_string(),
            color: color.to_string(),
        })
    }

    /// Deliver everything A queued to B, as the relay would (A never
    /// receives its own events back).
    fn relay(from: &mut SyncController, to: &mut SyncController) -> usize {
        let events = from.drain_outbox();
        let count = events.len();
        for event in events {
            to.apply(event);
        }
        count
    }

    #[test]
    fn test_normalize_center_and_corners() {
        assert_eq!(normalize(500.0, 400.0, 1000.0, 800.0), Some(Position::new(0.0, 0.0)));
        assert_eq!(normalize(0.0, 0.0, 1000.0, 800.0), Some(Position::new(-1.0, -1.0)));
        assert_eq!(normalize(1000.0, 800.0, 1000.0, 800.0), Some(Position::new(1.0, 1.0)));
        assert_eq!(normalize(10.0, 10.0, 0.0, 0.0), None);
    }

    #[test]
    fn test_pointer_move_emits_once_per_distinct_position() {
        let mut a = controller("a", "#aa00ff");

        a.on_pointer_move(600.0, 280.0, 1000.0, 800.0);
        a.on_pointer_move(600.0, 280.0, 1000.0, 800.0);
        assert_eq!(a.pending_outbox(), 1);

        a.on_pointer_move(601.0, 280.0, 1000.0, 800.0);
        assert_eq!(a.pending_outbox(), 2);
    }

    #[test]
    fn test_switch_flip_reaches_peer_without_republish() {
        // Scenario: A sets the switch to true; B receives {toggleSwitch:
        // true}, updates local state, and must not publish anything.
        let mut a = controller("a", "#aa00ff");
        let mut b = controller("b", "#00ff00");

        a.on_toggle_switch(true);
        let published = relay(&mut a, &mut b);

        assert_eq!(published, 1);
        assert!(b.snapshot().toggle_switch);
        assert_eq!(b.pending_outbox(), 0);
    }

    #[test]
    fn test_received_flip_never_triggers_republish_loop() {
        let mut b = controller("b", "#00ff00");

        for _ in 0..10 {
            b.apply(BroadcastEvent::switch_flipped(true));
        }

        assert!(b.snapshot().toggle_switch);
        assert_eq!(b.pending_outbox(), 0);
    }

    #[test]
    fn test_cursor_move_updates_peer_registry() {
        // Scenario: A moves to (0.2, -0.3) with color #aa00ff; B's mirror
        // gains the entry and its active count goes from 1 to 2.
        let mut a = controller("a", "#aa00ff");
        let mut b = controller("b", "#00ff00");
        assert_eq!(b.snapshot().active_count, 1);

        a.on_pointer_move(600.0, 280.0, 1000.0, 800.0); // -> (0.2, -0.3)
        relay(&mut a, &mut b);

        let snapshot = b.snapshot();
        assert_eq!(snapshot.active_count, 2);
        let cursor = &snapshot.cursors[0];
        assert_eq!(cursor.user_id, "a");
        assert_eq!(cursor.color, "#aa00ff");
        assert!((cursor.position.x - 0.2).abs() < 1e-9);
        assert!((cursor.position.y - -0.3).abs() < 1e-9);
    }

    #[test]
    fn test_hidden_tab_removes_cursor_at_peer() {
        // Scenario: A hides its tab; B removes A and the count drops.
        let mut a = controller("a", "#aa00ff");
        let mut b = controller("b", "#00ff00");

        a.on_pointer_move(600.0, 280.0, 1000.0, 800.0);
        relay(&mut a, &mut b);
        assert_eq!(b.snapshot().active_count, 2);

        a.on_visibility_change(true);
        let events = a.drain_outbox();
        assert_eq!(
            events,
            vec![BroadcastEvent::mouse_left("a")],
            "inactivity must broadcast a null position and null color"
        );
        for event in events {
            b.apply(event);
        }

        assert_eq!(b.snapshot().active_count, 1);
        assert!(b.snapshot().cursors.is_empty());
    }

    #[test]
    fn test_blur_then_focus_emits_nothing_until_movement() {
        let mut a = controller("a", "#aa00ff");

        a.on_pointer_move(600.0, 280.0, 1000.0, 800.0);
        a.drain_outbox();

        a.on_blur();
        assert_eq!(a.drain_outbox().len(), 1);

        a.on_focus();
        assert_eq!(a.pending_outbox(), 0);

        // Re-activation rides on the next movement, even back to the
        // same spot.
        a.on_pointer_move(600.0, 280.0, 1000.0, 800.0);
        assert_eq!(a.pending_outbox(), 1);
    }

    #[test]
    fn test_deactivate_while_inactive_is_silent() {
        let mut a = controller("a", "#aa00ff");
        a.on_visibility_change(true);
        a.on_blur();
        a.on_pointer_leave();
        assert_eq!(a.pending_outbox(), 0);
    }

    #[test]
    fn test_peer_color_stable_across_moves() {
        let mut b = controller("b", "#00ff00");

        b.apply(BroadcastEvent::mouse_moved("a", Position::new(0.1, 0.1), "#aa00ff"));
        b.apply(BroadcastEvent::mouse_moved("a", Position::new(0.2, 0.2), "#123456"));

        assert_eq!(b.snapshot().cursors[0].color, "#aa00ff");
    }

    #[test]
    fn test_own_echo_is_dropped() {
        let mut a = controller("a", "#aa00ff");
        a.apply(BroadcastEvent::mouse_moved("a", Position::new(0.5, 0.5), "#aa00ff"));
        assert_eq!(a.snapshot().active_count, 1);
    }

    #[test]
    fn test_roster_sync_seeds_existing_cursors() {
        let mut b = controller("b", "#00ff00");
        b.sync_switch(true);
        b.sync_roster(&[
            RosterEntry {
                user_id: "a".to_string(),
                position: Position::new(0.2, -0.3),
                color: "#aa00ff".to_string(),
            },
            RosterEntry {
                user_id: "b".to_string(),
                position: Position::new(0.0, 0.0),
                color: "#00ff00".to_string(),
            },
        ]);

        let snapshot = b.snapshot();
        assert!(snapshot.toggle_switch);
        // Own roster entry is skipped; only the peer is mirrored.
        assert_eq!(snapshot.active_count, 2);
        assert_eq!(snapshot.cursors[0].user_id, "a");
    }

    #[test]
    fn test_smoothing_lags_target_after_retarget() {
        let mut b = controller("b", "#00ff00");
        b.apply(BroadcastEvent::mouse_moved("a", Position::new(0.0, 0.0), "#aa00ff"));
        b.apply(BroadcastEvent::mouse_moved("a", Position::new(1.0, 0.0), "#aa00ff"));

        b.tick();
        let rendered = b.snapshot().cursors[0].position;
        assert!((rendered.x - 0.1).abs() < 1e-12);
        assert!(rendered.x < 1.0);
    }
}
