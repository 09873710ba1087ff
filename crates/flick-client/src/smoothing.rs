//! Render smoothing for remote cursors.
//!
//! Each remote cursor keeps a rendered "current" position distinct from
//! the last received "target". Every tick the current position moves a
//! fixed fraction of the remaining distance toward the target, an
//! exponential approach that lags the target on purpose and never snaps.

use flick_protocol::Position;
use std::collections::HashMap;

/// Default per-tick interpolation coefficient.
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.1;

/// A remote cursor's smoothing state.
#[derive(Debug, Clone, Copy)]
struct SmoothedCursor {
    current: Position,
    target: Position,
}

/// Per-user cursor interpolator.
#[derive(Debug)]
pub struct CursorSmoother {
    factor: f64,
    cursors: HashMap<String, SmoothedCursor>,
}

impl CursorSmoother {
    /// Create a smoother with the default factor.
    #[must_use]
    pub fn new() -> Self {
        Self::with_factor(DEFAULT_SMOOTHING_FACTOR)
    }

    /// Create a smoother with a custom factor in `(0, 1)`.
    #[must_use]
    pub fn with_factor(factor: f64) -> Self {
        Self {
            factor,
            cursors: HashMap::new(),
        }
    }

    /// Update a user's target position.
    ///
    /// A cursor seen for the first time starts rendered at its target,
    /// so new peers appear in place instead of sliding in from nowhere.
    pub fn retarget(&mut self, user_id: impl Into<String>, target: Position) {
        let user_id = user_id.into();
        match self.cursors.get_mut(&user_id) {
            Some(cursor) => cursor.target = target,
            None => {
                self.cursors.insert(
                    user_id,
                    SmoothedCursor {
                        current: target,
                        target,
                    },
                );
            }
        }
    }

    /// Drop a user's cursor. The rendered element disappears rather than
    /// easing toward a stale target.
    pub fn forget(&mut self, user_id: &str) {
        self.cursors.remove(user_id);
    }

    /// Advance every cursor one tick toward its target.
    pub fn advance(&mut self) {
        for cursor in self.cursors.values_mut() {
            cursor.current.x += (cursor.target.x - cursor.current.x) * self.factor;
            cursor.current.y += (cursor.target.y - cursor.current.y) * self.factor;
        }
    }

    /// Rendered position for a user, if tracked.
    #[must_use]
    pub fn rendered(&self, user_id: &str) -> Option<Position> {
        self.cursors.get(user_id).map(|c| c.current)
    }

    /// Number of cursors being smoothed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// Check if no cursors are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

impl Default for CursorSmoother {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sight_snaps_to_target() {
        let mut smoother = CursorSmoother::new();
        smoother.retarget("u1", Position::new(0.4, -0.2));
        assert_eq!(smoother.rendered("u1"), Some(Position::new(0.4, -0.2)));
    }

    #[test]
    fn test_geometric_convergence() {
        let factor = 0.1;
        let mut smoother = CursorSmoother::with_factor(factor);
        smoother.retarget("u1", Position::new(0.0, 0.0));
        smoother.retarget("u1", Position::new(1.0, 0.0));

        let initial_diff = 1.0;
        for n in 1..=20 {
            smoother.advance();
            let rendered = smoother.rendered("u1").unwrap();
            let expected = initial_diff * (1.0 - factor).powi(n);
            let diff = 1.0 - rendered.x;
            assert!((diff - expected).abs() < 1e-12, "tick {n}: {diff} vs {expected}");
            // Approaches but never reaches the target in finite ticks.
            assert!(rendered.x < 1.0);
        }
    }

    #[test]
    fn test_forget_drops_cursor() {
        let mut smoother = CursorSmoother::new();
        smoother.retarget("u1", Position::new(0.5, 0.5));
        smoother.forget("u1");
        assert!(smoother.rendered("u1").is_none());
        assert!(smoother.is_empty());
    }

    #[test]
    fn test_advance_with_no_cursors_is_noop() {
        let mut smoother = CursorSmoother::new();
        smoother.advance();
        assert_eq!(smoother.len(), 0);
    }
}
