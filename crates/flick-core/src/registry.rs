//! Cursor registry: who is active and where their cursor is.
//!
//! The registry holds peer entries only; the owning viewer is implicit,
//! which is why [`CursorRegistry::active_count`] is peers plus one. The
//! same type backs the server's authoritative map (behind a mutex) and
//! each client's local mirror.

use flick_protocol::Position;
use std::collections::HashMap;
use tracing::debug;

/// A single active cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorEntry {
    /// Owning user.
    pub user_id: String,
    /// Last known normalized position.
    pub position: Position,
    /// Display color, fixed for the entry's lifetime.
    pub color: String,
}

/// Registry of active peer cursors, keyed by user id.
#[derive(Debug, Default)]
pub struct CursorRegistry {
    entries: HashMap<String, CursorEntry>,
}

impl CursorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active users: tracked peers plus the local viewer.
    /// Never less than 1.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.entries.len() + 1
    }

    /// Check if a user has an active cursor.
    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    /// Get a user's entry.
    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&CursorEntry> {
        self.entries.get(user_id)
    }

    /// Insert or update a user's cursor.
    ///
    /// An absent position is equivalent to [`CursorRegistry::remove`].
    /// A user's color is fixed on first sight: later upserts may move the
    /// cursor but never recolor it. A new user arriving without a color
    /// gets a random one, mirroring how the browser client fills the gap.
    ///
    /// Returns `true` if this created a new entry.
    pub fn upsert(
        &mut self,
        user_id: impl Into<String>,
        position: Option<Position>,
        color: Option<&str>,
    ) -> bool {
        let user_id = user_id.into();

        let Some(position) = position else {
            self.remove(&user_id);
            return false;
        };

        match self.entries.get_mut(&user_id) {
            Some(entry) => {
                entry.position = position;
                false
            }
            None => {
                let color = color
                    .map(str::to_string)
                    .unwrap_or_else(crate::session::random_color);
                debug!(user = %user_id, color = %color, "Registry: cursor appeared");
                self.entries.insert(
                    user_id.clone(),
                    CursorEntry {
                        user_id,
                        position,
                        color,
                    },
                );
                true
            }
        }
    }

    /// Remove a user's cursor.
    ///
    /// Returns the removed entry, if any. Removing an unknown user is a
    /// no-op, so absent-upsert followed by remove equals a single remove.
    pub fn remove(&mut self, user_id: &str) -> Option<CursorEntry> {
        let entry = self.entries.remove(user_id);
        if entry.is_some() {
            debug!(user = %user_id, "Registry: cursor removed");
        }
        entry
    }

    /// All active entries, in no particular order.
    #[must_use]
    pub fn entries(&self) -> Vec<&CursorEntry> {
        self.entries.values().collect()
    }

    /// Cloned snapshot of all entries, for roster sync.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CursorEntry> {
        self.entries.values().cloned().collect()
    }

    /// Check if no peers are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
