//! The shared toggle switch.
//!
//! A single boolean with last-writer-wins semantics, persisted across
//! restarts. The critical invariant is echo suppression: [`SwitchState::set`]
//! yields a `SwitchFlipped` event for publication, while
//! [`SwitchState::apply_remote`] absorbs a received flip without producing
//! one, so a flip can never loop through the relay forever.

use flick_protocol::{BroadcastEvent, SwitchFlipped};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-backed persistence for the switch value.
///
/// The on-disk format is the wire payload itself: `{"toggleSwitch":bool}`.
/// All I/O is best-effort; failures are logged and the in-memory value
/// stays authoritative.
#[derive(Debug, Clone)]
pub struct SwitchStore {
    path: PathBuf,
}

impl SwitchStore {
    /// Create a store at the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted value, if any.
    #[must_use]
    pub fn load(&self) -> Option<bool> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read switch state");
                return None;
            }
        };

        match serde_json::from_str::<SwitchFlipped>(&contents) {
            Ok(p) => Some(p.toggle_switch),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt switch state file");
                None
            }
        }
    }

    /// Persist a value, logging on failure.
    pub fn save(&self, value: bool) {
        let payload = SwitchFlipped {
            toggle_switch: value,
        };
        let contents = match serde_json::to_string(&payload) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to serialize switch state");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, contents) {
            warn!(path = %self.path.display(), error = %e, "Failed to persist switch state");
        }
    }
}

/// The shared switch value plus optional persistence.
#[derive(Debug, Default)]
pub struct SwitchState {
    value: bool,
    store: Option<SwitchStore>,
}

impl SwitchState {
    /// Create an in-memory switch, defaulting to `false`.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Create a switch backed by a store, loading any persisted value.
    #[must_use]
    pub fn with_store(store: SwitchStore) -> Self {
        let value = store.load().unwrap_or(false);
        debug!(value, path = %store.path().display(), "Loaded switch state");
        Self {
            value,
            store: Some(store),
        }
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> bool {
        self.value
    }

    /// Flip the switch locally.
    ///
    /// Persists the new value and returns the `SwitchFlipped` event the
    /// caller must publish with the sender excluded.
    pub fn set(&mut self, value: bool) -> BroadcastEvent {
        self.value = value;
        self.persist();
        BroadcastEvent::switch_flipped(value)
    }

    /// Absorb a flip received from the broadcast channel.
    ///
    /// Updates state and persistence but never yields an event to
    /// publish: re-publishing here would echo forever.
    pub fn apply_remote(&mut self, value: bool) {
        self.value = value;
        self.persist();
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            store.save(self.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_false() {
        let switch = SwitchState::in_memory();
        assert!(!switch.get());
    }

    #[test]
    fn test_set_returns_event() {
        let mut switch = SwitchState::in_memory();
        let event = switch.set(true);
        assert!(switch.get());
        assert_eq!(event, BroadcastEvent::switch_flipped(true));
    }

    #[test]
    fn test_apply_remote_updates_silently() {
        let mut switch = SwitchState::in_memory();
        switch.apply_remote(true);
        assert!(switch.get());
    }

    #[test]
    fn test_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switch.json");

        {
            let mut switch = SwitchState::with_store(SwitchStore::new(&path));
            assert!(!switch.get());
            switch.set(true);
        }

        // A fresh process sees the persisted value.
        let switch = SwitchState::with_store(SwitchStore::new(&path));
        assert!(switch.get());
    }

    #[test]
    fn test_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switch.json");
        std::fs::write(&path, "not json").unwrap();

        let switch = SwitchState::with_store(SwitchStore::new(&path));
        assert!(!switch.get());
    }

    #[test]
    fn test_last_writer_wins() {
        let mut switch = SwitchState::in_memory();
        switch.set(true);
        switch.apply_remote(false);
        switch.apply_remote(true);
        assert!(switch.get());
    }
}
