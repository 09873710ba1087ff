//! Session identity: stable per-browser-session user ids and colors.
//!
//! A client presenting a known token gets the same identity back, so
//! reconnects within a session keep their user id and color. Tokens and
//! user ids combine a nanosecond timestamp with randomness so concurrent
//! clients never collide in practice. Colors are uniform over the RGB
//! space and are NOT collision-checked: two users can share a color,
//! which is an accepted limitation of the demo.

use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Counter distinguishing identities minted within the same nanosecond.
static MINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A user's stable identity for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Opaque unique user id.
    pub user_id: String,
    /// Assigned display color, `#rrggbb`.
    pub color: String,
}

/// Generate a random display color, uniform over 24-bit RGB.
#[must_use]
pub fn random_color() -> String {
    let rgb: u32 = rand::thread_rng().gen_range(0..=0xff_ff_ff);
    format!("#{rgb:06x}")
}

fn mint_user_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let counter = MINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("user_{nanos:x}{counter:x}")
}

fn mint_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let suffix: u64 = rand::thread_rng().gen();
    format!("sess_{nanos:x}_{suffix:x}")
}

/// Directory of session identities keyed by token.
///
/// Identities live for the process lifetime; there is no expiry, matching
/// the ephemeral best-effort scope of the system.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: DashMap<String, SessionIdentity>,
}

impl SessionDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a token to an identity, minting both when the token is
    /// missing or unknown. Always succeeds.
    pub fn identify(&self, existing_token: Option<&str>) -> (String, SessionIdentity) {
        if let Some(token) = existing_token {
            if let Some(identity) = self.sessions.get(token) {
                debug!(user = %identity.user_id, "Session resumed");
                return (token.to_string(), identity.clone());
            }
        }

        let token = mint_token();
        let identity = SessionIdentity {
            user_id: mint_user_id(),
            color: random_color(),
        };
        debug!(user = %identity.user_id, color = %identity.color, "Session created");
        self.sessions.insert(token.clone(), identity.clone());
        (token, identity)
    }

    /// Look up an identity without minting.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<SessionIdentity> {
        self.sessions.get(token).map(|i| i.clone())
    }

    /// Number of known sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if no sessions are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
