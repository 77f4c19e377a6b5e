//! Single-key session registry.
//!
//! One live session per identifier; the tag is ignored. Unlike [`Hub`],
//! removing a session from a [`UniqueHub`] also closes it.
//!
//! [`Hub`]: super::Hub

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::session::Session;

// ============================================================================
// UniqueHub
// ============================================================================

/// Concurrent registry holding at most one session per identifier.
///
/// Evicted sessions are closed after the registry lock is released, so a
/// close callback may call back into the hub.
#[derive(Debug, Default)]
pub struct UniqueHub {
    sessions: RwLock<FxHashMap<String, Session>>,
    count: AtomicUsize,
}

impl UniqueHub {
    /// Creates an empty hub.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session` under its identifier.
    ///
    /// An existing entry is replaced and returned; it is not closed.
    pub fn add(&self, session: &Session) -> Option<Session> {
        let replaced = {
            let mut sessions = self.sessions.write();
            let replaced = sessions.insert(session.identifier().to_string(), session.clone());
            if replaced.is_none() {
                self.count.fetch_add(1, Ordering::Relaxed);
            }
            replaced
        };

        debug!(
            session_id = %session.id(),
            identifier = %session.identifier(),
            replaced = replaced.is_some(),
            "Session added to unique hub"
        );
        replaced
    }

    /// Removes and closes `session` if it is the entry stored under its
    /// identifier. Returns `true` if an entry was removed.
    pub fn remove(&self, session: &Session) -> bool {
        let removed = {
            let mut sessions = self.sessions.write();
            let stored = sessions
                .get(session.identifier())
                .is_some_and(|stored| stored.ptr_eq(session));
            if stored {
                self.count.fetch_sub(1, Ordering::Relaxed);
                sessions.remove(session.identifier())
            } else {
                None
            }
        };

        match removed {
            Some(session) => {
                evict(&session);
                true
            }
            None => false,
        }
    }

    /// Removes and closes whatever session is registered under `identifier`.
    pub fn remove_identifier(&self, identifier: &str) -> Option<Session> {
        let removed = {
            let mut sessions = self.sessions.write();
            let removed = sessions.remove(identifier)?;
            self.count.fetch_sub(1, Ordering::Relaxed);
            removed
        };
        evict(&removed);
        Some(removed)
    }

    /// Returns the session registered under `identifier`.
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<Session> {
        self.sessions.read().get(identifier).cloned()
    }

    /// Returns every registered session, in no particular order.
    #[must_use]
    pub fn get_all(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    /// Returns the number of registered sessions.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns `true` if no session is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Closes a session that has just left the registry.
fn evict(session: &Session) {
    debug!(
        session_id = %session.id(),
        identifier = %session.identifier(),
        "Session evicted from unique hub"
    );
    if let Err(e) = session.close() {
        warn!(session_id = %session.id(), error = %e, "Closing evicted session failed");
    }
}

// ============================================================================
// Tests
// ============================================================================
