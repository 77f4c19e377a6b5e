//! Two-level session registry.
//!
//! Sessions are indexed by identifier, then by tag, so one identity can
//! hold several live sessions (one per device, say).
//!
//! ```text
//! Hub
//! ├── "alice" ─┬── "phone"  → Session
//! │            └── "laptop" → Session
//! └── "bob" ───── "tag"    → Session
//! ```
//!
//! The hub indexes sessions; it never opens or closes them.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::session::Session;

// ============================================================================
// Types
// ============================================================================

/// Sessions of one identifier, by tag.
type Group = FxHashMap<String, Session>;

// ============================================================================
// Hub
// ============================================================================

/// Concurrent registry of live sessions keyed by identifier and tag.
///
/// # Thread Safety
///
/// All operations take `&self`; lookups share a read lock, mutations take
/// the write lock. [`Hub::count`] reads an atomic counter without locking.
#[derive(Debug, Default)]
pub struct Hub {
    groups: RwLock<FxHashMap<String, Group>>,
    count: AtomicUsize,
}

// ============================================================================
// Hub - Constructor
// ============================================================================

impl Hub {
    /// Creates an empty hub.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// Hub - Mutation
// ============================================================================

impl Hub {
    /// Registers `session` under its identifier and tag.
    ///
    /// An existing entry under the same key is replaced and returned; it is
    /// not closed.
    pub fn add(&self, session: &Session) -> Option<Session> {
        let replaced = {
            let mut groups = self.groups.write();
            let replaced = groups
                .entry(session.identifier().to_string())
                .or_default()
                .insert(session.tag().to_string(), session.clone());

            if replaced.is_none() {
                self.count.fetch_add(1, Ordering::Relaxed);
            }
            replaced
        };

        debug!(
            session_id = %session.id(),
            identifier = %session.identifier(),
            tag = %session.tag(),
            replaced = replaced.is_some(),
            "Session added to hub"
        );
        replaced
    }

    /// Removes `session` if it is the entry stored under its key.
    ///
    /// A newer session registered under the same key is left in place.
    /// Returns `true` if an entry was removed.
    pub fn remove(&self, session: &Session) -> bool {
        {
            let mut groups = self.groups.write();

            let Some(group) = groups.get_mut(session.identifier()) else {
                return false;
            };
            if !group
                .get(session.tag())
                .is_some_and(|stored| stored.ptr_eq(session))
            {
                return false;
            }

            group.remove(session.tag());
            if group.is_empty() {
                groups.remove(session.identifier());
            }
            self.count.fetch_sub(1, Ordering::Relaxed);
        }

        debug!(
            session_id = %session.id(),
            identifier = %session.identifier(),
            tag = %session.tag(),
            "Session removed from hub"
        );
        true
    }

    /// Removes every session registered under `identifier`.
    ///
    /// Returns the number of sessions removed.
    pub fn remove_group(&self, identifier: &str) -> usize {
        let removed = {
            let mut groups = self.groups.write();
            let removed = groups.remove(identifier).map_or(0, |group| group.len());
            self.count.fetch_sub(removed, Ordering::Relaxed);
            removed
        };

        if removed > 0 {
            debug!(%identifier, removed, "Session group removed from hub");
        }
        removed
    }
}

// ============================================================================
// Hub - Lookup
// ============================================================================

impl Hub {
    /// Returns the session registered under `identifier` and `tag`.
    #[must_use]
    pub fn get(&self, identifier: &str, tag: &str) -> Option<Session> {
        self.groups.read().get(identifier)?.get(tag).cloned()
    }

    /// Returns every session registered under `identifier`, in no particular order.
    #[must_use]
    pub fn get_group(&self, identifier: &str) -> Vec<Session> {
        self.groups
            .read()
            .get(identifier)
            .map(|group| group.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns every registered session, in no particular order.
    #[must_use]
    pub fn get_all(&self) -> Vec<Session> {
        let groups = self.groups.read();
        let mut sessions = Vec::with_capacity(self.count());
        for group in groups.values() {
            sessions.extend(group.values().cloned());
        }
        sessions
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

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::testing::ScriptedConnection;

    async fn session(identifier: &str, tag: &str) -> Session {
        Session::builder()
            .connection(ScriptedConnection::new())
            .identifier(identifier)
            .tag(tag)
            .open()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let hub = Hub::new();
        let phone = session("alice", "phone").await;
        let laptop = session("alice", "laptop").await;

        assert!(hub.add(&phone).is_none());
        assert!(hub.add(&laptop).is_none());

        assert_eq!(hub.count(), 2);
        assert_eq!(hub.get("alice", "phone"), Some(phone));
        assert_eq!(hub.get("alice", "laptop"), Some(laptop));
        assert!(hub.get("alice", "tablet").is_none());
        assert!(hub.get("bob", "phone").is_none());
    }

    #[tokio::test]
    async fn test_add_same_key_replaces_without_counting() {
        let hub = Hub::new();
        let old = session("alice", "phone").await;
        let new = session("alice", "phone").await;

        hub.add(&old);
        let replaced = hub.add(&new);

        assert_eq!(replaced, Some(old.clone()));
        assert!(!old.is_closed());
        assert_eq!(hub.count(), 1);
        assert_eq!(hub.get("alice", "phone"), Some(new));
    }

    #[tokio::test]
    async fn test_stale_remove_keeps_newer_session() {
        let hub = Hub::new();
        let old = session("alice", "phone").await;
        let new = session("alice", "phone").await;

        hub.add(&old);
        hub.add(&new);

        assert!(!hub.remove(&old));
        assert_eq!(hub.count(), 1);
        assert_eq!(hub.get("alice", "phone"), Some(new.clone()));

        assert!(hub.remove(&new));
        assert!(!hub.remove(&new));
        assert!(hub.is_empty());
        assert!(hub.get_group("alice").is_empty());
    }

    #[tokio::test]
    async fn test_group_operations() {
        let hub = Hub::new();
        for tag in ["phone", "laptop", "tablet"] {
            hub.add(&session("alice", tag).await);
        }
        hub.add(&session("bob", "phone").await);

        assert_eq!(hub.get_group("alice").len(), 3);
        assert_eq!(hub.get_group("bob").len(), 1);
        assert!(hub.get_group("carol").is_empty());
        assert_eq!(hub.get_all().len(), 4);

        assert_eq!(hub.remove_group("alice"), 3);
        assert_eq!(hub.remove_group("alice"), 0);
        assert_eq!(hub.count(), 1);
        assert_eq!(hub.get_all().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_remove() {
        let hub = Arc::new(Hub::new());
        let mut sessions = Vec::new();
        for i in 0..64 {
            sessions.push(session(&format!("user-{}", i % 8), &format!("tag-{i}")).await);
        }

        let mut tasks = Vec::new();
        for session in sessions.clone() {
            let hub = Arc::clone(&hub);
            tasks.push(tokio::spawn(async move { hub.add(&session) }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(hub.count(), 64);

        let mut tasks = Vec::new();
        for session in sessions.into_iter().step_by(2) {
            let hub = Arc::clone(&hub);
            tasks.push(tokio::spawn(async move { hub.remove(&session) }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(hub.count(), 32);
        assert_eq!(hub.get_all().len(), 32);
    }

    #[tokio::test]
    async fn test_logs_after_releasing_lock() {
        use std::sync::atomic::AtomicBool;

        use tracing::{Event, Subscriber};
        use tracing_subscriber::layer::{Context, Layer};
        use tracing_subscriber::prelude::*;

        /// Flags any event emitted while the hub's lock is held.
        struct LockCheck {
            hub: Arc<Hub>,
            held: Arc<AtomicBool>,
        }

        impl<S: Subscriber> Layer<S> for LockCheck {
            fn on_event(&self, _event: &Event<'_>, _ctx: Context<'_, S>) {
                if self.hub.groups.try_read().is_none() {
                    self.held.store(true, Ordering::SeqCst);
                }
            }
        }

        let hub = Arc::new(Hub::new());
        let held = Arc::new(AtomicBool::new(false));
        let subscriber = tracing_subscriber::registry().with(LockCheck {
            hub: Arc::clone(&hub),
            held: Arc::clone(&held),
        });
        let _guard = tracing::subscriber::set_default(subscriber);

        let phone = session("alice", "phone").await;
        let laptop = session("alice", "laptop").await;
        hub.add(&phone);
        hub.add(&laptop);
        hub.remove(&phone);
        hub.remove_group("alice");

        assert!(hub.is_empty());
        assert!(!held.load(Ordering::SeqCst));
    }

    mod proptests {
        use super::*;

        use proptest::prelude::*;
        use proptest::test_runner::TestCaseError;

        #[derive(Debug, Clone)]
        enum Op {
            Add(usize),
            Remove(usize),
            RemoveGroup(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                3 => (0..12usize).prop_map(Op::Add),
                2 => (0..12usize).prop_map(Op::Remove),
                1 => (0..3usize).prop_map(Op::RemoveGroup),
            ]
        }

        proptest! {
            #[test]
            fn count_matches_entries(ops in proptest::collection::vec(op(), 1..40)) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();

                rt.block_on(async {
                    // Twelve sessions over three identifiers and two tags: keys collide.
                    let mut pool = Vec::new();
                    for i in 0..12 {
                        pool.push(session(&format!("user-{}", i % 3), &format!("tag-{}", i % 2)).await);
                    }

                    let hub = Hub::new();
                    for op in ops {
                        match op {
                            Op::Add(i) => { hub.add(&pool[i]); }
                            Op::Remove(i) => { hub.remove(&pool[i]); }
                            Op::RemoveGroup(g) => { hub.remove_group(&format!("user-{g}")); }
                        }

                        let all = hub.get_all();
                        prop_assert_eq!(hub.count(), all.len());
                        for stored in &all {
                            let found = hub.get(stored.identifier(), stored.tag());
                            prop_assert_eq!(found.as_ref(), Some(stored));
                        }
                    }
                    Ok::<(), TestCaseError>(())
                })?;
            }
        }
    }
}
