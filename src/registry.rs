//! Nickname registry
//!
//! Thread-safe map from nickname to `SessionHandle`. Uses DashMap so that
//! registration is an atomic insert-if-absent on one shard and snapshots
//! never hold a lock past the copy.

use std::collections::BTreeSet;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::session::SessionHandle;

/// Registry of joined sessions keyed by nickname
///
/// Invariant: at most one entry per nickname. A nickname is free again
/// only after `remove`.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: DashMap<String, SessionHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `nickname` for `handle`
    ///
    /// Returns false if the nickname is already taken. Of several
    /// concurrent callers with the same nickname exactly one gets true.
    #[instrument(skip(self, handle), fields(connection = %handle.id()))]
    pub fn register(&self, nickname: &str, handle: SessionHandle) -> bool {
        match self.sessions.entry(nickname.to_string()) {
            Entry::Occupied(_) => {
                debug!("Nickname already taken");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(handle);
                debug!("Nickname registered");
                true
            }
        }
    }

    /// Drop the entry for `nickname` if there is one
    pub fn remove(&self, nickname: &str) {
        if self.sessions.remove(nickname).is_some() {
            debug!(nickname, "Nickname released");
        }
    }

    /// Current handle for `nickname`
    ///
    /// The session may disconnect right after this returns; delivery
    /// through the handle is best-effort.
    pub fn lookup(&self, nickname: &str) -> Option<SessionHandle> {
        self.sessions.get(nickname).map(|entry| entry.value().clone())
    }

    /// Point-in-time copy of all registered nicknames
    pub fn snapshot_users(&self) -> BTreeSet<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Point-in-time copy of all registered session handles
    pub fn snapshot_sessions(&self) -> Vec<SessionHandle> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use tokio::sync::mpsc;

    use crate::message::ServerMessage;
    use crate::session::Session;
    use crate::types::ConnectionId;

    fn handle(name: &str) -> (SessionHandle, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(8);
        let session = Session::new(ConnectionId::new(), name.to_string(), tx);
        (session.handle(), rx)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        let (alice, _rx) = handle("alice");
        let alice_id = alice.id();

        assert!(registry.register("alice", alice));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("alice").map(|h| h.id()), Some(alice_id));
        assert!(registry.lookup("bob").is_none());
    }

    #[test]
    fn test_register_conflict_keeps_first() {
        let registry = Registry::new();
        let (first, _rx1) = handle("alice");
        let (second, _rx2) = handle("alice");
        let first_id = first.id();

        assert!(registry.register("alice", first));
        assert!(!registry.register("alice", second));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("alice").map(|h| h.id()), Some(first_id));
    }

    #[test]
    fn test_nickname_reusable_after_remove() {
        let registry = Registry::new();
        let (first, _rx1) = handle("bob");
        let (second, _rx2) = handle("bob");

        assert!(registry.register("bob", first));
        registry.remove("bob");
        assert!(registry.is_empty());
        assert!(registry.register("bob", second));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = Registry::new();
        let (bob, _rx) = handle("bob");
        registry.register("bob", bob);

        registry.remove("bob");
        registry.remove("bob");
        registry.remove("nobody");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshots_are_copies() {
        let registry = Registry::new();
        let (alice, _rx1) = handle("alice");
        let (bob, _rx2) = handle("bob");
        registry.register("bob", bob);
        registry.register("alice", alice);

        let users = registry.snapshot_users();
        let sessions = registry.snapshot_sessions();
        registry.remove("alice");

        assert_eq!(
            users.into_iter().collect::<Vec<_>>(),
            vec!["alice".to_string(), "bob".to_string()]
        );
        assert_eq!(sessions.len(), 2);
        assert_eq!(registry.snapshot_users().len(), 1);
    }

    #[test]
    fn test_concurrent_registration_single_winner() {
        const CONTENDERS: usize = 16;

        for _ in 0..50 {
            let registry = Arc::new(Registry::new());
            let barrier = Arc::new(Barrier::new(CONTENDERS));

            let wins: usize = thread::scope(|scope| {
                let workers: Vec<_> = (0..CONTENDERS)
                    .map(|_| {
                        let registry = Arc::clone(&registry);
                        let barrier = Arc::clone(&barrier);
                        scope.spawn(move || {
                            let (h, _rx) = handle("carol");
                            barrier.wait();
                            registry.register("carol", h)
                        })
                    })
                    .collect();
                workers
                    .into_iter()
                    .map(|w| w.join().unwrap())
                    .filter(|won| *won)
                    .count()
            });

            assert_eq!(wins, 1);
            assert_eq!(registry.len(), 1);
        }
    }
}
