//! The authoritative in-memory session record (C1).
//!
//! All writes go through this store. Snapshots are full clones: a reader
//! never observes a later write through a snapshot it already holds.
//! Cross-session isolation is by construction: each session owns its own
//! store.

use forge_contract::SessionState;
use std::sync::RwLock;

#[derive(Debug)]
pub struct StateStore {
    inner: RwLock<SessionState>,
}

impl StateStore {
    pub fn new(initial: SessionState) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    /// Consistent snapshot of the current record.
    pub fn snapshot(&self) -> SessionState {
        self.inner.read().expect("state lock poisoned").clone()
    }

    /// Replace the whole record.
    pub fn replace(&self, state: SessionState) {
        *self.inner.write().expect("state lock poisoned") = state;
    }

    /// Apply a mutation and return the post-write snapshot.
    ///
    /// Field updates and batch updates are both expressed through the
    /// closure; writes are serialized by the lock.
    pub fn update<F>(&self, f: F) -> SessionState
    where
        F: FnOnce(&mut SessionState),
    {
        let mut guard = self.inner.write().expect("state lock poisoned");
        f(&mut guard);
        guard.clone()
    }

    /// Read a derived value without cloning the whole record.
    pub fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&SessionState) -> T,
    {
        f(&self.inner.read().expect("state lock poisoned"))
    }
}
