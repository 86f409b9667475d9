//! Per-session state tables.
//!
//! Every stateful component keeps one [`SessionScopes`] table: a concurrent
//! map from session key to that session's state behind its own mutex.
//! Operations on different sessions never contend; operations on the same
//! session are serialized by the session mutex.
//!
//! A scope can be removed while another thread still holds its `Arc`. Removal
//! marks the slot retired under the lock, and [`SessionScopes::with`]
//! retries on a retired slot, so no write ever lands in a removed scope.
//!
//! Lock order: a session mutex may be held while touching a `DashMap`
//! shard, never the other way around.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use toolbridge_domain::SessionId;

/// Session key where calls may be sessionless.
pub type ScopeKey = Option<SessionId>;

#[derive(Default)]
struct Slot<T> {
    retired: bool,
    state: T,
}

pub(crate) struct SessionScopes<K, T> {
    scopes: DashMap<K, Arc<Mutex<Slot<T>>>>,
}

impl<K, T> SessionScopes<K, T>
where
    K: Eq + Hash + Clone,
    T: Default,
{
    pub(crate) fn new() -> Self {
        Self {
            scopes: DashMap::new(),
        }
    }

    /// Run `f` on the scope for `key`, creating it if absent.
    pub(crate) fn with<R>(&self, key: &K, f: impl FnOnce(&mut T) -> R) -> R {
        loop {
            let scope = Arc::clone(self.scopes.entry(key.clone()).or_default().value());
            let mut slot = scope.lock();
            if !slot.retired {
                return f(&mut slot.state);
            }
        }
    }

    /// Run `f` on the scope for `key` if it exists.
    pub(crate) fn read<R>(&self, key: &K, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        loop {
            let scope = self.scopes.get(key).map(|s| Arc::clone(s.value()))?;
            let mut slot = scope.lock();
            if !slot.retired {
                return Some(f(&mut slot.state));
            }
        }
    }

    /// Remove the scope for `key`, returning its state.
    pub(crate) fn take(&self, key: &K) -> Option<T> {
        loop {
            let scope = self.scopes.get(key).map(|s| Arc::clone(s.value()))?;
            let mut slot = scope.lock();
            if slot.retired {
                continue;
            }
            slot.retired = true;
            let state = std::mem::take(&mut slot.state);
            self.scopes.remove_if(key, |_, s| Arc::ptr_eq(s, &scope));
            return Some(state);
        }
    }

    /// Remove the scope for `key` if `should_remove` accepts its state.
    ///
    /// The check and the removal happen under the session lock, so a scope
    /// that gains state concurrently is never dropped.
    pub(crate) fn take_if(&self, key: &K, should_remove: impl FnOnce(&T) -> bool) -> Option<T> {
        let scope = self.scopes.get(key).map(|s| Arc::clone(s.value()))?;
        let mut slot = scope.lock();
        if slot.retired || !should_remove(&slot.state) {
            return None;
        }
        slot.retired = true;
        let state = std::mem::take(&mut slot.state);
        self.scopes.remove_if(key, |_, s| Arc::ptr_eq(s, &scope));
        Some(state)
    }

    /// Visit every scope; scopes for which `f` returns `true` are removed.
    ///
    /// Returns the number of scopes removed.
    pub(crate) fn sweep(&self, mut f: impl FnMut(&K, &mut T) -> bool) -> usize {
        let mut removed = 0;
        for key in self.keys() {
            let Some(scope) = self.scopes.get(&key).map(|s| Arc::clone(s.value())) else {
                continue;
            };
            let mut slot = scope.lock();
            if slot.retired {
                continue;
            }
            if f(&key, &mut slot.state) {
                slot.retired = true;
                self.scopes.remove_if(&key, |_, s| Arc::ptr_eq(s, &scope));
                removed += 1;
            }
        }
        removed
    }

    /// Remove every scope.
    pub(crate) fn clear(&self) {
        for key in self.keys() {
            self.take(&key);
        }
    }

    pub(crate) fn keys(&self) -> Vec<K> {
        self.scopes.iter().map(|e| e.key().clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.scopes.len()
    }
}
