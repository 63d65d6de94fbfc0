// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The coordination-service seam the Replication Log is built on: leader
//! election and a totally-ordered append log both reduce to four
//! primitives an external service (etcd, ZooKeeper, ...) already offers.
//! [`LocalCoordinationStore`] is the in-process "cluster of one" that
//! backs a single-replica deployment; a networked implementation plugs in
//! at the same [`CoordinationStore`] trait without touching the log or
//! replica state machine.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::ReplicationResult;

/// An ephemeral node's lease, held as long as this guard lives. Dropping
/// it releases the node so another caller can claim it (leader
/// election). Opaque by design: each `CoordinationStore` implementation
/// boxes whatever it needs (a local map entry, a networked session
/// handle, ...) behind it.
pub type EphemeralGuard = Box<dyn Send + Sync>;

/// The coordination primitives the Replication Log needs from an
/// external service. An ephemeral node disappears when its guard is
/// dropped; a sequential node's name carries a monotonically increasing
/// suffix assigned by the store, giving the log its total order for
/// free.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Create `path` holding `value` if absent, returning a guard whose
    /// drop releases it. Used for leader election: exactly one caller
    /// across the cluster observes `Some`.
    async fn create_ephemeral(
        &self,
        path: &str,
        value: Vec<u8>,
    ) -> ReplicationResult<Option<EphemeralGuard>>;

    /// Create a new node under `prefix` whose name is `prefix` suffixed
    /// with a store-assigned, monotonically increasing sequence number.
    /// Returns the full node path.
    async fn create_sequential(&self, prefix: &str, value: Vec<u8>) -> ReplicationResult<String>;

    /// Atomically replace the value at `path`: succeeds and swaps in
    /// `new` only if the current value equals `expected` (`None` means
    /// "path must not exist yet").
    async fn compare_and_swap(
        &self,
        path: &str,
        expected: Option<Vec<u8>>,
        new: Vec<u8>,
    ) -> ReplicationResult<bool>;

    async fn get(&self, path: &str) -> ReplicationResult<Option<Vec<u8>>>;

    /// A notifier that fires at least once after every change to `path`
    /// (creation, CAS, or ephemeral release).
    async fn watch(&self, path: &str) -> Arc<Notify>;
}

#[derive(Default)]
struct State {
    nodes: HashMap<String, Vec<u8>>,
    sequences: HashMap<String, u64>,
}

struct Inner {
    state: Mutex<State>,
    notifiers: Mutex<HashMap<String, Arc<Notify>>>,
}

impl Inner {
    fn notifier_for(&self, path: &str) -> Arc<Notify> {
        self.notifiers.lock().entry(path.to_string()).or_insert_with(|| Arc::new(Notify::new())).clone()
    }
}

/// Single-process "cluster of one": every primitive is backed by a
/// `parking_lot`-guarded map plus a [`Notify`] per watched path. Correct
/// for a lone replica or for tests; a real deployment plugs a networked
/// `CoordinationStore` in its place. Cheap to clone (an `Arc` wrapper).
#[derive(Clone)]
pub struct LocalCoordinationStore(Arc<Inner>);

struct LocalEphemeralGuard {
    inner: Arc<Inner>,
    path: String,
}

impl Drop for LocalEphemeralGuard {
    fn drop(&mut self) {
        self.inner.state.lock().nodes.remove(&self.path);
        self.inner.notifier_for(&self.path).notify_waiters();
    }
}

impl LocalCoordinationStore {
    pub fn new() -> Self {
        Self(Arc::new(Inner { state: Mutex::new(State::default()), notifiers: Mutex::new(HashMap::new()) }))
    }
}

impl Default for LocalCoordinationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for LocalCoordinationStore {
    async fn create_ephemeral(
        &self,
        path: &str,
        value: Vec<u8>,
    ) -> ReplicationResult<Option<EphemeralGuard>> {
        let mut state = self.0.state.lock();
        if state.nodes.contains_key(path) {
            return Ok(None);
        }
        state.nodes.insert(path.to_string(), value);
        drop(state);
        self.0.notifier_for(path).notify_waiters();
        Ok(Some(Box::new(LocalEphemeralGuard { inner: self.0.clone(), path: path.to_string() })))
    }

    async fn create_sequential(&self, prefix: &str, value: Vec<u8>) -> ReplicationResult<String> {
        let mut state = self.0.state.lock();
        let seq = state.sequences.entry(prefix.to_string()).or_insert(0);
        *seq += 1;
        let path = format!("{prefix}{:010}", *seq);
        state.nodes.insert(path.clone(), value);
        drop(state);
        self.0.notifier_for(&path).notify_waiters();
        self.0.notifier_for(prefix).notify_waiters();
        Ok(path)
    }

    async fn compare_and_swap(
        &self,
        path: &str,
        expected: Option<Vec<u8>>,
        new: Vec<u8>,
    ) -> ReplicationResult<bool> {
        let mut state = self.0.state.lock();
        let current = state.nodes.get(path).cloned();
        if current != expected {
            return Ok(false);
        }
        state.nodes.insert(path.to_string(), new);
        drop(state);
        self.0.notifier_for(path).notify_waiters();
        Ok(true)
    }

    async fn get(&self, path: &str) -> ReplicationResult<Option<Vec<u8>>> {
        Ok(self.0.state.lock().nodes.get(path).cloned())
    }

    async fn watch(&self, path: &str) -> Arc<Notify> {
        self.0.notifier_for(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_one_caller_wins_ephemeral_creation() {
        let store = LocalCoordinationStore::new();
        let first = store.create_ephemeral("leader", b"a".to_vec()).await.unwrap();
        let second = store.create_ephemeral("leader", b"b".to_vec()).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn dropping_the_guard_frees_the_node_for_re_election() {
        let store = LocalCoordinationStore::new();
        let guard = store.create_ephemeral("leader", b"a".to_vec()).await.unwrap().unwrap();
        drop(guard);
        let second = store.create_ephemeral("leader", b"b".to_vec()).await.unwrap();
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn sequential_nodes_are_strictly_increasing() {
        let store = LocalCoordinationStore::new();
        let a = store.create_sequential("logs/", b"1".to_vec()).await.unwrap();
        let b = store.create_sequential("logs/", b"2".to_vec()).await.unwrap();
        assert_eq!(a, "logs/0000000001");
        assert_eq!(b, "logs/0000000002");
    }

    #[tokio::test]
    async fn compare_and_swap_rejects_stale_expectation() {
        let store = LocalCoordinationStore::new();
        store.compare_and_swap("x", None, b"1".to_vec()).await.unwrap();
        let ok = store.compare_and_swap("x", Some(b"wrong".to_vec()), b"2".to_vec()).await.unwrap();
        assert!(!ok);
        let ok = store.compare_and_swap("x", Some(b"1".to_vec()), b"2".to_vec()).await.unwrap();
        assert!(ok);
        assert_eq!(store.get("x").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn watch_fires_after_a_sequential_create() {
        let store = LocalCoordinationStore::new();
        let notify = store.watch("logs/").await;
        let waiter = tokio::spawn(async move {
            notify.notified().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        store.create_sequential("logs/", b"x".to_vec()).await.unwrap();
        waiter.await.unwrap();
    }
}
