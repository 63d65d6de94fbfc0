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

//! The Replication Log (4.F): a leader-elected, totally-ordered
//! [`dogma_core::Command`] log. Only the current leader appends; every
//! replica, leader included, applies entries strictly in sequence order
//! and persists how far it has gotten so a restart resumes rather than
//! replaying from scratch.
//!
//! Contracts: R1 (total order; naturally-idempotent commands carry an
//! idempotency token and duplicate submission is rejected rather than
//! silently absorbed), R2 (admin status changes are logged like any
//! other command, no special-casing), R3 (login produces exactly one
//! entry, logout exactly one, a failed login produces none - enforced by
//! callers constructing `Command::CreateSession`/`RemoveSession` only on
//! success).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dogma_core::Command;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordination::{CoordinationStore, EphemeralGuard};
use crate::error::{ReplicationError, ReplicationResult};

const LEADER_PATH: &str = "leader";
const LOG_PREFIX: &str = "logs/";

/// One entry in the replicated log. `result` is advisory only (surfaced
/// to operators, e.g. via a status endpoint) and is never consulted
/// during replay - replay correctness depends solely on `command`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub replica_id: String,
    pub command: Command,
    pub result: Option<String>,
}

/// Where a replica sits in the leader-election lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaState {
    Starting,
    Follower,
    Leader,
    Stopping,
}

/// A single replica's view of the log: append (leader only) and
/// catch-up (every replica), backed by a [`CoordinationStore`] for
/// ordering and a local "last applied revision" counter for resume.
pub struct ReplicationLog<S: CoordinationStore> {
    store: Arc<S>,
    replica_id: String,
    state: Mutex<ReplicaState>,
    leadership: Mutex<Option<EphemeralHandle>>,
    last_applied: AtomicI64,
    applied_tokens: Mutex<HashSet<Uuid>>,
    data_dir: Option<PathBuf>,
}

impl<S: CoordinationStore + 'static> ReplicationLog<S> {
    pub fn new(store: S, replica_id: impl Into<String>) -> Self {
        Self {
            store: Arc::new(store),
            replica_id: replica_id.into(),
            state: Mutex::new(ReplicaState::Starting),
            leadership: Mutex::new(None),
            last_applied: AtomicI64::new(0),
            applied_tokens: Mutex::new(HashSet::new()),
            data_dir: None,
        }
    }

    /// Resume from a persisted "last applied revision" counter under
    /// `dir`, if one exists.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> ReplicationResult<Self> {
        let dir = dir.into();
        if let Ok(bytes) = std::fs::read(cursor_path(&dir)) {
            let text = String::from_utf8_lossy(&bytes);
            let parsed: i64 = text.trim().parse().map_err(|_| {
                ReplicationError::Corruption(format!("malformed cursor file: {text:?}"))
            })?;
            self.last_applied = AtomicI64::new(parsed);
        }
        self.data_dir = Some(dir);
        Ok(self)
    }

    pub fn state(&self) -> ReplicaState {
        *self.state.lock()
    }

    pub fn last_applied(&self) -> i64 {
        self.last_applied.load(Ordering::SeqCst)
    }

    /// Attempt to win leadership via an ephemeral node; at most one
    /// replica across the cluster holds it at a time. Returns whether
    /// this call won.
    pub async fn try_become_leader(&self) -> ReplicationResult<bool> {
        let handle = self
            .store
            .clone()
            .create_ephemeral(LEADER_PATH, self.replica_id.as_bytes().to_vec())
            .await?;
        let won = handle.is_some();
        *self.leadership.lock() = handle;
        *self.state.lock() = if won { ReplicaState::Leader } else { ReplicaState::Follower };
        Ok(won)
    }

    /// Release leadership, if held, reverting to `Follower`.
    pub fn step_down(&self) {
        self.leadership.lock().take();
        let mut state = self.state.lock();
        if *state == ReplicaState::Leader {
            *state = ReplicaState::Follower;
        }
    }

    pub fn stop(&self) {
        self.leadership.lock().take();
        *self.state.lock() = ReplicaState::Stopping;
    }

    /// Append `command` to the log. Only the current leader may call
    /// this; naturally-idempotent commands (session creation) carry an
    /// idempotency token and a second submission with the same token is
    /// rejected rather than appended again (R1).
    pub async fn append(&self, command: Command) -> ReplicationResult<i64> {
        if *self.state.lock() != ReplicaState::Leader {
            return Err(ReplicationError::NotLeader);
        }
        if let Some(token) = command.idempotency_token() {
            let mut seen = self.applied_tokens.lock();
            if seen.contains(&token) {
                return Err(ReplicationError::DuplicateSubmission);
            }
            seen.insert(token);
        }

        let entry = LogEntry { replica_id: self.replica_id.clone(), command, result: None };
        let payload = serde_json::to_vec(&entry)?;
        let node = self.store.create_sequential(LOG_PREFIX, payload).await?;
        sequence_of(&node)
    }

    /// Apply every entry strictly after the last-applied cursor, up to
    /// and including `through`, calling `apply` once per entry in order.
    /// `apply` performs the local side effect (e.g. a storage-layer
    /// `push`) and must tolerate being invoked during restart replay.
    pub async fn catch_up(
        &self,
        through: i64,
        mut apply: impl FnMut(&Command) -> ReplicationResult<()>,
    ) -> ReplicationResult<()> {
        let mut next = self.last_applied.load(Ordering::SeqCst) + 1;
        while next <= through {
            let node = format!("{LOG_PREFIX}{next:010}");
            let bytes =
                self.store.get(&node).await?.ok_or(ReplicationError::MissingEntry(next))?;
            let entry: LogEntry = serde_json::from_slice(&bytes)?;
            apply(&entry.command)?;
            if let Some(token) = entry.command.idempotency_token() {
                self.applied_tokens.lock().insert(token);
            }
            self.last_applied.store(next, Ordering::SeqCst);
            self.persist_cursor()?;
            next += 1;
        }
        Ok(())
    }

    fn persist_cursor(&self) -> ReplicationResult<()> {
        let Some(dir) = &self.data_dir else { return Ok(()) };
        std::fs::create_dir_all(dir)?;
        let path = cursor_path(dir);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, self.last_applied.load(Ordering::SeqCst).to_string())?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn cursor_path(dir: &Path) -> PathBuf {
    dir.join("last_applied_revision")
}

fn sequence_of(node: &str) -> ReplicationResult<i64> {
    node.rsplit_once(LOG_PREFIX.trim_end_matches('/'))
        .and_then(|(_, suffix)| suffix.trim_start_matches('/').parse::<i64>().ok())
        .ok_or_else(|| ReplicationError::Corruption(format!("malformed log node path: {node}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::LocalCoordinationStore;
    use dogma_core::Author;
    use std::sync::Mutex as StdMutex;

    fn create_project_command(name: &str) -> Command {
        Command::CreateProject {
            timestamp: chrono::Utc::now(),
            author: Author::system(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn only_the_leader_may_append() {
        let store = LocalCoordinationStore::new();
        let log = ReplicationLog::new(store, "r1");
        let err = log.append(create_project_command("a")).await.unwrap_err();
        assert!(matches!(err, ReplicationError::NotLeader));

        assert!(log.try_become_leader().await.unwrap());
        let seq = log.append(create_project_command("a")).await.unwrap();
        assert_eq!(seq, 1);
    }

    #[tokio::test]
    async fn second_replica_cannot_win_leadership_while_first_holds_it() {
        let store = LocalCoordinationStore::new();
        let leader = ReplicationLog::new(store.clone(), "r1");
        let follower = ReplicationLog::new(store, "r2");

        assert!(leader.try_become_leader().await.unwrap());
        assert!(!follower.try_become_leader().await.unwrap());
        assert_eq!(follower.state(), ReplicaState::Follower);

        leader.step_down();
        assert!(follower.try_become_leader().await.unwrap());
    }

    #[tokio::test]
    async fn catch_up_applies_entries_in_order_and_advances_cursor() {
        let store = LocalCoordinationStore::new();
        let log = ReplicationLog::new(store, "r1");
        log.try_become_leader().await.unwrap();
        log.append(create_project_command("a")).await.unwrap();
        log.append(create_project_command("b")).await.unwrap();

        let applied = Arc::new(StdMutex::new(Vec::new()));
        let applied_clone = applied.clone();
        log.catch_up(2, move |command| {
            if let Command::CreateProject { name, .. } = command {
                applied_clone.lock().unwrap().push(name.clone());
            }
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(*applied.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(log.last_applied(), 2);
    }

    #[tokio::test]
    async fn duplicate_idempotency_token_is_rejected_not_silently_absorbed() {
        let store = LocalCoordinationStore::new();
        let log = ReplicationLog::new(store, "r1");
        log.try_become_leader().await.unwrap();

        let token = Uuid::new_v4();
        let cmd = Command::CreateSession {
            timestamp: chrono::Utc::now(),
            author: Author::system(),
            session_id: Uuid::new_v4(),
            username: "alice".into(),
            expiration_time: chrono::Utc::now() + chrono::Duration::hours(1),
            raw_token: "tok".into(),
            idempotency_token: token,
        };
        log.append(cmd.clone()).await.unwrap();
        let err = log.append(cmd).await.unwrap_err();
        assert!(matches!(err, ReplicationError::DuplicateSubmission));
    }

    #[tokio::test]
    async fn cursor_survives_restart_via_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCoordinationStore::new();
        let log = ReplicationLog::new(store.clone(), "r1").with_data_dir(dir.path()).unwrap();
        log.try_become_leader().await.unwrap();
        log.append(create_project_command("a")).await.unwrap();
        log.catch_up(1, |_| Ok(())).await.unwrap();
        assert_eq!(log.last_applied(), 1);

        let resumed = ReplicationLog::new(store, "r1").with_data_dir(dir.path()).unwrap();
        assert_eq!(resumed.last_applied(), 1);
    }
}
