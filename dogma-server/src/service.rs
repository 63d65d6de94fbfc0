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

//! Binds the repository manager, query engine, watch registries,
//! replication log, mirror scheduler and session store into the single
//! in-process object the server binary drives.
//!
//! There is no network surface here - `Service` is the seam an admin API
//! or RPC frontend would be built against, but wiring one up is out of
//! scope. What matters is the command-apply path: a push either goes
//! through the replication log (when this replica is leader) or is
//! rejected, and the exact same `apply_command` closure is used whether
//! the command just got appended by us or arrived via `catch_up` while
//! replaying another leader's history.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dogma_core::{Author, Change, Command, CoreError, Markup, Query, Revision};
use dogma_core::path::PathPattern;
use dogma_query::QueryEngine;
use dogma_replication::{LocalCoordinationStore, ReplicationLog};
use dogma_storage::{RepositoryManager, SessionStore};
use dogma_watch::{WatchFileOutcome, WatchOutcome, WatchRegistry};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

#[derive(Clone, Eq, PartialEq, Hash)]
struct RepoKey(String, String);

/// The whole replica's in-process state. Cheap to clone (every field is
/// an `Arc` or a concurrent map).
pub struct Service {
    pub repo_manager: Arc<RepositoryManager>,
    pub replication: Arc<ReplicationLog<LocalCoordinationStore>>,
    pub sessions: Arc<SessionStore>,
    watches: DashMap<RepoKey, Arc<WatchRegistry>>,
    read_only: std::sync::atomic::AtomicBool,
}

impl Service {
    pub fn new(
        repo_manager: Arc<RepositoryManager>,
        replication: Arc<ReplicationLog<LocalCoordinationStore>>,
        sessions: Arc<SessionStore>,
        read_only: bool,
    ) -> Self {
        Self {
            repo_manager,
            replication,
            sessions,
            watches: DashMap::new(),
            read_only: std::sync::atomic::AtomicBool::new(read_only),
        }
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn watch_registry(&self, project: &str, repo: &str) -> ServiceResult<Arc<WatchRegistry>> {
        let key = RepoKey(project.to_string(), repo.to_string());
        if let Some(existing) = self.watches.get(&key) {
            return Ok(existing.value().clone());
        }
        let handle = self.repo_manager.handle(project, repo)?;
        let registry = Arc::new(WatchRegistry::new(handle));
        self.watches.insert(key, registry.clone());
        Ok(registry)
    }

    /// `query(project, repo, revision, query)`: stateless read, no
    /// replication involved.
    pub fn query(
        &self,
        project: &str,
        repo: &str,
        revision: Revision,
        query: &Query,
    ) -> ServiceResult<dogma_core::Entry> {
        let handle = self.repo_manager.handle(project, repo)?;
        let engine = QueryEngine::new(handle);
        Ok(engine.get_file(revision, query)?)
    }

    pub fn find(
        &self,
        project: &str,
        repo: &str,
        revision: Revision,
        pattern: &PathPattern,
    ) -> ServiceResult<std::collections::BTreeMap<String, dogma_core::Entry>> {
        let handle = self.repo_manager.handle(project, repo)?;
        let engine = QueryEngine::new(handle);
        Ok(engine.find(revision, pattern)?)
    }

    pub fn get_history(
        &self,
        project: &str,
        repo: &str,
        from: Revision,
        to: Revision,
        pattern: &PathPattern,
    ) -> ServiceResult<Vec<dogma_core::Commit>> {
        let handle = self.repo_manager.handle(project, repo)?;
        let engine = QueryEngine::new(handle);
        Ok(engine.get_history(from, to, pattern)?)
    }

    pub fn get_diff(
        &self,
        project: &str,
        repo: &str,
        from: Revision,
        to: Revision,
        query: &Query,
    ) -> ServiceResult<Change> {
        let handle = self.repo_manager.handle(project, repo)?;
        let engine = QueryEngine::new(handle);
        Ok(engine.get_diff(from, to, query)?)
    }

    /// `watchRepository`: suspends until a commit under `project/repo`
    /// touches `pattern`, `timeout` elapses, or `cancel` fires.
    pub async fn watch_repository(
        &self,
        project: &str,
        repo: &str,
        last_known: i64,
        pattern: &PathPattern,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> ServiceResult<WatchOutcome> {
        let registry = self.watch_registry(project, repo)?;
        Ok(registry.watch_repository(last_known, pattern, timeout, cancel).await?)
    }

    pub async fn watch_file(
        &self,
        project: &str,
        repo: &str,
        last_known: i64,
        path: &str,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> ServiceResult<WatchFileOutcome> {
        let registry = self.watch_registry(project, repo)?;
        Ok(registry.watch_file(last_known, path, timeout, cancel).await?)
    }

    /// Push a change set through the replication log. Fails with
    /// `ReadOnly` if this replica is read-only, `NotLeader` if it is not
    /// currently the replication leader - both are retryable by the
    /// caller against a different replica.
    #[allow(clippy::too_many_arguments)]
    pub async fn push(
        &self,
        project: &str,
        repo: &str,
        author: Author,
        base_revision: Revision,
        summary: impl Into<String>,
        detail: Option<String>,
        markup: Markup,
        changes: Vec<Change>,
        force: bool,
    ) -> ServiceResult<i64> {
        if self.is_read_only() {
            return Err(ServiceError::Core(CoreError::ReadOnly));
        }
        let command = Command::Push {
            timestamp: chrono::Utc::now(),
            author,
            project: project.to_string(),
            repo: repo.to_string(),
            base_revision: base_revision.0,
            summary: summary.into(),
            detail,
            markup,
            changes,
            force,
        };
        let sequence = self.replication.append(command.clone()).await?;
        self.apply_command(&command)?;
        Ok(sequence)
    }

    /// Create a session, replicated like any other command so every
    /// replica can validate a bearer token presented to it (R3: exactly
    /// one log entry per successful login).
    pub async fn login(
        &self,
        username: impl Into<String>,
        raw_token: impl Into<String>,
        ttl: Duration,
    ) -> ServiceResult<dogma_core::session::AuthenticatedSession> {
        let username = username.into();
        let raw_token = raw_token.into();
        let ttl_chrono = chrono::Duration::from_std(ttl)
            .map_err(|e| ServiceError::Core(CoreError::InvalidPush(e.to_string())))?;
        let session_id = Uuid::new_v4();
        let command = Command::CreateSession {
            timestamp: chrono::Utc::now(),
            author: Author::new(username.clone()),
            session_id,
            username: username.clone(),
            expiration_time: chrono::Utc::now() + ttl_chrono,
            raw_token: raw_token.clone(),
            idempotency_token: Uuid::new_v4(),
        };
        self.replication.append(command.clone()).await?;
        self.apply_command(&command)?;
        self.sessions.get(session_id).map_err(ServiceError::from)
    }

    pub async fn logout(&self, session_id: Uuid) -> ServiceResult<()> {
        let command = Command::RemoveSession {
            timestamp: chrono::Utc::now(),
            author: Author::system(),
            session_id,
        };
        self.replication.append(command.clone()).await?;
        self.apply_command(&command)
    }

    /// Apply a single command to local state. Called both right after a
    /// successful `append` (this replica is leader) and from inside
    /// `catch_up` while replaying another leader's log - the two paths
    /// must stay behaviorally identical or replicas diverge.
    pub fn apply_command(&self, command: &Command) -> ServiceResult<()> {
        match command {
            Command::CreateProject { name, author, .. } => {
                self.repo_manager.create_project(name, &author.name)?;
            }
            Command::RemoveProject { name, author, .. } => {
                self.repo_manager.remove_project(name, &author.name)?;
            }
            Command::UnremoveProject { name, .. } => {
                self.repo_manager.unremove_project(name)?;
            }
            Command::PurgeProject { name, .. } => {
                self.repo_manager.purge_project(name)?;
            }
            Command::CreateRepo { project, name, author, .. } => {
                self.repo_manager.create_repository(project, name, &author.name)?;
            }
            Command::RemoveRepo { project, name, author, .. } => {
                self.repo_manager.remove_repository(project, name, &author.name)?;
            }
            Command::UnremoveRepo { project, name, .. } => {
                self.repo_manager.unremove_repository(project, name)?;
            }
            Command::PurgeRepo { project, name, .. } => {
                self.repo_manager.purge_repository(project, name)?;
            }
            Command::Push {
                project,
                repo,
                author,
                base_revision,
                summary,
                detail,
                markup,
                changes,
                force,
                ..
            } => {
                let handle = self.repo_manager.handle(project, repo)?;
                let outcome = handle.push(
                    Revision(*base_revision),
                    author.clone(),
                    summary.clone(),
                    detail.clone(),
                    *markup,
                    changes.clone(),
                    *force,
                )?;
                self.repo_manager.record_head_revision(project, repo, outcome.new_revision);
                if let Ok(registry) = self.watch_registry(project, repo) {
                    registry.notify_commit();
                }
            }
            Command::Transform { project, repo, .. } => {
                // Named pure-function transforms are not registered on this
                // replica; a Transform command with no matching function is
                // logged and skipped rather than failing replay for every
                // other command behind it.
                tracing::warn!(project = %project, repo = %repo, "no transform registry configured, skipping");
            }
            Command::UpdateServerStatus { read_only, .. } => {
                self.set_read_only(*read_only);
            }
            Command::CreateSession { session_id: _, username, raw_token, expiration_time, .. } => {
                let ttl = (*expiration_time - chrono::Utc::now())
                    .to_std()
                    .unwrap_or(Duration::from_secs(0));
                self.sessions.create(username.clone(), raw_token.clone(), ttl)?;
            }
            Command::RemoveSession { session_id, .. } => {
                self.sessions.remove(*session_id)?;
            }
        }
        Ok(())
    }

    /// Replay every replication-log entry through `last_applied` into
    /// local state. Used at startup before attempting leadership, and
    /// whenever a follower observes the leader's cursor has advanced.
    pub async fn catch_up(&self, through: i64) -> ServiceResult<()> {
        self.replication
            .catch_up(through, |command| {
                self.apply_command(command)
                    .map_err(|e| dogma_replication::ReplicationError::Corruption(e.to_string()))
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dogma_core::project::META_REPO_NAME;

    fn service() -> Service {
        let repo_manager = Arc::new(RepositoryManager::new());
        let store = LocalCoordinationStore::new();
        let replication = Arc::new(ReplicationLog::new(store, "r1"));
        Service::new(repo_manager, replication, Arc::new(SessionStore::new()), false)
    }

    #[tokio::test]
    async fn push_is_rejected_until_leadership_is_won() {
        let svc = service();
        svc.apply_command(&Command::CreateProject {
            timestamp: chrono::Utc::now(),
            author: Author::system(),
            name: "demo".into(),
        })
        .unwrap();

        let err = svc
            .push(
                "demo",
                META_REPO_NAME,
                Author::system(),
                Revision::head(),
                "first",
                None,
                Markup::Plaintext,
                vec![Change::UpsertText { path: "/a.txt".into(), content: "hi".into() }],
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Replication(_)));

        assert!(svc.replication.try_become_leader().await.unwrap());
        let rev = svc
            .push(
                "demo",
                META_REPO_NAME,
                Author::system(),
                Revision::head(),
                "first",
                None,
                Markup::Plaintext,
                vec![Change::UpsertText { path: "/a.txt".into(), content: "hi".into() }],
                false,
            )
            .await
            .unwrap();
        assert_eq!(rev, 1);
    }

    #[tokio::test]
    async fn read_only_replica_rejects_push_even_as_leader() {
        let svc = service();
        svc.apply_command(&Command::CreateProject {
            timestamp: chrono::Utc::now(),
            author: Author::system(),
            name: "demo".into(),
        })
        .unwrap();
        svc.replication.try_become_leader().await.unwrap();
        svc.set_read_only(true);

        let err = svc
            .push(
                "demo",
                META_REPO_NAME,
                Author::system(),
                Revision::head(),
                "first",
                None,
                Markup::Plaintext,
                vec![Change::UpsertText { path: "/a.txt".into(), content: "hi".into() }],
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::ReadOnly)));
    }

    #[tokio::test]
    async fn login_then_logout_round_trips_through_session_store() {
        let svc = service();
        svc.replication.try_become_leader().await.unwrap();
        let session = svc.login("alice", "tok", Duration::from_secs(60)).await.unwrap();
        assert_eq!(svc.sessions.get(session.id).unwrap().username, "alice");
        svc.logout(session.id).await.unwrap();
        assert!(svc.sessions.get(session.id).is_err());
    }
}
