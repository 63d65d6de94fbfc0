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

//! `watchRepository`/`watchFile` (4.E): long-poll suspension until a
//! matching commit lands, a timeout fires, the registry shuts down, or the
//! caller cancels.
//!
//! Rather than maintaining a parallel log of "revision -> touched paths",
//! the registry re-derives matches from [`RepoHandle::history`] each time
//! it wakes, which is cheap because the list only needs to be scanned from
//! `lastKnown` forward and is already held in memory by the commit engine.
//! A single [`tokio::sync::Notify`] wakes every waiter after each commit;
//! timeouts are enforced per call via `tokio::time`, so there is no
//! per-watcher timer task.

use std::sync::Arc;
use std::time::Duration;

use dogma_core::{Commit, Entry, PathPattern};
use dogma_storage::RepoHandle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{WatchError, WatchResult};

/// The outcome of `watchRepository`: either the newest revision matching
/// the pattern, or a "no change" timeout sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Changed(i64),
    Timeout,
}

/// The outcome of `watchFile`.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchFileOutcome {
    Changed(i64, Entry),
    Removed(i64),
    Timeout,
}

/// One repository's watch state: a wakeup bell plus a shutdown signal
/// shared by every call currently suspended on it.
pub struct WatchRegistry {
    repo: Arc<RepoHandle>,
    bell: Notify,
    shutdown: CancellationToken,
}

impl WatchRegistry {
    pub fn new(repo: Arc<RepoHandle>) -> Self {
        Self { repo, bell: Notify::new(), shutdown: CancellationToken::new() }
    }

    /// A token children can observe; cancelling it has no effect on this
    /// registry (use [`WatchRegistry::shutdown`] for that).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wake every watcher with a fatal `ShuttingDown` error.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Must be called by the commit engine's caller after every
    /// successfully applied push so waiters re-check for a match.
    pub fn notify_commit(&self) {
        self.bell.notify_waiters();
    }

    /// `watchRepository(repo, lastKnown, pattern, timeoutMs)`.
    pub async fn watch_repository(
        &self,
        last_known: i64,
        pattern: &PathPattern,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> WatchResult<WatchOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.shutdown.is_cancelled() {
                return Err(WatchError::ShuttingDown);
            }
            if let Some(revision) =
                self.newest_matching(last_known, |c| c.changes.iter().any(|ch| pattern.matches(ch.path())))
            {
                return Ok(WatchOutcome::Changed(revision));
            }

            tokio::select! {
                _ = self.bell.notified() => continue,
                _ = self.shutdown.cancelled() => return Err(WatchError::ShuttingDown),
                _ = cancel.cancelled() => return Err(WatchError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return Ok(WatchOutcome::Timeout),
            }
        }
    }

    /// `watchFile(repo, lastKnown, path, timeoutMs)`.
    pub async fn watch_file(
        &self,
        last_known: i64,
        path: &str,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> WatchResult<WatchFileOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.shutdown.is_cancelled() {
                return Err(WatchError::ShuttingDown);
            }
            if let Some(revision) = self.newest_matching(last_known, |c| c.touches(path)) {
                let snapshot = self.repo.snapshot_at(revision)?;
                return Ok(match snapshot.get(path) {
                    Some(entry) => WatchFileOutcome::Changed(revision, entry.clone()),
                    None => WatchFileOutcome::Removed(revision),
                });
            }

            tokio::select! {
                _ = self.bell.notified() => continue,
                _ = self.shutdown.cancelled() => return Err(WatchError::ShuttingDown),
                _ = cancel.cancelled() => return Err(WatchError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return Ok(WatchFileOutcome::Timeout),
            }
        }
    }

    /// The newest revision strictly greater than `last_known` whose commit
    /// satisfies `pred`, if any.
    fn newest_matching(&self, last_known: i64, pred: impl Fn(&Commit) -> bool) -> Option<i64> {
        self.repo
            .history()
            .into_iter()
            .filter(|c| c.revision > last_known && pred(c))
            .map(|c| c.revision)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dogma_core::{Author, Change, Markup, Revision};
    use serde_json::json;
    use std::time::Duration as StdDuration;

    fn push(repo: &RepoHandle, path: &str, value: serde_json::Value) {
        repo.push(
            Revision::head(),
            Author::new("tester"),
            "update",
            None,
            Markup::Plaintext,
            vec![Change::UpsertJson { path: path.to_string(), content: value }],
            false,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn returns_immediately_if_already_matching() {
        let repo = Arc::new(RepoHandle::new_empty());
        push(&repo, "/a.json", json!({"v": 1}));
        let registry = WatchRegistry::new(repo);
        let pattern = PathPattern::parse("/a.json").unwrap();

        let outcome = registry
            .watch_repository(0, &pattern, StdDuration::from_secs(5), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, WatchOutcome::Changed(2));
    }

    #[tokio::test]
    async fn times_out_with_no_matching_commit() {
        let repo = Arc::new(RepoHandle::new_empty());
        let registry = WatchRegistry::new(repo);
        let pattern = PathPattern::parse("/a.json").unwrap();

        let outcome = registry
            .watch_repository(1, &pattern, StdDuration::from_millis(20), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, WatchOutcome::Timeout);
    }

    #[tokio::test]
    async fn wakes_up_on_a_later_matching_commit() {
        let repo = Arc::new(RepoHandle::new_empty());
        let registry = Arc::new(WatchRegistry::new(repo.clone()));
        let pattern = PathPattern::parse("/a.json").unwrap();

        let waiter = {
            let registry = registry.clone();
            let pattern = pattern.clone();
            tokio::spawn(async move {
                registry
                    .watch_repository(1, &pattern, StdDuration::from_secs(5), CancellationToken::new())
                    .await
            })
        };

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        push(&repo, "/a.json", json!({"v": 2}));
        registry.notify_commit();

        let outcome = waiter.await.unwrap().unwrap();
        assert_eq!(outcome, WatchOutcome::Changed(2));
    }

    #[tokio::test]
    async fn cancellation_surfaces_cancelled_error() {
        let repo = Arc::new(RepoHandle::new_empty());
        let registry = WatchRegistry::new(repo);
        let pattern = PathPattern::parse("/a.json").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = registry
            .watch_repository(0, &pattern, StdDuration::from_secs(5), cancel)
            .await;
        assert!(matches!(outcome, Err(WatchError::Cancelled)));
    }

    #[tokio::test]
    async fn shutdown_surfaces_fatal_error() {
        let repo = Arc::new(RepoHandle::new_empty());
        let registry = WatchRegistry::new(repo);
        registry.shutdown();
        let pattern = PathPattern::parse("/a.json").unwrap();

        let outcome = registry
            .watch_repository(0, &pattern, StdDuration::from_secs(5), CancellationToken::new())
            .await;
        assert!(matches!(outcome, Err(WatchError::ShuttingDown)));
    }

    #[tokio::test]
    async fn watch_file_reports_removal() {
        let repo = Arc::new(RepoHandle::new_empty());
        push(&repo, "/a.json", json!({"v": 1}));
        repo.push(
            Revision::head(),
            Author::new("tester"),
            "remove",
            None,
            Markup::Plaintext,
            vec![Change::Remove { path: "/a.json".to_string() }],
            false,
        )
        .unwrap();

        let registry = WatchRegistry::new(repo);
        let outcome = registry
            .watch_file(2, "/a.json", StdDuration::from_secs(5), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, WatchFileOutcome::Removed(3));
    }
}
