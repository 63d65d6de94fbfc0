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

//! A higher-level watcher that applies a pure mapping function over the
//! raw revision a [`WatchRegistry`] reports, memoizing the mapped value per
//! revision so the mapper runs at most once even when several observers
//! are waiting on the same registry.

use std::sync::Arc;
use std::time::Duration;

use dogma_core::{CoreResult, PathPattern};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::WatchResult;
use crate::registry::{WatchOutcome, WatchRegistry};

#[derive(Debug, Clone, PartialEq)]
pub enum WatcherOutcome<T> {
    Changed(i64, T),
    Timeout,
}

/// `Watcher<T>`: `watchRepository` plus a pure `i64 -> T` mapping step,
/// cached by revision.
pub struct Watcher<T> {
    registry: Arc<WatchRegistry>,
    pattern: PathPattern,
    mapper: Arc<dyn Fn(i64) -> CoreResult<T> + Send + Sync>,
    cache: Mutex<Option<(i64, Result<T, String>)>>,
}

impl<T: Clone + Send + Sync + 'static> Watcher<T> {
    pub fn new(
        registry: Arc<WatchRegistry>,
        pattern: PathPattern,
        mapper: impl Fn(i64) -> CoreResult<T> + Send + Sync + 'static,
    ) -> Self {
        Self { registry, pattern, mapper: Arc::new(mapper), cache: Mutex::new(None) }
    }

    /// Suspend until a revision newer than `last_known` matches the
    /// pattern, then return the mapped value for that revision.
    pub async fn next(
        &self,
        last_known: i64,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> WatchResult<WatcherOutcome<T>> {
        match self.registry.watch_repository(last_known, &self.pattern, timeout, cancel).await? {
            WatchOutcome::Timeout => Ok(WatcherOutcome::Timeout),
            WatchOutcome::Changed(revision) => Ok(WatcherOutcome::Changed(revision, self.mapped(revision)?)),
        }
    }

    fn mapped(&self, revision: i64) -> WatchResult<T> {
        let mut guard = self.cache.lock();
        if let Some((cached_revision, cached_result)) = guard.as_ref() {
            if *cached_revision == revision {
                return cached_result.clone().map_err(crate::error::WatchError::MapperFailed);
            }
        }

        let result: Result<T, String> = (self.mapper)(revision).map_err(|e| e.to_string());
        *guard = Some((revision, result.clone()));
        result.map_err(crate::error::WatchError::MapperFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dogma_storage::RepoHandle;
    use dogma_core::{Author, Change, Markup, Revision};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn mapper_runs_once_per_revision_under_concurrent_callers() {
        let repo = Arc::new(RepoHandle::new_empty());
        repo.push(
            Revision::head(),
            Author::new("tester"),
            "seed",
            None,
            Markup::Plaintext,
            vec![Change::UpsertJson { path: "/a.json".into(), content: json!({"v": 1}) }],
            false,
        )
        .unwrap();

        let registry = Arc::new(WatchRegistry::new(repo));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let watcher = Arc::new(Watcher::new(
            registry,
            PathPattern::parse("/a.json").unwrap(),
            move |revision| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(revision * 10)
            },
        ));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let watcher = watcher.clone();
            handles.push(tokio::spawn(async move {
                watcher.next(0, StdDuration::from_secs(5), CancellationToken::new()).await
            }));
        }

        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome, WatcherOutcome::Changed(2, 20));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
