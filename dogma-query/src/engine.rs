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

//! Stateless evaluation of a [`Query`] against a repository's materialized
//! snapshots: `getFile`, `find`, `getHistory` and `getDiff`.

use std::collections::BTreeMap;
use std::sync::Arc;

use dogma_core::{Change, Commit, Entry, EntryContent, EntryType, PathPattern, Query, Revision};
use dogma_storage::RepoHandle;

use crate::error::{QueryError, QueryResult};
use crate::jsonpath::JsonPathExpr;

/// Evaluates queries against a single repository's commit history. Cheap to
/// construct; holds only an `Arc` to the storage-layer handle the caller
/// already owns via `RepositoryManager::handle`.
pub struct QueryEngine {
    repo: Arc<RepoHandle>,
}

impl QueryEngine {
    pub fn new(repo: Arc<RepoHandle>) -> Self {
        Self { repo }
    }

    fn snapshot_for(&self, revision: Revision) -> QueryResult<(i64, std::collections::HashMap<String, Entry>)> {
        let head = self.repo.head_revision();
        let resolved = revision.normalize(head)?;
        let snapshot = self.repo.snapshot_at(resolved)?;
        Ok((resolved, snapshot))
    }

    /// Evaluate `query` against the snapshot as of `revision`.
    pub fn get_file(&self, revision: Revision, query: &Query) -> QueryResult<Entry> {
        let (_, snapshot) = self.snapshot_for(revision)?;
        self.evaluate(&snapshot, query)
    }

    fn evaluate(
        &self,
        snapshot: &std::collections::HashMap<String, Entry>,
        query: &Query,
    ) -> QueryResult<Entry> {
        let entry = snapshot
            .get(query.path())
            .ok_or_else(|| QueryError::Core(dogma_core::CoreError::NotFound(query.path().to_string())))?;

        match query {
            Query::Identity { .. } => Ok(entry.clone()),
            Query::JsonPath { path, expression } => {
                if !matches!(entry.entry_type, EntryType::Json | EntryType::Yaml) {
                    return Err(QueryError::NotStructured(entry.entry_type, path.clone()));
                }
                let root = entry.parsed_value().ok_or(QueryError::NotStructured(entry.entry_type, path.clone()))?;
                let expr = JsonPathExpr::parse(expression)?;
                let extracted = expr.evaluate(&root).map_err(|e| match e {
                    QueryError::PathNotFound { expression, .. } => QueryError::PathNotFound {
                        path: path.clone(),
                        expression,
                    },
                    other => other,
                })?;
                Ok(Entry {
                    path: path.clone(),
                    entry_type: entry.entry_type,
                    content: EntryContent::Tree(extracted),
                })
            }
        }
    }

    /// Every entry whose path matches `pattern` under `revision`, ordered
    /// by path.
    pub fn find(&self, revision: Revision, pattern: &PathPattern) -> QueryResult<BTreeMap<String, Entry>> {
        let (_, snapshot) = self.snapshot_for(revision)?;
        Ok(snapshot
            .into_iter()
            .filter(|(path, _)| pattern.matches(path))
            .collect())
    }

    /// Commits in the half-open range `(from, to]` whose change set
    /// intersects `pattern`, oldest first.
    pub fn get_history(&self, from: Revision, to: Revision, pattern: &PathPattern) -> QueryResult<Vec<Commit>> {
        let head = self.repo.head_revision();
        let from_rev = from.normalize(head)?;
        let to_rev = to.normalize(head)?;
        let (lo, hi) = if from_rev <= to_rev { (from_rev, to_rev) } else { (to_rev, from_rev) };

        let mut commits: Vec<Commit> = self
            .repo
            .history()
            .into_iter()
            .filter(|c| c.revision > lo && c.revision <= hi)
            .filter(|c| c.changes.iter().any(|change| pattern.matches(change.path())))
            .collect();

        if from_rev > to_rev {
            commits.reverse();
        }
        Ok(commits)
    }

    /// The transformation of `query`'s result between `from` and `to`, as a
    /// single [`Change`]: a JSON patch for JSON/YAML entries, a unified text
    /// patch otherwise.
    pub fn get_diff(&self, from: Revision, to: Revision, query: &Query) -> QueryResult<Change> {
        let (_, from_snapshot) = self.snapshot_for(from)?;
        let (_, to_snapshot) = self.snapshot_for(to)?;

        let before = self.evaluate(&from_snapshot, query).ok();
        let after = self.evaluate(&to_snapshot, query).ok();
        let path = query.path().to_string();

        match (before, after) {
            (None, None) => Err(QueryError::Core(dogma_core::CoreError::NotFound(path))),
            (Some(_), None) => Ok(Change::Remove { path }),
            (None, Some(after)) => Ok(upsert_change(path, &after)),
            (Some(before), Some(after)) => {
                if before == after {
                    return Ok(match entry_json(&after) {
                        Some(_) => Change::ApplyJsonPatch { path, ops: Vec::new() },
                        None => Change::ApplyTextPatch { path, patch: String::new() },
                    });
                }
                match entry_json(&after).or_else(|| entry_json(&before)) {
                    Some(_) => {
                        let before_json = entry_json(&before).unwrap_or(serde_json::Value::Null);
                        let after_json = entry_json(&after).unwrap_or(serde_json::Value::Null);
                        let ops = dogma_core::patch::diff(&before_json, &after_json);
                        Ok(Change::ApplyJsonPatch { path, ops })
                    }
                    None => {
                        let before_text = before.content.as_text().unwrap_or_default();
                        let after_text = after.content.as_text().unwrap_or_default();
                        let diff = dogma_storage::diff_text(before_text, after_text);
                        Ok(Change::ApplyTextPatch {
                            path,
                            patch: diff.to_unified("a", "b"),
                        })
                    }
                }
            }
        }
    }
}

fn entry_json(entry: &Entry) -> Option<serde_json::Value> {
    match entry.entry_type {
        EntryType::Json | EntryType::Yaml => entry.parsed_value(),
        EntryType::Text | EntryType::Directory => None,
    }
}

fn upsert_change(path: String, entry: &Entry) -> Change {
    match entry_json(entry) {
        Some(value) => Change::UpsertJson { path, content: value },
        None => Change::UpsertText {
            path,
            content: entry.content.as_text().unwrap_or_default().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dogma_core::{Author, Markup};
    use serde_json::json;

    fn repo_with_pushes() -> Arc<RepoHandle> {
        let repo = Arc::new(RepoHandle::new_empty());
        repo.push(
            Revision::head(),
            Author::new("alice"),
            "add settings",
            None,
            Markup::Plaintext,
            vec![Change::UpsertJson { path: "/settings.json".into(), content: json!({"replicas": 1}) }],
            false,
        )
        .unwrap();
        repo.push(
            Revision::head(),
            Author::new("alice"),
            "bump replicas",
            None,
            Markup::Plaintext,
            vec![Change::UpsertJson { path: "/settings.json".into(), content: json!({"replicas": 3}) }],
            false,
        )
        .unwrap();
        repo
    }

    #[test]
    fn identity_query_returns_entry() {
        let engine = QueryEngine::new(repo_with_pushes());
        let entry = engine
            .get_file(Revision::head(), &Query::Identity { path: "/settings.json".into() })
            .unwrap();
        assert_eq!(entry.parsed_value().unwrap(), json!({"replicas": 3}));
    }

    #[test]
    fn json_path_query_extracts_subtree() {
        let engine = QueryEngine::new(repo_with_pushes());
        let entry = engine
            .get_file(
                Revision::head(),
                &Query::JsonPath { path: "/settings.json".into(), expression: "$.replicas".into() },
            )
            .unwrap();
        assert_eq!(entry.content, EntryContent::Tree(json!(3)));
    }

    #[test]
    fn find_matches_glob_pattern() {
        let engine = QueryEngine::new(repo_with_pushes());
        let pattern = PathPattern::parse("/*.json").unwrap();
        let found = engine.find(Revision::head(), &pattern).unwrap();
        assert!(found.contains_key("/settings.json"));
    }

    #[test]
    fn get_history_filters_by_pattern_and_range() {
        let engine = QueryEngine::new(repo_with_pushes());
        let pattern = PathPattern::parse("/settings.json").unwrap();
        let commits = engine.get_history(Revision(1), Revision::head(), &pattern).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].revision, 2);
        assert_eq!(commits[1].revision, 3);
    }

    #[test]
    fn get_diff_produces_json_patch_between_revisions() {
        let engine = QueryEngine::new(repo_with_pushes());
        let change = engine
            .get_diff(Revision(2), Revision(3), &Query::Identity { path: "/settings.json".into() })
            .unwrap();
        match change {
            Change::ApplyJsonPatch { ops, .. } => assert!(!ops.is_empty()),
            other => panic!("expected ApplyJsonPatch, got {other:?}"),
        }
    }

    #[test]
    fn get_diff_from_absent_to_present_is_upsert() {
        let engine = QueryEngine::new(repo_with_pushes());
        let change = engine
            .get_diff(Revision(1), Revision(2), &Query::Identity { path: "/settings.json".into() })
            .unwrap();
        assert!(matches!(change, Change::UpsertJson { .. }));
    }
}
