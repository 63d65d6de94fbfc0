// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The sole writer of new commits. One `RepoHandle` per repository holds
//! the per-repository write lock that serializes `push` and protects the
//! commit chain tip and the object store append path; readers never take
//! this lock, they materialize a snapshot from an already-published
//! commit id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dogma_core::{
    patch, Author, Change, Commit, CoreError, CoreResult, Entry, EntryType, Markup, Revision,
};
use parking_lot::RwLock;

use crate::object_store::{Blob, CommitObject, EntryMode, GitObject, ObjectId, ObjectStore, Tree};

/// Paths that non-administrative pushes may never write directly; the
/// meta-repo indexer and mirror scheduler are the only writers of these.
const RESERVED_PREFIXES: &[&str] = &["/mirrors/", "/credentials/", "/tokens/"];
const MIRROR_SENTINEL: &str = "/mirror_state.json";

struct HeadState {
    revision: i64,
    commit_id: Option<ObjectId>,
    /// Flat materialized view of the current head: path -> entry.
    snapshot: HashMap<String, Entry>,
    /// Full commit metadata by revision (1-indexed into this vec at
    /// `revision - 1`), kept alongside the content-addressed object graph
    /// so the query engine can serve `getHistory`/`getDiff` without
    /// re-deriving author/detail/markup from the storage-level commit
    /// object, which only carries what the object model needs for
    /// content addressing.
    history: Vec<Commit>,
}

/// Per-repository commit state: one object store shard plus the write
/// lock that linearizes pushes against it.
pub struct RepoHandle {
    pub object_store: ObjectStore,
    head: RwLock<HeadState>,
    data_dir: Option<PathBuf>,
}

/// The result of a successful push: the new revision and the changes as
/// actually persisted (after `UPSERT_JSON` normalization and empty-change
/// filtering).
pub struct PushOutcome {
    pub new_revision: i64,
    pub normalized_changes: Vec<Change>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct PersistedHistory {
    commits: Vec<Commit>,
    head_commit_id: Option<ObjectId>,
}

/// Rebuild the flat path -> entry snapshot by replaying every commit's
/// changes in order, used when resuming from an on-disk history file.
fn replay_snapshot(history: &[Commit]) -> HashMap<String, Entry> {
    let mut snapshot = HashMap::new();
    for commit in history {
        for change in &commit.changes {
            let _ = apply_change(&mut snapshot, change.clone());
        }
    }
    snapshot
}

impl RepoHandle {
    pub fn new_empty() -> Self {
        Self {
            object_store: ObjectStore::new(),
            head: RwLock::new(HeadState {
                revision: 1,
                commit_id: None,
                snapshot: HashMap::new(),
                history: Vec::new(),
            }),
            data_dir: None,
        }
    }

    pub fn with_data_dir(dir: impl AsRef<Path>) -> CoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let objects_path = dir.join("objects.bin");
        let object_store = if objects_path.exists() {
            ObjectStore::load_from_file(&objects_path)
                .map_err(|e| CoreError::Corruption(e.to_string()))?
        } else {
            ObjectStore::new()
        };
        let history_path = dir.join("history.bin");
        let (history, commit_id) = if history_path.exists() {
            let bytes = std::fs::read(&history_path).map_err(|e| CoreError::Corruption(e.to_string()))?;
            let persisted: PersistedHistory =
                bincode::deserialize(&bytes).map_err(|e| CoreError::Corruption(e.to_string()))?;
            (persisted.commits, persisted.head_commit_id)
        } else {
            (Vec::new(), None)
        };
        let revision = history.last().map(|c| c.revision).unwrap_or(1);
        let snapshot = replay_snapshot(&history);
        Ok(Self {
            object_store,
            head: RwLock::new(HeadState { revision, commit_id, snapshot, history }),
            data_dir: Some(dir),
        })
    }

    pub fn head_revision(&self) -> i64 {
        self.head.read().revision
    }

    /// A clone of the materialized snapshot at the current head.
    pub fn snapshot(&self) -> HashMap<String, Entry> {
        self.head.read().snapshot.clone()
    }

    /// The full commit history in revision order, oldest first.
    pub fn history(&self) -> Vec<Commit> {
        self.head.read().history.clone()
    }

    /// A single commit by its (positive, absolute) revision number.
    pub fn commit_at(&self, revision: i64) -> Option<Commit> {
        self.head
            .read()
            .history
            .iter()
            .find(|c| c.revision == revision)
            .cloned()
    }

    /// The materialized `path -> entry` snapshot as of a past revision,
    /// reconstructed by replaying every commit up to and including it.
    /// Revision 1 (repository creation) is always the empty snapshot.
    pub fn snapshot_at(&self, revision: i64) -> CoreResult<HashMap<String, Entry>> {
        let head = self.head.read();
        if revision < 1 || revision > head.revision {
            return Err(CoreError::NotFound(format!(
                "revision {revision} (head is {})",
                head.revision
            )));
        }
        if revision == head.revision {
            return Ok(head.snapshot.clone());
        }
        let prefix: Vec<Commit> = head.history.iter().filter(|c| c.revision <= revision).cloned().collect();
        Ok(replay_snapshot(&prefix))
    }

    fn persist(&self) -> CoreResult<()> {
        if let Some(dir) = &self.data_dir {
            self.object_store
                .save_to_file(&dir.join("objects.bin"))
                .map_err(|e| CoreError::Corruption(e.to_string()))?;
            let head = self.head.read();
            let persisted = PersistedHistory { commits: head.history.clone(), head_commit_id: head.commit_id };
            drop(head);
            let bytes = bincode::serialize(&persisted).map_err(|e| CoreError::Corruption(e.to_string()))?;
            let tmp = dir.join("history.bin.tmp");
            std::fs::write(&tmp, bytes).map_err(|e| CoreError::Corruption(e.to_string()))?;
            std::fs::rename(&tmp, dir.join("history.bin")).map_err(|e| CoreError::Corruption(e.to_string()))?;
        }
        Ok(())
    }

    /// `push(repo, baseRevision, author, summary, detail, markup, changes)`.
    ///
    /// See the commit engine's push algorithm: resolve base revision,
    /// compute a preview (normalizing `UPSERT_JSON`, evaluating patch
    /// tests, rejecting disallowed paths), reject on no net effect,
    /// otherwise build and persist the new commit. Rejects writes under the
    /// reserved `/mirrors/`, `/credentials/`, `/tokens/` prefixes and the
    /// `/mirror_state.json` sentinel; the meta-repo indexer and mirror
    /// scheduler use [`RepoHandle::push_privileged`] for those.
    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &self,
        base_revision: Revision,
        author: Author,
        summary: impl Into<String>,
        detail: Option<String>,
        markup: Markup,
        changes: Vec<Change>,
        force: bool,
    ) -> CoreResult<PushOutcome> {
        self.push_impl(base_revision, author, summary, detail, markup, changes, force, false)
    }

    /// As [`RepoHandle::push`], but allowed to write the reserved
    /// `/mirrors/`, `/credentials/`, `/tokens/` prefixes and the
    /// `/mirror_state.json` sentinel. Reserved for the meta-repo indexer's
    /// legacy-aggregate migration and the mirror scheduler's state writes.
    #[allow(clippy::too_many_arguments)]
    pub fn push_privileged(
        &self,
        base_revision: Revision,
        author: Author,
        summary: impl Into<String>,
        detail: Option<String>,
        markup: Markup,
        changes: Vec<Change>,
        force: bool,
    ) -> CoreResult<PushOutcome> {
        self.push_impl(base_revision, author, summary, detail, markup, changes, force, true)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_impl(
        &self,
        base_revision: Revision,
        author: Author,
        summary: impl Into<String>,
        detail: Option<String>,
        markup: Markup,
        changes: Vec<Change>,
        force: bool,
        privileged: bool,
    ) -> CoreResult<PushOutcome> {
        if changes.is_empty() {
            return Err(CoreError::InvalidPush("changes list is empty".into()));
        }

        let mut head = self.head.write();

        let resolved_base = base_revision.normalize(head.revision)?;
        if !force && resolved_base != head.revision {
            return Err(CoreError::ChangeConflict);
        }

        let mut new_snapshot = head.snapshot.clone();
        let mut normalized = Vec::new();
        for change in changes {
            if !privileged {
                if let Some(path) = reserved_violation(&change) {
                    return Err(CoreError::InvalidPush(format!(
                        "path {path} is reserved and cannot be pushed directly"
                    )));
                }
            }
            if let Some(applied) = apply_change(&mut new_snapshot, change)? {
                normalized.push(applied);
            }
        }

        if normalized.is_empty() {
            return Err(CoreError::RedundantChange);
        }

        let tree = build_tree(&self.object_store, &new_snapshot);
        let tree_id = self.object_store.put(&tree);
        let summary: String = summary.into();

        let commit_obj = match head.commit_id {
            None => CommitObject::initial(tree_id, author.name.clone(), summary.clone()),
            Some(parent) => {
                CommitObject::child(parent, head.revision, tree_id, author.name.clone(), summary.clone())
            }
        };
        let commit_id = self.object_store.put(&commit_obj);
        let new_revision = commit_obj.revision;

        let commit = dogma_core::Commit {
            revision: new_revision,
            author,
            summary,
            detail,
            markup,
            timestamp: chrono::Utc::now(),
            changes: normalized.clone(),
        };

        head.revision = new_revision;
        head.commit_id = Some(commit_id);
        head.snapshot = new_snapshot;
        head.history.push(commit);
        drop(head);

        self.persist()?;

        Ok(PushOutcome { new_revision, normalized_changes: normalized })
    }
}

fn reserved_violation(change: &Change) -> Option<&str> {
    let path = change.path();
    if path == MIRROR_SENTINEL {
        return Some(path);
    }
    RESERVED_PREFIXES
        .iter()
        .find(|p| path.starts_with(**p))
        .map(|_| path)
}

/// Apply one change to the working snapshot, returning the normalized
/// change actually recorded (or `None` if it had no net effect).
fn apply_change(snapshot: &mut HashMap<String, Entry>, change: Change) -> CoreResult<Option<Change>> {
    match change {
        Change::UpsertText { path, content } => {
            let entry = Entry::text(path.clone(), content)?;
            if snapshot.get(&path) == Some(&entry) {
                return Ok(None);
            }
            snapshot.insert(path.clone(), entry.clone());
            Ok(Some(Change::UpsertText {
                path,
                content: entry.content.as_text().unwrap_or_default().to_string(),
            }))
        }
        Change::UpsertYaml { path, content } => {
            let entry = Entry::yaml(path.clone(), &content)?;
            if snapshot.get(&path) == Some(&entry) {
                return Ok(None);
            }
            snapshot.insert(path.clone(), entry);
            Ok(Some(Change::UpsertYaml { path, content }))
        }
        Change::UpsertJson { path, content } => {
            let new_entry = Entry::json(path.clone(), &content)?;
            match snapshot.get(&path) {
                Some(existing) if existing.entry_type == EntryType::Json => {
                    let existing_value = existing.parsed_value();
                    if existing_value.as_ref() == Some(&content) {
                        return Ok(None);
                    }
                    let ops = match existing_value {
                        Some(ref old) => patch::diff(old, &content),
                        None => return normalize_and_insert_json(snapshot, path, new_entry, content),
                    };
                    snapshot.insert(path.clone(), new_entry);
                    Ok(Some(Change::ApplyJsonPatch { path, ops }))
                }
                _ => normalize_and_insert_json(snapshot, path, new_entry, content),
            }
        }
        Change::ApplyJsonPatch { path, ops } => {
            let current = snapshot
                .get(&path)
                .and_then(|e| e.parsed_value())
                .unwrap_or(serde_json::Value::Null);
            let new_value = patch::apply_patch(&current, &ops)?;
            let entry = Entry::json(path.clone(), &new_value)?;
            if snapshot.get(&path) == Some(&entry) {
                return Ok(None);
            }
            snapshot.insert(path.clone(), entry);
            Ok(Some(Change::ApplyJsonPatch { path, ops }))
        }
        Change::ApplyTextPatch { path, patch: patch_text } => {
            let current = snapshot
                .get(&path)
                .and_then(|e| e.content.as_text())
                .unwrap_or("")
                .to_string();
            let new_text = crate::diff::apply_unified_text_patch(&current, &patch_text)?;
            let entry = Entry::text(path.clone(), new_text)?;
            if snapshot.get(&path) == Some(&entry) {
                return Ok(None);
            }
            snapshot.insert(path.clone(), entry);
            Ok(Some(Change::ApplyTextPatch { path, patch: patch_text }))
        }
        Change::Remove { path } => {
            if snapshot.remove(&path).is_some() {
                Ok(Some(Change::Remove { path }))
            } else {
                Ok(None)
            }
        }
        Change::Rename { old_path, new_path } => {
            if let Some(entry) = snapshot.remove(&old_path) {
                let mut renamed = entry;
                renamed.path = new_path.clone();
                snapshot.insert(new_path.clone(), renamed);
                Ok(Some(Change::Rename { old_path, new_path }))
            } else {
                Err(CoreError::NotFound(format!("rename source {old_path}")))
            }
        }
    }
}

fn normalize_and_insert_json(
    snapshot: &mut HashMap<String, Entry>,
    path: String,
    new_entry: Entry,
    content: serde_json::Value,
) -> CoreResult<Option<Change>> {
    snapshot.insert(path.clone(), new_entry);
    Ok(Some(Change::UpsertJson { path, content }))
}

fn build_tree(store: &ObjectStore, snapshot: &HashMap<String, Entry>) -> Tree {
    let mut tree = Tree::new();
    let mut paths: Vec<_> = snapshot.keys().collect();
    paths.sort();
    for path in paths {
        let entry = &snapshot[path];
        let bytes = entry.bytes().map(|b| b.to_vec()).unwrap_or_default();
        let blob = Blob::new(bytes);
        let oid = store.put(&blob);
        tree.add_entry(path.clone(), oid, EntryMode::Blob);
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn push_simple(handle: &RepoHandle, path: &str, value: serde_json::Value) -> CoreResult<PushOutcome> {
        handle.push(
            Revision::head(),
            Author::new("alice"),
            "edit",
            None,
            Markup::Plaintext,
            vec![Change::UpsertJson { path: path.into(), content: value }],
            false,
        )
    }

    #[test]
    fn create_then_read() {
        let handle = RepoHandle::new_empty();
        let outcome = push_simple(&handle, "/x.json", json!({"a": "b"})).unwrap();
        assert_eq!(outcome.new_revision, 2);
        let snap = handle.snapshot();
        assert_eq!(snap["/x.json"].parsed_value().unwrap(), json!({"a": "b"}));
    }

    #[test]
    fn redundant_push_rejected() {
        let handle = RepoHandle::new_empty();
        push_simple(&handle, "/x.json", json!({"a": "b"})).unwrap();
        let result = push_simple(&handle, "/x.json", json!({"a": "b"}));
        assert!(matches!(result, Err(CoreError::RedundantChange)));
        assert_eq!(handle.head_revision(), 2);
    }

    #[test]
    fn optimistic_conflict_on_stale_base() {
        let handle = RepoHandle::new_empty();
        push_simple(&handle, "/x.json", json!({"a": 1})).unwrap();
        push_simple(&handle, "/x.json", json!({"a": 2})).unwrap();
        let result = handle.push(
            Revision(2),
            Author::new("bob"),
            "stale",
            None,
            Markup::Plaintext,
            vec![Change::UpsertJson { path: "/x.json".into(), content: json!({"a": 3}) }],
            false,
        );
        assert!(matches!(result, Err(CoreError::ChangeConflict)));
    }

    #[test]
    fn upsert_json_normalizes_to_patch_when_value_differs() {
        let handle = RepoHandle::new_empty();
        push_simple(&handle, "/x.json", json!({"a": 1})).unwrap();
        let outcome = push_simple(&handle, "/x.json", json!({"a": 2})).unwrap();
        assert!(matches!(
            outcome.normalized_changes[0],
            Change::ApplyJsonPatch { .. }
        ));
    }

    #[test]
    fn empty_changes_rejected() {
        let handle = RepoHandle::new_empty();
        let result = handle.push(
            Revision::head(),
            Author::new("alice"),
            "noop",
            None,
            Markup::Plaintext,
            vec![],
            false,
        );
        assert!(matches!(result, Err(CoreError::InvalidPush(_))));
    }

    #[test]
    fn reserved_path_rejected() {
        let handle = RepoHandle::new_empty();
        let result = handle.push(
            Revision::head(),
            Author::new("alice"),
            "sneaky",
            None,
            Markup::Plaintext,
            vec![Change::UpsertText { path: "/mirror_state.json".into(), content: "{}".into() }],
            false,
        );
        assert!(matches!(result, Err(CoreError::InvalidPush(_))));
    }

    #[test]
    fn safe_replace_conflict_aborts_whole_commit() {
        let handle = RepoHandle::new_empty();
        push_simple(&handle, "/x.json", json!({"a": 1})).unwrap();
        let ops = vec![dogma_core::JsonPatchOp::SafeReplace {
            path: "/a".into(),
            old_value: json!(999),
            value: json!(2),
        }];
        let result = handle.push(
            Revision::head(),
            Author::new("alice"),
            "bad safe replace",
            None,
            Markup::Plaintext,
            vec![Change::ApplyJsonPatch { path: "/x.json".into(), ops }],
            false,
        );
        assert!(matches!(result, Err(CoreError::ChangePatchConflict(_))));
        assert_eq!(handle.head_revision(), 2);
    }

    #[test]
    fn remove_then_rename_not_found() {
        let handle = RepoHandle::new_empty();
        let result = handle.push(
            Revision::head(),
            Author::new("alice"),
            "rename missing",
            None,
            Markup::Plaintext,
            vec![Change::Rename { old_path: "/missing.txt".into(), new_path: "/other.txt".into() }],
            false,
        );
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[test]
    fn history_tracks_every_accepted_revision() {
        let handle = RepoHandle::new_empty();
        push_simple(&handle, "/x.json", json!({"a": 1})).unwrap();
        push_simple(&handle, "/y.json", json!({"b": 2})).unwrap();
        let history = handle.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].revision, 2);
        assert_eq!(history[1].revision, 3);
        assert_eq!(handle.commit_at(2).unwrap().revision, 2);
        assert!(handle.commit_at(99).is_none());
    }

    #[test]
    fn history_survives_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let handle = RepoHandle::with_data_dir(dir.path()).unwrap();
            push_simple(&handle, "/x.json", json!({"a": 1})).unwrap();
        }
        let reloaded = RepoHandle::with_data_dir(dir.path()).unwrap();
        assert_eq!(reloaded.head_revision(), 2);
        assert_eq!(reloaded.history().len(), 1);
        assert_eq!(reloaded.snapshot()["/x.json"].parsed_value().unwrap(), json!({"a": 1}));
    }
}
