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

//! Startup migration of the legacy `/mirrors.json` and `/credentials.json`
//! aggregate files into one file per element under `/mirrors/` and
//! `/credentials/`. Idempotent: once the legacy file is gone there is
//! nothing left to migrate, so a second run is a no-op.

use std::collections::{HashMap, HashSet};

use dogma_core::{Author, Change, Entry, Markup, Revision};
use dogma_storage::RepoHandle;
use rand::Rng;
use serde_json::Value;

use crate::error::{IndexError, IndexResult};
use crate::view::{CREDENTIALS_PREFIX, MIRRORS_PREFIX};

const LEGACY_MIRRORS_PATH: &str = "/mirrors.json";
const LEGACY_CREDENTIALS_PATH: &str = "/credentials.json";

/// Run the legacy-aggregate migration against `repo`'s current head.
/// Returns `Ok(None)` when there was nothing to migrate.
pub fn migrate_legacy_aggregates(
    repo: &RepoHandle,
    author: Author,
) -> IndexResult<Option<dogma_storage::PushOutcome>> {
    let snapshot = repo.snapshot();
    let mut changes = Vec::new();

    if let Some(entry) = snapshot.get(LEGACY_MIRRORS_PATH) {
        changes.extend(split_aggregate(LEGACY_MIRRORS_PATH, entry, &snapshot, MIRRORS_PREFIX)?);
        changes.push(Change::Remove { path: LEGACY_MIRRORS_PATH.to_string() });
    }
    if let Some(entry) = snapshot.get(LEGACY_CREDENTIALS_PATH) {
        changes.extend(split_aggregate(LEGACY_CREDENTIALS_PATH, entry, &snapshot, CREDENTIALS_PREFIX)?);
        changes.push(Change::Remove { path: LEGACY_CREDENTIALS_PATH.to_string() });
    }

    if changes.is_empty() {
        return Ok(None);
    }

    let outcome = repo.push_privileged(
        Revision::head(),
        author,
        "migrate legacy mirrors.json/credentials.json into per-id files",
        None,
        Markup::Plaintext,
        changes,
        false,
    )?;
    Ok(Some(outcome))
}

fn split_aggregate(
    legacy_path: &str,
    entry: &Entry,
    existing: &HashMap<String, Entry>,
    prefix: &str,
) -> IndexResult<Vec<Change>> {
    let value = entry.parsed_value().ok_or_else(|| IndexError::MalformedEntry {
        path: legacy_path.to_string(),
        reason: "not valid JSON".into(),
    })?;
    let elements = value.as_array().ok_or_else(|| IndexError::MalformedEntry {
        path: legacy_path.to_string(),
        reason: "expected a JSON array".into(),
    })?;

    let mut used_ids: HashSet<String> = existing
        .keys()
        .filter_map(|p| p.strip_prefix(prefix).and_then(|r| r.strip_suffix(".json")))
        .map(str::to_string)
        .collect();

    let mut changes = Vec::with_capacity(elements.len());
    for element in elements {
        let base_id = element
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(random_id);
        let id = dedup_id(base_id, &used_ids);
        used_ids.insert(id.clone());

        let mut content = element.clone();
        if let Value::Object(map) = &mut content {
            map.insert("id".to_string(), Value::String(id.clone()));
        }

        changes.push(Change::UpsertJson { path: format!("{prefix}{id}.json"), content });
    }
    Ok(changes)
}

fn dedup_id(base: String, used: &HashSet<String>) -> String {
    if !used.contains(&base) {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn random_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("gen-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror_element(id: Option<&str>) -> Value {
        let mut obj = serde_json::json!({
            "direction": "RemoteToLocal",
            "schedule": "0 0 * * *",
            "local": {"project": "p", "repository": "r", "path": "/"},
            "remote": {"uri": "https://example.com/r.git", "branch": "main", "path": "/"},
            "credential_id": null,
            "gitignore": [],
            "enabled": true,
            "zone": null,
            "max_num_files": 1000,
            "max_num_bytes": 1048576
        });
        if let Some(id) = id {
            obj.as_object_mut().unwrap().insert("id".to_string(), Value::String(id.to_string()));
        }
        obj
    }

    #[test]
    fn splits_legacy_mirrors_into_per_id_files() {
        let repo = RepoHandle::new_empty();
        repo.push(
            Revision::head(),
            Author::system(),
            "seed",
            None,
            Markup::Plaintext,
            vec![Change::UpsertJson {
                path: LEGACY_MIRRORS_PATH.to_string(),
                content: Value::Array(vec![mirror_element(Some("m1")), mirror_element(Some("m2"))]),
            }],
            false,
        )
        .unwrap();

        let outcome = migrate_legacy_aggregates(&repo, Author::system()).unwrap().unwrap();
        assert!(outcome.normalized_changes.iter().any(|c| c.path() == "/mirrors/m1.json"));
        assert!(outcome.normalized_changes.iter().any(|c| c.path() == "/mirrors/m2.json"));

        let snapshot = repo.snapshot();
        assert!(!snapshot.contains_key(LEGACY_MIRRORS_PATH));
        assert!(snapshot.contains_key("/mirrors/m1.json"));
    }

    #[test]
    fn duplicate_ids_get_dash_suffixes() {
        let repo = RepoHandle::new_empty();
        repo.push(
            Revision::head(),
            Author::system(),
            "seed",
            None,
            Markup::Plaintext,
            vec![Change::UpsertJson {
                path: LEGACY_MIRRORS_PATH.to_string(),
                content: Value::Array(vec![mirror_element(Some("dup")), mirror_element(Some("dup"))]),
            }],
            false,
        )
        .unwrap();

        migrate_legacy_aggregates(&repo, Author::system()).unwrap();
        let snapshot = repo.snapshot();
        assert!(snapshot.contains_key("/mirrors/dup.json"));
        assert!(snapshot.contains_key("/mirrors/dup-1.json"));
    }

    #[test]
    fn missing_id_gets_generated_suffix() {
        let repo = RepoHandle::new_empty();
        repo.push(
            Revision::head(),
            Author::system(),
            "seed",
            None,
            Markup::Plaintext,
            vec![Change::UpsertJson {
                path: LEGACY_MIRRORS_PATH.to_string(),
                content: Value::Array(vec![mirror_element(None)]),
            }],
            false,
        )
        .unwrap();

        migrate_legacy_aggregates(&repo, Author::system()).unwrap();
        let snapshot = repo.snapshot();
        let generated = snapshot.keys().find(|p| p.starts_with("/mirrors/gen-")).cloned();
        assert!(generated.is_some());
    }

    #[test]
    fn migration_is_idempotent() {
        let repo = RepoHandle::new_empty();
        repo.push(
            Revision::head(),
            Author::system(),
            "seed",
            None,
            Markup::Plaintext,
            vec![Change::UpsertJson {
                path: LEGACY_MIRRORS_PATH.to_string(),
                content: Value::Array(vec![mirror_element(Some("m1"))]),
            }],
            false,
        )
        .unwrap();

        let first = migrate_legacy_aggregates(&repo, Author::system()).unwrap();
        assert!(first.is_some());
        let second = migrate_legacy_aggregates(&repo, Author::system()).unwrap();
        assert!(second.is_none());
        assert_eq!(repo.head_revision(), 2);
    }
}
