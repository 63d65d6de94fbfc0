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

//! The in-memory view the indexer rebuilds from a meta-repository
//! snapshot: `/mirrors/*.json`, `/credentials/*.json`, `/tokens/…` and
//! `/repos/<R>/…` access metadata.

use std::collections::{BTreeMap, HashMap};

use dogma_core::{Credential, Entry, Mirror};

use crate::error::{IndexError, IndexResult};

pub const MIRRORS_PREFIX: &str = "/mirrors/";
pub const CREDENTIALS_PREFIX: &str = "/credentials/";
pub const TOKENS_PREFIX: &str = "/tokens/";
pub const REPOS_PREFIX: &str = "/repos/";

/// A rebuilt snapshot of a project's meta-repository configuration.
#[derive(Debug, Clone, Default)]
pub struct MetaView {
    pub mirrors: BTreeMap<String, Mirror>,
    pub credentials: BTreeMap<String, Credential>,
    pub tokens: BTreeMap<String, serde_json::Value>,
    pub repo_access: BTreeMap<String, serde_json::Value>,
}

impl MetaView {
    /// Parse every designated path out of a materialized meta-repository
    /// snapshot. Paths outside the designated prefixes are ignored.
    pub fn rebuild(snapshot: &HashMap<String, Entry>) -> IndexResult<Self> {
        let mut view = MetaView::default();

        for (path, entry) in snapshot {
            if let Some(id) = strip_json_suffix(path, MIRRORS_PREFIX) {
                let mirror: Mirror = parse_entry(path, entry)?;
                view.mirrors.insert(id, mirror);
            } else if let Some(id) = strip_json_suffix(path, CREDENTIALS_PREFIX) {
                let credential: Credential = parse_entry(path, entry)?;
                view.credentials.insert(id, credential);
            } else if let Some(rest) = path.strip_prefix(TOKENS_PREFIX) {
                view.tokens.insert(rest.to_string(), entry_as_value(entry));
            } else if let Some(rest) = path.strip_prefix(REPOS_PREFIX) {
                view.repo_access.insert(rest.to_string(), entry_as_value(entry));
            }
        }

        Ok(view)
    }

    pub fn mirror(&self, id: &str) -> Option<&Mirror> {
        self.mirrors.get(id)
    }

    pub fn credential(&self, id: &str) -> Option<&Credential> {
        self.credentials.get(id)
    }

    pub fn enabled_mirrors(&self) -> impl Iterator<Item = &Mirror> {
        self.mirrors.values().filter(|m| m.enabled)
    }
}

fn strip_json_suffix(path: &str, prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    let id = rest.strip_suffix(".json")?;
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id.to_string())
}

fn parse_entry<T: serde::de::DeserializeOwned>(path: &str, entry: &Entry) -> IndexResult<T> {
    let value = entry
        .parsed_value()
        .ok_or_else(|| IndexError::MalformedEntry { path: path.to_string(), reason: "not valid JSON".into() })?;
    serde_json::from_value(value)
        .map_err(|e| IndexError::MalformedEntry { path: path.to_string(), reason: e.to_string() })
}

fn entry_as_value(entry: &Entry) -> serde_json::Value {
    entry
        .parsed_value()
        .unwrap_or_else(|| serde_json::Value::String(entry.content.as_text().unwrap_or_default().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dogma_core::{EntryContent, EntryType, MirrorDirection};
    use std::collections::HashMap;

    fn mirror_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
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
        })
    }

    #[test]
    fn rebuilds_mirrors_and_credentials() {
        let mut snapshot = HashMap::new();
        snapshot.insert(
            "/mirrors/m1.json".to_string(),
            Entry { path: "/mirrors/m1.json".into(), entry_type: EntryType::Json, content: EntryContent::Tree(mirror_json("m1")) },
        );
        let view = MetaView::rebuild(&snapshot).unwrap();
        let mirror = view.mirror("m1").unwrap();
        assert_eq!(mirror.direction, MirrorDirection::RemoteToLocal);
        assert!(mirror.enabled);
    }

    #[test]
    fn ignores_unrelated_paths() {
        let mut snapshot = HashMap::new();
        snapshot.insert(
            "/settings.json".to_string(),
            Entry { path: "/settings.json".into(), entry_type: EntryType::Json, content: EntryContent::Tree(serde_json::json!({})) },
        );
        let view = MetaView::rebuild(&snapshot).unwrap();
        assert!(view.mirrors.is_empty());
        assert!(view.credentials.is_empty());
    }

    #[test]
    fn malformed_credential_entry_errors() {
        let mut snapshot = HashMap::new();
        snapshot.insert(
            "/credentials/bad.json".to_string(),
            Entry { path: "/credentials/bad.json".into(), entry_type: EntryType::Json, content: EntryContent::Tree(serde_json::json!("not an object")) },
        );
        assert!(MetaView::rebuild(&snapshot).is_err());
    }
}
