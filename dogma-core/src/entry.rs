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

//! `Entry`: a (path, type, content) triple, value-typed and compared
//! structurally.

use serde::{Deserialize, Serialize};

use crate::path::validate_path;
use crate::error::CoreResult;

/// How an entry's raw bytes should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Json,
    Yaml,
    Text,
    Directory,
}

impl EntryType {
    /// Infer the entry type from a path's extension; directories (paths
    /// ending in `/`) are `Directory`.
    pub fn infer(path: &str) -> Self {
        if path.ends_with('/') {
            return EntryType::Directory;
        }
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".json") {
            EntryType::Json
        } else if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            EntryType::Yaml
        } else {
            EntryType::Text
        }
    }
}

/// The content payload of an entry. `Tree` is used only transiently by the
/// query engine when a JSON-path query extracts a sub-tree whose raw bytes
/// are not preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryContent {
    Bytes(Vec<u8>),
    Tree(serde_json::Value),
}

impl EntryContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EntryContent::Bytes(b) => std::str::from_utf8(b).ok(),
            EntryContent::Tree(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<serde_json::Value> {
        match self {
            EntryContent::Bytes(b) => serde_json::from_slice(b).ok(),
            EntryContent::Tree(v) => Some(v.clone()),
        }
    }
}

/// A (path, type, content) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub path: String,
    pub entry_type: EntryType,
    pub content: EntryContent,
}

impl Entry {
    pub fn new(path: impl Into<String>, content: Vec<u8>) -> CoreResult<Self> {
        let path = path.into();
        validate_path(&path)?;
        let entry_type = EntryType::infer(&path);
        Ok(Self {
            path,
            entry_type,
            content: EntryContent::Bytes(content),
        })
    }

    pub fn text(path: impl Into<String>, text: impl Into<String>) -> CoreResult<Self> {
        Self::new(path, text.into().into_bytes())
    }

    pub fn json(path: impl Into<String>, value: &serde_json::Value) -> CoreResult<Self> {
        let bytes = serde_json::to_vec_pretty(value)?;
        Self::new(path, bytes)
    }

    pub fn yaml(path: impl Into<String>, value: &serde_json::Value) -> CoreResult<Self> {
        let text = serde_yaml::to_string(value)
            .map_err(|e| crate::error::CoreError::InvalidPush(e.to_string()))?;
        Self::new(path, text.into_bytes())
    }

    /// Canonical JSON value for JSON/YAML entries; `None` for plain text.
    ///
    /// Invalid YAML falls back to being served as the raw text rather than
    /// erroring, matching the query engine's lenient behavior.
    pub fn parsed_value(&self) -> Option<serde_json::Value> {
        match self.entry_type {
            EntryType::Json => self.content.as_json(),
            EntryType::Yaml => match &self.content {
                EntryContent::Bytes(b) => serde_yaml::from_slice(b).ok(),
                EntryContent::Tree(v) => Some(v.clone()),
            },
            EntryType::Text | EntryType::Directory => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.content {
            EntryContent::Bytes(b) => Some(b),
            EntryContent::Tree(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_type_from_extension() {
        assert_eq!(EntryType::infer("/a.json"), EntryType::Json);
        assert_eq!(EntryType::infer("/a.JSON"), EntryType::Json);
        assert_eq!(EntryType::infer("/a.yaml"), EntryType::Yaml);
        assert_eq!(EntryType::infer("/a.yml"), EntryType::Yaml);
        assert_eq!(EntryType::infer("/a.txt"), EntryType::Text);
        assert_eq!(EntryType::infer("/dir/"), EntryType::Directory);
    }

    #[test]
    fn json_entry_round_trips_value() {
        let v = serde_json::json!({"a": "b"});
        let e = Entry::json("/x.json", &v).unwrap();
        assert_eq!(e.parsed_value().unwrap(), v);
    }

    #[test]
    fn invalid_yaml_falls_back_to_text() {
        let e = Entry::new("/x.yaml", b"not: [valid yaml".to_vec()).unwrap();
        assert!(e.parsed_value().is_none());
        assert_eq!(e.content.as_text(), Some("not: [valid yaml"));
    }
}
