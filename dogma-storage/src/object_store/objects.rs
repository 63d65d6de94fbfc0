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

//! Content-addressed object kinds: blobs, trees, commits.
//!
//! Mirrors Git's object model: every object is identified by the blake3
//! hash of its serialized bytes, objects are immutable, and a commit
//! points at a tree plus (at most one, here: linear history) parent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A content address: the blake3 hash of an object's serialized bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub [u8; 32]);

impl ObjectId {
    pub fn from_content(bytes: &[u8]) -> Self {
        let hash = blake3::hash(bytes);
        Self(*hash.as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 7 bytes (14 hex chars), for log-friendly display.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..7])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        let bytes = hex::decode(s).map_err(|_| ParseError::InvalidHex)?;
        if bytes.len() != 32 {
            return Err(ParseError::InvalidLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(prefix)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid hex string")]
    InvalidHex,
    #[error("invalid length, expected 32 bytes")]
    InvalidLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectType {
    Blob = 1,
    Tree = 2,
    Commit = 3,
}

/// The raw bytes of one entry's content, addressed by the blake3 hash of
/// those bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn object_id(&self) -> ObjectId {
        ObjectId::from_content(&self.data)
    }

    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryMode {
    Blob,
    Tree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub oid: ObjectId,
    pub mode: EntryMode,
}

/// A recursive directory listing; entries are kept sorted by name so that
/// identical directory contents always hash to the same tree id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, name: impl Into<String>, oid: ObjectId, mode: EntryMode) {
        let name = name.into();
        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == name) {
            existing.oid = oid;
            existing.mode = mode;
        } else {
            self.entries.push(TreeEntry { name, oid, mode });
            self.entries.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    pub fn object_id(&self) -> ObjectId {
        let bytes = bincode::serialize(self).expect("tree serialization is infallible");
        ObjectId::from_content(&bytes)
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitObject {
    pub tree: ObjectId,
    pub parent: Option<ObjectId>,
    pub revision: i64,
    pub author: String,
    pub summary: String,
    pub timestamp_us: u64,
}

impl CommitObject {
    pub fn initial(tree: ObjectId, author: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            tree,
            parent: None,
            revision: 1,
            author: author.into(),
            summary: summary.into(),
            timestamp_us: current_timestamp_us(),
        }
    }

    pub fn child(
        parent: ObjectId,
        parent_revision: i64,
        tree: ObjectId,
        author: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parent: Some(parent),
            revision: parent_revision + 1,
            author: author.into(),
            summary: summary.into(),
            timestamp_us: current_timestamp_us(),
        }
    }

    pub fn object_id(&self) -> ObjectId {
        let bytes = bincode::serialize(self).expect("commit serialization is infallible");
        ObjectId::from_content(&bytes)
    }

    pub fn is_initial(&self) -> bool {
        self.parent.is_none()
    }
}

pub fn current_timestamp_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_micros() as u64
}

/// Common trait implemented by every storable object kind.
pub trait GitObject: Sized + Serialize + for<'de> Deserialize<'de> {
    const TYPE: ObjectType;

    fn object_type(&self) -> ObjectType {
        Self::TYPE
    }

    fn serialize_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("object serialization is infallible")
    }

    fn deserialize_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    fn compute_oid(&self) -> ObjectId {
        ObjectId::from_content(&self.serialize_bytes())
    }
}

impl GitObject for Blob {
    const TYPE: ObjectType = ObjectType::Blob;
}

impl GitObject for Tree {
    const TYPE: ObjectType = ObjectType::Tree;
}

impl GitObject for CommitObject {
    const TYPE: ObjectType = ObjectType::Commit;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_is_content_addressed() {
        let a = Blob::new(b"hello".to_vec());
        let b = Blob::new(b"hello".to_vec());
        assert_eq!(a.object_id(), b.object_id());
        let c = Blob::new(b"world".to_vec());
        assert_ne!(a.object_id(), c.object_id());
    }

    #[test]
    fn hex_roundtrip() {
        let id = ObjectId::from_content(b"abc");
        let hex = id.to_hex();
        assert_eq!(ObjectId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn short_id_is_14_hex_chars() {
        let id = ObjectId::from_content(b"abc");
        assert_eq!(id.short().len(), 14);
    }

    #[test]
    fn tree_keeps_entries_sorted() {
        let mut t = Tree::new();
        t.add_entry("b.txt", ObjectId::from_content(b"b"), EntryMode::Blob);
        t.add_entry("a.txt", ObjectId::from_content(b"a"), EntryMode::Blob);
        let names: Vec<_> = t.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["a.txt".to_string(), "b.txt".to_string()]);
    }

    #[test]
    fn commit_parent_chain() {
        let tree1 = Tree::new().object_id();
        let c1 = CommitObject::initial(tree1, "alice", "init");
        assert!(c1.is_initial());
        let c2 = CommitObject::child(c1.object_id(), c1.revision, tree1, "alice", "second");
        assert_eq!(c2.revision, 2);
        assert_eq!(c2.parent, Some(c1.object_id()));
    }
}
