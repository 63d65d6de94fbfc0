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

//! A per-repository content-addressed object store, backed in memory by
//! a `DashMap` and flushed to a single `bincode`-encoded file on disk.
//! Cross-repository sharing is deliberately not permitted: each
//! repository owns its own `ObjectStore` instance and backing file.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::objects::{GitObject, ObjectId, ObjectType};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),
    #[error("corrupted object: {0}")]
    CorruptedObject(ObjectId),
    #[error("type mismatch: expected {expected:?}, got {actual:?}")]
    TypeMismatch { expected: ObjectType, actual: ObjectType },
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("serialization error: {0}")]
    SerializationError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub obj_type: ObjectType,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_objects: u64,
    pub blob_count: u64,
    pub tree_count: u64,
    pub commit_count: u64,
    pub total_size_bytes: u64,
}

/// A single repository's content-addressed object database.
pub struct ObjectStore {
    objects: DashMap<ObjectId, StoredObject>,
    blob_count: AtomicU64,
    tree_count: AtomicU64,
    commit_count: AtomicU64,
    total_size: AtomicU64,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            blob_count: AtomicU64::new(0),
            tree_count: AtomicU64::new(0),
            commit_count: AtomicU64::new(0),
            total_size: AtomicU64::new(0),
        }
    }

    /// Idempotent: re-`put`ting identical content returns the same id
    /// without touching the counters again.
    pub fn put<T: GitObject>(&self, obj: &T) -> ObjectId {
        let bytes = obj.serialize_bytes();
        let oid = ObjectId::from_content(&bytes);
        if self.objects.contains_key(&oid) {
            return oid;
        }
        let size = bytes.len() as u64;
        self.objects.insert(
            oid,
            StoredObject { obj_type: T::TYPE, data: bytes },
        );
        match T::TYPE {
            ObjectType::Blob => self.blob_count.fetch_add(1, Ordering::Relaxed),
            ObjectType::Tree => self.tree_count.fetch_add(1, Ordering::Relaxed),
            ObjectType::Commit => self.commit_count.fetch_add(1, Ordering::Relaxed),
        };
        self.total_size.fetch_add(size, Ordering::Relaxed);
        oid
    }

    pub fn get<T: GitObject>(&self, id: &ObjectId) -> Result<Option<T>, StoreError> {
        match self.objects.get(id) {
            None => Ok(None),
            Some(entry) => {
                if entry.obj_type != T::TYPE {
                    return Err(StoreError::TypeMismatch {
                        expected: T::TYPE,
                        actual: entry.obj_type,
                    });
                }
                T::deserialize_bytes(&entry.data)
                    .map(Some)
                    .map_err(|_| StoreError::CorruptedObject(*id))
            }
        }
    }

    pub fn get_required<T: GitObject>(&self, id: &ObjectId) -> Result<T, StoreError> {
        self.get(id)?.ok_or(StoreError::NotFound(*id))
    }

    pub fn exists(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_objects: self.objects.len() as u64,
            blob_count: self.blob_count.load(Ordering::Relaxed),
            tree_count: self.tree_count.load(Ordering::Relaxed),
            commit_count: self.commit_count.load(Ordering::Relaxed),
            total_size_bytes: self.total_size.load(Ordering::Relaxed),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot: Vec<(ObjectId, StoredObject)> =
            self.objects.iter().map(|e| (*e.key(), e.value().clone())).collect();
        let bytes = bincode::serialize(&snapshot)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(tmp_path, path)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, StoreError> {
        let bytes = std::fs::read(path)?;
        let snapshot: Vec<(ObjectId, StoredObject)> =
            bincode::deserialize(&bytes).map_err(|e| StoreError::SerializationError(e.to_string()))?;
        let store = Self::new();
        for (id, obj) in snapshot {
            let size = obj.data.len() as u64;
            match obj.obj_type {
                ObjectType::Blob => store.blob_count.fetch_add(1, Ordering::Relaxed),
                ObjectType::Tree => store.tree_count.fetch_add(1, Ordering::Relaxed),
                ObjectType::Commit => store.commit_count.fetch_add(1, Ordering::Relaxed),
            };
            store.total_size.fetch_add(size, Ordering::Relaxed);
            store.objects.insert(id, obj);
        }
        Ok(store)
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::objects::{Blob, CommitObject, Tree};
    use super::*;

    #[test]
    fn put_is_idempotent() {
        let store = ObjectStore::new();
        let blob = Blob::new(b"hello".to_vec());
        let id1 = store.put(&blob);
        let id2 = store.put(&blob);
        assert_eq!(id1, id2);
        assert_eq!(store.stats().blob_count, 1);
    }

    #[test]
    fn type_mismatch_detected() {
        let store = ObjectStore::new();
        let blob = Blob::new(b"hello".to_vec());
        let id = store.put(&blob);
        let result = store.get::<Tree>(&id);
        assert!(matches!(result, Err(StoreError::TypeMismatch { .. })));
    }

    #[test]
    fn commit_chain_persists() {
        let store = ObjectStore::new();
        let tree = Tree::new();
        let tree_id = store.put(&tree);
        let c1 = CommitObject::initial(tree_id, "alice", "init");
        let c1_id = store.put(&c1);
        let fetched: CommitObject = store.get_required(&c1_id).unwrap();
        assert_eq!(fetched, c1);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.bin");
        let store = ObjectStore::new();
        let blob = Blob::new(b"payload".to_vec());
        let id = store.put(&blob);
        store.save_to_file(&path).unwrap();

        let loaded = ObjectStore::load_from_file(&path).unwrap();
        let fetched: Blob = loaded.get_required(&id).unwrap();
        assert_eq!(fetched, blob);
    }
}
