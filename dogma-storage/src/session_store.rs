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

//! Authenticated sessions, fronted by an in-memory cache over a sharded
//! filesystem backing store: two hex characters of the session id select
//! a subdirectory so no single directory ever holds every live session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dogma_core::session::AuthenticatedSession;
use dogma_core::{CoreError, CoreResult};
use moka::sync::Cache;
use uuid::Uuid;

const CACHE_CAPACITY: u64 = 10_000;
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Sessions, cached in memory and persisted (if a data dir is configured)
/// as one JSON file per session under a two-level shard directory.
pub struct SessionStore {
    cache: Cache<Uuid, Arc<AuthenticatedSession>>,
    data_dir: Option<PathBuf>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
            data_dir: None,
        }
    }

    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: Some(dir.into()), ..Self::new() }
    }

    fn shard_path(&self, id: Uuid) -> Option<PathBuf> {
        let dir = self.data_dir.as_ref()?;
        let simple = id.simple().to_string();
        let (prefix, rest) = simple.split_at(2);
        Some(dir.join(prefix).join(format!("{rest}.json")))
    }

    /// Mint a fresh session id without persisting anything yet; callers
    /// that need the id before they have the rest of the session's fields
    /// (e.g. to embed it in a token they are about to sign) use this
    /// instead of picking one themselves.
    pub fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }

    /// Whether a non-expired session with this id is known to the store,
    /// without deserializing or returning its content.
    pub fn exists(&self, id: Uuid) -> bool {
        self.get(id).is_ok()
    }

    pub fn create(
        &self,
        username: impl Into<String>,
        raw_token: impl Into<String>,
        ttl: Duration,
    ) -> CoreResult<AuthenticatedSession> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| CoreError::InvalidPush(e.to_string()))?;
        let session = AuthenticatedSession::new(username, raw_token, ttl);
        self.persist(&session)?;
        self.cache.insert(session.id, Arc::new(session.clone()));
        Ok(session)
    }

    /// Renew an existing session's expiration time in place, used by a
    /// client that wants to keep a long-lived connection authenticated
    /// without logging in again.
    pub fn update(&self, id: Uuid, ttl: Duration) -> CoreResult<AuthenticatedSession> {
        let mut session = self.get(id)?;
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| CoreError::InvalidPush(e.to_string()))?;
        session.expiration_time = Utc::now() + ttl;
        self.persist(&session)?;
        self.cache.insert(session.id, Arc::new(session.clone()));
        Ok(session)
    }

    pub fn get(&self, id: Uuid) -> CoreResult<AuthenticatedSession> {
        if let Some(session) = self.cache.get(&id) {
            if session.is_expired() {
                self.remove(id)?;
                return Err(CoreError::NotFound(format!("session {id}")));
            }
            return Ok((*session).clone());
        }
        let session = self.load(id)?;
        if session.is_expired() {
            self.remove(id)?;
            return Err(CoreError::NotFound(format!("session {id}")));
        }
        self.cache.insert(id, Arc::new(session.clone()));
        Ok(session)
    }

    pub fn remove(&self, id: Uuid) -> CoreResult<()> {
        self.cache.invalidate(&id);
        if let Some(path) = self.shard_path(id) {
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }

    /// Scan the backing store and evict sessions past their expiration
    /// time. Run periodically by the mirror scheduler's shared tick loop;
    /// a no-op when no data dir is configured since nothing outlives the
    /// in-process cache's own TTL eviction in that mode.
    pub fn sweep_expired(&self) -> CoreResult<usize> {
        let Some(dir) = &self.data_dir else { return Ok(0) };
        let mut removed = 0;
        if !dir.exists() {
            return Ok(0);
        }
        for shard in std::fs::read_dir(dir).map_err(|e| CoreError::Corruption(e.to_string()))? {
            let shard = shard.map_err(|e| CoreError::Corruption(e.to_string()))?;
            if !shard.path().is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(shard.path()).map_err(|e| CoreError::Corruption(e.to_string()))? {
                let entry = entry.map_err(|e| CoreError::Corruption(e.to_string()))?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Ok(bytes) = std::fs::read(&path) else { continue };
                let Ok(stored) = serde_json::from_slice::<StoredSession>(&bytes) else { continue };
                if stored.expiration_time < Utc::now() {
                    let _ = std::fs::remove_file(&path);
                    self.cache.invalidate(&stored.id);
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn persist(&self, session: &AuthenticatedSession) -> CoreResult<()> {
        let Some(path) = self.shard_path(session.id) else { return Ok(()) };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Corruption(e.to_string()))?;
        }
        let stored = StoredSession {
            id: session.id,
            username: session.username.clone(),
            expiration_time: session.expiration_time,
            raw_token: session.raw_token.clone(),
        };
        let bytes = serde_json::to_vec(&stored)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| CoreError::Corruption(e.to_string()))?;
        std::fs::rename(&tmp, &path).map_err(|e| CoreError::Corruption(e.to_string()))?;
        Ok(())
    }

    fn load(&self, id: Uuid) -> CoreResult<AuthenticatedSession> {
        let path = self.shard_path(id).ok_or_else(|| CoreError::NotFound(format!("session {id}")))?;
        let bytes = std::fs::read(&path).map_err(|_| CoreError::NotFound(format!("session {id}")))?;
        let stored: StoredSession =
            serde_json::from_slice(&bytes).map_err(|e| CoreError::Corruption(e.to_string()))?;
        Ok(AuthenticatedSession {
            id: stored.id,
            username: stored.username,
            expiration_time: stored.expiration_time,
            raw_token: stored.raw_token,
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StoredSession {
    id: Uuid,
    username: String,
    expiration_time: DateTime<Utc>,
    raw_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_round_trip() {
        let store = SessionStore::new();
        let session = store.create("alice", "tok-1", Duration::from_secs(60)).unwrap();
        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched.username, "alice");
    }

    #[test]
    fn persists_to_disk_and_survives_cache_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_data_dir(dir.path());
        let session = store.create("bob", "tok-2", Duration::from_secs(60)).unwrap();
        store.cache.invalidate(&session.id);
        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched.username, "bob");
    }

    #[test]
    fn remove_deletes_cache_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_data_dir(dir.path());
        let session = store.create("carol", "tok-3", Duration::from_secs(60)).unwrap();
        store.remove(session.id).unwrap();
        assert!(matches!(store.get(session.id), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn sweep_removes_expired_sessions_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_data_dir(dir.path());
        let expired = store.create("dave", "tok-4", Duration::from_secs(0)).unwrap();
        let live = store.create("erin", "tok-5", Duration::from_secs(600)).unwrap();
        store.cache.invalidate(&expired.id);
        store.cache.invalidate(&live.id);
        std::thread::sleep(Duration::from_millis(5));
        let removed = store.sweep_expired().unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(live.id).is_ok());
    }

    #[test]
    fn generate_returns_distinct_unused_ids() {
        let store = SessionStore::new();
        let a = store.generate();
        let b = store.generate();
        assert_ne!(a, b);
        assert!(!store.exists(a));
    }

    #[test]
    fn exists_reflects_create_and_remove() {
        let store = SessionStore::new();
        let session = store.create("frank", "tok-6", Duration::from_secs(60)).unwrap();
        assert!(store.exists(session.id));
        store.remove(session.id).unwrap();
        assert!(!store.exists(session.id));
    }

    #[test]
    fn update_extends_expiration_past_the_original_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_data_dir(dir.path());
        let session = store.create("grace", "tok-7", Duration::from_millis(20)).unwrap();
        let renewed = store.update(session.id, Duration::from_secs(60)).unwrap();
        assert!(renewed.expiration_time > session.expiration_time);

        std::thread::sleep(Duration::from_millis(30));
        store.cache.invalidate(&session.id);
        let reloaded = store.get(session.id).unwrap();
        assert!(!reloaded.is_expired());
    }
}
