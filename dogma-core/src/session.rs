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

//! `AuthenticatedSession`: lives in the Session Store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedSession {
    pub id: Uuid,
    pub username: String,
    pub expiration_time: DateTime<Utc>,
    pub raw_token: String,
}

impl AuthenticatedSession {
    pub fn new(username: impl Into<String>, raw_token: impl Into<String>, ttl: chrono::Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            expiration_time: Utc::now() + ttl,
            raw_token: raw_token.into(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiration_time
    }

    /// The two-level shard prefix (first two hex characters of the id)
    /// used by the filesystem-backed session store.
    pub fn shard_prefix(&self) -> String {
        let hex = self.id.simple().to_string();
        hex[..2].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_detected_after_ttl() {
        let s = AuthenticatedSession::new("alice", "tok", chrono::Duration::milliseconds(-1));
        assert!(s.is_expired());
    }

    #[test]
    fn shard_prefix_is_two_hex_chars() {
        let s = AuthenticatedSession::new("alice", "tok", chrono::Duration::hours(1));
        assert_eq!(s.shard_prefix().len(), 2);
    }
}
