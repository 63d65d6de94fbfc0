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

//! `Command`: the tagged union replayed in order by every replica of the
//! Replication Log. A single discriminator field (`type`) carries the
//! kind; unknown types are rejected by the deserializer (fatal), unknown
//! fields are ignored by serde's default struct handling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::change::Change;
use crate::commit::{Author, Markup};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    CreateProject {
        timestamp: DateTime<Utc>,
        author: Author,
        name: String,
    },
    RemoveProject {
        timestamp: DateTime<Utc>,
        author: Author,
        name: String,
    },
    UnremoveProject {
        timestamp: DateTime<Utc>,
        author: Author,
        name: String,
    },
    PurgeProject {
        timestamp: DateTime<Utc>,
        author: Author,
        name: String,
    },
    CreateRepo {
        timestamp: DateTime<Utc>,
        author: Author,
        project: String,
        name: String,
    },
    RemoveRepo {
        timestamp: DateTime<Utc>,
        author: Author,
        project: String,
        name: String,
    },
    UnremoveRepo {
        timestamp: DateTime<Utc>,
        author: Author,
        project: String,
        name: String,
    },
    PurgeRepo {
        timestamp: DateTime<Utc>,
        author: Author,
        project: String,
        name: String,
    },
    Push {
        timestamp: DateTime<Utc>,
        author: Author,
        project: String,
        repo: String,
        base_revision: i64,
        summary: String,
        detail: Option<String>,
        markup: Markup,
        changes: Vec<Change>,
        force: bool,
    },
    /// Push via a pure transform function identified by name, applied to
    /// the current value at `path` on the replaying side. Carrying the
    /// function by name (rather than serialized code) keeps the log
    /// format data-only.
    Transform {
        timestamp: DateTime<Utc>,
        author: Author,
        project: String,
        repo: String,
        base_revision: i64,
        path: String,
        transform_name: String,
    },
    UpdateServerStatus {
        timestamp: DateTime<Utc>,
        author: Author,
        read_only: bool,
    },
    CreateSession {
        timestamp: DateTime<Utc>,
        author: Author,
        session_id: Uuid,
        username: String,
        expiration_time: DateTime<Utc>,
        raw_token: String,
        idempotency_token: Uuid,
    },
    RemoveSession {
        timestamp: DateTime<Utc>,
        author: Author,
        session_id: Uuid,
    },
}

impl Command {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Command::CreateProject { timestamp, .. }
            | Command::RemoveProject { timestamp, .. }
            | Command::UnremoveProject { timestamp, .. }
            | Command::PurgeProject { timestamp, .. }
            | Command::CreateRepo { timestamp, .. }
            | Command::RemoveRepo { timestamp, .. }
            | Command::UnremoveRepo { timestamp, .. }
            | Command::PurgeRepo { timestamp, .. }
            | Command::Push { timestamp, .. }
            | Command::Transform { timestamp, .. }
            | Command::UpdateServerStatus { timestamp, .. }
            | Command::CreateSession { timestamp, .. }
            | Command::RemoveSession { timestamp, .. } => *timestamp,
        }
    }

    /// Idempotency key for commands whose operation is naturally
    /// idempotent (session creation); `None` means duplicate submission
    /// must be rejected rather than silently absorbed (R1).
    pub fn idempotency_token(&self) -> Option<Uuid> {
        match self {
            Command::CreateSession { idempotency_token, .. } => Some(*idempotency_token),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_discriminator() {
        let cmd = Command::CreateProject {
            timestamp: Utc::now(),
            author: Author::system(),
            name: "foo".into(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "CreateProject");
        let back: Command = serde_json::from_value(json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = serde_json::json!({"type": "NotARealCommand"});
        assert!(serde_json::from_value::<Command>(json).is_err());
    }
}
