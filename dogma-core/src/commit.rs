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

//! `Commit`: an atomic application of a list of changes at a base revision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::change::Change;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), email: None }
    }

    pub fn with_email(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: Some(email.into()) }
    }

    pub fn system() -> Self {
        Self::with_email("dogma", "dogma@localhost")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Markup {
    Plaintext,
    Markdown,
}

/// One immutable revision in a repository's linear history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub revision: i64,
    pub author: Author,
    pub summary: String,
    pub detail: Option<String>,
    pub markup: Markup,
    pub timestamp: DateTime<Utc>,
    /// The normalized changes actually persisted (post `UPSERT_JSON` ->
    /// `APPLY_JSON_PATCH` normalization, empties filtered).
    pub changes: Vec<Change>,
}

impl Commit {
    pub fn initial(author: Author, summary: impl Into<String>, changes: Vec<Change>) -> Self {
        Self {
            revision: 1,
            author,
            summary: summary.into(),
            detail: None,
            markup: Markup::Plaintext,
            timestamp: Utc::now(),
            changes,
        }
    }

    pub fn child(
        parent_revision: i64,
        author: Author,
        summary: impl Into<String>,
        detail: Option<String>,
        markup: Markup,
        changes: Vec<Change>,
    ) -> Self {
        Self {
            revision: parent_revision + 1,
            author,
            summary: summary.into(),
            detail,
            markup,
            timestamp: Utc::now(),
            changes,
        }
    }

    pub fn touches(&self, path: &str) -> bool {
        self.changes.iter().any(|c| match c {
            Change::Rename { old_path, new_path } => old_path == path || new_path == path,
            other => other.path() == path,
        })
    }
}
