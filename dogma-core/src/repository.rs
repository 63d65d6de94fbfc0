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

//! `Repository`: a named container within a project with a linear commit
//! history. This is metadata only; the object store and commit chain
//! themselves live in `dogma-storage`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::project::{validate_name, DeletionRecord};
use crate::error::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessGrantKind {
    Role,
    User,
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub kind: AccessGrantKind,
    pub subject: String,
    pub permission: Permission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub project: String,
    pub name: String,
    /// Monotonically increasing, starts at 1 once the initial empty
    /// commit is created.
    pub head_revision: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub deletion: Option<DeletionRecord>,
    pub grants: Vec<AccessGrant>,
}

impl Repository {
    pub fn new(project: impl Into<String>, name: impl Into<String>, created_by: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            project: project.into(),
            name,
            head_revision: 1,
            created_by: created_by.into(),
            created_at: Utc::now(),
            deletion: None,
            grants: Vec::new(),
        })
    }

    pub fn is_meta(&self) -> bool {
        self.name == crate::project::META_REPO_NAME
    }

    pub fn is_removed(&self) -> bool {
        self.deletion.is_some()
    }

    pub fn mark_removed(&mut self, author: impl Into<String>) {
        self.deletion = Some(DeletionRecord { author: author.into(), timestamp: Utc::now() });
    }

    pub fn unmark_removed(&mut self) {
        self.deletion = None;
    }
}

/// A materialized snapshot of one revision: `path -> entry`.
pub type Snapshot = HashMap<String, crate::entry::Entry>;
