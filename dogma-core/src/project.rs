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

//! `Project`: a named namespace owning repositories and a meta-repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{CoreError, CoreResult};

pub const META_REPO_NAME: &str = "meta";
pub const INTERNAL_PROJECT_NAME: &str = "dogma";

static NAME_RE: OnceLock<regex::Regex> = OnceLock::new();

/// `[A-Za-z_][A-Za-z0-9._-]*`
pub fn validate_name(name: &str) -> CoreResult<()> {
    let re = NAME_RE.get_or_init(|| regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9._-]*$").unwrap());
    if re.is_match(name) {
        Ok(())
    } else {
        Err(CoreError::InvalidName(format!(
            "name must match [A-Za-z_][A-Za-z0-9._-]*: {name}"
        )))
    }
}

/// A project is internal (hidden from non-admin listings) if it starts
/// with `@` or is the reserved `dogma` project.
pub fn is_internal(name: &str) -> bool {
    name.starts_with('@') || name == INTERNAL_PROJECT_NAME
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionRecord {
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub deletion: Option<DeletionRecord>,
}

impl Project {
    pub fn new(name: impl Into<String>, created_by: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            created_by: created_by.into(),
            created_at: Utc::now(),
            deletion: None,
        })
    }

    pub fn is_internal(&self) -> bool {
        is_internal(&self.name)
    }

    pub fn is_removed(&self) -> bool {
        self.deletion.is_some()
    }

    pub fn mark_removed(&mut self, author: impl Into<String>) {
        self.deletion = Some(DeletionRecord {
            author: author.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn unmark_removed(&mut self) {
        self.deletion = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(validate_name("foo").is_ok());
        assert!(validate_name("_foo-bar.baz").is_ok());
        assert!(validate_name("9abc").is_err());
        assert!(validate_name("has space").is_err());
    }

    #[test]
    fn internal_projects_detected() {
        assert!(is_internal("@system"));
        assert!(is_internal("dogma"));
        assert!(!is_internal("foo"));
    }

    #[test]
    fn soft_delete_round_trip() {
        let mut p = Project::new("foo", "alice").unwrap();
        assert!(!p.is_removed());
        p.mark_removed("alice");
        assert!(p.is_removed());
        p.unmark_removed();
        assert!(!p.is_removed());
    }
}
