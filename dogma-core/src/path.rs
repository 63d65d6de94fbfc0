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

//! Path grammar and glob-style path patterns.
//!
//! `path = "/" segment ("/" segment)*`, `segment = [A-Za-z0-9._-]+`, no
//! leading/trailing `.` in a segment and no `..`. Directory paths end in
//! `/`; the empty root `/` is a valid directory path.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{CoreError, CoreResult};

/// Validate an entry path against the path grammar.
pub fn validate_path(path: &str) -> CoreResult<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') {
        return Err(CoreError::InvalidPath(format!(
            "path must start with '/': {path}"
        )));
    }
    let is_dir = path.ends_with('/');
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(CoreError::InvalidPath(format!("empty path: {path}")));
    }
    for segment in trimmed.split('/') {
        validate_segment(segment)?;
    }
    let _ = is_dir;
    Ok(())
}

fn validate_segment(segment: &str) -> CoreResult<()> {
    if segment.is_empty() {
        return Err(CoreError::InvalidPath("empty path segment".into()));
    }
    if segment == "." || segment == ".." {
        return Err(CoreError::InvalidPath(format!(
            "illegal path segment: {segment}"
        )));
    }
    if segment.starts_with('.') || segment.ends_with('.') {
        return Err(CoreError::InvalidPath(format!(
            "segment may not start or end with '.': {segment}"
        )));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(CoreError::InvalidPath(format!(
            "segment contains illegal characters: {segment}"
        )));
    }
    Ok(())
}

/// A comma-separated list of glob expressions (`*` one segment, `**` any
/// depth), compiled once and reused for `find`, `diff` and watch matching.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    set: GlobSet,
}

impl PathPattern {
    /// Parse a comma-separated pattern list. An empty string matches
    /// everything (`/**`).
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let raw_owned = if raw.is_empty() {
            "/**".to_string()
        } else {
            raw.to_string()
        };
        let mut builder = GlobSetBuilder::new();
        for part in raw_owned.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let glob = Glob::new(part)
                .map_err(|e| CoreError::InvalidPath(format!("bad path pattern '{part}': {e}")))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| CoreError::InvalidPath(format!("bad path pattern '{raw_owned}': {e}")))?;
        Ok(Self { raw: raw_owned, set })
    }

    /// A pattern that matches every path.
    pub fn all() -> Self {
        Self::parse("/**").expect("/** is always a valid pattern")
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let trimmed = path.trim_start_matches('/');
        self.set.is_match(trimmed) || self.set.is_match(path)
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
