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

//! `Change`: a user-supplied edit against one path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::patch::JsonPatchOp;

/// The kind discriminator carried by a `Change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    UpsertText,
    UpsertJson,
    UpsertYaml,
    ApplyJsonPatch,
    ApplyTextPatch,
    Remove,
    Rename,
}

/// A single edit submitted by a caller as part of a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Change {
    UpsertText { path: String, content: String },
    UpsertJson { path: String, content: Value },
    UpsertYaml { path: String, content: Value },
    ApplyJsonPatch { path: String, ops: Vec<JsonPatchOp> },
    /// Unified-diff text patch; `patch` is the textual diff to apply.
    ApplyTextPatch { path: String, patch: String },
    Remove { path: String },
    Rename { old_path: String, new_path: String },
}

impl Change {
    pub fn path(&self) -> &str {
        match self {
            Change::UpsertText { path, .. }
            | Change::UpsertJson { path, .. }
            | Change::UpsertYaml { path, .. }
            | Change::ApplyJsonPatch { path, .. }
            | Change::ApplyTextPatch { path, .. }
            | Change::Remove { path } => path,
            Change::Rename { old_path, .. } => old_path,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::UpsertText { .. } => ChangeKind::UpsertText,
            Change::UpsertJson { .. } => ChangeKind::UpsertJson,
            Change::UpsertYaml { .. } => ChangeKind::UpsertYaml,
            Change::ApplyJsonPatch { .. } => ChangeKind::ApplyJsonPatch,
            Change::ApplyTextPatch { .. } => ChangeKind::ApplyTextPatch,
            Change::Remove { .. } => ChangeKind::Remove,
            Change::Rename { .. } => ChangeKind::Rename,
        }
    }
}
