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

//! Shared data model for the configuration repository service.
//!
//! This crate has no I/O of its own: it defines the value types (projects,
//! repositories, entries, changes, commits, queries, path patterns, mirrors,
//! credentials, sessions and replicated commands) plus the hand-rolled
//! JSON Patch engine that the rest of the workspace builds on.

pub mod change;
pub mod command;
pub mod commit;
pub mod credential;
pub mod entry;
pub mod error;
pub mod mirror;
pub mod patch;
pub mod path;
pub mod project;
pub mod query;
pub mod repository;
pub mod revision;
pub mod session;

pub use change::{Change, ChangeKind};
pub use command::Command;
pub use commit::{Author, Commit, Markup};
pub use credential::{Credential, CredentialType};
pub use entry::{Entry, EntryContent, EntryType};
pub use error::CoreError;
pub use mirror::{Mirror, MirrorDirection};
pub use patch::{JsonPatchOp, SafeReplace};
pub use path::PathPattern;
pub use project::Project;
pub use query::Query;
pub use repository::Repository;
pub use revision::Revision;
pub use session::AuthenticatedSession;
