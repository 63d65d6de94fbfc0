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

//! Physical storage for the configuration repository service.
//!
//! - **Object Store** (4.A): an immutable, content-addressed blob/tree/commit
//!   graph, one shard per repository ([`object_store`]).
//! - **Commit Engine** (4.B): the sole writer of new commits, serialized by a
//!   per-repository write lock ([`commit_engine`]).
//! - **Repository Manager** (4.D): project/repository lifecycle, soft-delete
//!   and purge ([`repo_manager`]).
//! - **Session Store** (4.G): filesystem-backed, sharded by session id, with
//!   an in-memory read-through cache ([`session_store`]).
//!
//! Text diffing for non-JSON entries ([`diff`]) backs both `getDiff` and the
//! mirror scheduler's local/remote tree comparison.

pub mod commit_engine;
pub mod diff;
pub mod object_store;
pub mod repo_manager;
pub mod session_store;

pub use commit_engine::{PushOutcome, RepoHandle};
pub use diff::{diff_text, DiffHunk, DiffLine, LineChange, TextDiffResult};
pub use object_store::{
    Blob, CommitObject, EntryMode, GitObject, ObjectId, ObjectStore, ObjectType, StoreError,
    StoreStats, StoredObject, Tree, TreeEntry,
};
pub use repo_manager::RepositoryManager;
pub use session_store::SessionStore;
