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

//! The error kinds shared by every layer of the core.
//!
//! Storage, query and replication crates each define their own error enum
//! for concerns local to them, but convert into (or carry a variant of)
//! this one at their public boundary so callers see one stable taxonomy.

use thiserror::Error;

/// Errors produced by the commit/query/repository-manager core.
///
/// Retryability is documented per variant; see the error handling design.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("change conflict: base revision does not match head")]
    ChangeConflict,

    #[error("change patch conflict: {0}")]
    ChangePatchConflict(String),

    #[error("redundant change: push has no net effect")]
    RedundantChange,

    #[error("invalid push: {0}")]
    InvalidPush(String),

    #[error("server is read-only")]
    ReadOnly,

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out")]
    Timeout,

    #[error("mirror error: {0}")]
    MirrorError(String),

    #[error("no quorum available")]
    NoQuorum,

    #[error("shutting down")]
    Shutdown,

    #[error("data corruption: {0}")]
    Corruption(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
