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

use thiserror::Error;

/// `MirrorError` surfaces to callers only through the scheduler's
/// [`crate::listener::MirrorListener::on_error`] hook, never as a direct
/// return value of a suspending call - mirror failures are retried on the
/// task's next scheduled tick rather than propagated synchronously.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("mirror {0} not found")]
    NotFound(String),

    #[error("invalid cron expression {0:?}: {1}")]
    InvalidSchedule(String, String),

    #[error("{0} contains more than {1} files (cap {2})")]
    TooManyFiles(String, u64, u64),

    #[error("{0} contains more than {1} bytes (cap {2})")]
    TooManyBytes(String, u64, u64),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] dogma_core::CoreError),

    #[error(transparent)]
    Index(#[from] dogma_index::IndexError),

    #[error("no credential found for host {0}")]
    NoCredential(String),

    #[error("{0}")]
    Other(String),
}

pub type MirrorResult<T> = Result<T, MirrorError>;
