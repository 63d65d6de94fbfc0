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

#[derive(Debug, Error)]
pub enum ReplicationError {
    /// No quorum of the coordination store could be reached; writes must
    /// block until it recovers, reads may continue against a stale view.
    #[error("no quorum")]
    NoQuorum,

    /// A compare-and-swap on the coordination store lost a race; the
    /// caller should refresh its view and retry.
    #[error("conflicting write, retry with a refreshed view")]
    Conflict,

    /// The replica is stopping; in-flight appends/catch-up are abandoned.
    #[error("replica shutting down")]
    Shutdown,

    #[error("this replica is not the leader")]
    NotLeader,

    #[error("duplicate submission of an idempotency token")]
    DuplicateSubmission,

    #[error("log entry {0} is missing")]
    MissingEntry(i64),

    #[error("corrupt log state: {0}")]
    Corruption(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] dogma_core::CoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ReplicationResult<T> = Result<T, ReplicationError>;
