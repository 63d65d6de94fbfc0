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

//! The Replication Log (4.F): a leader-elected, totally-ordered command
//! log built on a small [`coordination`] seam so a networked
//! coordination service can later stand in for [`LocalCoordinationStore`]
//! without touching [`log::ReplicationLog`] itself.

pub mod coordination;
pub mod error;
pub mod log;

pub use coordination::{CoordinationStore, EphemeralHandle, LocalCoordinationStore};
pub use error::{ReplicationError, ReplicationResult};
pub use log::{LogEntry, ReplicaState, ReplicationLog};
