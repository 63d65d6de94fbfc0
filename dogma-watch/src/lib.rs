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

//! The watch subsystem (4.E): long-poll `watchRepository`/`watchFile`
//! primitives over a repository's commit history, plus a higher-level
//! [`Watcher`] that adds a memoized pure mapping step.

pub mod error;
pub mod registry;
pub mod watcher;

pub use error::{WatchError, WatchResult};
pub use registry::{WatchFileOutcome, WatchOutcome, WatchRegistry};
pub use watcher::{Watcher, WatcherOutcome};
