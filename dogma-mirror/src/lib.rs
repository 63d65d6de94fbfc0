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

//! Cron-driven bidirectional Git mirroring (4.H): discovers `Mirror`
//! definitions from each project's meta-repository, runs them on a
//! bounded worker pool that never rejects a due task, and keeps at most
//! one run of a given mirror in flight at a time.

pub mod error;
pub mod git_sync;
pub mod listener;
pub mod scheduler;

pub use error::{MirrorError, MirrorResult};
pub use git_sync::GitWorkdir;
pub use listener::{MirrorListener, MirrorRunResult, MirrorTaskInfo, SharedListener, TracingListener};
pub use scheduler::{MirrorScheduler, MirrorSchedulerConfig};
