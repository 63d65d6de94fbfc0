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

//! Scheduler events: `onStart`/`onComplete`/`onError`, so external
//! collaborators (metrics, alerting - both out of this crate's scope) can
//! observe mirror progress without the scheduler depending on them.

use std::sync::Arc;

use dogma_core::MirrorDirection;

use crate::error::MirrorError;

/// Identifies one dispatched mirror task for the duration of a single run.
#[derive(Debug, Clone)]
pub struct MirrorTaskInfo {
    pub mirror_id: String,
    pub project: String,
    pub direction: MirrorDirection,
}

/// The outcome of a completed mirror run.
#[derive(Debug, Clone)]
pub struct MirrorRunResult {
    /// `true` if a new commit was pushed through the commit engine.
    pub committed: bool,
    pub new_revision: Option<i64>,
    pub files_synced: u64,
    pub bytes_synced: u64,
}

/// Observer of mirror scheduler progress. Implementations must not block;
/// the scheduler calls these synchronously from the worker that ran the
/// task.
pub trait MirrorListener: Send + Sync {
    fn on_start(&self, task: &MirrorTaskInfo) {
        let _ = task;
    }
    fn on_complete(&self, task: &MirrorTaskInfo, result: &MirrorRunResult) {
        let _ = (task, result);
    }
    fn on_error(&self, task: &MirrorTaskInfo, cause: &MirrorError) {
        let _ = (task, cause);
    }
}

/// Default listener: structured `tracing` events only, matching the
/// ambient logging stack used by every other component.
pub struct TracingListener;

impl MirrorListener for TracingListener {
    fn on_start(&self, task: &MirrorTaskInfo) {
        tracing::info!(mirror = %task.mirror_id, project = %task.project, ?task.direction, "mirror task started");
    }

    fn on_complete(&self, task: &MirrorTaskInfo, result: &MirrorRunResult) {
        tracing::info!(
            mirror = %task.mirror_id,
            committed = result.committed,
            revision = ?result.new_revision,
            files = result.files_synced,
            bytes = result.bytes_synced,
            "mirror task completed"
        );
    }

    fn on_error(&self, task: &MirrorTaskInfo, cause: &MirrorError) {
        tracing::warn!(mirror = %task.mirror_id, error = %cause, "mirror task failed, will retry next tick");
    }
}

pub type SharedListener = Arc<dyn MirrorListener>;
