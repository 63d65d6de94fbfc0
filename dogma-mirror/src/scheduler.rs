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

//! The mirror scheduler (4.H): a 1-second tick loop that discovers
//! mirrors from every project's meta-repository, a bounded worker pool
//! that never rejects a dispatched task, and per-mirror serialization so
//! at most one run of a given mirror is ever in flight.
//!
//! Cron coalescing: `next_fire` tracks one upcoming timestamp per mirror.
//! A tick dispatches a mirror once `now >= next_fire` and immediately
//! recomputes `next_fire` as the next occurrence strictly after `now` -
//! any fire windows missed while the mirror was busy (or the process was
//! down) collapse into a single catch-up run rather than one run per
//! missed window.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use dashmap::DashMap;
use dogma_core::{Author, Change, CoreError, Markup, Mirror, MirrorDirection, Revision};
use dogma_index::MetaView;
use dogma_storage::RepositoryManager;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::error::{MirrorError, MirrorResult};
use crate::git_sync::{compile_ignore, scratch_path, GitWorkdir};
use crate::listener::{MirrorRunResult, MirrorTaskInfo, SharedListener, TracingListener};

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const SENTINEL_NAME: &str = "mirror_state.json";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct MirrorState {
    remote_commit_id: String,
    synced_at: DateTime<Utc>,
}

/// Construction-time configuration for a [`MirrorScheduler`].
pub struct MirrorSchedulerConfig {
    pub num_threads: usize,
    pub scratch_dir: PathBuf,
    /// This replica's zone, if any; mirrors pinned to a different zone are
    /// skipped entirely.
    pub zone: Option<String>,
    pub listener: SharedListener,
}

impl Default for MirrorSchedulerConfig {
    fn default() -> Self {
        Self {
            num_threads: 2,
            scratch_dir: PathBuf::from("./dogma-data/mirror-scratch"),
            zone: None,
            listener: Arc::new(TracingListener),
        }
    }
}

#[derive(Clone)]
struct MirrorJob {
    project: String,
    mirror: Mirror,
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct MirrorKey(String, String);

/// The per-process mirror scheduler: tick loop, worker pool and
/// per-mirror serialization described in 4.H. Own lifecycle hooks
/// (`start`/`stop`) rather than a hidden global, per the design notes.
pub struct MirrorScheduler {
    repo_manager: Arc<RepositoryManager>,
    config: MirrorSchedulerConfig,
    next_fire: DashMap<MirrorKey, DateTime<Utc>>,
    in_flight: DashMap<MirrorKey, ()>,
    sender: mpsc::UnboundedSender<MirrorJob>,
    receiver: Arc<AsyncMutex<mpsc::UnboundedReceiver<MirrorJob>>>,
    shutdown: CancellationToken,
}

impl MirrorScheduler {
    pub fn new(repo_manager: Arc<RepositoryManager>, config: MirrorSchedulerConfig) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            repo_manager,
            config,
            next_fire: DashMap::new(),
            in_flight: DashMap::new(),
            sender,
            receiver: Arc::new(AsyncMutex::new(receiver)),
            shutdown: CancellationToken::new(),
        })
    }

    /// Start the tick loop and the bounded worker pool. Returns immediately;
    /// the returned handles run until [`MirrorScheduler::stop`] is called.
    pub fn start(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let tick_self = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = tick_self.shutdown.cancelled() => break,
                    _ = interval.tick() => tick_self.tick(),
                }
            }
        }));

        for _ in 0..self.config.num_threads.max(1) {
            let worker_self = Arc::clone(self);
            handles.push(tokio::spawn(async move { worker_self.run_worker().await }));
        }

        handles
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// One tick: enumerate every project's meta-repository, discover its
    /// enabled mirrors, and dispatch those whose schedule has fired and
    /// which are not already running.
    fn tick(&self) {
        let now = Utc::now();
        for project in self.repo_manager.list_projects(true) {
            let view = match self.load_meta_view(&project.name) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(project = %project.name, error = %e, "failed to load meta-repository for mirror discovery");
                    continue;
                }
            };
            for mirror in view.enabled_mirrors() {
                if !mirror.applies_to_zone(self.config.zone.as_deref()) {
                    continue;
                }
                let key = MirrorKey(project.name.clone(), mirror.id.clone());
                if self.in_flight.contains_key(&key) {
                    continue; // still running; backpressure is handled by skipping this tick
                }
                let due = match self.next_fire.get(&key) {
                    Some(t) => *t <= now,
                    None => {
                        self.set_next_fire(&key, &mirror.schedule, now);
                        false
                    }
                };
                if due {
                    self.set_next_fire(&key, &mirror.schedule, now);
                    let _ = self.sender.send(MirrorJob { project: project.name.clone(), mirror: mirror.clone() });
                }
            }
        }
    }

    fn set_next_fire(&self, key: &MirrorKey, schedule: &str, now: DateTime<Utc>) {
        let next = parse_schedule(schedule)
            .ok()
            .and_then(|s| s.after(&now).next())
            .unwrap_or(now + chrono::Duration::days(365));
        self.next_fire.insert(key.clone(), next);
    }

    fn load_meta_view(&self, project: &str) -> MirrorResult<MetaView> {
        let handle = self.repo_manager.handle(project, dogma_core::project::META_REPO_NAME)?;
        Ok(MetaView::rebuild(&handle.snapshot())?)
    }

    async fn run_worker(self: Arc<Self>) {
        loop {
            let job = {
                let mut rx = self.receiver.lock().await;
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    job = rx.recv() => job,
                }
            };
            let Some(job) = job else { return };
            let key = MirrorKey(job.project.clone(), job.mirror.id.clone());
            self.in_flight.insert(key.clone(), ());
            self.execute(job).await;
            self.in_flight.remove(&key);
        }
    }

    async fn execute(&self, job: MirrorJob) {
        let info = MirrorTaskInfo {
            mirror_id: job.mirror.id.clone(),
            project: job.project.clone(),
            direction: job.mirror.direction,
        };
        self.config.listener.on_start(&info);
        match self.run_task(&job.project, &job.mirror).await {
            Ok(result) => self.config.listener.on_complete(&info, &result),
            Err(e) => self.config.listener.on_error(&info, &e),
        }
    }

    async fn run_task(&self, project: &str, mirror: &Mirror) -> MirrorResult<MirrorRunResult> {
        let view = self.load_meta_view(project)?;
        let credential = mirror.credential_id.as_deref().and_then(|id| view.credential(id));
        let ignore = compile_ignore(&mirror.gitignore)?;
        let repo_handle = self.repo_manager.handle(project, &mirror.local.repository)?;

        let dir = scratch_path(&self.config.scratch_dir, project, &mirror.id);
        let (workdir, remote_head) = tokio::task::block_in_place(|| {
            GitWorkdir::sync(&dir, &mirror.remote.uri, &mirror.remote.branch, credential)
        })?;

        match mirror.direction {
            MirrorDirection::RemoteToLocal => {
                self.run_remote_to_local(&repo_handle, mirror, &workdir, &remote_head, &ignore)
            }
            MirrorDirection::LocalToRemote => {
                self.run_local_to_remote(&repo_handle, mirror, &workdir, &ignore, credential)
            }
        }
    }

    fn run_remote_to_local(
        &self,
        repo_handle: &dogma_storage::RepoHandle,
        mirror: &Mirror,
        workdir: &GitWorkdir,
        remote_head: &str,
        ignore: &globset::GlobSet,
    ) -> MirrorResult<MirrorRunResult> {
        let sentinel_path = join_path(&mirror.local.path, SENTINEL_NAME);
        let snapshot = repo_handle.snapshot();

        if let Some(existing) = snapshot.get(&sentinel_path) {
            if let Some(state) = existing.parsed_value().and_then(|v| serde_json::from_value::<MirrorState>(v).ok()) {
                if state.remote_commit_id == remote_head {
                    return Ok(MirrorRunResult { committed: false, new_revision: None, files_synced: 0, bytes_synced: 0 });
                }
            }
        }

        let remote_files = workdir.read_tree(&mirror.remote.path, ignore)?;
        enforce_caps(&mirror.id, &remote_files, mirror.max_num_files, mirror.max_num_bytes)?;

        let local_prefix = &mirror.local.path;
        let mut desired: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for (rel, content) in &remote_files {
            desired.insert(join_path(local_prefix, rel.trim_start_matches('/')), content.clone());
        }

        let mut changes = Vec::new();
        let mut bytes_synced = 0u64;
        for (path, content) in &desired {
            let matches_existing = snapshot
                .get(path)
                .map(|e| e.bytes().map(|b| b == content.as_slice()).unwrap_or(false))
                .unwrap_or(false);
            if matches_existing {
                continue;
            }
            bytes_synced += content.len() as u64;
            changes.push(content_change(path, content));
        }
        for path in snapshot.keys() {
            if path.starts_with(local_prefix.as_str())
                && path != &sentinel_path
                && !desired.contains_key(path)
            {
                changes.push(Change::Remove { path: path.clone() });
            }
        }

        let state = MirrorState { remote_commit_id: remote_head.to_string(), synced_at: Utc::now() };
        changes.push(Change::UpsertJson { path: sentinel_path, content: serde_json::to_value(&state)? });

        let files_synced = desired.len() as u64;
        let outcome = repo_handle.push_privileged(
            Revision::head(),
            Author::new("mirror"),
            format!("Mirror {} sync from {}", mirror.id, mirror.remote.uri),
            None,
            Markup::Plaintext,
            changes,
            false,
        );

        match outcome {
            Ok(o) => Ok(MirrorRunResult { committed: true, new_revision: Some(o.new_revision), files_synced, bytes_synced }),
            Err(CoreError::RedundantChange) => {
                Ok(MirrorRunResult { committed: false, new_revision: None, files_synced: 0, bytes_synced: 0 })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn run_local_to_remote(
        &self,
        repo_handle: &dogma_storage::RepoHandle,
        mirror: &Mirror,
        workdir: &GitWorkdir,
        ignore: &globset::GlobSet,
        credential: Option<&dogma_core::Credential>,
    ) -> MirrorResult<MirrorRunResult> {
        let snapshot = repo_handle.snapshot();
        let mut local_files: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for (path, entry) in &snapshot {
            if let Some(rel) = strip_prefix_path(path, &mirror.local.path) {
                if let Some(bytes) = entry.bytes() {
                    local_files.insert(format!("/{rel}"), bytes.to_vec());
                }
            }
        }
        enforce_caps(&mirror.id, &local_files, mirror.max_num_files, mirror.max_num_bytes)?;

        let remote_files = workdir.read_tree(&mirror.remote.path, ignore)?;
        if remote_files == local_files {
            return Ok(MirrorRunResult { committed: false, new_revision: None, files_synced: 0, bytes_synced: 0 });
        }

        let bytes_synced: u64 = local_files.values().map(|v| v.len() as u64).sum();
        let files_synced = local_files.len() as u64;
        let summary = format!("Mirror {} sync to {}", mirror.id, mirror.remote.uri);
        tokio::task::block_in_place(|| {
            workdir.commit_and_push(&mirror.remote.path, &local_files, &mirror.remote.branch, credential, "dogma-mirror", &summary)
        })?;

        Ok(MirrorRunResult { committed: true, new_revision: None, files_synced, bytes_synced })
    }
}

fn content_change(path: &str, bytes: &[u8]) -> Change {
    let entry_type = dogma_core::EntryType::infer(path);
    match entry_type {
        dogma_core::EntryType::Json => match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(v) => Change::UpsertJson { path: path.to_string(), content: v },
            Err(_) => Change::UpsertText { path: path.to_string(), content: String::from_utf8_lossy(bytes).into_owned() },
        },
        dogma_core::EntryType::Yaml => match serde_yaml::from_slice::<serde_json::Value>(bytes) {
            Ok(v) => Change::UpsertYaml { path: path.to_string(), content: v },
            Err(_) => Change::UpsertText { path: path.to_string(), content: String::from_utf8_lossy(bytes).into_owned() },
        },
        _ => Change::UpsertText { path: path.to_string(), content: String::from_utf8_lossy(bytes).into_owned() },
    }
}

fn enforce_caps(mirror_id: &str, files: &BTreeMap<String, Vec<u8>>, max_files: u64, max_bytes: u64) -> MirrorResult<()> {
    let count = files.len() as u64;
    if count > max_files {
        return Err(MirrorError::TooManyFiles(mirror_id.to_string(), count, max_files));
    }
    let bytes: u64 = files.values().map(|v| v.len() as u64).sum();
    if bytes > max_bytes {
        return Err(MirrorError::TooManyBytes(mirror_id.to_string(), bytes, max_bytes));
    }
    Ok(())
}

fn join_path(root: &str, rel: &str) -> String {
    let rel = rel.trim_start_matches('/');
    if root == "/" || root.is_empty() {
        format!("/{rel}")
    } else {
        format!("{}/{rel}", root.trim_end_matches('/'))
    }
}

fn strip_prefix_path(path: &str, prefix: &str) -> Option<String> {
    if prefix == "/" || prefix.is_empty() {
        return Some(path.trim_start_matches('/').to_string());
    }
    let prefix = prefix.trim_end_matches('/');
    path.strip_prefix(prefix).map(|rest| rest.trim_start_matches('/').to_string())
}

/// `cron` expects a seconds field; mirror schedules are the conventional
/// 5-field unix cron string, so a leading `0 ` (seconds = :00) is
/// prepended before delegating to the crate's parser.
fn parse_schedule(expr: &str) -> MirrorResult<Schedule> {
    Schedule::from_str(expr)
        .or_else(|_| Schedule::from_str(&format!("0 {expr}")))
        .map_err(|e| MirrorError::InvalidSchedule(expr.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_handles_root_and_subtree() {
        assert_eq!(join_path("/", "a.txt"), "/a.txt");
        assert_eq!(join_path("/sub", "a.txt"), "/sub/a.txt");
        assert_eq!(join_path("/sub/", "/a.txt"), "/sub/a.txt");
    }

    #[test]
    fn strip_prefix_path_round_trips_join_path() {
        assert_eq!(strip_prefix_path("/sub/a.txt", "/sub"), Some("a.txt".to_string()));
        assert_eq!(strip_prefix_path("/a.txt", "/"), Some("a.txt".to_string()));
        assert_eq!(strip_prefix_path("/other/a.txt", "/sub"), None);
    }

    #[test]
    fn enforce_caps_boundary_exact_cap_succeeds() {
        let mut files = BTreeMap::new();
        files.insert("/a.txt".to_string(), vec![0u8; 10]);
        assert!(enforce_caps("m", &files, 1, 10).is_ok());
    }

    #[test]
    fn enforce_caps_one_over_cap_fails() {
        let mut files = BTreeMap::new();
        files.insert("/a.txt".to_string(), vec![]);
        files.insert("/b.txt".to_string(), vec![]);
        assert!(matches!(enforce_caps("m", &files, 1, 1_000_000), Err(MirrorError::TooManyFiles(..))));
    }

    #[test]
    fn schedule_parses_5_field_unix_cron() {
        assert!(parse_schedule("0 0 * * *").is_ok());
    }

    #[test]
    fn schedule_rejects_garbage() {
        assert!(parse_schedule("not a cron expression").is_err());
    }
}
