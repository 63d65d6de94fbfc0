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

//! Wires the configuration repository service's components into a
//! single running replica: storage, query, watch, replication, mirror
//! scheduling and session expiry. The binary entry point is in
//! `main.rs`; this module is the part worth unit-testing in isolation.

pub mod config;
pub mod error;
pub mod service;
pub mod session_sweeper;

use std::sync::Arc;

use anyhow::Result;
use dogma_mirror::{MirrorScheduler, MirrorSchedulerConfig};
use dogma_replication::{LocalCoordinationStore, ReplicationLog};
use dogma_storage::{RepositoryManager, SessionStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::service::Service;

/// Every background task and handle a running replica needs to hold on
/// to for a clean shutdown.
pub struct Replica {
    pub service: Arc<Service>,
    pub mirror_scheduler: Arc<MirrorScheduler>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Replica {
    /// Construct every component per `config` and attempt to win
    /// leadership once before returning. Does not start background
    /// tasks - call `spawn_background_tasks` for that once the caller is
    /// ready to serve.
    pub async fn bootstrap(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let repo_manager = Arc::new(RepositoryManager::with_data_dir(&config.storage.data_dir));
        if repo_manager.get_project(dogma_core::project::INTERNAL_PROJECT_NAME).is_err() {
            repo_manager
                .create_project(dogma_core::project::INTERNAL_PROJECT_NAME, "dogma")
                .ok();
        }

        let coordination = LocalCoordinationStore::new();
        let replication = Arc::new(
            ReplicationLog::new(coordination, config.replication.replica_id.clone())
                .with_data_dir(config.storage.data_dir.join("replication"))?,
        );

        let sessions = Arc::new(SessionStore::with_data_dir(config.storage.data_dir.join("sessions")));

        let service = Arc::new(Service::new(
            repo_manager.clone(),
            replication.clone(),
            sessions,
            config.replication.read_only,
        ));

        let cursor = replication.last_applied();
        if cursor > 0 {
            service.catch_up(cursor).await?;
        }

        let won = replication.try_become_leader().await?;
        tracing::info!(won, replica_id = %config.replication.replica_id, "leadership attempt");

        let mirror_scheduler = MirrorScheduler::new(
            repo_manager,
            MirrorSchedulerConfig {
                num_threads: config.mirror.num_worker_threads,
                scratch_dir: config.mirror.scratch_dir.clone(),
                zone: config.replication.zone.clone(),
                ..Default::default()
            },
        );

        Ok(Self { service, mirror_scheduler, shutdown: CancellationToken::new(), tasks: Vec::new() })
    }

    /// Start the mirror scheduler's tick loop and the session expiry
    /// sweeper as background tasks tied to this replica's shutdown token.
    pub fn spawn_background_tasks(&mut self, config: &ServerConfig) {
        self.tasks.extend(self.mirror_scheduler.start());

        let sweeper = tokio::spawn(crate::session_sweeper::run(
            self.service.sessions.clone(),
            self.service.replication.clone(),
            std::time::Duration::from_secs(config.session.sweep_interval_secs),
            self.shutdown.clone(),
        ));
        self.tasks.push(sweeper);
    }

    /// Signal every background task to stop and wait for them to exit.
    pub async fn shutdown(mut self) {
        self.mirror_scheduler.stop();
        self.shutdown.cancel();
        self.service.replication.stop();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}
