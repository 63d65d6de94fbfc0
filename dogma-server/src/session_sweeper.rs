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

//! The cron-driven expiration sweep for the Session Store (4.G). Every
//! replica runs this loop, but the sweep itself only does work on the
//! current replication leader - followers would otherwise race the
//! leader's own sweep against the same backing files for no benefit.

use std::sync::Arc;
use std::time::Duration;

use dogma_replication::{LocalCoordinationStore, ReplicaState, ReplicationLog};
use dogma_storage::SessionStore;
use tokio_util::sync::CancellationToken;

pub async fn run(
    sessions: Arc<SessionStore>,
    replication: Arc<ReplicationLog<LocalCoordinationStore>>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if replication.state() != ReplicaState::Leader {
                    continue;
                }
                match sessions.sweep_expired() {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed, "swept expired sessions");
                    }
                    Ok(_) => {}
                    Err(error) => tracing::warn!(%error, "session sweep failed"),
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("session sweeper shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn sweeper_exits_promptly_on_shutdown() {
        let sessions = Arc::new(SessionStore::new());
        let store = LocalCoordinationStore::new();
        let replication = Arc::new(ReplicationLog::new(store, "r1"));
        let shutdown = CancellationToken::new();

        let shutdown_clone = shutdown.clone();
        let handle = tokio::spawn(run(sessions, replication, StdDuration::from_secs(60), shutdown_clone));
        shutdown.cancel();
        tokio::time::timeout(StdDuration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
