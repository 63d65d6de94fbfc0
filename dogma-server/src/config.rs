// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Dogma server configuration: a single replica's storage location,
/// replication identity and the cron-driven background components
/// (mirror scheduler, session sweeper) it runs locally.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub replication: ReplicationConfig,
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory holding every project's repositories.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplicationConfig {
    /// This process's replica id, used as the coordination-store identity
    /// when contending for leadership.
    #[serde(default = "default_replica_id")]
    pub replica_id: String,

    /// Serve in read-only mode: rejects non-administrative pushes
    /// regardless of leadership.
    #[serde(default)]
    pub read_only: bool,

    /// This replica's zone, if zone-pinned mirrors are in use.
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MirrorConfig {
    /// Worker threads in the mirror scheduler's bounded pool.
    #[serde(default = "default_mirror_threads")]
    pub num_worker_threads: usize,

    /// Scratch checkout directory for mirror working copies.
    #[serde(default = "default_mirror_scratch_dir")]
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// How often the session sweeper scans for expired sessions.
    #[serde(default = "default_session_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Default session TTL granted on login.
    #[serde(default = "default_session_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_session_sweep_interval_secs(),
            default_ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./dogma-data")
}

fn default_replica_id() -> String {
    format!("replica-{}", uuid::Uuid::new_v4())
}

fn default_mirror_threads() -> usize {
    2
}

fn default_mirror_scratch_dir() -> PathBuf {
    PathBuf::from("./dogma-data/mirror-scratch")
}

fn default_session_sweep_interval_secs() -> u64 {
    60
}

fn default_session_ttl_secs() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig { data_dir: default_data_dir() },
            replication: ReplicationConfig {
                replica_id: default_replica_id(),
                read_only: false,
                zone: None,
            },
            mirror: MirrorConfig {
                num_worker_threads: default_mirror_threads(),
                scratch_dir: default_mirror_scratch_dir(),
            },
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Build a configuration purely from environment variables, layered
    /// over the defaults.
    ///
    /// Supported environment variables:
    /// - `DOGMA_DATA_DIR`: storage root (default: ./dogma-data)
    /// - `DOGMA_REPLICA_ID`: this replica's id (default: a random uuid)
    /// - `DOGMA_READ_ONLY`: serve in read-only mode (default: false)
    /// - `DOGMA_ZONE`: this replica's mirror zone pin
    /// - `DOGMA_MIRROR_THREADS`: mirror scheduler worker count (default: 2)
    /// - `DOGMA_SESSION_SWEEP_INTERVAL_SECS`: session sweep cadence (default: 60)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DOGMA_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(id) = std::env::var("DOGMA_REPLICA_ID") {
            config.replication.replica_id = id;
        }
        if let Ok(read_only) = std::env::var("DOGMA_READ_ONLY") {
            config.replication.read_only = read_only.parse().unwrap_or(false);
        }
        if let Ok(zone) = std::env::var("DOGMA_ZONE") {
            config.replication.zone = Some(zone);
        }
        if let Ok(threads) = std::env::var("DOGMA_MIRROR_THREADS") {
            if let Ok(val) = threads.parse() {
                config.mirror.num_worker_threads = val;
            }
        }
        if let Ok(dir) = std::env::var("DOGMA_MIRROR_SCRATCH_DIR") {
            config.mirror.scratch_dir = PathBuf::from(dir);
        }
        if let Ok(secs) = std::env::var("DOGMA_SESSION_SWEEP_INTERVAL_SECS") {
            if let Ok(val) = secs.parse() {
                config.session.sweep_interval_secs = val;
            }
        }
        if let Ok(secs) = std::env::var("DOGMA_SESSION_TTL_SECS") {
            if let Ok(val) = secs.parse() {
                config.session.default_ttl_secs = val;
            }
        }

        config
    }

    /// Load with priority: file > env > defaults.
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!(?path, "loading configuration from file");
                Self::from_file(&path)?
            } else {
                tracing::warn!(?path, "config file not found, using defaults");
                Self::default()
            }
        } else {
            Self::default()
        };

        Ok(Self::merge_with_env(config))
    }

    /// Merge config with environment variables (env takes priority over
    /// the file, file takes priority over defaults).
    fn merge_with_env(mut config: Self) -> Self {
        if std::env::var("DOGMA_DATA_DIR").is_ok() {
            config.storage.data_dir = Self::from_env().storage.data_dir;
        }
        if std::env::var("DOGMA_REPLICA_ID").is_ok() {
            config.replication.replica_id = Self::from_env().replication.replica_id;
        }
        if std::env::var("DOGMA_READ_ONLY").is_ok() {
            config.replication.read_only = Self::from_env().replication.read_only;
        }
        if std::env::var("DOGMA_ZONE").is_ok() {
            config.replication.zone = Self::from_env().replication.zone;
        }
        if std::env::var("DOGMA_MIRROR_THREADS").is_ok() {
            config.mirror.num_worker_threads = Self::from_env().mirror.num_worker_threads;
        }
        config
    }

    /// Validate configuration, creating the data directory if absent.
    pub fn validate(&self) -> Result<()> {
        if self.mirror.num_worker_threads == 0 {
            anyhow::bail!("mirror.num_worker_threads must be at least 1");
        }
        if !self.storage.data_dir.exists() {
            std::fs::create_dir_all(&self.storage.data_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_session_ttl() {
        let config = ServerConfig::default();
        assert_eq!(config.session.default_ttl_secs, 3600);
        assert!(!config.replication.read_only);
    }

    #[test]
    fn from_env_honors_data_dir_and_read_only() {
        std::env::set_var("DOGMA_DATA_DIR", "/tmp/dogma-test-data");
        std::env::set_var("DOGMA_READ_ONLY", "true");

        let config = ServerConfig::from_env();
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/dogma-test-data"));
        assert!(config.replication.read_only);

        std::env::remove_var("DOGMA_DATA_DIR");
        std::env::remove_var("DOGMA_READ_ONLY");
    }

    #[test]
    fn rejects_zero_mirror_threads() {
        let mut config = ServerConfig::default();
        config.mirror.num_worker_threads = 0;
        assert!(config.validate().is_err());
    }
}
