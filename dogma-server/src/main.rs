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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use dogma_server::config::ServerConfig;
use dogma_server::Replica;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage root directory (overrides config file).
    #[arg(long, env = "DOGMA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// This replica's id (overrides config file).
    #[arg(long, env = "DOGMA_REPLICA_ID")]
    replica_id: Option<String>,

    /// Serve in read-only mode regardless of leadership.
    #[arg(long, env = "DOGMA_READ_ONLY")]
    read_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config)?;
    if let Some(dir) = args.data_dir {
        config.storage.data_dir = dir;
    }
    if let Some(id) = args.replica_id {
        config.replication.replica_id = id;
    }
    if args.read_only {
        config.replication.read_only = true;
    }
    config.validate()?;

    let _metrics = dogma_telemetry::init_telemetry("dogma-server");

    tracing::info!(
        data_dir = %config.storage.data_dir.display(),
        replica_id = %config.replication.replica_id,
        read_only = config.replication.read_only,
        "starting dogma replica"
    );

    let mut replica = Replica::bootstrap(&config).await?;
    replica.spawn_background_tasks(&config);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    replica.shutdown().await;

    Ok(())
}
