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

//! `Mirror`: a scheduled bidirectional bridge between a local repository
//! subtree and an external Git repository subtree.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorDirection {
    RemoteToLocal,
    LocalToRemote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalTarget {
    pub project: String,
    pub repository: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTarget {
    pub uri: String,
    pub branch: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mirror {
    pub id: String,
    pub direction: MirrorDirection,
    /// Standard 5-field cron expression.
    pub schedule: String,
    pub local: LocalTarget,
    pub remote: RemoteTarget,
    pub credential_id: Option<String>,
    pub gitignore: Vec<String>,
    pub enabled: bool,
    pub zone: Option<String>,
    pub max_num_files: u64,
    pub max_num_bytes: u64,
}

impl Mirror {
    pub fn applies_to_zone(&self, current_zone: Option<&str>) -> bool {
        match (&self.zone, current_zone) {
            (None, _) => true,
            (Some(z), Some(cz)) => z == cz,
            (Some(_), None) => false,
        }
    }
}
