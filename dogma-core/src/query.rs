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

//! `Query`: either an identity (path only) lookup or a JSON-path
//! expression against one `.json`/`.yaml` entry. Evaluation itself lives
//! in `dogma-query`; this is just the request shape, kept future-proof
//! for other expression kinds via the tagged representation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Query {
    Identity { path: String },
    JsonPath { path: String, expression: String },
}

impl Query {
    pub fn path(&self) -> &str {
        match self {
            Query::Identity { path } => path,
            Query::JsonPath { path, .. } => path,
        }
    }
}
