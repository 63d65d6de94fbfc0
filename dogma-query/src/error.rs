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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Core(#[from] dogma_core::CoreError),

    #[error("invalid json-path expression '{0}': {1}")]
    InvalidExpression(String, String),

    #[error("json-path expression '{expression}' does not resolve against {path}")]
    PathNotFound { path: String, expression: String },

    #[error("query requires a JSON or YAML entry, got a {0:?} entry at {1}")]
    NotStructured(dogma_core::EntryType, String),
}

pub type QueryResult<T> = Result<T, QueryError>;
