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

//! The query engine (4.C): a stateless function from (repository, revision,
//! query) to an entry or set of entries, evaluated against the commit
//! history tracked by [`dogma_storage::RepoHandle`].

pub mod engine;
pub mod error;
pub mod jsonpath;

pub use engine::QueryEngine;
pub use error::{QueryError, QueryResult};
pub use jsonpath::JsonPathExpr;
