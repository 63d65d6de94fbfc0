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

//! The meta-repository indexer (4.J): rebuilds an in-memory [`MetaView`]
//! of mirrors, credentials, tokens and repo-access metadata from a
//! project's meta-repository snapshot, and migrates the legacy
//! `/mirrors.json`/`/credentials.json` aggregate files into per-id files
//! at startup.
//!
//! This crate has no background task of its own: [`MetaView::rebuild`] is
//! meant to be invoked whenever the caller observes a new commit to the
//! meta-repository (e.g. via the watch registry), and
//! [`migration::migrate_legacy_aggregates`] once per project at startup.

pub mod error;
pub mod migration;
pub mod view;

pub use error::{IndexError, IndexResult};
pub use migration::migrate_legacy_aggregates;
pub use view::{MetaView, CREDENTIALS_PREFIX, MIRRORS_PREFIX, REPOS_PREFIX, TOKENS_PREFIX};
