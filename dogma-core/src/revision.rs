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

//! `Revision`: positive values are absolute (1 = repository creation
//! commit); negative values are relative (-1 = head). All public APIs
//! normalize to positive revisions before any storage I/O.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub const HEAD: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Revision(pub i64);

impl Revision {
    pub const HEAD: Revision = Revision(HEAD);

    pub fn head() -> Self {
        Revision(HEAD)
    }

    pub fn is_head(&self) -> bool {
        self.0 == HEAD
    }

    /// Resolve to a positive, absolute revision against the given head.
    pub fn normalize(&self, head_revision: i64) -> CoreResult<i64> {
        if self.0 == HEAD {
            return Ok(head_revision);
        }
        if self.0 <= 0 {
            return Err(CoreError::InvalidPush(format!(
                "revision must be positive or HEAD (-1), got {}",
                self.0
            )));
        }
        if self.0 > head_revision {
            return Err(CoreError::NotFound(format!(
                "revision {} exceeds head {}",
                self.0, head_revision
            )));
        }
        Ok(self.0)
    }
}

impl From<i64> for Revision {
    fn from(v: i64) -> Self {
        Revision(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_resolves_to_current_head() {
        assert_eq!(Revision::head().normalize(5).unwrap(), 5);
    }

    #[test]
    fn positive_within_range_is_identity() {
        assert_eq!(Revision(3).normalize(5).unwrap(), 3);
    }

    #[test]
    fn zero_and_other_negatives_rejected() {
        assert!(Revision(0).normalize(5).is_err());
        assert!(Revision(-2).normalize(5).is_err());
    }

    #[test]
    fn beyond_head_rejected() {
        assert!(Revision(6).normalize(5).is_err());
    }
}
